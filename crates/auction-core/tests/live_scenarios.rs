// End-to-end flows through the processor, ledger, hub and summary together.

use std::sync::Arc;

use auction_core::db::Database;
use auction_core::franchise::franchise_summary;
use auction_core::hub::LiveSessionHub;
use auction_core::model::{AuctionStatus, NewAuction, NewAuctionPlayer, PlayerProfile, Team};
use auction_core::processor::PriceUpdateProcessor;
use auction_core::protocol::ServerEvent;
use auction_core::AuctionError;
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn setup() -> (Arc<Database>, Arc<LiveSessionHub>, PriceUpdateProcessor) {
    let db = Arc::new(Database::open(":memory:").unwrap());
    db.upsert_player(&PlayerProfile {
        player_id: 7,
        name: "Rohit Sharma".into(),
        country: "India".into(),
        age: Some(37),
        specialism: "BATTER".into(),
        category: "Capped".into(),
        previous_teams: vec!["MI".into()],
        image: None,
    })
    .unwrap();
    db.create_auction(&NewAuction {
        auction_id: "A001".into(),
        name: "Mega Auction".into(),
        max_teams: 8,
        max_players_per_team: 25,
        budget_per_team: 10_000,
        created_by: "organizer@example.com".into(),
        players: vec![NewAuctionPlayer {
            player_id: 7,
            base_price: 200,
        }],
    })
    .unwrap();
    db.add_team(
        "A001",
        &Team {
            name: "Mumbai Indians".into(),
            email: "mi@example.com".into(),
            logo: None,
            phone: String::new(),
        },
    )
    .unwrap();

    let hub = Arc::new(LiveSessionHub::new());
    let processor = PriceUpdateProcessor::new(Arc::clone(&db), Arc::clone(&hub));
    (db, hub, processor)
}

fn join(hub: &LiveSessionHub, auction_id: &str) -> (u64, mpsc::Receiver<String>) {
    let conn = hub.next_connection_id();
    let (tx, rx) = mpsc::channel(32);
    hub.join(auction_id, conn, tx).unwrap();
    (conn, rx)
}

fn next_json(rx: &mut mpsc::Receiver<String>) -> Value {
    serde_json::from_str(&rx.try_recv().expect("expected a frame")).unwrap()
}

#[tokio::test]
async fn sell_then_unsold_scenario() {
    let (db, hub, processor) = setup();
    let (_conn, mut rx) = join(&hub, "A001");

    processor
        .sell_player("A001", 7, "Mumbai Indians", 500)
        .await
        .unwrap();

    let stored = db.auction_player("A001", 7).unwrap();
    assert_eq!(stored.sold_price, 500);
    assert_eq!(stored.sold_to.as_deref(), Some("MumbaiIndians"));
    assert!(stored.sold);
    assert_eq!(
        next_json(&mut rx),
        json!({"event": "playerSold", "data": {"playerId": 7, "franchise": "Mumbai Indians", "soldPrice": 500}})
    );

    let summary = franchise_summary(&db, "A001", "Mumbai Indians").unwrap();
    assert_eq!(summary.total_spent, 500);

    processor.mark_unsold("A001", 7).await.unwrap();

    let stored = db.auction_player("A001", 7).unwrap();
    assert_eq!(stored.sold_price, 100);
    assert_eq!(stored.sold_to, None);
    assert!(!stored.sold);
    assert_eq!(
        next_json(&mut rx),
        json!({"event": "playerUnsold", "data": {"playerId": 7, "basePrice": 100}})
    );

    let ledger = processor.ledger().list_by_auction("A001").unwrap();
    assert_eq!(ledger.len(), 2);
    let teams: Vec<(&str, u32)> = ledger
        .iter()
        .map(|e| (e.team_name.as_str(), e.bid_amount))
        .collect();
    assert!(teams.contains(&("Mumbai Indians", 500)));
    assert!(teams.contains(&("UNSOLD", 200)));
    assert!(ledger.iter().all(|e| e.player_name == "Rohit Sharma"));

    // Current standing reads player state, not history.
    let summary = franchise_summary(&db, "A001", "Mumbai Indians").unwrap();
    assert_eq!(summary.total_spent, 0);
}

#[tokio::test]
async fn ledger_only_grows_and_never_changes() {
    let (_db, _hub, processor) = setup();
    let mut previous = Vec::new();

    for round in 0..3u32 {
        processor
            .sell_player("A001", 7, "Mumbai Indians", 400 + round)
            .await
            .unwrap();
        processor.update_price("A001", 7, 999).await.unwrap();
        processor.mark_unsold("A001", 7).await.unwrap();

        let now = processor.ledger().list_by_auction("A001").unwrap();
        assert!(now.len() > previous.len());
        for old in &previous {
            assert!(now.contains(old), "ledger entry changed or vanished: {old:?}");
        }
        previous = now;
    }
    assert_eq!(previous.len(), 6);
}

#[tokio::test]
async fn change_player_does_not_echo_to_sender() {
    let (_db, hub, _processor) = setup();
    let (organizer, mut rx_organizer) = join(&hub, "A001");
    let (_team, mut rx_team) = join(&hub, "A001");

    hub.broadcast(
        "A001",
        &ServerEvent::PlayerChanged {
            new_index: 5,
            show_unsold_only: true,
        },
        Some(organizer),
    );

    assert!(rx_organizer.try_recv().is_err());
    assert_eq!(
        next_json(&mut rx_team),
        json!({"event": "playerChanged", "data": {"newIndex": 5, "showUnsoldOnly": true}})
    );
}

#[tokio::test]
async fn completing_the_auction_freezes_players() {
    let (db, hub, processor) = setup();
    let (_conn, mut rx) = join(&hub, "A001");

    db.update_status("A001", AuctionStatus::Ongoing).unwrap();
    processor.update_price("A001", 7, 250).await.unwrap();
    let _ = rx.try_recv();
    db.update_status("A001", AuctionStatus::Completed).unwrap();

    let err = processor
        .sell_player("A001", 7, "Mumbai Indians", 500)
        .await
        .unwrap_err();
    assert!(matches!(err, AuctionError::AuctionClosed { .. }));
    assert_eq!(db.auction_player("A001", 7).unwrap().sold_price, 250);
    assert!(rx.try_recv().is_err());
}
