// Real-time wire protocol: `{"event": <name>, "data": {...}}` JSON frames.

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::PlayerId;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// An event sent by a client over the real-time channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    UpdatePrice(UpdatePrice),
    SellPlayer(SellPlayer),
    MarkUnsold(MarkUnsold),
    RaiseHand(HandSignal),
    LowerHand(HandSignal),
    ChangePlayer(ChangePlayer),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrice {
    pub auction_id: String,
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
    /// Free-form bid action label from the organizer UI. Carried, not used.
    #[serde(default)]
    pub action: Option<String>,
    pub new_price: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellPlayer {
    pub auction_id: String,
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
    pub franchise: String,
    pub sold_price: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUnsold {
    pub auction_id: String,
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandSignal {
    pub auction_id: String,
    #[serde(deserialize_with = "flexible_player_id")]
    pub player_id: PlayerId,
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlayer {
    pub auction_id: String,
    pub new_index: u32,
    #[serde(default)]
    pub show_unsold_only: bool,
}

impl ClientEvent {
    /// Parse one text frame.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UpdatePrice(_) => "updatePrice",
            ClientEvent::SellPlayer(_) => "sellPlayer",
            ClientEvent::MarkUnsold(_) => "markUnsold",
            ClientEvent::RaiseHand(_) => "raiseHand",
            ClientEvent::LowerHand(_) => "lowerHand",
            ClientEvent::ChangePlayer(_) => "changePlayer",
        }
    }

    /// Room the event targets.
    pub fn auction_id(&self) -> &str {
        match self {
            ClientEvent::UpdatePrice(e) => &e.auction_id,
            ClientEvent::SellPlayer(e) => &e.auction_id,
            ClientEvent::MarkUnsold(e) => &e.auction_id,
            ClientEvent::RaiseHand(e) | ClientEvent::LowerHand(e) => &e.auction_id,
            ClientEvent::ChangePlayer(e) => &e.auction_id,
        }
    }
}

/// Accept `playerId` as either a JSON number or a numeric string. Also used
/// by request bodies on the HTTP side.
pub fn flexible_player_id<'de, D>(deserializer: D) -> Result<PlayerId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(PlayerId),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(id) => Ok(id),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid playerId '{s}'"))),
    }
}

// ---------------------------------------------------------------------------
// Server -> room
// ---------------------------------------------------------------------------

/// An event fanned out to an auction room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    PriceUpdate {
        player_id: PlayerId,
        new_price: u32,
    },
    PlayerSold {
        player_id: PlayerId,
        franchise: String,
        sold_price: u32,
    },
    PlayerUnsold {
        player_id: PlayerId,
        base_price: u32,
    },
    HandRaised {
        player_id: PlayerId,
        team_name: String,
    },
    HandLowered {
        player_id: PlayerId,
        team_name: String,
    },
    PlayerChanged {
        new_index: u32,
        show_unsold_only: bool,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PriceUpdate { .. } => "priceUpdate",
            ServerEvent::PlayerSold { .. } => "playerSold",
            ServerEvent::PlayerUnsold { .. } => "playerUnsold",
            ServerEvent::HandRaised { .. } => "handRaised",
            ServerEvent::HandLowered { .. } => "handLowered",
            ServerEvent::PlayerChanged { .. } => "playerChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_sell_player() {
        let raw = r#"{"event":"sellPlayer","data":{"auctionId":"A001","playerId":7,"franchise":"Mumbai Indians","soldPrice":500}}"#;
        let event = ClientEvent::from_json(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::SellPlayer(SellPlayer {
                auction_id: "A001".into(),
                player_id: 7,
                franchise: "Mumbai Indians".into(),
                sold_price: 500,
            })
        );
        assert_eq!(event.name(), "sellPlayer");
        assert_eq!(event.auction_id(), "A001");
    }

    #[test]
    fn player_id_accepts_numeric_string() {
        let raw = r#"{"event":"markUnsold","data":{"auctionId":"A001","playerId":" 42 "}}"#;
        match ClientEvent::from_json(raw).unwrap() {
            ClientEvent::MarkUnsold(e) => assert_eq!(e.player_id, 42),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn player_id_rejects_non_numeric_string() {
        let raw = r#"{"event":"markUnsold","data":{"auctionId":"A001","playerId":"abc"}}"#;
        assert!(ClientEvent::from_json(raw).is_err());
    }

    #[test]
    fn update_price_action_is_optional() {
        let raw = r#"{"event":"updatePrice","data":{"auctionId":"A001","playerId":7,"newPrice":250}}"#;
        match ClientEvent::from_json(raw).unwrap() {
            ClientEvent::UpdatePrice(e) => {
                assert_eq!(e.new_price, 250);
                assert_eq!(e.action, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn hand_signals_share_payload() {
        let raw = r#"{"event":"lowerHand","data":{"auctionId":"A001","playerId":"3","team":"CSK"}}"#;
        let event = ClientEvent::from_json(raw).unwrap();
        assert_eq!(event.name(), "lowerHand");
        assert!(matches!(event, ClientEvent::LowerHand(HandSignal { player_id: 3, .. })));
    }

    #[test]
    fn unknown_event_or_missing_field_is_rejected() {
        assert!(ClientEvent::from_json(r#"{"event":"deleteAuction","data":{}}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"event":"sellPlayer","data":{"auctionId":"A001"}}"#).is_err());
        assert!(ClientEvent::from_json("not json").is_err());
    }

    #[test]
    fn server_events_use_camel_case_wire_names() {
        let sold = ServerEvent::PlayerSold {
            player_id: 7,
            franchise: "Mumbai Indians".into(),
            sold_price: 500,
        };
        let value: serde_json::Value = serde_json::from_str(&sold.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "playerSold",
                "data": {"playerId": 7, "franchise": "Mumbai Indians", "soldPrice": 500}
            })
        );

        let changed = ServerEvent::PlayerChanged {
            new_index: 4,
            show_unsold_only: true,
        };
        let value: serde_json::Value = serde_json::from_str(&changed.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "playerChanged");
        assert_eq!(value["data"]["newIndex"], 4);
        assert_eq!(value["data"]["showUnsoldOnly"], true);
    }
}
