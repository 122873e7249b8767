// Read-only views over current auction state: per-team spend summary and the
// directory-joined player listings.

use serde::Serialize;
use tracing::warn;

use crate::db::Database;
use crate::error::AuctionError;
use crate::model::{normalize_team_name, unknown_player_name, Auction, AuctionPlayer, PlayerId};

const UNKNOWN: &str = "Unknown";

// ---------------------------------------------------------------------------
// Franchise summary
// ---------------------------------------------------------------------------

/// One player bought by a franchise, as shown on the team's squad page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquadPlayer {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    #[serde(rename = "Player Name")]
    pub name: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Age")]
    pub age: Option<u32>,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Base Price")]
    pub base_price: u32,
    #[serde(rename = "Sold Price")]
    pub sold_price: u32,
    #[serde(rename = "Previous Teams")]
    pub previous_teams: Vec<String>,
    #[serde(rename = "Image")]
    pub image: Option<String>,
}

/// A team's current standing, derived from current player state (never from
/// the ledger).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FranchiseSummary {
    pub team_name: String,
    pub players: Vec<SquadPlayer>,
    pub total_spent: u64,
    /// `budget_per_team - total_spent`. Negative when a team overspent;
    /// nothing upstream prevents that.
    pub remaining_purse: i64,
    pub budget_per_team: u32,
    pub auction_name: String,
    pub team_exists: bool,
}

/// Summarize what `team_name` has bought in `auction_id`.
///
/// The query name, registered team names and stored `sold_to` values are all
/// compared in normalized form. Players missing from the directory yield a
/// placeholder record instead of failing the summary.
pub fn franchise_summary(
    db: &Database,
    auction_id: &str,
    team_name: &str,
) -> Result<FranchiseSummary, AuctionError> {
    let auction = load(db, auction_id)?;

    if auction.team(team_name).is_none() {
        return Err(AuctionError::TeamNotFound {
            auction_id: auction_id.to_string(),
            team_name: team_name.to_string(),
        });
    }

    let wanted = normalize_team_name(team_name);
    let bought: Vec<&AuctionPlayer> = auction
        .players
        .iter()
        .filter(|p| p.sold && p.sold_to.as_deref() == Some(wanted.as_str()))
        .collect();

    let total_spent: u64 = bought.iter().map(|p| u64::from(p.sold_price)).sum();
    let remaining_purse = i64::from(auction.budget_per_team) - total_spent as i64;
    if remaining_purse < 0 {
        warn!(
            auction_id,
            team = %wanted,
            total_spent,
            budget = auction.budget_per_team,
            "team has spent beyond its budget"
        );
    }

    let ids: Vec<PlayerId> = bought.iter().map(|p| p.player_id).collect();
    let profiles = db.player_profiles(&ids)?;

    let players = bought
        .into_iter()
        .map(|p| match profiles.get(&p.player_id) {
            Some(profile) => SquadPlayer {
                player_id: p.player_id,
                name: or_unknown(&profile.name),
                country: or_unknown(&profile.country),
                age: profile.age,
                role: or_unknown(&profile.specialism),
                category: or_unknown(&profile.category),
                base_price: p.base_price,
                sold_price: p.sold_price,
                previous_teams: profile.previous_teams.clone(),
                image: profile.image.clone(),
            },
            None => {
                warn!(auction_id, player_id = p.player_id, "player details not found");
                SquadPlayer {
                    player_id: p.player_id,
                    name: unknown_player_name(p.player_id),
                    country: UNKNOWN.to_string(),
                    age: None,
                    role: UNKNOWN.to_string(),
                    category: UNKNOWN.to_string(),
                    base_price: p.base_price,
                    sold_price: p.sold_price,
                    previous_teams: Vec::new(),
                    image: None,
                }
            }
        })
        .collect();

    Ok(FranchiseSummary {
        team_name: team_name.to_string(),
        players,
        total_spent,
        remaining_purse,
        budget_per_team: auction.budget_per_team,
        auction_name: auction.name,
        team_exists: true,
    })
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Player listings
// ---------------------------------------------------------------------------

/// An auction player joined with its directory entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerListing {
    pub auction_name: String,
    pub max_teams: u32,
    pub player_id: PlayerId,
    pub player_name: String,
    pub country: String,
    pub age: Option<u32>,
    pub role: String,
    pub category: String,
    pub base_price: u32,
    pub sold_price: u32,
    /// Normalized franchise for sold players, empty otherwise.
    pub franchise: String,
    pub status: &'static str,
    pub image: Option<String>,
    pub previous_teams: Vec<String>,
}

/// List an auction's players in list order, optionally only the unsold ones.
/// Players with no directory entry are left out (and logged).
pub fn list_players(
    db: &Database,
    auction_id: &str,
    unsold_only: bool,
) -> Result<Vec<PlayerListing>, AuctionError> {
    let auction = load(db, auction_id)?;

    let selected: Vec<&AuctionPlayer> = auction
        .players
        .iter()
        .filter(|p| !unsold_only || !p.sold)
        .collect();
    let ids: Vec<PlayerId> = selected.iter().map(|p| p.player_id).collect();
    let profiles = db.player_profiles(&ids)?;

    let mut listings = Vec::with_capacity(selected.len());
    for p in selected {
        let Some(profile) = profiles.get(&p.player_id) else {
            warn!(auction_id, player_id = p.player_id, "player details not found, skipping");
            continue;
        };
        listings.push(PlayerListing {
            auction_name: auction.name.clone(),
            max_teams: auction.max_teams,
            player_id: p.player_id,
            player_name: profile.name.clone(),
            country: profile.country.clone(),
            age: profile.age,
            role: profile.specialism.clone(),
            category: profile.category.clone(),
            base_price: p.base_price,
            sold_price: p.sold_price,
            franchise: p.sold_to.clone().unwrap_or_default(),
            status: p.status_label(),
            image: profile.image.clone(),
            previous_teams: profile.previous_teams.clone(),
        });
    }
    Ok(listings)
}

fn load(db: &Database, auction_id: &str) -> Result<Auction, AuctionError> {
    db.load_auction(auction_id)?
        .ok_or_else(|| AuctionError::AuctionNotFound {
            auction_id: auction_id.to_string(),
        })
}
