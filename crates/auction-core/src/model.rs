// Auction data model: auctions, their teams and players, the player
// directory entry, and the auction status state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuctionError;

/// Player identifier as used by the player directory.
pub type PlayerId = u32;

/// Team name recorded in the ledger when a player goes unsold.
pub const UNSOLD_TEAM: &str = "UNSOLD";

// ---------------------------------------------------------------------------
// Auction status
// ---------------------------------------------------------------------------

/// Lifecycle of an auction. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Upcoming => "upcoming",
            AuctionStatus::Ongoing => "ongoing",
            AuctionStatus::Completed => "completed",
        }
    }

    /// Validate a requested transition and return the new status.
    ///
    /// - `completed` accepts nothing.
    /// - `ongoing` is only reachable from `upcoming`.
    /// - `completed` is reachable from `upcoming` or `ongoing`.
    /// - Re-requesting the current status is rejected like any other
    ///   transition that is not in the table above.
    pub fn transition_to(self, next: AuctionStatus) -> Result<AuctionStatus, AuctionError> {
        use AuctionStatus::*;
        match (self, next) {
            (Completed, _) => Err(AuctionError::InvalidTransition {
                from: self,
                to: next,
                reason: "auction is already completed".into(),
            }),
            (Upcoming, Ongoing) => Ok(Ongoing),
            (_, Ongoing) => Err(AuctionError::InvalidTransition {
                from: self,
                to: next,
                reason: "only an upcoming auction can be started".into(),
            }),
            (Upcoming | Ongoing, Completed) => Ok(Completed),
            (_, Upcoming) => Err(AuctionError::InvalidTransition {
                from: self,
                to: next,
                reason: "an auction cannot return to upcoming".into(),
            }),
        }
    }

    /// Whether player mutations (price, sale, unsold) are permitted.
    pub fn accepts_mutations(&self) -> bool {
        !matches!(self, AuctionStatus::Completed)
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(AuctionStatus::Upcoming),
            "ongoing" => Ok(AuctionStatus::Ongoing),
            "completed" => Ok(AuctionStatus::Completed),
            other => Err(AuctionError::Validation(format!(
                "invalid status value '{other}', expected one of upcoming, ongoing, completed"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Auction records
// ---------------------------------------------------------------------------

/// A participating franchise. Added by the approval workflow; the core only
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub phone: String,
}

/// Per-auction sale state of one directory player.
///
/// `sold == true` if and only if `sold_to` is `Some`. The storage layer
/// enforces this with a CHECK constraint and every mutation goes through
/// [`AuctionPlayer::sell`] / [`AuctionPlayer::mark_unsold`] semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionPlayer {
    pub player_id: PlayerId,
    pub base_price: u32,
    pub sold_price: u32,
    pub sold_to: Option<String>,
    pub sold: bool,
}

impl AuctionPlayer {
    /// A fresh, unsold player as created alongside its auction.
    pub fn new(player_id: PlayerId, base_price: u32) -> Self {
        Self {
            player_id,
            base_price,
            sold_price: 0,
            sold_to: None,
            sold: false,
        }
    }

    /// Record a provisional bid.
    pub fn set_price(&mut self, new_price: u32) {
        self.sold_price = new_price;
    }

    /// Close the player to a franchise. The stored franchise is normalized.
    pub fn sell(&mut self, franchise: &str, sold_price: u32) {
        self.sold_price = sold_price;
        self.sold_to = Some(normalize_team_name(franchise));
        self.sold = true;
    }

    /// Return the player to the pool at half the base price. Returns the new
    /// (discounted) price.
    pub fn mark_unsold(&mut self) -> u32 {
        let discounted = unsold_price(self.base_price);
        self.sold_price = discounted;
        self.sold_to = None;
        self.sold = false;
        discounted
    }

    pub fn status_label(&self) -> &'static str {
        if self.sold {
            "Sold"
        } else {
            "Available"
        }
    }
}

/// The durable record for one auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub auction_id: String,
    pub name: String,
    pub status: AuctionStatus,
    pub max_teams: u32,
    pub max_players_per_team: u32,
    pub budget_per_team: u32,
    pub created_by: String,
    pub teams: Vec<Team>,
    pub players: Vec<AuctionPlayer>,
}

impl Auction {
    pub fn player(&self, player_id: PlayerId) -> Option<&AuctionPlayer> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Find a registered team by name, comparing normalized forms.
    pub fn team(&self, team_name: &str) -> Option<&Team> {
        let wanted = normalize_team_name(team_name);
        self.teams
            .iter()
            .find(|t| normalize_team_name(&t.name) == wanted)
    }
}

/// Input for creating an auction. Auction creation itself belongs to an
/// external workflow; this exists so that workflow (and fixtures) can write
/// through the same store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuction {
    pub auction_id: String,
    pub name: String,
    #[serde(default = "default_max_teams")]
    pub max_teams: u32,
    #[serde(default = "default_max_players_per_team")]
    pub max_players_per_team: u32,
    #[serde(default = "default_budget_per_team")]
    pub budget_per_team: u32,
    #[serde(default)]
    pub created_by: String,
    /// (player_id, base_price) pairs.
    #[serde(default)]
    pub players: Vec<NewAuctionPlayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuctionPlayer {
    pub player_id: PlayerId,
    pub base_price: u32,
}

fn default_max_teams() -> u32 {
    8
}

fn default_max_players_per_team() -> u32 {
    25
}

fn default_budget_per_team() -> u32 {
    10_000
}

// ---------------------------------------------------------------------------
// Player directory
// ---------------------------------------------------------------------------

/// An entry in the (externally owned) player directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub age: Option<u32>,
    /// Playing role, e.g. "BATTER" or "ALL-ROUNDER".
    #[serde(default)]
    pub specialism: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub previous_teams: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Pricing and naming rules
// ---------------------------------------------------------------------------

/// Price a player returns to after going unsold: half the base, rounded down.
pub fn unsold_price(base_price: u32) -> u32 {
    base_price / 2
}

/// Amount the ledger records for an unsold outcome. This reconstructs the
/// base from the discounted price (`floor(base / 2) * 2`) instead of storing
/// the discounted price itself, so odd base prices lose one unit.
pub fn unsold_ledger_amount(discounted_price: u32) -> u32 {
    discounted_price.saturating_mul(2)
}

/// Display name used when a player id has no directory entry.
pub fn unknown_player_name(player_id: PlayerId) -> String {
    format!("Unknown Player (ID: {player_id})")
}

/// Canonical team-name form: every whitespace character removed.
///
/// Applied wherever a team name is compared against stored `sold_to` values.
pub fn normalize_team_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}
