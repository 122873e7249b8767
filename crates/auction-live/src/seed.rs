// Fixture loader: populates the directory, auctions and teams from TOML.

use std::path::Path;

use anyhow::{Context, Result};
use auction_core::db::Database;
use auction_core::model::{NewAuction, PlayerProfile, Team};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub players: Vec<PlayerProfile>,
    #[serde(default)]
    pub auctions: Vec<SeedAuction>,
}

/// An auction as created by the external workflow, plus its approved teams.
#[derive(Debug, Deserialize)]
pub struct SeedAuction {
    #[serde(flatten)]
    pub auction: NewAuction,
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// What a seeding pass changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub players: usize,
    pub auctions_created: usize,
    pub auctions_skipped: usize,
}

pub fn parse_seed(text: &str) -> Result<SeedFile> {
    toml::from_str(text).context("failed to parse seed file")
}

/// Read `path` and apply it to `db`.
pub fn load_seed_file(db: &Database, path: &Path) -> Result<SeedReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed = parse_seed(&text).with_context(|| format!("in {}", path.display()))?;
    apply_seed(db, &seed)
}

/// Apply fixtures. Safe to run on every start.
pub fn apply_seed(db: &Database, seed: &SeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for player in &seed.players {
        db.upsert_player(player)
            .with_context(|| format!("failed to seed player {}", player.player_id))?;
        report.players += 1;
    }

    for SeedAuction { auction, teams } in &seed.auctions {
        let created = db
            .create_auction(auction)
            .with_context(|| format!("failed to seed auction {}", auction.auction_id))?;

        if created {
            report.auctions_created += 1;
        } else {
            report.auctions_skipped += 1;
        }

        for team in teams {
            db.add_team(&auction.auction_id, team)
                .map_err(anyhow::Error::from)
                .with_context(|| {
                    format!(
                        "failed to seed team {} in auction {}",
                        team.name, auction.auction_id
                    )
                })?;
        }
    }

    info!(
        players = report.players,
        created = report.auctions_created,
        skipped = report.auctions_skipped,
        "seed fixtures applied"
    );
    Ok(report)
}
