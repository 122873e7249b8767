// Append-only bidding ledger: one row per final sale or unsold outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::Database;

/// One final outcome. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub auction_id: String,
    pub player_name: String,
    /// Team as submitted by the client (not normalized), or `UNSOLD`.
    pub team_name: String,
    pub bid_amount: u32,
    pub timestamp: DateTime<Utc>,
}

/// Write/read handle over the `bidding_history` table.
#[derive(Clone)]
pub struct BiddingLedger {
    db: Arc<Database>,
}

impl BiddingLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an outcome stamped with the current time.
    pub fn append(
        &self,
        auction_id: &str,
        player_name: &str,
        team_name: &str,
        bid_amount: u32,
    ) -> Result<LedgerEntry> {
        self.append_at(auction_id, player_name, team_name, bid_amount, Utc::now())
    }

    /// Append an outcome with an explicit timestamp.
    pub fn append_at(
        &self,
        auction_id: &str,
        player_name: &str,
        team_name: &str,
        bid_amount: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        // Stored at millisecond precision; keep the returned entry identical.
        let timestamp = timestamp.trunc_subsecs(3);
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO bidding_history (auction_id, player_name, team_name, bid_amount, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                auction_id,
                player_name,
                team_name,
                bid_amount,
                timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            ],
        )
        .with_context(|| format!("failed to append ledger entry for auction {auction_id}"))?;

        Ok(LedgerEntry {
            id: conn.last_insert_rowid(),
            auction_id: auction_id.to_string(),
            player_name: player_name.to_string(),
            team_name: team_name.to_string(),
            bid_amount,
            timestamp,
        })
    }

    /// All entries for one auction, newest first. Entries sharing a
    /// timestamp come back in reverse insertion order.
    pub fn list_by_auction(&self, auction_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.db.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, auction_id, player_name, team_name, bid_amount, timestamp
                 FROM bidding_history
                 WHERE auction_id = ?1
                 ORDER BY timestamp DESC, id DESC",
            )
            .context("failed to prepare ledger query")?;

        let rows = stmt
            .query_map(params![auction_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("failed to query ledger")?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, auction_id, player_name, team_name, bid_amount, ts) =
                row.context("failed to read ledger row")?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .with_context(|| format!("invalid ledger timestamp '{ts}' on entry {id}"))?
                .with_timezone(&Utc);
            entries.push(LedgerEntry {
                id,
                auction_id,
                player_name,
                team_name,
                bid_amount,
                timestamp,
            });
        }
        Ok(entries)
    }
}
