// SQLite persistence layer: auction state store and player directory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::AuctionError;
use crate::model::{
    Auction, AuctionPlayer, AuctionStatus, NewAuction, PlayerId, PlayerProfile, Team,
};

/// A single field-scoped change to one auction player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerChange {
    /// Provisional bid display.
    Price(u32),
    /// Final sale to a franchise (raw name; normalized on write).
    Sell { franchise: String, sold_price: u32 },
    /// Return to the pool at half the base price.
    Unsold,
}

/// SQLite-backed store for auctions, their teams and players, the player
/// directory, and the bidding ledger table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                player_id      INTEGER PRIMARY KEY,
                name           TEXT NOT NULL,
                country        TEXT NOT NULL DEFAULT '',
                age            INTEGER,
                specialism     TEXT NOT NULL DEFAULT '',
                category       TEXT NOT NULL DEFAULT '',
                previous_teams TEXT NOT NULL DEFAULT '[]',
                image          TEXT
            );

            CREATE TABLE IF NOT EXISTS auctions (
                auction_id           TEXT PRIMARY KEY,
                name                 TEXT NOT NULL,
                status               TEXT NOT NULL DEFAULT 'upcoming'
                                     CHECK (status IN ('upcoming', 'ongoing', 'completed')),
                max_teams            INTEGER NOT NULL,
                max_players_per_team INTEGER NOT NULL,
                budget_per_team      INTEGER NOT NULL,
                created_by           TEXT NOT NULL DEFAULT '',
                created_at           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS auction_teams (
                auction_id TEXT NOT NULL REFERENCES auctions(auction_id),
                team_name  TEXT NOT NULL,
                email      TEXT NOT NULL,
                logo       TEXT,
                phone      TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (auction_id, team_name)
            );

            CREATE TABLE IF NOT EXISTS auction_players (
                auction_id TEXT NOT NULL REFERENCES auctions(auction_id),
                player_id  INTEGER NOT NULL,
                list_order INTEGER NOT NULL,
                base_price INTEGER NOT NULL,
                sold_price INTEGER NOT NULL DEFAULT 0,
                sold_to    TEXT,
                sold       INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (auction_id, player_id),
                CHECK ((sold = 1) = (sold_to IS NOT NULL))
            );

            CREATE TABLE IF NOT EXISTS bidding_history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                auction_id  TEXT NOT NULL,
                player_name TEXT NOT NULL,
                team_name   TEXT NOT NULL,
                bid_amount  INTEGER NOT NULL,
                timestamp   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_bidding_history_auction
                ON bidding_history(auction_id, timestamp);

            CREATE TRIGGER IF NOT EXISTS bidding_history_no_update
                BEFORE UPDATE ON bidding_history
                BEGIN SELECT RAISE(ABORT, 'bidding_history is append-only'); END;

            CREATE TRIGGER IF NOT EXISTS bidding_history_no_delete
                BEFORE DELETE ON bidding_history
                BEGIN SELECT RAISE(ABORT, 'bidding_history is append-only'); END;
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Player directory
    // ------------------------------------------------------------------

    /// Insert or replace a directory entry.
    pub fn upsert_player(&self, profile: &PlayerProfile) -> Result<()> {
        let conn = self.conn();
        let previous_teams = serde_json::to_string(&profile.previous_teams)
            .context("failed to serialize previous teams")?;
        conn.execute(
            "INSERT INTO players (player_id, name, country, age, specialism, category, previous_teams, image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(player_id) DO UPDATE SET
                name           = excluded.name,
                country        = excluded.country,
                age            = excluded.age,
                specialism     = excluded.specialism,
                category       = excluded.category,
                previous_teams = excluded.previous_teams,
                image          = excluded.image",
            params![
                profile.player_id,
                profile.name,
                profile.country,
                profile.age,
                profile.specialism,
                profile.category,
                previous_teams,
                profile.image,
            ],
        )
        .context("failed to upsert player")?;
        Ok(())
    }

    /// Look up a single directory entry.
    pub fn player_profile(&self, player_id: PlayerId) -> Result<Option<PlayerProfile>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT player_id, name, country, age, specialism, category, previous_teams, image
             FROM players WHERE player_id = ?1",
            params![player_id],
            profile_from_row,
        )
        .optional()
        .context("failed to query player profile")
    }

    /// Look up many directory entries at once. Ids with no entry are simply
    /// absent from the returned map.
    pub fn player_profiles(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerProfile>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, name, country, age, specialism, category, previous_teams, image
                 FROM players WHERE player_id = ?1",
            )
            .context("failed to prepare player lookup")?;

        let mut found = HashMap::with_capacity(ids.len());
        for &id in ids {
            if let Some(profile) = stmt
                .query_row(params![id], profile_from_row)
                .optional()
                .context("failed to query player profile")?
            {
                found.insert(id, profile);
            }
        }
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Auctions (creation and team registration are driven externally)
    // ------------------------------------------------------------------

    /// Create an auction with its player list. Returns `false` without
    /// touching anything if the auction id already exists.
    pub fn create_auction(&self, auction: &NewAuction) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO auctions
                    (auction_id, name, max_teams, max_players_per_team, budget_per_team, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    auction.auction_id,
                    auction.name,
                    auction.max_teams,
                    auction.max_players_per_team,
                    auction.budget_per_team,
                    auction.created_by,
                ],
            )
            .context("failed to insert auction")?;

        if inserted == 0 {
            return Ok(false);
        }

        for (order, player) in auction.players.iter().enumerate() {
            tx.execute(
                "INSERT INTO auction_players (auction_id, player_id, list_order, base_price)
                 VALUES (?1, ?2, ?3, ?4)",
                params![auction.auction_id, player.player_id, order as i64, player.base_price],
            )
            .with_context(|| {
                format!(
                    "failed to insert player {} into auction {}",
                    player.player_id, auction.auction_id
                )
            })?;
        }

        tx.commit().context("failed to commit auction creation")?;
        Ok(true)
    }

    /// Register an approved team with an auction. Re-adding an existing team
    /// name is a no-op.
    pub fn add_team(&self, auction_id: &str, team: &Team) -> Result<(), AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        require_status(&tx, auction_id)?;
        tx.execute(
            "INSERT OR IGNORE INTO auction_teams (auction_id, team_name, email, logo, phone)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![auction_id, team.name, team.email, team.logo, team.phone],
        )
        .context("failed to insert team")?;
        tx.commit().context("failed to commit team registration")?;
        Ok(())
    }

    /// Load the full auction record, or `None` if it does not exist.
    pub fn load_auction(&self, auction_id: &str) -> Result<Option<Auction>> {
        let conn = self.conn();

        let header = conn
            .query_row(
                "SELECT auction_id, name, status, max_teams, max_players_per_team, budget_per_team, created_by
                 FROM auctions WHERE auction_id = ?1",
                params![auction_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .context("failed to query auction")?;

        let Some((id, name, status, max_teams, max_players_per_team, budget_per_team, created_by)) =
            header
        else {
            return Ok(None);
        };

        let status: AuctionStatus = status
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt status for auction {id}: {e}"))?;

        let teams = conn
            .prepare(
                "SELECT team_name, email, logo, phone FROM auction_teams
                 WHERE auction_id = ?1 ORDER BY rowid",
            )
            .context("failed to prepare team query")?
            .query_map(params![auction_id], |row| {
                Ok(Team {
                    name: row.get(0)?,
                    email: row.get(1)?,
                    logo: row.get(2)?,
                    phone: row.get(3)?,
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;

        let players = conn
            .prepare(
                "SELECT player_id, base_price, sold_price, sold_to, sold FROM auction_players
                 WHERE auction_id = ?1 ORDER BY list_order",
            )
            .context("failed to prepare auction player query")?
            .query_map(params![auction_id], player_from_row)
            .context("failed to query auction players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map auction player rows")?;

        Ok(Some(Auction {
            auction_id: id,
            name,
            status,
            max_teams,
            max_players_per_team,
            budget_per_team,
            created_by,
            teams,
            players,
        }))
    }

    /// Current status of an auction, or `None` if it does not exist.
    pub fn auction_status(&self, auction_id: &str) -> Result<Option<AuctionStatus>> {
        let conn = self.conn();
        read_status(&conn, auction_id)
    }

    /// Drive the auction status machine. The read, the guard, and the write
    /// happen in one transaction.
    pub fn update_status(
        &self,
        auction_id: &str,
        next: AuctionStatus,
    ) -> Result<AuctionStatus, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let current = require_status(&tx, auction_id)?;
        let status = current.transition_to(next)?;
        tx.execute(
            "UPDATE auctions SET status = ?1 WHERE auction_id = ?2",
            params![status.as_str(), auction_id],
        )
        .context("failed to update auction status")?;
        tx.commit().context("failed to commit status update")?;
        Ok(status)
    }

    // ------------------------------------------------------------------
    // Player mutations
    // ------------------------------------------------------------------

    /// Current state of one auction player. Fails with `AuctionNotFound` or
    /// `PlayerNotFound` rather than returning `None`.
    pub fn auction_player(
        &self,
        auction_id: &str,
        player_id: PlayerId,
    ) -> Result<AuctionPlayer, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        require_status(&tx, auction_id)?;
        let player = find_player(&tx, auction_id, player_id)?;
        tx.commit().context("failed to commit player lookup")?;
        Ok(player)
    }

    /// Apply one change to one auction player and return the stored result.
    ///
    /// The auction's status is re-checked and the player row is read and
    /// written inside one transaction. Only the columns the change touches
    /// are written.
    pub fn apply_player_change(
        &self,
        auction_id: &str,
        player_id: PlayerId,
        change: &PlayerChange,
    ) -> Result<AuctionPlayer, AuctionError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let status = require_status(&tx, auction_id)?;
        if !status.accepts_mutations() {
            return Err(AuctionError::AuctionClosed {
                auction_id: auction_id.to_string(),
            });
        }

        let mut player = find_player(&tx, auction_id, player_id)?;

        match change {
            PlayerChange::Price(new_price) => {
                player.set_price(*new_price);
                tx.execute(
                    "UPDATE auction_players SET sold_price = ?1
                     WHERE auction_id = ?2 AND player_id = ?3",
                    params![player.sold_price, auction_id, player_id],
                )
                .context("failed to update player price")?;
            }
            PlayerChange::Sell {
                franchise,
                sold_price,
            } => {
                player.sell(franchise, *sold_price);
                tx.execute(
                    "UPDATE auction_players SET sold_price = ?1, sold_to = ?2, sold = 1
                     WHERE auction_id = ?3 AND player_id = ?4",
                    params![player.sold_price, player.sold_to, auction_id, player_id],
                )
                .context("failed to record player sale")?;
            }
            PlayerChange::Unsold => {
                player.mark_unsold();
                tx.execute(
                    "UPDATE auction_players SET sold_price = ?1, sold_to = NULL, sold = 0
                     WHERE auction_id = ?2 AND player_id = ?3",
                    params![player.sold_price, auction_id, player_id],
                )
                .context("failed to mark player unsold")?;
            }
        }

        tx.commit().context("failed to commit player change")?;
        Ok(player)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn read_status(conn: &Connection, auction_id: &str) -> Result<Option<AuctionStatus>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT status FROM auctions WHERE auction_id = ?1",
            params![auction_id],
            |row| row.get(0),
        )
        .optional()
        .context("failed to query auction status")?;

    raw.map(|s| {
        s.parse()
            .map_err(|e| anyhow::anyhow!("corrupt status for auction {auction_id}: {e}"))
    })
    .transpose()
}

fn require_status(tx: &Transaction<'_>, auction_id: &str) -> Result<AuctionStatus, AuctionError> {
    read_status(tx, auction_id)?.ok_or_else(|| AuctionError::AuctionNotFound {
        auction_id: auction_id.to_string(),
    })
}

fn find_player(
    tx: &Transaction<'_>,
    auction_id: &str,
    player_id: PlayerId,
) -> Result<AuctionPlayer, AuctionError> {
    tx.query_row(
        "SELECT player_id, base_price, sold_price, sold_to, sold FROM auction_players
         WHERE auction_id = ?1 AND player_id = ?2",
        params![auction_id, player_id],
        player_from_row,
    )
    .optional()
    .context("failed to query auction player")?
    .ok_or_else(|| AuctionError::PlayerNotFound {
        auction_id: auction_id.to_string(),
        player_id,
    })
}

fn player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuctionPlayer> {
    Ok(AuctionPlayer {
        player_id: row.get(0)?,
        base_price: row.get(1)?,
        sold_price: row.get(2)?,
        sold_to: row.get(3)?,
        sold: row.get(4)?,
    })
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerProfile> {
    let previous_teams: String = row.get(6)?;
    Ok(PlayerProfile {
        player_id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        age: row.get(3)?,
        specialism: row.get(4)?,
        category: row.get(5)?,
        previous_teams: serde_json::from_str(&previous_teams).unwrap_or_default(),
        image: row.get(7)?,
    })
}
