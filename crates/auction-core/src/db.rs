// SQLite persistence layer for teams, players and users.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AuctionError, AuctionResult, Entity};
use crate::model::{NewPlayer, NewTeam, Player, PlayerUpdate, Team, User};

// Databases from older deployments store prices as REAL and allow a NULL
// status, so both are normalized on read.
const PLAYER_COLUMNS: &str = "id, name, role, style, CAST(basePrice AS INTEGER), image, \
     COALESCE(status, 'Unsold'), CAST(COALESCE(soldPrice, 0) AS INTEGER), soldToTeamId";

/// SQLite-backed store for the auction. All access goes through a single
/// connection guarded by a mutex, so writers are serialized in-process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

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
            CREATE TABLE IF NOT EXISTS teams (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                budget          INTEGER NOT NULL CHECK (budget > 0),
                remainingBudget INTEGER NOT NULL
                    CHECK (remainingBudget >= 0 AND remainingBudget <= budget),
                logo            TEXT
            );

            CREATE TABLE IF NOT EXISTS players (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                name         TEXT NOT NULL,
                role         TEXT NOT NULL,
                style        TEXT,
                basePrice    INTEGER NOT NULL,
                image        TEXT,
                status       TEXT NOT NULL DEFAULT 'Unsold',
                soldPrice    INTEGER NOT NULL DEFAULT 0,
                soldToTeamId INTEGER REFERENCES teams(id)
            );

            CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role          TEXT NOT NULL DEFAULT 'admin'
            );
            ",
        )
        .context("failed to create database schema")?;

        // Migration: databases created before player styles existed lack the
        // column. ALTER TABLE fails with "duplicate column name" otherwise.
        conn.execute_batch("ALTER TABLE players ADD COLUMN style TEXT;")
            .ok();

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_players_sold_to ON players(soldToTeamId);",
        )
        .context("failed to create soldToTeamId index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// All teams ordered by id, each carrying the ids of the players sold
    /// to it.
    pub fn list_teams(&self) -> AuctionResult<Vec<Team>> {
        let conn = self.conn();
        let mut teams = conn
            .prepare("SELECT id, name, budget, remainingBudget, logo FROM teams ORDER BY id")?
            .query_map([], team_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut owned: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT soldToTeamId, id FROM players
             WHERE soldToTeamId IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (team_id, player_id) = row?;
            owned.entry(team_id).or_default().push(player_id);
        }

        for team in &mut teams {
            team.players = owned.remove(&team.id).unwrap_or_default();
        }
        Ok(teams)
    }

    pub fn team(&self, id: i64) -> AuctionResult<Team> {
        let conn = self.conn();
        let mut team = conn
            .query_row(
                "SELECT id, name, budget, remainingBudget, logo FROM teams WHERE id = ?1",
                params![id],
                team_from_row,
            )
            .optional()?
            .ok_or_else(|| AuctionError::not_found(Entity::Team, id))?;

        team.players = conn
            .prepare("SELECT id FROM players WHERE soldToTeamId = ?1 ORDER BY id")?
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(team)
    }

    /// Register a team with its full budget available.
    pub fn create_team(&self, new: &NewTeam) -> AuctionResult<Team> {
        new.validate()?;
        let name = new.name.trim();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO teams (name, budget, remainingBudget, logo) VALUES (?1, ?2, ?2, ?3)",
            params![name, new.budget, new.logo],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(team_id = id, name, budget = new.budget, "team registered");

        Ok(Team {
            id,
            name: name.to_string(),
            budget: new.budget,
            remaining_budget: new.budget,
            logo: new.logo.clone(),
            players: vec![],
        })
    }

    /// Delete a team. Teams that already own sold players are kept so the
    /// sale history stays consistent.
    pub fn delete_team(&self, id: i64) -> AuctionResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM teams WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(AuctionError::not_found(Entity::Team, id));
        }

        let players: i64 = tx.query_row(
            "SELECT COUNT(*) FROM players WHERE soldToTeamId = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if players > 0 {
            return Err(AuctionError::TeamHasPlayers {
                team_id: id,
                players: players as usize,
            });
        }

        tx.execute("DELETE FROM teams WHERE id = ?1", params![id])?;
        tx.commit()?;
        tracing::info!(team_id = id, "team deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn list_players(&self) -> AuctionResult<Vec<Player>> {
        let conn = self.conn();
        let players = conn
            .prepare(&format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY id"))?
            .query_map([], player_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    pub fn player(&self, id: i64) -> AuctionResult<Player> {
        let conn = self.conn();
        load_player(&conn, id)
    }

    pub fn create_player(&self, new: &NewPlayer) -> AuctionResult<Player> {
        new.validate()?;
        let name = new.name.trim();
        let status = new.initial_status();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO players (name, role, style, basePrice, image, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                new.role.as_str(),
                new.style,
                new.base_price,
                new.image,
                status.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(player_id = id, name, %status, "player created");

        Ok(Player {
            id,
            name: name.to_string(),
            role: new.role,
            style: new.style.clone(),
            base_price: new.base_price,
            image: new.image.clone(),
            status,
            sold_price: 0,
            sold_to_team_id: None,
        })
    }

    /// Apply a partial update and return the number of rows written
    /// (0 when the update carries no fields).
    pub fn update_player(&self, id: i64, update: &PlayerUpdate) -> AuctionResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = load_player(&tx, id)?;
        if update.is_empty() {
            return Ok(0);
        }
        // Validates the resulting row; only supplied columns are written.
        update.apply_to(&current)?;

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(status.as_str().to_string().into());
        }
        if let Some(style) = &update.style {
            sets.push("style = ?");
            values.push(style.clone().into());
        }
        if let Some(price) = update.sold_price {
            sets.push("soldPrice = ?");
            values.push(price.into());
        }
        if let Some(team_id) = update.sold_to_team_id {
            sets.push("soldToTeamId = ?");
            values.push(match team_id {
                Some(team_id) => team_id.into(),
                None => rusqlite::types::Value::Null,
            });
        }
        values.push(id.into());

        let sql = format!("UPDATE players SET {} WHERE id = ?", sets.join(", "));
        let changes = tx.execute(&sql, rusqlite::params_from_iter(values))?;
        tx.commit()?;
        tracing::debug!(player_id = id, changes, "player updated");
        Ok(changes)
    }

    pub fn delete_player(&self, id: i64) -> AuctionResult<()> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM players WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(AuctionError::not_found(Entity::Player, id));
        }
        tracing::info!(player_id = id, "player deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a user with an already-hashed password. A taken email is a
    /// validation failure.
    pub fn create_user(&self, email: &str, password_hash: &str) -> AuctionResult<User> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (email, password_hash) VALUES (?1, ?2)",
            params![email, password_hash],
        )?;
        if inserted == 0 {
            return Err(AuctionError::validation("Email already exists"));
        }
        Ok(User {
            id: conn.last_insert_rowid(),
            email: email.to_string(),
            role: "admin".to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> AuctionResult<Option<User>> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, email, role, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        role: row.get(2)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        budget: row.get(2)?,
        remaining_budget: row.get(3)?,
        logo: row.get(4)?,
        players: vec![],
    })
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let role: String = row.get(2)?;
    let status: String = row.get(6)?;
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        role: role.parse().map_err(|e| text_conversion_error(2, e))?,
        style: row.get(3)?,
        base_price: row.get(4)?,
        image: row.get(5)?,
        status: status.parse().map_err(|e| text_conversion_error(6, e))?,
        sold_price: row.get(7)?,
        sold_to_team_id: row.get(8)?,
    })
}

fn text_conversion_error(column: usize, err: AuctionError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(err),
    )
}

/// Load one player through any connection or open transaction.
pub(crate) fn load_player(conn: &Connection, id: i64) -> AuctionResult<Player> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
        params![id],
        player_from_row,
    )
    .optional()?
    .ok_or_else(|| AuctionError::not_found(Entity::Player, id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{PlayerRole, PlayerStatus};

    /// Helper: create a fresh in-memory database for each test.
    pub(crate) fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    pub(crate) fn new_team(name: &str, budget: i64) -> NewTeam {
        NewTeam {
            name: name.to_string(),
            budget,
            logo: None,
        }
    }

    pub(crate) fn new_player(name: &str, base_price: i64) -> NewPlayer {
        NewPlayer {
            name: name.to_string(),
            role: PlayerRole::Batsman,
            style: Some("Right Hand Bat".to_string()),
            base_price,
            image: None,
            status: None,
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(tables, vec!["players", "teams", "users"]);
    }

    #[test]
    fn create_team_starts_with_full_budget() {
        let db = test_db();
        let team = db.create_team(&new_team("  Mumbai Mavericks ", 1_000_000)).unwrap();
        assert_eq!(team.name, "Mumbai Mavericks");
        assert_eq!(team.remaining_budget, 1_000_000);
        assert!(team.players.is_empty());

        let listed = db.list_teams().unwrap();
        assert_eq!(listed, vec![team]);
    }

    #[test]
    fn create_team_rejects_bad_budget() {
        let db = test_db();
        let err = db.create_team(&new_team("Broke XI", 0)).unwrap_err();
        assert!(matches!(err, AuctionError::Validation(_)));
        assert!(db.list_teams().unwrap().is_empty());
    }

    #[test]
    fn team_lookup_reports_missing_id() {
        let db = test_db();
        assert_eq!(
            db.team(9).unwrap_err(),
            AuctionError::not_found(Entity::Team, 9)
        );
    }

    #[test]
    fn list_teams_attaches_sold_players() {
        let db = test_db();
        let a = db.create_team(&new_team("A", 1_000_000)).unwrap();
        let b = db.create_team(&new_team("B", 1_000_000)).unwrap();
        let p1 = db.create_player(&new_player("P1", 100_000)).unwrap();
        let p2 = db.create_player(&new_player("P2", 100_000)).unwrap();
        db.create_player(&new_player("P3", 100_000)).unwrap();

        db.sell_player(p1.id, a.id, 200_000).unwrap();
        db.sell_player(p2.id, a.id, 300_000).unwrap();

        let teams = db.list_teams().unwrap();
        assert_eq!(teams[0].players, vec![p1.id, p2.id]);
        assert!(teams[1].players.is_empty());
        assert_eq!(teams[1].id, b.id);
        assert_eq!(db.team(a.id).unwrap().players, vec![p1.id, p2.id]);
    }

    #[test]
    fn delete_team_without_players() {
        let db = test_db();
        let team = db.create_team(&new_team("Gone", 500_000)).unwrap();
        db.delete_team(team.id).unwrap();
        assert!(db.list_teams().unwrap().is_empty());
        assert!(matches!(
            db.delete_team(team.id),
            Err(AuctionError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn delete_team_with_sold_players_is_rejected() {
        let db = test_db();
        let team = db.create_team(&new_team("Owners", 500_000)).unwrap();
        let player = db.create_player(&new_player("Bought", 100_000)).unwrap();
        db.sell_player(player.id, team.id, 100_000).unwrap();

        assert_eq!(
            db.delete_team(team.id).unwrap_err(),
            AuctionError::TeamHasPlayers {
                team_id: team.id,
                players: 1
            }
        );
        assert_eq!(db.list_teams().unwrap().len(), 1);
    }

    #[test]
    fn create_player_defaults_to_unsold() {
        let db = test_db();
        let player = db.create_player(&new_player("V. Kohli", 200_000)).unwrap();
        assert_eq!(player.status, PlayerStatus::Unsold);
        assert_eq!(player.sold_price, 0);
        assert_eq!(db.player(player.id).unwrap(), player);
    }

    #[test]
    fn self_registered_player_is_pending_until_approved() {
        let db = test_db();
        let mut new = new_player("Walk-in", 100_000);
        new.status = Some(PlayerStatus::Pending);
        let player = db.create_player(&new).unwrap();
        assert_eq!(player.status, PlayerStatus::Pending);

        let changes = db.update_player(player.id, &PlayerUpdate::mark_unsold()).unwrap();
        assert_eq!(changes, 1);
        assert_eq!(db.player(player.id).unwrap().status, PlayerStatus::Unsold);
    }

    #[test]
    fn update_with_only_status_keeps_other_columns() {
        let db = test_db();
        let player = db.create_player(&new_player("Keeper", 100_000)).unwrap();
        db.update_player(player.id, &PlayerUpdate::mark_unsold()).unwrap();
        let after = db.player(player.id).unwrap();
        assert_eq!(after.style.as_deref(), Some("Right Hand Bat"));
        assert_eq!(after.sold_price, 0);
        assert_eq!(after.sold_to_team_id, None);
    }

    #[test]
    fn empty_update_writes_nothing() {
        let db = test_db();
        let player = db.create_player(&new_player("Idle", 100_000)).unwrap();
        assert_eq!(db.update_player(player.id, &PlayerUpdate::default()).unwrap(), 0);
    }

    #[test]
    fn update_rejects_marking_sold() {
        let db = test_db();
        let team = db.create_team(&new_team("A", 1_000_000)).unwrap();
        let player = db.create_player(&new_player("Shortcut", 100_000)).unwrap();
        let update = PlayerUpdate {
            status: Some(PlayerStatus::Sold),
            sold_price: Some(100_000),
            sold_to_team_id: Some(Some(team.id)),
            ..Default::default()
        };
        assert!(matches!(
            db.update_player(player.id, &update),
            Err(AuctionError::Validation(_))
        ));
        assert_eq!(db.player(player.id).unwrap().status, PlayerStatus::Unsold);
        assert_eq!(db.team(team.id).unwrap().remaining_budget, 1_000_000);
    }

    #[test]
    fn update_missing_player_is_not_found() {
        let db = test_db();
        assert!(matches!(
            db.update_player(404, &PlayerUpdate::mark_unsold()),
            Err(AuctionError::EntityNotFound { entity: Entity::Player, .. })
        ));
    }

    #[test]
    fn delete_player_then_missing() {
        let db = test_db();
        let player = db.create_player(&new_player("Temp", 100_000)).unwrap();
        db.delete_player(player.id).unwrap();
        assert!(db.list_players().unwrap().is_empty());
        assert!(db.delete_player(player.id).is_err());
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = test_db();
        let user = db.create_user("ops@example.com", "hash").unwrap();
        assert_eq!(user.role, "admin");
        assert!(matches!(
            db.create_user("ops@example.com", "other"),
            Err(AuctionError::Validation(_))
        ));

        let found = db.find_user_by_email("ops@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
        assert!(db.find_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn remaining_budget_check_constraint_enforced() {
        let db = test_db();
        let team = db.create_team(&new_team("A", 100)).unwrap();
        let conn = db.conn();
        let result = conn.execute(
            "UPDATE teams SET remainingBudget = -1 WHERE id = ?1",
            params![team.id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn migration_adds_style_to_legacy_players_table() {
        let db_path = std::env::temp_dir().join(format!(
            "auction_style_migration_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&db_path);
        let db_path_str = db_path.to_str().unwrap();

        // Create a legacy database on disk: REAL prices, nullable status and
        // no style column.
        {
            let conn = Connection::open(db_path_str).unwrap();
            conn.execute_batch(
                "CREATE TABLE teams (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    budget INTEGER NOT NULL,
                    remainingBudget INTEGER NOT NULL,
                    logo TEXT
                );
                CREATE TABLE players (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    role TEXT NOT NULL,
                    basePrice REAL NOT NULL,
                    image TEXT,
                    status TEXT DEFAULT 'Unsold',
                    soldPrice REAL DEFAULT 0,
                    soldToTeamId INTEGER,
                    FOREIGN KEY (soldToTeamId) REFERENCES teams (id)
                );
                INSERT INTO teams (name, budget, remainingBudget) VALUES ('Chennai', 1000000, 1000000);
                INSERT INTO players (name, role, basePrice) VALUES ('Legacy', 'Bowler', 50000);
                INSERT INTO players (name, role, basePrice, status, soldPrice)
                    VALUES ('Unknown', 'Batsman', 20000.0, NULL, NULL);",
            )
            .unwrap();
        }

        let db = Database::open(db_path_str).unwrap();
        let players = db.list_players().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Legacy");
        assert_eq!(players[0].style, None);
        assert_eq!(players[0].base_price, 50_000);
        assert_eq!(players[0].sold_price, 0);
        assert_eq!(players[1].status, PlayerStatus::Unsold);
        assert_eq!(players[1].base_price, 20_000);
        assert_eq!(players[1].sold_price, 0);

        // Legacy rows go through the sale engine like any other.
        let team = db.list_teams().unwrap()[0].id;
        assert_eq!(db.sell_player(players[0].id, team, 75_000).unwrap(), 925_000);
        let sold = db.player(players[0].id).unwrap();
        assert_eq!(sold.status, PlayerStatus::Sold);
        assert_eq!(sold.sold_price, 75_000);

        // Re-opening an already migrated database is harmless.
        drop(db);
        Database::open(db_path_str).unwrap();

        let _ = std::fs::remove_file(&db_path);
    }
}
