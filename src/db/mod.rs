//! Subscription registry: tracked wallets, push subscribers, chat
//! subscribers. One SQLite file in WAL mode; the pipeline only reads,
//! mutations arrive through the Telegram command surface.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::Mutex;

use crate::logger::{self, LogTag};

#[derive(Debug, Clone)]
pub struct TrackedWallet {
    pub address: String,
    pub added_by: i64,
    pub added_at: i64,
}

#[derive(Debug, Clone)]
pub struct PushSubscription {
    pub user_id: i64,
    pub push_key: String,
    pub created_at: i64,
}

/// Registry connection wrapper. All access serializes through one
/// connection; the workload is read-mostly and tiny.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        logger::info(LogTag::Database, &format!("Registry opened at {}", path));
        Ok(db)
    }

    /// In-memory registry for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tracked_wallets (
                address TEXT PRIMARY KEY COLLATE NOCASE,
                added_by INTEGER NOT NULL,
                added_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS push_subscriptions (
                user_id INTEGER PRIMARY KEY,
                push_key TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS push_sequential_sells_subscriptions (
                user_id INTEGER PRIMARY KEY,
                push_key TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_subscribers (
                user_id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    // ---- tracked wallets ----

    /// Add a wallet to the tracked set. Returns false when it was already
    /// present (no-op).
    pub fn add_wallet(&self, address: &str, added_by: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO tracked_wallets (address, added_by, added_at)
             VALUES (?1, ?2, ?3)",
            params![address, added_by, Utc::now().timestamp()],
        )?;
        Ok(changed > 0)
    }

    /// Remove a wallet. Returns false when it was not tracked.
    pub fn remove_wallet(&self, address: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM tracked_wallets WHERE address = ?1",
            params![address],
        )?;
        Ok(changed > 0)
    }

    /// Membership check, case-insensitive. An empty tracked set means
    /// "track everything" so a fresh install still alerts.
    pub fn is_wallet_tracked(&self, address: &str) -> Result<bool> {
        if self.wallet_count()? == 0 {
            logger::warning(
                LogTag::Database,
                "Tracked-wallet set is empty, treating every wallet as tracked",
            );
            return Ok(true);
        }
        let conn = self.conn.lock().unwrap();
        let found: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracked_wallets WHERE address = ?1",
            params![address],
            |row| row.get(0),
        )?;
        Ok(found > 0)
    }

    pub fn list_wallets(&self, skip: u32, limit: u32) -> Result<Vec<TrackedWallet>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT address, added_by, added_at FROM tracked_wallets
             ORDER BY added_at, address LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, skip], |row| {
            Ok(TrackedWallet {
                address: row.get(0)?,
                added_by: row.get(1)?,
                added_at: row.get(2)?,
            })
        })?;
        let mut wallets = Vec::new();
        for wallet in rows {
            wallets.push(wallet?);
        }
        Ok(wallets)
    }

    pub fn wallet_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM tracked_wallets", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ---- push subscriptions ----

    /// Register (or refresh) the general push subscription for a user.
    /// One subscription per user per class; re-subscribing updates the key.
    pub fn add_push_subscription(&self, user_id: i64, push_key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO push_subscriptions (user_id, push_key, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, push_key, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn remove_push_subscription(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM push_subscriptions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn subscribers_general(&self) -> Result<Vec<PushSubscription>> {
        self.load_subscriptions("push_subscriptions")
    }

    pub fn add_sequential_sells_subscription(&self, user_id: i64, push_key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO push_sequential_sells_subscriptions
             (user_id, push_key, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, push_key, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn remove_sequential_sells_subscription(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM push_sequential_sells_subscriptions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn subscribers_sequential_sells(&self) -> Result<Vec<PushSubscription>> {
        self.load_subscriptions("push_sequential_sells_subscriptions")
    }

    fn load_subscriptions(&self, table: &str) -> Result<Vec<PushSubscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT user_id, push_key, created_at FROM {} ORDER BY created_at",
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(PushSubscription {
                user_id: row.get(0)?,
                push_key: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        let mut subscriptions = Vec::new();
        for subscription in rows {
            subscriptions.push(subscription?);
        }
        Ok(subscriptions)
    }

    // ---- chat subscribers ----

    pub fn add_chat_subscriber(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO chat_subscribers (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, Utc::now().timestamp()],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_chat_subscriber(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM chat_subscribers WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn chat_subscribers(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT user_id FROM chat_subscribers ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut users = Vec::new();
        for user in rows {
            users.push(user?);
        }
        Ok(users)
    }

    /// Total push subscribers across both classes, for the health report.
    pub fn subscriber_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let general: i64 =
            conn.query_row("SELECT COUNT(*) FROM push_subscriptions", [], |row| {
                row.get(0)
            })?;
        let sells: i64 = conn.query_row(
            "SELECT COUNT(*) FROM push_sequential_sells_subscriptions",
            [],
            |row| row.get(0),
        )?;
        Ok((general + sells) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_insert_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_wallet("Wallet1", 42).unwrap());
        assert!(!db.add_wallet("Wallet1", 42).unwrap());
        assert_eq!(db.wallet_count().unwrap(), 1);
    }

    #[test]
    fn wallet_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.add_wallet("AbCdEf", 1).unwrap();
        // A second wallet keeps the set non-empty without matching.
        db.add_wallet("Other", 1).unwrap();
        assert!(db.is_wallet_tracked("abcdef").unwrap());
        assert!(db.is_wallet_tracked("ABCDEF").unwrap());
        assert!(!db.is_wallet_tracked("Unknown").unwrap());
    }

    #[test]
    fn duplicate_insert_differs_only_in_case() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_wallet("AbCdEf", 1).unwrap());
        assert!(!db.add_wallet("ABCDEF", 1).unwrap());
        assert_eq!(db.wallet_count().unwrap(), 1);
    }

    #[test]
    fn empty_tracked_set_tracks_everything() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.is_wallet_tracked("anything").unwrap());
    }

    #[test]
    fn remove_wallet_reports_membership() {
        let db = Database::open_in_memory().unwrap();
        db.add_wallet("W1", 1).unwrap();
        assert!(db.remove_wallet("W1").unwrap());
        assert!(!db.remove_wallet("W1").unwrap());
    }

    #[test]
    fn list_wallets_paginates() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.add_wallet(&format!("W{}", i), 1).unwrap();
        }
        let page = db.list_wallets(2, 2).unwrap();
        assert_eq!(page.len(), 2);
        let all = db.list_wallets(0, 100).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn push_subscription_is_one_per_user() {
        let db = Database::open_in_memory().unwrap();
        db.add_push_subscription(7, "key-a").unwrap();
        db.add_push_subscription(7, "key-b").unwrap();
        let subs = db.subscribers_general().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].push_key, "key-b");
    }

    #[test]
    fn subscription_classes_are_independent() {
        let db = Database::open_in_memory().unwrap();
        db.add_push_subscription(1, "general-key").unwrap();
        db.add_sequential_sells_subscription(2, "sells-key").unwrap();
        assert_eq!(db.subscribers_general().unwrap().len(), 1);
        assert_eq!(db.subscribers_sequential_sells().unwrap().len(), 1);
        assert_eq!(db.subscriber_count().unwrap(), 2);
        assert!(db.remove_sequential_sells_subscription(2).unwrap());
        assert_eq!(db.subscriber_count().unwrap(), 1);
    }

    #[test]
    fn chat_subscribers_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_chat_subscriber(10).unwrap());
        assert!(!db.add_chat_subscriber(10).unwrap());
        assert_eq!(db.chat_subscribers().unwrap(), vec![10]);
        assert!(db.remove_chat_subscriber(10).unwrap());
        assert!(db.chat_subscribers().unwrap().is_empty());
    }
}
