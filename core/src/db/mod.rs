mod admin;
mod foods;
mod logs;
mod stats;
mod users;

pub use admin::DEFAULT_USER_PAGE;

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;

use crate::models::DATE_FORMAT;

/// Schema version written by [`Database::migrate`].
pub const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open an existing database. Refuses to serve from a schema that has
    /// not been migrated to [`SCHEMA_VERSION`].
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self::connect(path)?;
        let version = db.schema_version()?;
        if version < SCHEMA_VERSION {
            bail!(
                "Database {} is at schema version {version}, expected {SCHEMA_VERSION}. Run `dietlog migrate` first",
                path.display()
            );
        }
        if version > SCHEMA_VERSION {
            bail!(
                "Database {} has schema version {version}, newer than this build supports ({SCHEMA_VERSION})",
                path.display()
            );
        }
        Ok(db)
    }

    /// Open (creating if needed) and bring the schema up to date.
    pub fn open_and_migrate(path: &Path) -> Result<Self> {
        let db = Self::connect(path)?;
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Database { conn })
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .context("Failed to read schema version")
    }

    /// Idempotent: each step runs only when the stored version is below it.
    pub fn migrate(&self) -> Result<()> {
        let version = self.schema_version()?;

        if version < 1 {
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS users (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        email TEXT NOT NULL UNIQUE,
                        password_hash TEXT NOT NULL,
                        name TEXT,
                        age INTEGER,
                        gender TEXT,
                        height REAL,
                        weight REAL,
                        target_weight REAL,
                        activity_level TEXT,
                        goal TEXT,
                        bmr REAL,
                        tdee REAL,
                        daily_calories REAL,
                        daily_protein REAL,
                        daily_carbs REAL,
                        daily_fat REAL,
                        is_admin INTEGER NOT NULL DEFAULT 0,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS foods (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        calories REAL NOT NULL,
                        protein REAL,
                        carbs REAL,
                        fat REAL,
                        serving_size TEXT,
                        barcode TEXT,
                        category TEXT,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS daily_logs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                        date TEXT NOT NULL,
                        meal_type TEXT,
                        food_id INTEGER REFERENCES foods(id) ON DELETE SET NULL,
                        food_name TEXT,
                        calories REAL,
                        protein REAL,
                        carbs REAL,
                        fat REAL,
                        quantity REAL DEFAULT 1,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS water_logs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                        date TEXT NOT NULL,
                        amount REAL,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS exercise_logs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                        date TEXT NOT NULL,
                        exercise_name TEXT,
                        duration INTEGER,
                        calories_burned REAL,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS weight_logs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                        date TEXT NOT NULL,
                        weight REAL NOT NULL,
                        created_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS favorite_foods (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                        food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
                        created_at TEXT NOT NULL,
                        UNIQUE (user_id, food_id)
                    );

                    CREATE INDEX IF NOT EXISTS idx_daily_logs_user_date ON daily_logs(user_id, date);
                    CREATE INDEX IF NOT EXISTS idx_water_logs_user_date ON water_logs(user_id, date);
                    CREATE INDEX IF NOT EXISTS idx_exercise_logs_user_date ON exercise_logs(user_id, date);
                    CREATE INDEX IF NOT EXISTS idx_weight_logs_user_date ON weight_logs(user_id, date);
                    CREATE INDEX IF NOT EXISTS idx_daily_logs_created ON daily_logs(created_at);
                    CREATE INDEX IF NOT EXISTS idx_water_logs_created ON water_logs(created_at);
                    CREATE INDEX IF NOT EXISTS idx_exercise_logs_created ON exercise_logs(created_at);
                    CREATE INDEX IF NOT EXISTS idx_weight_logs_created ON weight_logs(created_at);
                    CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);
                    CREATE INDEX IF NOT EXISTS idx_foods_category ON foods(category);

                    PRAGMA user_version = 1;",
                )
                .context("Failed to apply schema version 1")?;
        }

        Ok(())
    }
}

fn now_timestamp() -> String {
    Local::now().to_rfc3339()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn date_str(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` substring pattern.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
