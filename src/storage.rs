//! SQLite-backed storage for profiles, check-ins, food logs, and the conversation log.

use crate::store::{validate_exchange, ContextProvider, ConversationStore, StoreError};
use crate::types::{ConversationContext, ConversationRecord, Mood, MAX_COMMON_EMOTIONS};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub const DB_FILE: &str = "companion.db";

/// Food logs scanned when deriving common emotions.
const EMOTION_WINDOW: i64 = 20;

pub const ENERGY_RANGE: RangeInclusive<u8> = 1..=5;
pub const STRESS_RANGE: RangeInclusive<u8> = 1..=10;

fn check_range(field: &'static str, value: u8, range: &RangeInclusive<u8>) -> Result<(), StoreError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(StoreError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join(DB_FILE))?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                dietary_preferences TEXT NOT NULL DEFAULT '[]',
                mental_health_goals TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS checkins (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                mood TEXT NOT NULL,
                energy_level INTEGER NOT NULL,
                stress_level INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS food_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                food_items TEXT NOT NULL,
                emotions_before TEXT NOT NULL DEFAULT '[]',
                emotions_after TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_message TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checkins_user_date ON checkins(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_food_logs_user_date ON food_logs(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_conversations_user_date ON conversations(user_id, created_at);
            "#,
        )?;
        Ok(())
    }

    pub fn upsert_profile(
        &mut self,
        user_id: &str,
        goals: &[String],
        dietary_preferences: &[String],
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO users (id, dietary_preferences, mental_health_goals, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET dietary_preferences = ?2, mental_health_goals = ?3, updated_at = ?4",
            params![
                user_id,
                serde_json::to_string(dietary_preferences)?,
                serde_json::to_string(goals)?,
                now
            ],
        )?;
        Ok(())
    }

    pub fn record_checkin(
        &mut self,
        user_id: &str,
        mood: Mood,
        energy_level: u8,
        stress_level: u8,
    ) -> Result<String, StoreError> {
        check_range("energy level", energy_level, &ENERGY_RANGE)?;
        check_range("stress level", stress_level, &STRESS_RANGE)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO checkins (id, user_id, mood, energy_level, stress_level, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, user_id, mood.as_str(), energy_level, stress_level, now],
        )?;
        Ok(id)
    }

    pub fn record_food_log(
        &mut self,
        user_id: &str,
        meal_type: &str,
        food_items: &[String],
        emotions_before: &[String],
        emotions_after: &[String],
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO food_logs (id, user_id, meal_type, food_items, emotions_before, emotions_after, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                user_id,
                meal_type,
                serde_json::to_string(food_items)?,
                serde_json::to_string(emotions_before)?,
                serde_json::to_string(emotions_after)?,
                now
            ],
        )?;
        Ok(id)
    }

    pub fn append_conversation(
        &mut self,
        user_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<String, StoreError> {
        let (user_message, ai_response) = validate_exchange(user_message, ai_response)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO conversations (id, user_id, user_message, ai_response, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, user_message, ai_response, now],
        )?;
        Ok(id)
    }

    /// Newest first.
    pub fn conversation_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, user_message, ai_response, created_at FROM conversations
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok(ConversationRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                user_message: row.get(2)?,
                ai_response: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn user_context(&self, user_id: &str) -> Result<ConversationContext, StoreError> {
        let recent_mood: Option<String> = self
            .conn
            .query_row(
                "SELECT mood FROM checkins WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let mut stmt = self.conn.prepare(
            "SELECT emotions_before, emotions_after FROM food_logs
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params![user_id, EMOTION_WINDOW], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut emotions = Vec::new();
        for (before, after) in rows {
            emotions.extend(serde_json::from_str::<Vec<String>>(&before)?);
            emotions.extend(serde_json::from_str::<Vec<String>>(&after)?);
        }

        let profile: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT dietary_preferences, mental_health_goals FROM users WHERE id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (dietary_patterns, goals) = match profile {
            Some((diet, goals)) => (serde_json::from_str(&diet)?, serde_json::from_str(&goals)?),
            None => (Vec::new(), Vec::new()),
        };

        Ok(ConversationContext {
            // A mood string this build does not know is treated as absent.
            recent_mood: recent_mood.and_then(|m| m.parse().ok()),
            common_emotions: most_common(emotions, MAX_COMMON_EMOTIONS),
            dietary_patterns,
            goals,
        })
    }
}

/// Most frequent first; ties keep first-seen order.
fn most_common(items: Vec<String>, limit: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        let item = item.trim().to_lowercase();
        if item.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(name, _)| *name == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(name, _)| name).collect()
}

/// Adapts [`Storage`] to the orchestrator's collaborator traits.
pub struct SqliteStore {
    storage: Mutex<Storage>,
}

impl SqliteStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    /// Runs `f` with exclusive access to the underlying storage.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut Storage) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut storage = self.storage.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut storage)
    }
}

#[async_trait]
impl ContextProvider for SqliteStore {
    async fn get_context(&self, user_id: &str) -> Result<ConversationContext, StoreError> {
        self.with(|s| s.user_context(user_id))
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn append(
        &self,
        user_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<String, StoreError> {
        self.with(|s| s.append_conversation(user_id, user_message, ai_response))
    }
}
