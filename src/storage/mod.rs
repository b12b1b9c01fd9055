//! Storage backends for playtrace
//!
//! - Postgres: durable storage for participants, sessions, events, gameplays and replays
//! - Memory: process-local tables for tests and database-less development

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};

use crate::telemetry::{
    EventItem, GamePlaySubmitRequest, RankingItem, RankingQuery, Replay, SessionEndRequest,
    SessionStartRequest,
};
pub use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored play session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub participant_id: String,
    pub mode: String,
    pub agent_skill: Option<String>,
    pub game_version: Option<String>,
    pub model_version: Option<String>,
    pub seed: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<Map<String, Value>>,
}

/// Row counts, for `playtrace status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub participants: i64,
    pub sessions: i64,
    pub events: i64,
    pub gameplays: i64,
    pub replays: i64,
}

/// Persistence used by the HTTP handlers
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Register an anonymous participant, returns its id
    async fn create_participant(&self) -> Result<String, StorageError>;

    async fn participant_exists(&self, participant_id: &str) -> Result<bool, StorageError>;

    /// Create a session for an existing participant, returns the session id
    async fn create_session(&self, req: &SessionStartRequest) -> Result<String, StorageError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError>;

    async fn session_exists(&self, session_id: &str) -> Result<bool, StorageError>;

    /// Mark a session finished; `NotFound` if it does not exist
    async fn end_session(&self, req: &SessionEndRequest) -> Result<(), StorageError>;

    /// Append a batch of events atomically, returns how many were stored
    async fn append_events(
        &self,
        session_id: &str,
        events: &[EventItem],
    ) -> Result<usize, StorageError>;

    /// Events of a session ordered by `t_ms`, then arrival
    async fn list_events(&self, session_id: &str) -> Result<Vec<EventItem>, StorageError>;

    /// Store a gameplay submission, returns its id
    async fn insert_gameplay(&self, req: &GamePlaySubmitRequest) -> Result<String, StorageError>;

    /// One leaderboard page plus the total number of matching gameplays
    async fn rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<(Vec<RankingItem>, i64), StorageError>;

    async fn insert_replay(&self, replay: &Replay) -> Result<(), StorageError>;

    async fn get_replay(&self, replay_id: &str) -> Result<Option<Replay>, StorageError>;

    async fn stats(&self) -> Result<StoreStats, StorageError>;
}
