//! In-memory storage backend

use crate::storage::{SessionRecord, StorageError, StoreStats, TelemetryStore};
use crate::telemetry::{
    new_id, EventItem, GamePlayFrame, GamePlayStatistics, GamePlaySubmitRequest, RankingItem,
    RankingQuery, Replay, SessionEndRequest, SessionStartRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

struct StoredEvent {
    seq: u64,
    event: EventItem,
}

struct StoredGamePlay {
    id: String,
    nickname: String,
    score: i64,
    final_stage: i64,
    model_id: Option<String>,
    statistics: GamePlayStatistics,
    frames: Vec<GamePlayFrame>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    participants: HashSet<String>,
    sessions: HashMap<String, SessionRecord>,
    events: HashMap<String, Vec<StoredEvent>>,
    next_event_seq: u64,
    /// Insertion order
    gameplays: Vec<StoredGamePlay>,
    replays: HashMap<String, Replay>,
}

/// Process-local store; contents are lost on restart
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame trace of a stored gameplay
    pub fn gameplay_frames(&self, gameplay_id: &str) -> Option<Vec<GamePlayFrame>> {
        self.tables
            .read()
            .gameplays
            .iter()
            .find(|g| g.id == gameplay_id)
            .map(|g| g.frames.clone())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn create_participant(&self) -> Result<String, StorageError> {
        let id = new_id();
        self.tables.write().participants.insert(id.clone());
        debug!(participant_id = %id, "Created participant");
        Ok(id)
    }

    async fn participant_exists(&self, participant_id: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().participants.contains(participant_id))
    }

    async fn create_session(&self, req: &SessionStartRequest) -> Result<String, StorageError> {
        let mut tables = self.tables.write();

        if !tables.participants.contains(&req.participant_id) {
            return Err(StorageError::NotFound(format!(
                "Participant not found: {}",
                req.participant_id
            )));
        }

        let id = new_id();
        tables.sessions.insert(
            id.clone(),
            SessionRecord {
                id: id.clone(),
                participant_id: req.participant_id.clone(),
                mode: req.mode.as_str().to_string(),
                agent_skill: req.agent_skill.map(|s| s.as_str().to_string()),
                game_version: req.game_version.clone(),
                model_version: req.model_version.clone(),
                seed: req.seed,
                started_at: Utc::now(),
                ended_at: None,
                duration_ms: None,
                result: None,
            },
        );

        Ok(id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.tables.read().sessions.get(session_id).cloned())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, StorageError> {
        Ok(self.tables.read().sessions.contains_key(session_id))
    }

    async fn end_session(&self, req: &SessionEndRequest) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let session = tables
            .sessions
            .get_mut(&req.session_id)
            .ok_or_else(|| StorageError::NotFound(format!("Session not found: {}", req.session_id)))?;

        session.ended_at = Some(Utc::now());
        session.duration_ms = req.duration_ms;
        session.result = req.result.clone();
        Ok(())
    }

    async fn append_events(
        &self,
        session_id: &str,
        events: &[EventItem],
    ) -> Result<usize, StorageError> {
        let mut tables = self.tables.write();

        if !tables.sessions.contains_key(session_id) {
            return Err(StorageError::NotFound(format!("Session not found: {}", session_id)));
        }

        let first_seq = tables.next_event_seq;
        tables.next_event_seq += events.len() as u64;

        let stored = tables.events.entry(session_id.to_string()).or_default();
        for (i, event) in events.iter().enumerate() {
            stored.push(StoredEvent {
                seq: first_seq + i as u64,
                event: event.clone(),
            });
        }

        Ok(events.len())
    }

    async fn list_events(&self, session_id: &str) -> Result<Vec<EventItem>, StorageError> {
        let tables = self.tables.read();
        let Some(stored) = tables.events.get(session_id) else {
            return Ok(Vec::new());
        };

        let mut ordered: Vec<&StoredEvent> = stored.iter().collect();
        ordered.sort_by_key(|e| (e.event.t_ms, e.seq));
        Ok(ordered.into_iter().map(|e| e.event.clone()).collect())
    }

    async fn insert_gameplay(&self, req: &GamePlaySubmitRequest) -> Result<String, StorageError> {
        let id = new_id();
        self.tables.write().gameplays.push(StoredGamePlay {
            id: id.clone(),
            nickname: req.nickname.clone(),
            score: req.score,
            final_stage: req.final_stage,
            model_id: req.model_id.clone(),
            statistics: req.statistics.clone(),
            frames: req.frames.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<(Vec<RankingItem>, i64), StorageError> {
        let tables = self.tables.read();

        let mut matching: Vec<&StoredGamePlay> = tables
            .gameplays
            .iter()
            .filter(|g| match &query.model_id {
                Some(model_id) => g.model_id.as_deref() == Some(model_id.as_str()),
                None => true,
            })
            .collect();
        let total = matching.len() as i64;

        // Stable sort keeps insertion order for exact ties
        matching.sort_by(|a, b| b.score.cmp(&a.score).then(a.created_at.cmp(&b.created_at)));

        let offset = query.offset();
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.page_size).unwrap_or(0))
            .enumerate()
            .map(|(i, g)| RankingItem {
                id: g.id.clone(),
                nickname: g.nickname.clone(),
                score: g.score,
                final_stage: g.final_stage,
                model_id: g.model_id.clone(),
                total_frames: g.statistics.total_frames,
                play_duration: g.statistics.play_duration,
                created_at: g.created_at,
                rank: offset + i as i64 + 1,
            })
            .collect();

        Ok((items, total))
    }

    async fn insert_replay(&self, replay: &Replay) -> Result<(), StorageError> {
        let mut tables = self.tables.write();

        if !tables.sessions.contains_key(&replay.session_id) {
            return Err(StorageError::NotFound(format!(
                "Session not found: {}",
                replay.session_id
            )));
        }

        tables.replays.insert(replay.id.clone(), replay.clone());
        Ok(())
    }

    async fn get_replay(&self, replay_id: &str) -> Result<Option<Replay>, StorageError> {
        Ok(self.tables.read().replays.get(replay_id).cloned())
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        let tables = self.tables.read();
        Ok(StoreStats {
            participants: tables.participants.len() as i64,
            sessions: tables.sessions.len() as i64,
            events: tables.events.values().map(|e| e.len() as i64).sum(),
            gameplays: tables.gameplays.len() as i64,
            replays: tables.replays.len() as i64,
        })
    }
}
