//! PostgreSQL storage backend

use crate::storage::{SessionRecord, StorageError, StoreStats, TelemetryStore};
use crate::telemetry::{
    new_id, EventItem, GamePlaySubmitRequest, RankingItem, RankingQuery, Replay,
    SessionEndRequest, SessionStartRequest,
};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::Value;
use std::fmt::Display;
use tokio_postgres::{config::Host, NoTls, Row};
use tracing::{debug, info};

/// Postgres connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pg: tokio_postgres::Config,
}

impl PostgresConfig {
    /// Read `DATABASE_URL`, falling back to the libpq `PG*` variables
    pub fn from_env() -> Option<Self> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return Self::from_url(&url);
        }

        let mut pg = tokio_postgres::Config::new();
        pg.host(&std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()))
            .port(
                std::env::var("PGPORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(5432),
            )
            .user(&std::env::var("PGUSER").ok()?)
            .dbname(&std::env::var("PGDATABASE").ok()?);
        if let Ok(password) = std::env::var("PGPASSWORD") {
            pg.password(password);
        }

        Self::checked(pg)
    }

    /// Parse a `postgres://` URL or libpq key/value string
    ///
    /// Percent-encoded credentials are decoded. A user and a database name
    /// are required.
    pub fn from_url(url: &str) -> Option<Self> {
        let pg = url.parse::<tokio_postgres::Config>().ok()?;
        Self::checked(pg)
    }

    fn checked(pg: tokio_postgres::Config) -> Option<Self> {
        pg.get_user().filter(|u| !u.is_empty())?;
        pg.get_dbname().filter(|d| !d.is_empty())?;
        Some(Self { pg })
    }

    pub fn user(&self) -> Option<&str> {
        self.pg.get_user()
    }

    pub fn password(&self) -> Option<&[u8]> {
        self.pg.get_password()
    }

    /// First TCP host, if any
    pub fn host(&self) -> Option<&str> {
        self.pg.get_hosts().iter().find_map(|h| match h {
            Host::Tcp(name) => Some(name.as_str()),
            #[allow(unreachable_patterns)]
            _ => None,
        })
    }

    /// Configured port, libpq default otherwise
    pub fn port(&self) -> u16 {
        self.pg.get_ports().first().copied().unwrap_or(5432)
    }

    pub fn database(&self) -> Option<&str> {
        self.pg.get_dbname()
    }
}

fn db_err(e: impl Display) -> StorageError {
    StorageError::Database(e.to_string())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    locale TEXT,
    user_agent_hash TEXT,
    cohort TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    participant_id TEXT NOT NULL REFERENCES participants(id),
    mode TEXT NOT NULL,
    agent_skill TEXT,
    game_version TEXT,
    model_version TEXT,
    seed BIGINT,
    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    ended_at TIMESTAMPTZ,
    duration_ms BIGINT,
    result JSONB
);

CREATE INDEX IF NOT EXISTS sessions_participant_idx ON sessions(participant_id);

CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    t_ms BIGINT NOT NULL,
    type TEXT NOT NULL,
    payload JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS events_session_t_idx ON events(session_id, t_ms);

CREATE TABLE IF NOT EXISTS replays (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id),
    storage_url TEXT NOT NULL,
    frames_count BIGINT,
    duration_ms BIGINT,
    compression TEXT,
    schema_version TEXT,
    generated_by TEXT,
    checksum TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS gameplays (
    id TEXT PRIMARY KEY,
    nickname TEXT NOT NULL,
    score BIGINT NOT NULL,
    final_stage BIGINT NOT NULL,
    model_id TEXT,
    total_frames BIGINT,
    play_duration DOUBLE PRECISION,
    enemies_destroyed BIGINT,
    shots_fired BIGINT,
    hits BIGINT,
    deaths BIGINT,
    frames_data JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS gameplays_score_created_idx ON gameplays(score DESC, created_at);
CREATE INDEX IF NOT EXISTS gameplays_model_score_idx ON gameplays(model_id, score DESC);
"#;

/// PostgreSQL storage for the telemetry tables
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Connect a pool and make sure the schema exists
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let manager = Manager::from_config(
            config.pg,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(db_err)?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        client.batch_execute(SCHEMA).await.map_err(db_err)?;

        info!("Database schema initialized");
        Ok(())
    }

    async fn exists(&self, sql: &str, id: &str) -> Result<bool, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let row = client.query_one(sql, &[&id]).await.map_err(db_err)?;
        Ok(row.get(0))
    }
}

fn session_from_row(row: &Row) -> Result<SessionRecord, StorageError> {
    let result: Option<Value> = row.get("result");
    let result = match result {
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(StorageError::Serialization(format!(
                "session result is not an object: {}",
                other
            )))
        }
        None => None,
    };

    Ok(SessionRecord {
        id: row.get("id"),
        participant_id: row.get("participant_id"),
        mode: row.get("mode"),
        agent_skill: row.get("agent_skill"),
        game_version: row.get("game_version"),
        model_version: row.get("model_version"),
        seed: row.get("seed"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        duration_ms: row.get("duration_ms"),
        result,
    })
}

fn replay_from_row(row: &Row) -> Replay {
    Replay {
        id: row.get("id"),
        session_id: row.get("session_id"),
        storage_url: row.get("storage_url"),
        frames_count: row.get("frames_count"),
        duration_ms: row.get("duration_ms"),
        compression: row.get("compression"),
        schema_version: row.get("schema_version"),
        generated_by: row.get("generated_by"),
        checksum: row.get("checksum"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TelemetryStore for PostgresStore {
    async fn create_participant(&self) -> Result<String, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let id = new_id();

        client
            .execute("INSERT INTO participants (id) VALUES ($1)", &[&id])
            .await
            .map_err(db_err)?;

        debug!(participant_id = %id, "Created participant");
        Ok(id)
    }

    async fn participant_exists(&self, participant_id: &str) -> Result<bool, StorageError> {
        self.exists(
            "SELECT EXISTS(SELECT 1 FROM participants WHERE id = $1)",
            participant_id,
        )
        .await
    }

    async fn create_session(&self, req: &SessionStartRequest) -> Result<String, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let id = new_id();
        let agent_skill = req.agent_skill.map(|s| s.as_str());

        let inserted = client
            .execute(
                "INSERT INTO sessions
                     (id, participant_id, mode, agent_skill, game_version, model_version, seed)
                 SELECT $1::TEXT, p.id, $3::TEXT, $4::TEXT, $5::TEXT, $6::TEXT, $7::BIGINT
                 FROM participants p WHERE p.id = $2",
                &[
                    &id,
                    &req.participant_id,
                    &req.mode.as_str(),
                    &agent_skill,
                    &req.game_version,
                    &req.model_version,
                    &req.seed,
                ],
            )
            .await
            .map_err(db_err)?;

        if inserted == 0 {
            return Err(StorageError::NotFound(format!(
                "Participant not found: {}",
                req.participant_id
            )));
        }

        debug!(session_id = %id, participant_id = %req.participant_id, "Created session");
        Ok(id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let row = client
            .query_opt(
                "SELECT id, participant_id, mode, agent_skill, game_version, model_version,
                        seed, started_at, ended_at, duration_ms, result
                 FROM sessions WHERE id = $1",
                &[&session_id],
            )
            .await
            .map_err(db_err)?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, StorageError> {
        self.exists("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1)", session_id)
            .await
    }

    async fn end_session(&self, req: &SessionEndRequest) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let result = req.result.clone().map(Value::Object);

        let updated = client
            .execute(
                "UPDATE sessions SET ended_at = NOW(), duration_ms = $2, result = $3 WHERE id = $1",
                &[&req.session_id, &req.duration_ms, &result],
            )
            .await
            .map_err(db_err)?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("Session not found: {}", req.session_id)));
        }

        Ok(())
    }

    async fn append_events(
        &self,
        session_id: &str,
        events: &[EventItem],
    ) -> Result<usize, StorageError> {
        let mut client = self.pool.get().await.map_err(db_err)?;
        let tx = client.transaction().await.map_err(db_err)?;

        let found: bool = tx
            .query_one("SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1)", &[&session_id])
            .await
            .map_err(db_err)?
            .get(0);
        if !found {
            return Err(StorageError::NotFound(format!("Session not found: {}", session_id)));
        }

        let stmt = tx
            .prepare_cached(
                "INSERT INTO events (session_id, t_ms, type, payload) VALUES ($1, $2, $3, $4)",
            )
            .await
            .map_err(db_err)?;

        for event in events {
            let payload = Value::Object(event.payload.clone());
            tx.execute(&stmt, &[&session_id, &event.t_ms, &event.kind, &payload])
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(events.len())
    }

    async fn list_events(&self, session_id: &str) -> Result<Vec<EventItem>, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let rows = client
            .query(
                "SELECT t_ms, type, payload FROM events WHERE session_id = $1 ORDER BY t_ms, id",
                &[&session_id],
            )
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let payload = match row.get::<_, Value>(2) {
                    Value::Object(map) => map,
                    other => {
                        return Err(StorageError::Serialization(format!(
                            "event payload is not an object: {}",
                            other
                        )))
                    }
                };
                Ok(EventItem {
                    t_ms: row.get(0),
                    kind: row.get(1),
                    payload,
                })
            })
            .collect()
    }

    async fn insert_gameplay(&self, req: &GamePlaySubmitRequest) -> Result<String, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let id = new_id();
        let frames = serde_json::to_value(&req.frames)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let stats = &req.statistics;

        client
            .execute(
                "INSERT INTO gameplays
                     (id, nickname, score, final_stage, model_id, total_frames, play_duration,
                      enemies_destroyed, shots_fired, hits, deaths, frames_data)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                &[
                    &id,
                    &req.nickname,
                    &req.score,
                    &req.final_stage,
                    &req.model_id,
                    &stats.total_frames,
                    &stats.play_duration,
                    &stats.enemies_destroyed,
                    &stats.shots_fired,
                    &stats.hits,
                    &stats.deaths,
                    &frames,
                ],
            )
            .await
            .map_err(db_err)?;

        debug!(gameplay_id = %id, score = req.score, "Stored gameplay");
        Ok(id)
    }

    async fn rankings(
        &self,
        query: &RankingQuery,
    ) -> Result<(Vec<RankingItem>, i64), StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let offset = query.offset();

        let total: i64 = client
            .query_one(
                "SELECT COUNT(*) FROM gameplays WHERE ($1::TEXT IS NULL OR model_id = $1)",
                &[&query.model_id],
            )
            .await
            .map_err(db_err)?
            .get(0);

        let rows = client
            .query(
                "SELECT id, nickname, score, final_stage, model_id, total_frames,
                        play_duration, created_at
                 FROM gameplays
                 WHERE ($1::TEXT IS NULL OR model_id = $1)
                 ORDER BY score DESC, created_at ASC
                 LIMIT $2 OFFSET $3",
                &[&query.model_id, &query.page_size, &offset],
            )
            .await
            .map_err(db_err)?;

        let items = rows
            .iter()
            .enumerate()
            .map(|(i, row)| RankingItem {
                id: row.get("id"),
                nickname: row.get("nickname"),
                score: row.get("score"),
                final_stage: row.get("final_stage"),
                model_id: row.get("model_id"),
                total_frames: row.get("total_frames"),
                play_duration: row.get("play_duration"),
                created_at: row.get("created_at"),
                rank: offset + i as i64 + 1,
            })
            .collect();

        Ok((items, total))
    }

    async fn insert_replay(&self, replay: &Replay) -> Result<(), StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;

        client
            .execute(
                "INSERT INTO replays
                     (id, session_id, storage_url, frames_count, duration_ms, compression,
                      schema_version, generated_by, checksum, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                &[
                    &replay.id,
                    &replay.session_id,
                    &replay.storage_url,
                    &replay.frames_count,
                    &replay.duration_ms,
                    &replay.compression,
                    &replay.schema_version,
                    &replay.generated_by,
                    &replay.checksum,
                    &replay.created_at,
                ],
            )
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn get_replay(&self, replay_id: &str) -> Result<Option<Replay>, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let row = client
            .query_opt(
                "SELECT id, session_id, storage_url, frames_count, duration_ms, compression,
                        schema_version, generated_by, checksum, created_at
                 FROM replays WHERE id = $1",
                &[&replay_id],
            )
            .await
            .map_err(db_err)?;

        Ok(row.as_ref().map(replay_from_row))
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        let client = self.pool.get().await.map_err(db_err)?;
        let row = client
            .query_one(
                "SELECT
                     (SELECT COUNT(*) FROM participants),
                     (SELECT COUNT(*) FROM sessions),
                     (SELECT COUNT(*) FROM events),
                     (SELECT COUNT(*) FROM gameplays),
                     (SELECT COUNT(*) FROM replays)",
                &[],
            )
            .await
            .map_err(db_err)?;

        Ok(StoreStats {
            participants: row.get(0),
            sessions: row.get(1),
            events: row.get(2),
            gameplays: row.get(3),
            replays: row.get(4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_url() {
        let cfg = PostgresConfig::from_url("postgres://app:pw@db.internal:6543/playtrace?sslmode=disable")
            .unwrap();
        assert_eq!(cfg.user(), Some("app"));
        assert_eq!(cfg.password(), Some(&b"pw"[..]));
        assert_eq!(cfg.host(), Some("db.internal"));
        assert_eq!(cfg.port(), 6543);
        assert_eq!(cfg.database(), Some("playtrace"));
    }

    #[test]
    fn test_config_from_url_defaults() {
        let cfg = PostgresConfig::from_url("postgresql://app@localhost/playtrace").unwrap();
        assert_eq!(cfg.password(), None);
        assert_eq!(cfg.port(), 5432);
    }

    #[test]
    fn test_config_from_url_decodes_credentials() {
        let cfg = PostgresConfig::from_url("postgres://app:p%40ss@db:5432/playtrace").unwrap();
        assert_eq!(cfg.password(), Some(&b"p@ss"[..]));
        assert_eq!(cfg.host(), Some("db"));
        assert_eq!(cfg.database(), Some("playtrace"));

        let cfg = PostgresConfig::from_url("postgres://app:a%2Fb%3Ac%25d@db/playtrace").unwrap();
        assert_eq!(cfg.password(), Some(&b"a/b:c%d"[..]));
    }

    #[test]
    fn test_config_from_key_value() {
        let cfg = PostgresConfig::from_url("host=db user=app password='p@ss' dbname=playtrace").unwrap();
        assert_eq!(cfg.password(), Some(&b"p@ss"[..]));
        assert_eq!(cfg.host(), Some("db"));
    }

    #[test]
    fn test_config_from_url_rejects() {
        assert!(PostgresConfig::from_url("mysql://app@localhost/db").is_none());
        assert!(PostgresConfig::from_url("postgres://localhost/db").is_none());
        assert!(PostgresConfig::from_url("postgres://app@localhost/").is_none());
        assert!(PostgresConfig::from_url("postgres://app@localhost:notaport/db").is_none());
    }
}
