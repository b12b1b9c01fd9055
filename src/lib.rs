//! playtrace - telemetry backend for game sessions and experiments
//!
//! Accepts participant registration, session lifecycle calls, batched
//! gameplay events and final gameplay submissions, and serves the
//! leaderboard and replay metadata. Event uploads are authorized by
//! stateless HMAC-signed ingest tokens bound to a single session.

pub mod auth;
pub mod server;
pub mod storage;
pub mod telemetry;

pub use auth::{IngestClaims, IssueError, VerifyError};
pub use server::{PlaytraceServer, ServerConfig};
pub use storage::{MemoryStore, PostgresConfig, PostgresStore, TelemetryStore};
