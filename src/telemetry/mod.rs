//! Telemetry domain model
//!
//! Request and response shapes for the public API, plus the validation the
//! handlers run before anything reaches storage.

mod catalog;
mod gameplay;
mod session;

pub use catalog::{agent_catalog, Agent, Replay};
pub use gameplay::{
    GamePlayFrame, GamePlayStatistics, GamePlaySubmitRequest, GamePlaySubmitResponse,
    RankingItem, RankingParams, RankingQuery, RankingResponse, RESERVED_AGENT_NICKNAMES,
    SKIPPED_AGENT_RUN_ID,
};
pub use session::{
    AgentSkill, EventItem, EventsBatchRequest, EventsBatchResponse, ParticipantResponse,
    SessionEndRequest, SessionMode, SessionStartRequest, SessionStartResponse,
};

use thiserror::Error;

/// A request that failed field validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Generate a new record id (32 lowercase hex chars)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_max_chars(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}
