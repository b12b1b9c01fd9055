//! Participants, sessions and event batches

use super::{require_max_chars, require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest accepted event type name
pub const MAX_EVENT_TYPE_LEN: usize = 32;

/// Who is playing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Human,
    Agent,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Human => "human",
            SessionMode::Agent => "agent",
        }
    }
}

/// Difficulty tier of the opposing agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentSkill {
    Beginner,
    Intermediate,
    Advanced,
}

impl AgentSkill {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentSkill::Beginner => "beginner",
            AgentSkill::Intermediate => "intermediate",
            AgentSkill::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartRequest {
    pub participant_id: String,
    pub mode: SessionMode,
    #[serde(default)]
    pub agent_skill: Option<AgentSkill>,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
}

impl SessionStartRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("participant_id", &self.participant_id)?;
        if let Some(v) = &self.game_version {
            require_max_chars("game_version", v, 64)?;
        }
        if let Some(v) = &self.model_version {
            require_max_chars("model_version", v, 64)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub session_id: String,
    pub ingest_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndRequest {
    pub session_id: String,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
}

impl SessionEndRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("session_id", &self.session_id)?;
        if matches!(self.duration_ms, Some(ms) if ms < 0) {
            return Err(ValidationError::new("duration_ms", "must not be negative"));
        }
        Ok(())
    }
}

/// One gameplay event inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    /// Milliseconds since session start
    pub t_ms: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsBatchRequest {
    pub session_id: String,
    /// Client-chosen id for log correlation
    #[serde(default)]
    pub request_id: Option<String>,
    pub events: Vec<EventItem>,
}

impl EventsBatchRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("session_id", &self.session_id)?;
        for event in &self.events {
            require_non_empty("type", &event.kind)?;
            require_max_chars("type", &event.kind, MAX_EVENT_TYPE_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsBatchResponse {
    pub accepted: bool,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_start_parse() {
        let req: SessionStartRequest = serde_json::from_value(json!({
            "participant_id": "p1",
            "mode": "agent",
            "agent_skill": "advanced",
            "seed": 42
        }))
        .unwrap();

        assert_eq!(req.mode, SessionMode::Agent);
        assert_eq!(req.agent_skill, Some(AgentSkill::Advanced));
        assert_eq!(req.seed, Some(42));
        assert!(req.game_version.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_session_start_rejects_unknown_mode() {
        let result: Result<SessionStartRequest, _> = serde_json::from_value(json!({
            "participant_id": "p1",
            "mode": "spectator"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_session_start_requires_participant() {
        let req: SessionStartRequest = serde_json::from_value(json!({
            "participant_id": " ",
            "mode": "human"
        }))
        .unwrap();
        assert_eq!(req.validate().unwrap_err().field, "participant_id");
    }

    #[test]
    fn test_mode_and_skill_strings() {
        for mode in [SessionMode::Human, SessionMode::Agent] {
            assert_eq!(serde_json::to_value(mode).unwrap(), json!(mode.as_str()));
        }
        for skill in [AgentSkill::Beginner, AgentSkill::Intermediate, AgentSkill::Advanced] {
            assert_eq!(serde_json::to_value(skill).unwrap(), json!(skill.as_str()));
        }
        assert!(serde_json::from_value::<AgentSkill>(json!("expert")).is_err());
    }

    #[test]
    fn test_events_batch_parse() {
        let req: EventsBatchRequest = serde_json::from_value(json!({
            "session_id": "s1",
            "events": [
                {"t_ms": 0, "type": "spawn", "payload": {"x": 1}},
                {"t_ms": 16, "type": "shot", "payload": {}}
            ]
        }))
        .unwrap();

        assert_eq!(req.events.len(), 2);
        assert_eq!(req.events[0].kind, "spawn");
        assert!(req.request_id.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_events_batch_payload_must_be_object() {
        let result: Result<EventsBatchRequest, _> = serde_json::from_value(json!({
            "session_id": "s1",
            "events": [{"t_ms": 0, "type": "spawn", "payload": [1, 2]}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_events_batch_type_length() {
        let req = EventsBatchRequest {
            session_id: "s1".to_string(),
            request_id: None,
            events: vec![EventItem {
                t_ms: 0,
                kind: "x".repeat(MAX_EVENT_TYPE_LEN + 1),
                payload: Map::new(),
            }],
        };
        assert_eq!(req.validate().unwrap_err().field, "type");
    }

    #[test]
    fn test_session_end_negative_duration() {
        let req = SessionEndRequest {
            session_id: "s1".to_string(),
            duration_ms: Some(-1),
            result: None,
        };
        assert_eq!(req.validate().unwrap_err().field, "duration_ms");
    }
}
