//! Static agent catalog and replay metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AgentSkill;

/// A pre-trained opponent clients can choose from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub skill: AgentSkill,
    pub model_version: String,
    pub description: String,
}

/// The agents currently offered
pub fn agent_catalog() -> Vec<Agent> {
    [
        (AgentSkill::Beginner, "Beginner agent"),
        (AgentSkill::Intermediate, "Intermediate agent"),
        (AgentSkill::Advanced, "Advanced agent"),
    ]
    .into_iter()
    .map(|(skill, description)| Agent {
        id: format!("agent-{}", skill.as_str()),
        skill,
        model_version: "v1".to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Stored replay of a finished session
///
/// The replay file itself lives in object storage under `storage_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    pub id: String,
    pub session_id: String,
    pub storage_url: String,
    pub frames_count: Option<i64>,
    pub duration_ms: Option<i64>,
    pub compression: Option<String>,
    pub schema_version: Option<String>,
    pub generated_by: Option<String>,
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}
