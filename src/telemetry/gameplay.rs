//! Gameplay submissions and the leaderboard

use super::{require_max_chars, require_non_empty, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nicknames used by the built-in agents; their runs are not ranked
pub const RESERVED_AGENT_NICKNAMES: &[&str] = &["beginner", "medium", "master"];

/// Id returned for a run that was acknowledged but not stored
pub const SKIPPED_AGENT_RUN_ID: &str = "skipped-ai-agent";

pub const MAX_NICKNAME_LEN: usize = 64;
pub const MAX_MODEL_ID_LEN: usize = 32;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePlayStatistics {
    #[serde(default)]
    pub total_frames: Option<i64>,
    /// Seconds
    #[serde(default)]
    pub play_duration: Option<f64>,
    #[serde(default)]
    pub enemies_destroyed: Option<i64>,
    #[serde(default)]
    pub shots_fired: Option<i64>,
    #[serde(default)]
    pub hits: Option<i64>,
    #[serde(default)]
    pub deaths: Option<i64>,
}

/// Per-frame trace; fields beyond the fixed set are kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayFrame {
    pub frame_number: i64,
    pub player_x: f64,
    pub player_y: f64,
    pub player_lives: i64,
    pub player_score: i64,
    pub current_weapon: i64,
    pub input_left: i64,
    pub input_right: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlaySubmitRequest {
    pub nickname: String,
    pub score: i64,
    pub final_stage: i64,
    #[serde(default)]
    pub model_id: Option<String>,
    pub statistics: GamePlayStatistics,
    pub frames: Vec<GamePlayFrame>,
}

impl GamePlaySubmitRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("nickname", &self.nickname)?;
        require_max_chars("nickname", &self.nickname, MAX_NICKNAME_LEN)?;
        if let Some(model_id) = &self.model_id {
            require_max_chars("model_id", model_id, MAX_MODEL_ID_LEN)?;
        }
        Ok(())
    }

    /// Whether this run was played by one of the built-in agents
    pub fn is_agent_run(&self) -> bool {
        RESERVED_AGENT_NICKNAMES.contains(&self.nickname.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlaySubmitResponse {
    pub id: String,
    pub message: String,
}

/// Raw leaderboard query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub model_id: Option<String>,
}

impl RankingParams {
    /// Apply defaults and bounds
    ///
    /// `page_size` is clamped to [`MAX_PAGE_SIZE`]; a page or page size
    /// below one is rejected.
    pub fn resolve(self) -> Result<RankingQuery, ValidationError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

        if page < 1 {
            return Err(ValidationError::new("page", "must be at least 1"));
        }
        if page_size < 1 {
            return Err(ValidationError::new("page_size", "must be at least 1"));
        }

        Ok(RankingQuery {
            page,
            page_size,
            model_id: self.model_id.filter(|m| !m.is_empty()),
        })
    }
}

/// Validated leaderboard query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingQuery {
    pub page: i64,
    pub page_size: i64,
    pub model_id: Option<String>,
}

impl RankingQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingItem {
    pub id: String,
    pub nickname: String,
    pub score: i64,
    pub final_stage: i64,
    pub model_id: Option<String>,
    pub total_frames: Option<i64>,
    pub play_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingResponse {
    pub rankings: Vec<RankingItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(nickname: &str) -> GamePlaySubmitRequest {
        serde_json::from_value(json!({
            "nickname": nickname,
            "score": 1200,
            "final_stage": 3,
            "model_id": "intermediate",
            "statistics": {"total_frames": 2, "play_duration": 1.5},
            "frames": [
                {
                    "frame_number": 0, "player_x": 1.0, "player_y": 2.0,
                    "player_lives": 3, "player_score": 0, "current_weapon": 1,
                    "input_left": 0, "input_right": 1, "enemy_count": 7
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_frame_keeps_extra_fields() {
        let req = submission("ace");
        let frame = &req.frames[0];

        assert_eq!(frame.extra.get("enemy_count"), Some(&json!(7)));

        let back = serde_json::to_value(frame).unwrap();
        assert_eq!(back["enemy_count"], json!(7));
        assert_eq!(back["player_lives"], json!(3));
    }

    #[test]
    fn test_statistics_fields_optional() {
        let req = submission("ace");
        assert_eq!(req.statistics.total_frames, Some(2));
        assert_eq!(req.statistics.deaths, None);
    }

    #[test]
    fn test_agent_runs_detected() {
        assert!(submission("master").is_agent_run());
        assert!(submission("beginner").is_agent_run());
        assert!(!submission("Master").is_agent_run());
        assert!(!submission("ace").is_agent_run());
    }

    #[test]
    fn test_nickname_validation() {
        assert!(submission("ace").validate().is_ok());
        assert_eq!(submission("").validate().unwrap_err().field, "nickname");
        assert_eq!(
            submission(&"n".repeat(MAX_NICKNAME_LEN + 1)).validate().unwrap_err().field,
            "nickname"
        );
    }

    #[test]
    fn test_ranking_defaults() {
        let query = RankingParams::default().resolve().unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.model_id, None);
    }

    #[test]
    fn test_ranking_page_size_clamped() {
        let query = RankingParams {
            page: Some(3),
            page_size: Some(500),
            model_id: Some("advanced".to_string()),
        }
        .resolve()
        .unwrap();

        assert_eq!(query.page_size, MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 200);
        assert_eq!(query.model_id.as_deref(), Some("advanced"));
    }

    #[test]
    fn test_ranking_rejects_out_of_range() {
        let bad_page = RankingParams {
            page: Some(0),
            ..Default::default()
        };
        assert_eq!(bad_page.resolve().unwrap_err().field, "page");

        let bad_size = RankingParams {
            page_size: Some(0),
            ..Default::default()
        };
        assert_eq!(bad_size.resolve().unwrap_err().field, "page_size");
    }
}
