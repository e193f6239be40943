use murmur_types::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ParseEnumError {
                kind: "difficulty",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl TopicStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Paused => "paused",
        }
    }
}

impl FromStr for TopicStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            _ => Err(ParseEnumError {
                kind: "topic status",
                value: s.to_string(),
            }),
        }
    }
}

/// Something the user is learning, with the running record of their progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningTopic {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub status: TopicStatus,
    pub progress_percentage: u8,
    /// Concepts covered so far, in the order they were first recorded.
    pub concepts_covered: Vec<String>,
    pub last_summary: Option<String>,
    pub next_steps: Option<String>,
    pub session_count: i64,
    pub total_time_minutes: i64,
    pub last_studied_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One sitting on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningSession {
    pub id: String,
    pub topic_id: String,
    pub session_number: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub summary: Option<String>,
    pub concepts_covered: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTopic {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

/// Partial topic update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<TopicStatus>,
    pub progress_percentage: Option<i64>,
    pub next_steps: Option<String>,
}

/// Which topics to list, and which page of them.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    pub status: Option<TopicStatus>,
    /// Category, case-insensitive.
    pub category: Option<String>,
    /// `None` lists every match.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// What was covered in the current study session.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub summary: Option<String>,
    pub concepts: Vec<String>,
    pub next_steps: Option<String>,
    pub progress_percentage: Option<i64>,
}

/// Returned when resuming a topic: where the user left off, plus the new
/// study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Continuation {
    pub topic: LearningTopic,
    pub session: LearningSession,
}

/// Returned after saving progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedProgress {
    pub topic: LearningTopic,
    pub session: LearningSession,
    /// Concepts recorded for the first time in this session.
    pub new_concepts: Vec<String>,
}
