use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Automated verdict for a moderated file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    NeedsReview,
    ViolationFound,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Clean => "Clean",
            Verdict::NeedsReview => "Needs Review",
            Verdict::ViolationFound => "Violation Found",
            Verdict::Error => "Error",
            Verdict::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Reviewer's decision after looking at an automated verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalVerdict {
    Pending,
    Approved,
    Rejected,
}

impl FinalVerdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(FinalVerdict::Pending),
            "approved" | "approve" => Some(FinalVerdict::Approved),
            "rejected" | "reject" => Some(FinalVerdict::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for FinalVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FinalVerdict::Pending => "Pending",
            FinalVerdict::Approved => "Approved",
            FinalVerdict::Rejected => "Rejected",
        };
        f.write_str(label)
    }
}

/// One flagged chunk of a moderated file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationDetail {
    pub id: i64,
    pub chunk_id: String,
    pub chunk_text: String,
    pub verdict: String,
    pub explanation: String,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
}

/// Full moderation result including violations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    pub id: i64,
    #[serde(default)]
    pub user_username: Option<String>,
    pub filename: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub final_verdict: Option<FinalVerdict>,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub allowed_chunks: u32,
    #[serde(default)]
    pub review_chunks: u32,
    #[serde(default)]
    pub violation_chunks: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub violations: Vec<ViolationDetail>,
}

/// History row, without violation bodies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationSummary {
    pub id: i64,
    #[serde(default)]
    pub user_username: Option<String>,
    pub filename: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub allowed_chunks: u32,
    #[serde(default)]
    pub review_chunks: u32,
    #[serde(default)]
    pub violation_chunks: u32,
    #[serde(default)]
    pub violation_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationHistory {
    pub count: usize,
    pub results: Vec<ModerationSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalVerdictUpdate {
    pub message: String,
    pub final_verdict: FinalVerdict,
}
