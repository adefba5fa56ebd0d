use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded policy document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub user_username: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    pub filename: String,
    /// File size in bytes
    #[serde(default)]
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl PolicyDocument {
    pub fn display_size(&self) -> String {
        const KB: f64 = 1024.0;
        const MB: f64 = KB * 1024.0;
        let size = self.file_size as f64;
        if size >= MB {
            format!("{:.1} MB", size / MB)
        } else if size >= KB {
            format!("{:.1} KB", size / KB)
        } else {
            format!("{} B", self.file_size)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyList {
    pub count: usize,
    pub policies: Vec<PolicyDocument>,
    #[serde(default)]
    pub policy_store_exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyUpload {
    pub message: String,
    #[serde(default)]
    pub policy_documents: Vec<PolicyDocument>,
}

/// Plain `{"message": ...}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default)]
    pub note: Option<String>,
}
