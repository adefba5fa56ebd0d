//! Data models for moderation service responses.
//!
//! This module contains the types returned by the policy and moderation
//! endpoints:
//! - `PolicyDocument`, `PolicyList`: uploaded policy files
//! - `ModerationResult`, `ModerationSummary`: per-file verdicts and history
//! - `Verdict`, `FinalVerdict`: automated and reviewer decisions

pub mod moderation;
pub mod policy;

pub use moderation::{
    FinalVerdict, FinalVerdictUpdate, ModerationHistory, ModerationResult, ModerationSummary,
    Verdict, ViolationDetail,
};
pub use policy::{MessageResponse, PolicyDocument, PolicyList, PolicyUpload};
