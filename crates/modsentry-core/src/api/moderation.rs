//! Client for the policy and moderation endpoints.
//!
//! Every call goes through the `RequestGateway`, so it carries the current
//! access token and survives a single token expiry transparently.

use serde::Serialize;
use tracing::debug;

use crate::models::{
    FinalVerdict, FinalVerdictUpdate, MessageResponse, ModerationHistory, ModerationResult,
    PolicyList, PolicyUpload,
};

use super::gateway::RequestGateway;
use super::request::{FilePart, RequestDescriptor};
use super::ApiError;

const MODERATION_BASE: &str = "/api/moderation";

#[derive(Debug, Serialize)]
struct FinalVerdictRequest {
    final_verdict: FinalVerdict,
}

#[derive(Clone)]
pub struct ModerationApi {
    gateway: RequestGateway,
}

impl ModerationApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    // ===== Policies =====

    /// Upload one or more policy documents into the policy store
    pub async fn upload_policies(&self, files: Vec<FilePart>) -> Result<PolicyUpload, ApiError> {
        if files.is_empty() {
            return Err(ApiError::InvalidRequest("No files provided".to_string()));
        }
        debug!(count = files.len(), "Uploading policy files");
        let request = files.into_iter().fold(
            RequestDescriptor::post(format!("{}/upload-policy/", MODERATION_BASE)),
            |request, mut file| {
                file.field = "files".to_string();
                request.with_file(file)
            },
        );
        self.gateway.send_json(&request).await
    }

    pub async fn list_policies(&self) -> Result<PolicyList, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::get(format!("{}/policies/", MODERATION_BASE)))
            .await
    }

    pub async fn delete_policy(&self, id: i64) -> Result<MessageResponse, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::delete(format!(
                "{}/policies/{}/",
                MODERATION_BASE, id
            )))
            .await
    }

    /// Delete all of the user's policies and reset the policy store
    pub async fn clear_policies(&self) -> Result<MessageResponse, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::post(format!(
                "{}/clear-policies/",
                MODERATION_BASE
            )))
            .await
    }

    // ===== Moderation =====

    pub async fn moderate_file(&self, mut file: FilePart) -> Result<ModerationResult, ApiError> {
        debug!(file = %file.file_name, "Submitting file for moderation");
        file.field = "file".to_string();
        let request =
            RequestDescriptor::post(format!("{}/moderate/", MODERATION_BASE)).with_file(file);
        self.gateway.send_json(&request).await
    }

    pub async fn history(&self) -> Result<ModerationHistory, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::get(format!("{}/history/", MODERATION_BASE)))
            .await
    }

    pub async fn detail(&self, id: i64) -> Result<ModerationResult, ApiError> {
        self.gateway
            .send_json(&RequestDescriptor::get(format!(
                "{}/history/{}/",
                MODERATION_BASE, id
            )))
            .await
    }

    pub async fn update_final_verdict(
        &self,
        id: i64,
        verdict: FinalVerdict,
    ) -> Result<FinalVerdictUpdate, ApiError> {
        let path = format!("{}/history/{}/verdict/", MODERATION_BASE, id);
        let request = RequestDescriptor::post(path).with_json(&FinalVerdictRequest {
            final_verdict: verdict,
        })?;
        self.gateway.send_json(&request).await
    }
}
