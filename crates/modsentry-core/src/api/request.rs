//! Immutable description of an outbound API call.
//!
//! The gateway may need to send the same logical request twice (once more
//! after a token refresh), so everything needed to rebuild it lives here,
//! including the attempt count.

use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// Whether a request needs a session to be sent at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Needs a bearer token; an expired token triggers one refresh and retry
    Required,
    /// Credential exchange endpoints: token attached if present, never refreshed
    Optional,
}

/// A file to upload as one multipart field
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Arc<[u8]>,
    pub mime: Option<String>,
}

impl FilePart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for_file_name(&file_name).map(str::to_string);
        Self {
            field: field.into(),
            file_name,
            bytes: bytes.into(),
            mime,
        }
    }

    /// Read a file from disk into a part named `field`
    pub fn from_path(field: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(field, file_name, bytes))
    }

    fn to_part(&self) -> Result<Part, ApiError> {
        let part = Part::bytes(self.bytes.to_vec()).file_name(self.file_name.clone());
        match self.mime {
            Some(ref mime) => part
                .mime_str(mime)
                .map_err(|e| ApiError::InvalidRequest(format!("bad mime type {}: {}", mime, e))),
            None => Ok(part),
        }
    }
}

fn mime_for_file_name(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "json" => Some("application/json"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FilePart>),
}

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    auth: AuthMode,
    attempt: u32,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            auth: AuthMode::Required,
            attempt: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("unserializable body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Append a file; the body becomes multipart
    pub fn with_file(mut self, file: FilePart) -> Self {
        match self.body {
            RequestBody::Multipart(ref mut parts) => parts.push(file),
            _ => self.body = RequestBody::Multipart(vec![file]),
        }
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn optional_auth(mut self) -> Self {
        self.auth = AuthMode::Optional;
        self
    }

    /// Copy of this request marking one more attempt
    pub fn retried(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn auth(&self) -> AuthMode {
        self.auth
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_been_retried(&self) -> bool {
        self.attempt > 0
    }

    /// Fresh multipart form; forms are consumed on send so each attempt builds one
    pub(crate) fn multipart_form(parts: &[FilePart]) -> Result<Form, ApiError> {
        parts.iter().try_fold(Form::new(), |form, file| {
            Ok(form.part(file.field.clone(), file.to_part()?))
        })
    }
}
