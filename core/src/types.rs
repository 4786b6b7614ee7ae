//! DTOs for the marketplace backend.
//!
//! These mirror the mock-server's schema but are defined independently;
//! integration tests catch drift between the two crates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Returned by `user/login`, `user/sign_up` and `PUT user/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub id: u64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub profile_img: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub insta_link: String,
    #[serde(default)]
    pub tiktok_link: String,
    #[serde(default)]
    pub onboarding_questions: Map<String, Value>,
    #[serde(default)]
    pub is_breeder: bool,
    pub token: String,
}

/// The backend's usual error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub img_url: String,
}

/// A local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Path or `file://` URI of the content.
    pub uri: String,
    /// Upload file name; derived from `uri` when absent.
    pub name: Option<String>,
    /// MIME type; `image/jpeg` when absent.
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            content_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn local_path(&self) -> &str {
        self.uri.strip_prefix("file://").unwrap_or(&self.uri)
    }

    pub fn file_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let last_segment = self.uri.rsplit('/').next().unwrap_or_default();
        let ext = match last_segment.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "jpg",
        };
        format!("photo.{ext}")
    }

    pub fn mime_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| "image/jpeg".to_string())
    }
}
