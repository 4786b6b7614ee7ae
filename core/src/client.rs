//! Request pipeline for the marketplace API.
//!
//! # Design
//! `ApiClient` splits every call into building and parsing:
//! `build_request` / `build_upload` turn a logical call into an `HttpRequest`,
//! `parse_response` turns an `HttpResponse` into a typed value or `ApiError`.
//! The async verbs glue the two halves together over an injected `Transport`,
//! asking an injected `TokenProvider` for the bearer token.
//!
//! Every 401 fires the `ForceLogout` broadcast before the error body is
//! looked at, so a session owner learns about it even when the body is junk.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile, RequestBody};
use crate::logout::ForceLogout;
use crate::params::Params;
use crate::token::TokenProvider;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{FileUpload, UploadResponse};

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    logout: ForceLogout,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("logout", &self.logout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        logout: ForceLogout,
    ) -> Self {
        Self {
            config,
            transport,
            tokens,
            logout,
        }
    }

    /// Client over a fresh `ReqwestTransport`.
    pub fn connect(
        config: ClientConfig,
        tokens: Arc<dyn TokenProvider>,
        logout: ForceLogout,
    ) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::new(config, Arc::new(transport), tokens, logout))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn force_logout(&self) -> &ForceLogout {
        &self.logout
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Get, endpoint, params, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&Params>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Post, endpoint, body, token).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&Params>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Put, endpoint, body, token).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Option<&Params>,
    ) -> Result<T, ApiError> {
        self.request(HttpMethod::Delete, endpoint, params, None).await
    }

    /// Upload one file as multipart form data to the configured upload
    /// endpoint.
    #[instrument(skip(self, file, token), fields(uri = %file.uri))]
    pub async fn upload_image(
        &self,
        file: &FileUpload,
        token: Option<&str>,
    ) -> Result<UploadResponse, ApiError> {
        let path = file.local_path();
        let bytes = tokio::fs::read(path).await.map_err(|e| ApiError::Upload {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let token = self.resolve_token(token).await;
        let request = self.build_upload(file, bytes, token.as_deref());
        let response = self.transport.send(request).await?;
        self.parse_response(response)
    }

    #[instrument(skip(self, method, params, token), fields(method = method.as_str()))]
    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Option<&Params>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let token = self.resolve_token(token).await;
        let request = self.build_request(method, endpoint, params, token.as_deref())?;
        debug!(url = %request.url, authenticated = token.is_some(), "sending request");
        let response = self.transport.send(request).await?;
        self.parse_response(response)
    }

    /// Explicit override first, then the provider. Empty strings count as
    /// absent.
    async fn resolve_token(&self, explicit: Option<&str>) -> Option<String> {
        match explicit.filter(|t| !t.is_empty()) {
            Some(token) => Some(token.to_string()),
            None => self.tokens.token().await,
        }
    }

    /// Origin plus endpoint with exactly one slash between them, plus a query
    /// string when `params` has entries.
    pub fn build_url(&self, endpoint: &str, params: Option<&Params>) -> String {
        let url = format!("{}/{}", self.config.base_url, endpoint.trim_start_matches('/'));
        match params {
            Some(params) if !params.is_empty() => format!("{url}?{}", params.to_query()),
            _ => url,
        }
    }

    /// Build a JSON request. `token` is the already-resolved bearer token.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Option<&Params>,
        token: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        push_authorization(&mut headers, token);

        let (url, body) = if method.is_query_style() {
            (self.build_url(endpoint, params), None)
        } else {
            let body = params.map(Params::to_json).transpose()?.map(RequestBody::Json);
            (self.build_url(endpoint, None), body)
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Build the multipart upload request. No JSON content type is set; the
    /// transport supplies the multipart boundary.
    pub fn build_upload(&self, file: &FileUpload, bytes: Vec<u8>, token: Option<&str>) -> HttpRequest {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        push_authorization(&mut headers, token);

        HttpRequest {
            method: HttpMethod::Post,
            url: self.build_url(&self.config.upload_endpoint, None),
            headers,
            body: Some(RequestBody::Multipart(MultipartFile {
                field: UPLOAD_FIELD.to_string(),
                file_name: file.file_name(),
                content_type: file.mime_type(),
                bytes,
            })),
        }
    }

    /// Turn a response into `T`, or into the matching `ApiError`.
    ///
    /// A 401 fires the force-logout broadcast exactly once, before anything
    /// else happens.
    pub fn parse_response<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        if response.status == 401 {
            warn!("401 unauthorized, emitting force logout");
            self.logout.emit();
        }

        if !response.is_success() {
            let parsed = parse_json(&response)?;
            return Err(error_from_body(&response, parsed));
        }

        let value = parse_json(&response)?;
        serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

fn push_authorization(headers: &mut Vec<(String, String)>, token: Option<&str>) {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        headers.push(("Authorization".to_string(), format!("Bearer {token}")));
    }
}

fn parse_json(response: &HttpResponse) -> Result<Value, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| {
        warn!(status = response.status, error = %e, "invalid JSON response");
        ApiError::InvalidJson {
            status: response.status,
            text: response.body.clone(),
        }
    })
}

fn error_from_body(response: &HttpResponse, parsed: Value) -> ApiError {
    let message = match parsed.get("detail").filter(|d| is_truthy(d)) {
        Some(Value::String(detail)) => detail.clone(),
        Some(detail) => detail.to_string(),
        None if is_truthy(&parsed) => parsed.to_string(),
        None => response.status_text.clone(),
    };
    ApiError::Api {
        message,
        status: Some(response.status),
        original: parsed,
    }
}

/// `null`, `false`, zero and the empty string carry no message.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
