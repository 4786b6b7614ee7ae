//! Async API client core for the puppy-adoption marketplace backend.
//!
//! # Overview
//! Every network call the app makes goes through `ApiClient`: it builds the
//! URL, attaches the bearer token, sends the request through a `Transport`,
//! and normalizes failures into `ApiError`. A 401 from the server fires the
//! `ForceLogout` broadcast so the session owner can react.
//!
//! # Design
//! - Request building and response parsing are pure (`build_*` /
//!   `parse_response`); only the `Transport` does I/O.
//! - The token source (`TokenProvider`) and the logout broadcaster
//!   (`ForceLogout`) are injected, never global.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.
//!
//! ```no_run
//! use std::sync::Arc;
//! use pupup_core::{ApiClient, ClientConfig, FileStore, ForceLogout, Params, StoredToken};
//!
//! # async fn run() -> Result<(), pupup_core::ApiError> {
//! let store = Arc::new(FileStore::new("storage.json"));
//! let logout = ForceLogout::new();
//! let _session = logout.subscribe_fn(|| eprintln!("session expired"));
//!
//! let config = ClientConfig::from_env();
//! let tokens = Arc::new(StoredToken::for_config(store, &config));
//! let client = ApiClient::connect(config, tokens, logout)?;
//! let home: serde_json::Value = client.get("home", None).await?;
//! let params = Params::new().with("user_id", 5).with("litter_id", 9);
//! let _: serde_json::Value = client.delete("favorites", Some(&params)).await?;
//! # let _ = home;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod logout;
pub mod params;
pub mod store;
pub mod token;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile, RequestBody};
pub use logout::{ForceLogout, LogoutCallback, Subscription};
pub use params::Params;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use token::{StaticToken, StoredToken, TokenProvider};
pub use transport::{ReqwestTransport, Transport};
pub use types::{ErrorResponse, FileUpload, LoginResponse, UploadResponse};
