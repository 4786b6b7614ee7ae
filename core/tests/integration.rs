//! End-to-end flows against the live mock server.
//!
//! # Design
//! Starts the mock backend on a random port, then drives `ApiClient` through
//! `ReqwestTransport` over real HTTP. Covers the paths the app actually uses:
//! home feed, OTP login, stored-token auth, favorites, and image upload.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pupup_core::{
    ApiClient, ApiError, ClientConfig, FileUpload, ForceLogout, KeyValueStore, LoginResponse,
    MemoryStore, Params, StoredToken,
};
use serde_json::{json, Value};

struct Harness {
    client: ApiClient,
    store: Arc<MemoryStore>,
    logouts: Arc<AtomicUsize>,
}

async fn start() -> Harness {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));

    let store = Arc::new(MemoryStore::new());
    let logout = ForceLogout::new();
    let logouts = Arc::new(AtomicUsize::new(0));
    let counter = logouts.clone();
    logout.subscribe_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let client = ApiClient::connect(
        ClientConfig::new(&format!("http://{addr}")),
        Arc::new(StoredToken::new(store.clone())),
        logout,
    )
    .unwrap();

    Harness {
        client,
        store,
        logouts,
    }
}

async fn login(h: &Harness) -> LoginResponse {
    let body = Params::new().with("email", "a@b.com").with("otp", mock_server::VALID_OTP);
    let user: LoginResponse = h.client.post("/user/login", Some(&body), None).await.unwrap();
    h.store.set_item("auth_token", &user.token).await.unwrap();
    user
}

#[tokio::test]
async fn home_resolves_to_exact_body() {
    let h = start().await;
    let home: Value = h.client.get("/home", None).await.unwrap();
    assert_eq!(home, json!({"breeds": [], "litters": []}));
    assert_eq!(h.logouts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_otp_rejects_and_forces_logout() {
    let h = start().await;
    let body = Params::new().with("email", "a@b.com").with("otp", 111111);

    let err = h
        .client
        .post::<LoginResponse>("user/login", Some(&body), None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "invalid code");
    assert_eq!(err.original(), Some(json!({"detail": "invalid code"})));
    assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn authenticated_favorites_lifecycle() {
    let h = start().await;
    let user = login(&h).await;

    let fav = Params::new().with("user_id", user.id).with("litter_id", 9);
    let _: Value = h.client.post("favorites/", Some(&fav), None).await.unwrap();

    let query = Params::new().with("user_id", user.id);
    let favorites: Value = h.client.get("favorites", Some(&query)).await.unwrap();
    assert_eq!(favorites, json!([{"user_id": user.id, "litter_id": 9}]));

    let removed: Value = h.client.delete("favorites", Some(&fav)).await.unwrap();
    assert_eq!(removed, json!({"detail": "removed"}));

    let err = h
        .client
        .delete::<Value>("favorites", Some(&fav))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "favorite not found");
    assert_eq!(h.logouts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn explicit_token_overrides_stale_stored_token() {
    let h = start().await;
    let user = login(&h).await;
    h.store.set_item("auth_token", "stale").await.unwrap();

    let update = Params::new().with("name", "Ann");
    let updated: LoginResponse = h
        .client
        .put("/user/", Some(&update), Some(&user.token))
        .await
        .unwrap();
    assert_eq!(updated.name, "Ann");

    // Without the override the stale token is used and the server says 401.
    let err = h
        .client
        .put::<LoginResponse>("/user/", Some(&update), None)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let h = start().await;
    let err = h.client.get::<Value>("favorites", None).await.unwrap_err();
    assert_eq!(err.to_string(), "Not authenticated");
    assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_json_failure_is_invalid_json() {
    let h = start().await;
    let err = h.client.get::<Value>("broken", None).await.unwrap_err();
    match err {
        ApiError::InvalidJson { status, text } => {
            assert_eq!(status, 502);
            assert_eq!(text, "upstream exploded");
        }
        other => panic!("expected InvalidJson, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_image_returns_public_url() {
    let h = start().await;
    login(&h).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rex.png");
    std::fs::write(&path, b"\x89PNG fake").unwrap();

    let file = FileUpload::new(format!("file://{}", path.display()))
        .with_name("rex.png")
        .with_content_type("image/png");
    let uploaded = h.client.upload_image(&file, None).await.unwrap();
    assert!(uploaded.img_url.ends_with("-rex.png"));
}

#[tokio::test]
async fn upload_without_session_forces_logout() {
    let h = start().await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rex.jpg");
    std::fs::write(&path, b"jpg").unwrap();

    let err = h
        .client
        .upload_image(&FileUpload::new(path.to_string_lossy()), None)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(h.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let client = ApiClient::connect(
        ClientConfig::new(&format!("http://{addr}")),
        Arc::new(pupup_core::StaticToken::none()),
        ForceLogout::new(),
    )
    .unwrap();

    let err = client.get::<Value>("home", None).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
