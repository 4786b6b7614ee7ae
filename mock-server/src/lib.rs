use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// The only one-time code the mock accepts.
pub const VALID_OTP: u32 = 123456;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub profile_img: String,
    pub description: String,
    pub insta_link: String,
    pub tiktok_link: String,
    pub onboarding_questions: Map<String, Value>,
    pub is_breeder: bool,
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Favorite {
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub litter_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed_id: Option<u64>,
}

#[derive(Deserialize)]
pub struct SendOtp {
    pub email: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub otp: u32,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub description: Option<String>,
    pub onboarding_questions: Option<Map<String, Value>>,
}

#[derive(Debug, Default)]
pub struct Backend {
    /// Bearer token -> user id.
    pub sessions: HashMap<String, u64>,
    pub users: HashMap<u64, User>,
    pub favorites: Vec<Favorite>,
}

pub type Db = Arc<RwLock<Backend>>;

/// Non-2xx answer with the backend's `{"detail": ...}` body.
#[derive(Debug)]
pub struct Failure(pub StatusCode, pub String);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Backend::default())))
}

/// Router over a caller-supplied backend, so tests can seed or inspect it.
pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/home", get(home))
        .route("/user/send_login_otp", post(send_login_otp))
        .route("/user/login", post(login))
        .route("/user/", put(update_user))
        .route("/favorites", get(list_favorites).delete(remove_favorite))
        .route("/favorites/", post(add_favorite))
        .route("/admin/upload-image", post(upload_image))
        .route("/broken", get(broken))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authenticate(backend: &Backend, headers: &HeaderMap) -> Result<u64, Failure> {
    let unauthorized = || Failure(StatusCode::UNAUTHORIZED, "Not authenticated".to_string());
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    backend.sessions.get(token).copied().ok_or_else(unauthorized)
}

async fn home() -> Json<Value> {
    Json(json!({ "breeds": [], "litters": [] }))
}

async fn send_login_otp(Json(input): Json<SendOtp>) -> Result<Json<Value>, Failure> {
    if input.email.trim().is_empty() {
        return Err(Failure(StatusCode::UNPROCESSABLE_ENTITY, "email required".to_string()));
    }
    info!(email = %input.email, "otp requested");
    Ok(Json(json!({ "message": "OTP sent" })))
}

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Result<Json<User>, Failure> {
    if input.otp != VALID_OTP {
        warn!(email = %input.email, "rejected login code");
        return Err(Failure(StatusCode::UNAUTHORIZED, "invalid code".to_string()));
    }

    let mut backend = db.write().await;
    let token = Uuid::new_v4().to_string();
    let existing = backend
        .users
        .values()
        .find(|u| u.email == input.email)
        .map(|u| u.id);
    let id = existing.unwrap_or(backend.users.len() as u64 + 1);

    let user = backend.users.entry(id).or_insert_with(|| User {
        id,
        email: input.email.clone(),
        name: String::new(),
        profile_img: String::new(),
        description: String::new(),
        insta_link: String::new(),
        tiktok_link: String::new(),
        onboarding_questions: Map::new(),
        is_breeder: false,
        token: String::new(),
    });
    user.token = token.clone();
    let user = user.clone();
    backend.sessions.insert(token, id);
    Ok(Json(user))
}

async fn update_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, Failure> {
    let mut backend = db.write().await;
    let id = authenticate(&backend, &headers)?;
    let user = backend
        .users
        .get_mut(&id)
        .ok_or_else(|| Failure(StatusCode::NOT_FOUND, "user not found".to_string()))?;
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(description) = input.description {
        user.description = description;
    }
    if let Some(questions) = input.onboarding_questions {
        user.onboarding_questions = questions;
    }
    Ok(Json(user.clone()))
}

async fn list_favorites(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Favorite>>, Failure> {
    let backend = db.read().await;
    let caller = authenticate(&backend, &headers)?;
    let user_id = match query.get("user_id") {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| Failure(StatusCode::BAD_REQUEST, "user_id must be a number".to_string()))?,
        None => caller,
    };
    Ok(Json(
        backend
            .favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect(),
    ))
}

async fn add_favorite(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(favorite): Json<Favorite>,
) -> Result<(StatusCode, Json<Favorite>), Failure> {
    let mut backend = db.write().await;
    authenticate(&backend, &headers)?;
    if favorite.litter_id.is_none() && favorite.breed_id.is_none() {
        return Err(Failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            "litter_id or breed_id required".to_string(),
        ));
    }
    if !backend.favorites.contains(&favorite) {
        backend.favorites.push(favorite.clone());
    }
    Ok((StatusCode::CREATED, Json(favorite)))
}

async fn remove_favorite(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(favorite): Query<Favorite>,
) -> Result<Json<Value>, Failure> {
    let mut backend = db.write().await;
    authenticate(&backend, &headers)?;
    let before = backend.favorites.len();
    backend.favorites.retain(|f| f != &favorite);
    if backend.favorites.len() == before {
        return Err(Failure(StatusCode::NOT_FOUND, "favorite not found".to_string()));
    }
    Ok(Json(json!({ "detail": "removed" })))
}

async fn upload_image(
    State(db): State<Db>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, Failure> {
    authenticate(&*db.read().await, &headers)?;

    let bad_request = |msg: String| Failure(StatusCode::BAD_REQUEST, msg);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
        info!(%file_name, %content_type, size = bytes.len(), "image uploaded");
        return Ok(Json(json!({
            "img_url": format!("https://cdn.pupup.test/uploads/{}-{file_name}", Uuid::new_v4()),
        })));
    }
    Err(bad_request("file field required".to_string()))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream exploded")
}
