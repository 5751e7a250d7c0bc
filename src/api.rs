// Favorites - REST API (Axum)
//
// Thin HTTP layer over the library: resolves the caller from a bearer token
// and passes the user id and connection explicitly into the core.

use crate::auth::TokenIssuer;
use crate::catalog::{list_characters, list_planets, seed_catalog, Character, Planet};
use crate::config::Config;
use crate::error::FavoritesError;
use crate::favorites::{get_merged_lists, FavoriteRow};
use crate::reconciliation::{FavoriteItem, ReconciliationEngine};
use crate::users::{authenticate, create_user, find_user_by_id, AccountError, CreateAccount, User};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub engine: ReconciliationEngine,
    pub tokens: TokenIssuer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(conn: Connection, config: Config) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            engine: ReconciliationEngine::with_policy(config.unknown_categories),
            tokens: TokenIssuer::new(
                config.jwt_secret.as_bytes(),
                chrono::Duration::hours(config.token_ttl_hours),
            ),
            config: Arc::new(config),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Favorites(#[from] FavoritesError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(_) => ApiError::BadRequest(err.to_string()),
            AccountError::AlreadyExists => ApiError::Conflict(err.to_string()),
            AccountError::Auth(_) | AccountError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Favorites(FavoritesError::validation(rejection.body_text()))
    }
}

/// Error body returned for every failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Favorites(e) => {
                let status = match e {
                    FavoritesError::Validation(_) => StatusCode::BAD_REQUEST,
                    FavoritesError::NotFound(_) => StatusCode::NOT_FOUND,
                    FavoritesError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    FavoritesError::ConflictRace(_) => StatusCode::CONFLICT,
                };
                (status, e.code())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

// ============================================================================
// Access Layer
// ============================================================================

/// The authenticated caller. Rejects the request with 401 before any
/// handler runs when the token is missing, invalid, or names no active user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let user_id = state
            .tokens
            .verify(token.trim())
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        let conn = state.conn()?;
        match find_user_by_id(&conn, user_id).map_err(FavoritesError::from)? {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => Err(ApiError::Unauthorized("Unknown or inactive user".to_string())),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Serialize)]
struct Endpoint {
    method: &'static str,
    path: &'static str,
}

/// GET / - Sitemap of registered endpoints
async fn sitemap() -> impl IntoResponse {
    let endpoints: Vec<Endpoint> = endpoints()
        .into_iter()
        .map(|(method, path, _)| Endpoint { method, path })
        .collect();

    Json(serde_json::json!({ "endpoints": endpoints }))
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /create-account
async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<Option<CreateAccount>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let Some(payload) = body else {
        return Err(ApiError::BadRequest("The request body is null".to_string()));
    };

    let account = payload.validate()?;
    let conn = state.conn()?;
    create_user(&conn, &account)?;

    Ok(Json(serde_json::json!({ "msg": "Added user" })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// POST /login - Exchange credentials for an access token
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = body?;
    let wrong = || ApiError::Unauthorized("Wrong username or password".to_string());

    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(wrong());
    };

    let user = {
        let conn = state.conn()?;
        authenticate(&conn, &username, &password)?.ok_or_else(wrong)?
    };

    let access_token = state
        .tokens
        .issue(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = user.id, "token issued");
    Ok(Json(LoginResponse { access_token }))
}

/// GET /load_data - Seed catalogs from the configured CSV files
async fn load_data(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.conn()?;
    seed_catalog(&mut conn, &state.config.characters_csv, &state.config.planets_csv)
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;

    Ok(Json("Successfully added the data"))
}

/// GET /characters - Character catalog
async fn get_characters(State(state): State<AppState>) -> Result<Json<Vec<Character>>, ApiError> {
    let conn = state.conn()?;
    let characters = list_characters(&conn)
        .map_err(|e| FavoritesError::StoreUnavailable(format!("{:#}", e)))?;
    Ok(Json(characters))
}

/// GET /planets - Planet catalog
async fn get_planets(State(state): State<AppState>) -> Result<Json<Vec<Planet>>, ApiError> {
    let conn = state.conn()?;
    let planets =
        list_planets(&conn).map_err(|e| FavoritesError::StoreUnavailable(format!("{:#}", e)))?;
    Ok(Json(planets))
}

/// GET /get-favorites - Merged favorites, characters first
async fn get_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<FavoriteRow>>, ApiError> {
    let conn = state.conn()?;
    Ok(Json(get_merged_lists(&conn, user.id)?))
}

/// POST /update-favorites - Reconcile with the submitted desired list
async fn update_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<Vec<FavoriteItem>>, JsonRejection>,
) -> Result<Json<Vec<FavoriteRow>>, ApiError> {
    let Json(items) = body?;

    let mut conn = state.conn()?;
    let rows = state.engine.reconcile(&mut conn, user.id, &items)?;

    Ok(Json(rows))
}

/// GET /user_identity - Echo the authenticated user
async fn user_identity(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "id": user.id,
        "full_name": user.email,
        "username": user.username,
    }))
}

// ============================================================================
// Router
// ============================================================================

/// Every route the server exposes; the router and the sitemap both read it
fn endpoints() -> Vec<(&'static str, &'static str, MethodRouter<AppState>)> {
    vec![
        ("GET", "/", get(sitemap)),
        ("GET", "/api/health", get(health_check)),
        ("POST", "/create-account", post(create_account)),
        ("POST", "/login", post(login)),
        ("GET", "/load_data", get(load_data)),
        ("GET", "/characters", get(get_characters)),
        ("GET", "/planets", get(get_planets)),
        ("GET", "/get-favorites", get(get_favorites)),
        ("POST", "/update-favorites", post(update_favorites)),
        ("GET", "/user_identity", get(user_identity)),
    ]
}

pub fn router(state: AppState) -> Router {
    endpoints()
        .into_iter()
        .fold(Router::new(), |router, (_, path, handler)| router.route(path, handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
