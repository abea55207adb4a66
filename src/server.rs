//! HTTP dispatch layer
//!
//! Maps the privilege RPC surface onto JSON routes. Mutations always pass the
//! authorization gate; reads pass it according to the gate's read policy.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthorizationGate, RequestMetadata};
use crate::authority::{IdentityAuthority, TokenClaims};
use crate::constants::TOKEN_KEY;
use crate::error::{Error, Result};
use crate::privilege::Privilege;
use crate::store::PrivilegeStore;

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: PrivilegeStore,
    pub gate: AuthorizationGate,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct PrivilegeResponse {
    pub privilege: Privilege,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrivilegesResponse {
    pub privileges: Vec<Privilege>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub reassigned: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::ProtectedRecord(_) | Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::MissingCredential(_) => StatusCode::UNAUTHORIZED,
        Error::AuthorityUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            // detail stays in the log
            Error::Storage(_) => "internal storage error".to_string(),
            e => e.to_string(),
        };
        let body = ErrorResponse { code: self.code().to_string(), message };
        (status_for(&self), Json(body)).into_response()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Build gate metadata from HTTP headers. `Authorization: Bearer` stands in
/// for a missing `token` header.
pub fn metadata_from_headers(headers: &HeaderMap) -> Option<RequestMetadata> {
    if headers.is_empty() {
        return None;
    }
    let mut meta = RequestMetadata::new();
    for (k, v) in headers {
        if let Ok(v) = v.to_str() {
            meta.insert(k.as_str(), v);
        }
    }
    if !meta.contains(TOKEN_KEY) {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if let Some(t) = bearer {
            meta.insert(TOKEN_KEY, t.trim());
        }
    }
    Some(meta)
}

fn logged<T>(op: &'static str, r: Result<T>) -> Result<T> {
    r.map_err(|e| {
        error!(op, code = e.code(), error = %e, "could not {} privilege", op);
        e
    })
}

async fn gate_write(s: &AppState, op: &'static str, headers: &HeaderMap) -> Result<TokenClaims> {
    let meta = metadata_from_headers(headers);
    logged(op, s.gate.authorize(meta.as_ref()).await)
}

async fn gate_read(s: &AppState, op: &'static str, headers: &HeaderMap) -> Result<()> {
    let meta = metadata_from_headers(headers);
    logged(op, s.gate.authorize_read(meta.as_ref()).await).map(|_| ())
}

// ============================================================================
// Handlers
// ============================================================================

async fn ping() -> Json<PingResponse> {
    info!("received ping");
    Json(PingResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create(
    State(s): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<Privilege>,
) -> Result<(StatusCode, Json<PrivilegeResponse>)> {
    info!(op = "create", "received request");
    gate_write(&s, "create", &headers).await?;
    let privilege = logged("create", s.store.create(&mut req))?;
    Ok((StatusCode::CREATED, Json(PrivilegeResponse { privilege })))
}

async fn update(
    State(s): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut req): Json<Privilege>,
) -> Result<Json<PrivilegeResponse>> {
    info!(op = "update", %id, "received request");
    gate_write(&s, "update", &headers).await?;
    req.id = id;
    let privilege = logged("update", s.store.update(&mut req))?;
    Ok(Json(PrivilegeResponse { privilege }))
}

async fn get_one(
    State(s): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PrivilegeResponse>> {
    gate_read(&s, "get", &headers).await?;
    let privilege = logged("get", s.store.get(&id))?;
    Ok(Json(PrivilegeResponse { privilege }))
}

async fn get_root(State(s): State<AppState>, headers: HeaderMap) -> Result<Json<PrivilegeResponse>> {
    gate_read(&s, "get root", &headers).await?;
    let privilege = logged("get root", s.store.get_root())?;
    Ok(Json(PrivilegeResponse { privilege }))
}

async fn get_default(State(s): State<AppState>, headers: HeaderMap) -> Result<Json<PrivilegeResponse>> {
    gate_read(&s, "get default", &headers).await?;
    let privilege = logged("get default", s.store.get_default())?;
    Ok(Json(PrivilegeResponse { privilege }))
}

async fn get_all(State(s): State<AppState>, headers: HeaderMap) -> Result<Json<PrivilegesResponse>> {
    gate_read(&s, "get all", &headers).await?;
    let privileges = logged("get all", s.store.get_all())?;
    Ok(Json(PrivilegesResponse { privileges }))
}

async fn delete(
    State(s): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>> {
    info!(op = "delete", %id, "received request");
    gate_write(&s, "delete", &headers).await?;
    let reassigned = logged("delete", s.store.delete(&id))?;
    Ok(Json(DeleteResponse { reassigned }))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/privileges", get(get_all).post(create))
        .route("/privileges/root", get(get_root))
        .route("/privileges/default", get(get_default))
        .route("/privileges/:id", get(get_one).put(update).delete(delete))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Install the global fmt subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ============================================================================
// Remote identity authority
// ============================================================================

fn unavailable<E: std::fmt::Display>(e: E) -> Error {
    Error::AuthorityUnavailable(e.to_string())
}

#[derive(Serialize)]
struct ValidateTokenRequest<'a> {
    token: &'a str,
}

/// Identity authority reached over HTTP
#[derive(Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base: String,
}

impl HttpAuthority {
    /// `base` is the authority root URL; `timeout` bounds every call
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(unavailable)?;
        Ok(HttpAuthority {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityAuthority for HttpAuthority {
    async fn validate_token(&self, token: &str) -> Result<TokenClaims> {
        let resp = self
            .client
            .post(format!("{}/validate_token", self.base))
            .json(&ValidateTokenRequest { token })
            .send()
            .await
            .map_err(unavailable)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::AuthorityUnavailable(format!(
                "authority returned {}: {}",
                status,
                body.trim()
            )));
        }
        resp.json::<TokenClaims>().await.map_err(unavailable)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .get(format!("{}/ping", self.base))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(unavailable)
    }
}
