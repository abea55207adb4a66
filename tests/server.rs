//! HTTP surface tests
#![cfg(feature = "server")]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use privileges::server::{build_router, metadata_from_headers, AppState, HttpAuthority};
use privileges::{
    AuthorizationGate, Error, IdentityAuthority, PrivilegeStore, ReadPolicy, StaticAuthority,
    StoreOptions, TokenClaims, MANAGE_PRIVILEGES, VIEW_ALL_USERS,
};

const ADMIN: &str = "admin-token";
const VIEWER: &str = "viewer-token";

fn setup(policy: ReadPolicy) -> (TempDir, PrivilegeStore, Router) {
    let dir = TempDir::new().unwrap();
    let store = PrivilegeStore::open(dir.path(), &StoreOptions::default()).unwrap();
    store.bootstrap().unwrap();

    let authority = StaticAuthority::new();
    authority.issue(ADMIN, TokenClaims::with_mask("admin", VIEW_ALL_USERS | MANAGE_PRIVILEGES));
    authority.issue(VIEWER, TokenClaims::with_mask("viewer", VIEW_ALL_USERS));
    let gate = AuthorizationGate::new(Arc::new(authority), policy);

    let app = build_router(AppState { store: store.clone(), gate });
    (dir, store, app)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        b = b.header("token", t);
    }
    match body {
        Some(v) => b
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => b.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, v)
}

fn support_body() -> Value {
    json!({ "name": "Support", "view_all_users": true, "block_user": true })
}

#[tokio::test]
async fn ping_needs_no_token() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let (status, body) = send(&app, json_request("GET", "/ping", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_without_token_is_unauthorized() {
    let (_d, store, app) = setup(ReadPolicy::Gated);
    let (status, body) =
        send(&app, json_request("POST", "/privileges", None, Some(support_body()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_credential");
    assert_eq!(store.get_all().unwrap().len(), 2);
}

#[tokio::test]
async fn create_without_manage_privileges_is_forbidden() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let (status, body) =
        send(&app, json_request("POST", "/privileges", Some(VIEWER), Some(support_body()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn create_then_get() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let (status, body) =
        send(&app, json_request("POST", "/privileges", Some(ADMIN), Some(support_body()))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["privilege"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, body) = send(&app, json_request("GET", &format!("/privileges/{}", id), Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privilege"]["name"], "Support");
    assert_eq!(body["privilege"]["block_user"], true);
    assert_eq!(body["privilege"]["root"], false);
    assert_eq!(body["privilege"]["default"], false);
}

#[tokio::test]
async fn create_invalid_is_bad_request() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let bad = json!({ "name": "Broken", "delete_user": true });
    let (status, body) = send(&app, json_request("POST", "/privileges", Some(ADMIN), Some(bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
    assert!(body["message"].as_str().unwrap().contains("view_all_users"));
}

#[tokio::test]
async fn update_uses_path_id() {
    let (_d, store, app) = setup(ReadPolicy::Gated);
    let (_, body) =
        send(&app, json_request("POST", "/privileges", Some(ADMIN), Some(support_body()))).await;
    let id = body["privilege"]["id"].as_str().unwrap().to_string();

    let change = json!({ "id": "ignored", "name": "Helpdesk", "view_all_users": true });
    let (status, body) =
        send(&app, json_request("PUT", &format!("/privileges/{}", id), Some(ADMIN), Some(change))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privilege"]["id"], id.as_str());
    assert_eq!(store.get(&id).unwrap().name, "Helpdesk");
    assert!(!store.get(&id).unwrap().block_user);
}

#[tokio::test]
async fn singletons_are_protected() {
    let (_d, store, app) = setup(ReadPolicy::Gated);
    let root = store.get_root().unwrap();
    let default = store.get_default().unwrap();

    let (status, body) =
        send(&app, json_request("DELETE", &format!("/privileges/{}", root.id), Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "protected_record");

    let change = json!({ "name": "Everyone", "view_all_users": true });
    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/privileges/{}", default.id), Some(ADMIN), Some(change)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.get_default().unwrap(), default);
}

#[tokio::test]
async fn delete_moves_users_to_default() {
    let (_d, store, app) = setup(ReadPolicy::Gated);
    let (_, body) =
        send(&app, json_request("POST", "/privileges", Some(ADMIN), Some(support_body()))).await;
    let id = body["privilege"]["id"].as_str().unwrap().to_string();
    store.assign_user("alice", &id).unwrap();

    let (status, body) =
        send(&app, json_request("DELETE", &format!("/privileges/{}", id), Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reassigned"], 1);

    let (status, body) = send(&app, json_request("GET", &format!("/privileges/{}", id), Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(
        store.user_privilege("alice").unwrap().privilege_id,
        store.get_default().unwrap().id
    );
}

#[tokio::test]
async fn list_and_singleton_routes() {
    let (_d, store, app) = setup(ReadPolicy::Gated);
    let (status, body) = send(&app, json_request("GET", "/privileges", Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privileges"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, json_request("GET", "/privileges/root", Some(ADMIN), None)).await;
    assert_eq!(body["privilege"]["id"], store.get_root().unwrap().id.as_str());
    let (_, body) = send(&app, json_request("GET", "/privileges/default", Some(ADMIN), None)).await;
    assert_eq!(body["privilege"]["id"], store.get_default().unwrap().id.as_str());
}

#[tokio::test]
async fn gated_reads_require_token() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let (status, _) = send(&app, json_request("GET", "/privileges", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn open_reads_skip_token() {
    let (_d, _s, app) = setup(ReadPolicy::Open);
    let (status, body) = send(&app, json_request("GET", "/privileges/root", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privilege"]["root"], true);

    let (status, _) =
        send(&app, json_request("POST", "/privileges", None, Some(support_body()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_header_is_accepted() {
    let (_d, _s, app) = setup(ReadPolicy::Gated);
    let req = Request::builder()
        .method("GET")
        .uri("/privileges")
        .header("authorization", format!("Bearer {}", ADMIN))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn token_header_wins_over_bearer() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert("token", "from-header".parse().unwrap());
    headers.insert("authorization", "Bearer from-bearer".parse().unwrap());
    let meta = metadata_from_headers(&headers).unwrap();
    assert_eq!(meta.get("token"), Some("from-header"));

    assert!(metadata_from_headers(&axum::http::HeaderMap::new()).is_none());
}

// ============================================================================
// HttpAuthority against an in-process authority
// ============================================================================

async fn validate(Json(req): Json<Value>) -> Result<Json<TokenClaims>, StatusCode> {
    match req["token"].as_str() {
        Some(ADMIN) => Ok(Json(TokenClaims::with_mask("admin", VIEW_ALL_USERS | MANAGE_PRIVILEGES))),
        Some(VIEWER) => Ok(Json(TokenClaims::with_mask("viewer", VIEW_ALL_USERS))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn spawn_authority() -> String {
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/validate_token", post(validate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

#[tokio::test]
async fn http_authority_validates_tokens() {
    let base = spawn_authority().await;
    let authority = HttpAuthority::new(base, Duration::from_secs(5)).unwrap();

    authority.ping().await.unwrap();
    let claims = authority.validate_token(ADMIN).await.unwrap();
    assert!(claims.manage_privileges);
    assert_eq!(claims.user_id.as_deref(), Some("admin"));

    let err = authority.validate_token("forged").await.unwrap_err();
    assert!(matches!(err, Error::AuthorityUnavailable(ref m) if m.contains("401")));
}

#[tokio::test]
async fn http_authority_behind_the_gate() {
    let base = spawn_authority().await;
    let authority = HttpAuthority::new(base, Duration::from_secs(5)).unwrap();
    let gate = AuthorizationGate::new(Arc::new(authority), ReadPolicy::Gated);

    let admin: privileges::RequestMetadata = [("token", ADMIN)].into_iter().collect();
    let viewer: privileges::RequestMetadata = [("token", VIEWER)].into_iter().collect();
    assert!(gate.authorize(Some(&admin)).await.is_ok());
    assert!(matches!(gate.authorize(Some(&viewer)).await, Err(Error::Forbidden(_))));
}

#[tokio::test]
async fn unreachable_authority_is_unavailable() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let authority = HttpAuthority::new(format!("http://{}", addr), Duration::from_millis(500)).unwrap();
    assert!(matches!(authority.ping().await, Err(Error::AuthorityUnavailable(_))));
    assert!(matches!(
        authority.validate_token(ADMIN).await,
        Err(Error::AuthorityUnavailable(_))
    ));
}
