// HTTP-level tests: drive the router in-process with tower's oneshot
#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use favorites::api::{router, AppState};
use favorites::{open_database, Config};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tower::util::ServiceExt;

fn test_state(db_path: &str) -> AppState {
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data");
    let config = Config {
        db_path: db_path.to_string(),
        jwt_secret: "test-secret".to_string(),
        characters_csv: data.join("characters.csv"),
        planets_csv: data.join("planets.csv"),
        ..Default::default()
    };

    let conn = open_database(&config.db_path, Duration::from_millis(100)).unwrap();
    AppState::new(conn, config)
}

fn test_app() -> Router {
    router(test_state(":memory:"))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

async fn send_raw(
    app: &Router,
    uri: &str,
    content_type: Option<&str>,
    body: &'static str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Register + log in, returning the access token
async fn register(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/create-account",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@rebellion.org", username),
            "password": "use-the-force",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": username, "password": "use-the-force"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    body["access_token"].as_str().unwrap().to_string()
}

async fn load_catalog(app: &Router) {
    let (status, _) = send(app, Method::GET, "/load_data", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

fn planet_ids(rows: &Value) -> Vec<i64> {
    rows.as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row.get("planet_id").and_then(Value::as_i64))
        .collect()
}

#[tokio::test]
async fn test_health_and_sitemap() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": "OK"}));

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let paths: Vec<&str> = body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/update-favorites"));
}

#[tokio::test]
async fn test_every_sitemap_entry_is_routed() {
    let app = test_app();

    let (_, body) = send(&app, Method::GET, "/", None, None).await;
    let endpoints = body["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 10);

    for endpoint in endpoints {
        let method: Method = endpoint["method"].as_str().unwrap().parse().unwrap();
        let path = endpoint["path"].as_str().unwrap();

        let (status, _) = send(&app, method.clone(), path, None, None).await;
        assert_ne!(status, StatusCode::NOT_FOUND, "{} {}", method, path);
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, path);
    }
}

#[tokio::test]
async fn test_create_account_validation() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/create-account", None, Some(Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "The request body is null");

    let (status, body) = send(
        &app,
        Method::POST,
        "/create-account",
        None,
        Some(json!({"username": "han", "password": "falcon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Empty email");

    // Unreadable bodies are rejected as such, not reported as null
    let (status, body) = send_raw(&app, "/create-account", Some("application/json"), r#"{"username":"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_ne!(body["message"], "The request body is null");

    let (status, body) = send_raw(
        &app,
        "/create-account",
        None,
        r#"{"username":"han","email":"han@falcon.net","password":"falcon"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(body["message"], "The request body is null");

    let (status, body) = send_raw(&app, "/create-account", Some("application/json"), "[1, 2]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(body["message"], "The request body is null");

    register(&app, "han").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/create-account",
        None,
        Some(json!({"username": "han", "email": "solo@falcon.net", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_login_and_identity() {
    let app = test_app();
    let token = register(&app, "leia").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "leia", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/user_identity", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "leia");
    assert_eq!(body["full_name"], "leia@rebellion.org");
}

#[tokio::test]
async fn test_favorites_require_authentication() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/get-favorites", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/get-favorites", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/update-favorites",
        None,
        Some(json!([{"category": "PLANET", "planet_id": 1}])),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_and_read_favorites() {
    let app = test_app();
    load_catalog(&app).await;
    let token = register(&app, "luke").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([
            {"category": "PLANET", "planet_id": 5},
            {"category": "PLANET", "planet_id": 9},
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, updated) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([
            {"category": "PLANET", "planet_id": 9},
            {"category": "CHARACTER", "character_id": 4},
            {"category": "PLANET", "planet_id": 10},
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut planets = planet_ids(&updated);
    planets.sort();
    assert_eq!(planets, vec![9, 10]);

    // Characters come first in the merged list
    assert_eq!(updated[0]["character_id"], 4);
    assert!(updated[0].get("planet_id").is_none());

    let (status, read) = send(&app, Method::GET, "/get-favorites", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read, updated);

    // Empty list clears everything
    let (status, cleared) = send(&app, Method::POST, "/update-favorites", Some(&token), Some(json!([]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared, json!([]));
}

#[tokio::test]
async fn test_failed_update_leaves_favorites_untouched() {
    let app = test_app();
    load_catalog(&app).await;
    let token = register(&app, "wedge").await;

    send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([{"category": "CHARACTER", "character_id": 9}])),
    )
    .await;
    let (_, before) = send(&app, Method::GET, "/get-favorites", Some(&token), None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([
            {"category": "CHARACTER", "character_id": 1},
            {"category": "PLANET", "planet_id": 999},
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([{"category": "STARSHIP", "starship_id": 10}])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!({"category": "PLANET"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, after) = send(&app, Method::GET, "/get-favorites", Some(&token), None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    let app = test_app();
    load_catalog(&app).await;
    let luke = register(&app, "luke").await;
    let leia = register(&app, "leia").await;

    send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&leia),
        Some(json!([{"category": "PLANET", "planet_id": 2}])),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&luke),
        Some(json!([{"category": "PLANET", "planet_id": 1}])),
    )
    .await;
    send(&app, Method::POST, "/update-favorites", Some(&luke), Some(json!([]))).await;

    let (_, leia_rows) = send(&app, Method::GET, "/get-favorites", Some(&leia), None).await;
    assert_eq!(planet_ids(&leia_rows), vec![2]);
}

#[tokio::test]
async fn test_catalog_endpoints() {
    let app = test_app();

    let (_, empty) = send(&app, Method::GET, "/planets", None, None).await;
    assert_eq!(empty, json!([]));

    load_catalog(&app).await;
    load_catalog(&app).await;

    let (status, characters) = send(&app, Method::GET, "/characters", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(characters.as_array().unwrap().len(), 10);
    assert_eq!(characters[0]["name"], "Luke Skywalker");

    let (_, planets) = send(&app, Method::GET, "/planets", None, None).await;
    assert_eq!(planets[0]["name"], "Tatooine");
}

#[tokio::test]
async fn test_store_failure_surfaces_as_unavailable() {
    let state = test_state(":memory:");
    let db = state.db.clone();
    let app = router(state);
    let token = register(&app, "biggs").await;

    db.lock()
        .unwrap()
        .execute_batch("DROP TABLE favorite_planet")
        .unwrap();

    let (status, body) = send(&app, Method::GET, "/get-favorites", Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "store_unavailable");
}

#[tokio::test]
async fn test_held_writer_lock_surfaces_as_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.db");
    let path = path.to_str().unwrap();

    let app = router(test_state(path));
    load_catalog(&app).await;
    let token = register(&app, "porkins").await;

    let other = rusqlite::Connection::open(path).unwrap();
    other.execute_batch("BEGIN IMMEDIATE").unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/update-favorites",
        Some(&token),
        Some(json!([{"category": "PLANET", "planet_id": 1}])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    other.execute_batch("ROLLBACK").unwrap();
    let (_, rows) = send(&app, Method::GET, "/get-favorites", Some(&token), None).await;
    assert_eq!(rows, json!([]));
}
