use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use snapsecret_broker::telemetry::CORRELATION_ID_HEADER;
use snapsecret_broker::{AppState, ConfiguredStore, build_state_with_store};
use snapsecret_core::{EngineConfig, MemoryStore, SWEEP_EVERY_PUTS};
use snapsecret_spec::{SecretId, SecretsStore};
use std::time::Duration;
use tower::ServiceExt;

fn bootstrap() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let state: AppState = build_state_with_store(
        ConfiguredStore::Memory(store.clone()),
        EngineConfig::default(),
    );
    (snapsecret_broker::http::router(state), store)
}

fn create_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/secrets")
        .header(header::HOST, "snap.test")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn access_request(id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/v1/secrets/{id}"))
        .body(Body::empty())
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn create_then_access_once() {
    let (app, _store) = bootstrap();

    let response = app
        .clone()
        .oneshot(create_request(json!({ "text": "launch-code", "expireIn": "5m" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    let created = read_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["message"], "Successfully created secret");
    assert_eq!(location, format!("http://snap.test/v1/secrets/{id}"));

    let response = app.clone().oneshot(access_request(&id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accessed = read_json(response).await;
    assert_eq!(accessed["secret"], "launch-code");
    assert_eq!(
        accessed["message"],
        "Secret accessed, it will not be accessible anymore"
    );

    let response = app.oneshot(access_request(&id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["errorType"], "SecretExpiredOrNotFound");
    assert!(body.get("causes").is_none());
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let (app, store) = bootstrap();
    let response = app
        .oneshot(create_request(json!({ "text": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["errorType"], "InvalidRequest");
    assert!(store.is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (app, _store) = bootstrap();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/secrets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["errorType"], "InvalidRequest");
}

#[tokio::test]
async fn bad_expire_in_is_rejected() {
    let (app, _store) = bootstrap();
    let response = app
        .oneshot(create_request(json!({ "text": "x", "expireIn": "whenever" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_id_looks_like_unknown_id() {
    let (app, _store) = bootstrap();
    let malformed = app
        .clone()
        .oneshot(access_request("not_valid!"))
        .await
        .unwrap();
    let unknown = app.oneshot(access_request("valid-but-unknown")).await.unwrap();
    assert_eq!(malformed.status(), StatusCode::NOT_FOUND);
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let malformed = read_json(malformed).await;
    assert_eq!(malformed["errorType"], read_json(unknown).await["errorType"]);
    assert_eq!(
        malformed["message"],
        "Failed to get secret. Secret is either expired or does not exist."
    );
}

#[tokio::test]
async fn malformed_id_is_not_echoed() {
    let (app, _store) = bootstrap();
    let response = app
        .oneshot(access_request("%3Cscript%3Ealert(1)%3C%2Fscript%3E"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let message = read_json(response).await["message"].to_string();
    assert!(!message.contains("script"));
}

#[tokio::test]
async fn oversized_expire_in_is_a_bad_request() {
    let (app, store) = bootstrap();
    for expire_in in ["200000000000000d", "91d", "91.00:00:00"] {
        let response = app
            .clone()
            .oneshot(create_request(json!({ "text": "x", "expireIn": expire_in })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{expire_in}");
        assert_eq!(read_json(response).await["errorType"], "InvalidRequest");
    }
    assert!(store.is_empty());

    let response = app
        .oneshot(create_request(json!({ "text": "x", "expireIn": "90d" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn expired_secrets_are_evicted_by_later_creates() {
    let (app, store) = bootstrap();
    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(create_request(json!({ "text": "stale", "expireIn": "1s" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    tokio::time::sleep(Duration::from_millis(1200)).await;

    for _ in 0..SWEEP_EVERY_PUTS {
        let response = app
            .clone()
            .oneshot(create_request(json!({ "text": "fresh" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    assert_eq!(store.len(), SWEEP_EVERY_PUTS as usize);
}

#[tokio::test]
async fn expired_secret_is_not_found() {
    let (app, store) = bootstrap();
    let response = app
        .clone()
        .oneshot(create_request(json!({ "text": "blink", "expireIn": "1s" })))
        .await
        .unwrap();
    let id = read_json(response).await["id"].as_str().unwrap().to_string();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app.oneshot(access_request(&id)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn correlation_id_is_echoed_or_generated() {
    let (app, _store) = bootstrap();
    let request = Request::builder()
        .uri("/healthz")
        .header(CORRELATION_ID_HEADER, "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CORRELATION_ID_HEADER], "req-123");
    assert_eq!(read_json(response).await, json!({ "status": "ok" }));

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
}

#[tokio::test]
async fn prompt_and_answer_are_accepted() {
    let (app, store) = bootstrap();
    let response = app
        .oneshot(create_request(json!({
            "text": "wifi: correct-horse",
            "prompt": "where did we meet?",
            "answer": "lisbon",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["id"].as_str().unwrap().to_string();

    let stored = store
        .get(&SecretId::new(id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.prompt(), Some("where did we meet?"));
    assert_eq!(stored.answer(), Some("lisbon"));
}
