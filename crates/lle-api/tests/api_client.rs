use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use lle_api::{ApiClient, ApiConfig, ApiError};
use lle_store::LocalStore;
use lle_types::{AuthTokens, ChildProfile, ChildUpdate};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use uuid::Uuid;

const CHILD_ID: &str = "4b6f0f9e-2f5c-4d0a-9d6e-0c2a1b7f3e11";

#[derive(Default)]
struct Backend {
    /// The only access token the mock accepts.
    valid_access: Mutex<String>,
    refresh_ok: Mutex<bool>,
    refresh_calls: Mutex<u32>,
    requests: Mutex<Vec<String>>,
}

type Shared = Arc<Backend>;

fn authorized(backend: &Backend, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", backend.valid_access.lock().unwrap());
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

fn child_json(name: &str, age: u32) -> Value {
    json!({
        "id": CHILD_ID,
        "parent": 1,
        "name": name,
        "age": age,
        "native_language": "en",
        "conversation_prompt": "",
        "created_at": "2025-03-01T10:00:00Z",
        "updated_at": "2025-03-01T10:00:00Z"
    })
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({"access": "access-1", "refresh": "refresh-1"})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
    }
}

async fn refresh(State(backend): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    *backend.refresh_calls.lock().unwrap() += 1;
    if *backend.refresh_ok.lock().unwrap() && body["refresh"] == "refresh-1" {
        *backend.valid_access.lock().unwrap() = "access-2".to_string();
        (StatusCode::OK, Json(json!({"access": "access-2"})))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
    }
}

async fn list_children(State(backend): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.requests.lock().unwrap().push("GET /children/".into());
    if !authorized(&backend, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "expired"})));
    }
    (
        StatusCode::OK,
        Json(json!({"count": 1, "next": null, "previous": null, "results": [child_json("Ava", 4)]})),
    )
}

async fn create_child(State(backend): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    backend.requests.lock().unwrap().push("POST /children/".into());
    let age = body["age"].as_u64().unwrap_or(0) as u32;
    (
        StatusCode::CREATED,
        Json(child_json(body["name"].as_str().unwrap_or(""), age)),
    )
}

async fn update_child(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(id, CHILD_ID);
    Json(child_json("Ava", body["age"].as_u64().unwrap_or(4) as u32))
}

async fn start_session(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "session_id": 42,
            "livekit_room": format!("child_{}_abc", body["child_id"].as_str().unwrap_or("")),
            "child_id": body["child_id"],
            "started_at": "2025-03-01T10:00:00Z"
        })),
    )
}

async fn end_session(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    if id == 42 {
        (StatusCode::OK, Json(json!({"id": 42})))
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"message": "Session already ended."})))
    }
}

async fn sessions(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("child_id").map(String::as_str), Some(CHILD_ID));
    Json(json!([{
        "id": 42,
        "child": CHILD_ID,
        "child_username": "parent",
        "livekit_room": "child_x_abc",
        "started_at": "2025-03-01T10:00:00Z",
        "ended_at": null
    }]))
}

async fn analytics(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("child_id").map(String::as_str), Some(CHILD_ID));
    Json(json!({"count": 1, "results": [{
        "id": "a1",
        "session": 42,
        "child_vocalizations": 17,
        "assistant_responses": 15,
        "avg_child_utterance_length": 2.5,
        "unique_child_words": 30,
        "encouragements_given": 6,
        "child_to_ai_ratio": 1.13,
        "topics_detected": ["animals", "colors"],
        "best_utterance": "the big red dog",
        "conversation_summary": "Talked about pets.",
        "created_at": "2025-03-01T10:20:00Z"
    }]}))
}

async fn media_token(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    match q.get("room").map(String::as_str) {
        Some("broken") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "LiveKit token service not configured. API key or secret missing."})),
        ),
        Some("html") => (StatusCode::BAD_GATEWAY, Json(json!("upstream down"))),
        _ => (
            StatusCode::OK,
            Json(json!({"token": "aaa.bbb.ccc", "source": "generated"})),
        ),
    }
}

async fn spawn_backend(backend: Shared) -> String {
    let app = Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/token/refresh/", post(refresh))
        .route("/api/children/", get(list_children).post(create_child))
        .route("/api/children/{id}/", patch(update_child))
        .route("/api/sessions/", get(sessions))
        .route("/api/sessions/start/", post(start_session))
        .route("/api/sessions/{id}/end", post(end_session))
        .route("/api/analytics", get(analytics))
        .route("/api/livekit-token/", get(media_token))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn setup() -> (ApiClient, Shared) {
    let backend = Arc::new(Backend::default());
    *backend.valid_access.lock().unwrap() = "access-1".to_string();
    *backend.refresh_ok.lock().unwrap() = true;
    let base = spawn_backend(backend.clone()).await;
    let client = ApiClient::new(&ApiConfig::new(base), LocalStore::in_memory().unwrap()).unwrap();
    (client, backend)
}

#[tokio::test]
async fn login_stores_tokens_and_authenticates_requests() {
    let (client, _backend) = setup().await;
    assert!(!client.is_authenticated());

    let tokens = client.login("parent", "secret").await.unwrap();
    assert_eq!(tokens.access, "access-1");
    assert!(client.is_authenticated());

    let page = client.list_children().await.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].name, "Ava");
}

#[tokio::test]
async fn bad_credentials_surface_backend_message() {
    let (client, _backend) = setup().await;
    let err = client.login("parent", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized), "got {err:?}");
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn expired_access_token_is_refreshed_once_and_retried() {
    let (client, backend) = setup().await;
    client.login("parent", "secret").await.unwrap();

    // Server rotates its key; the stored access token is now stale.
    *backend.valid_access.lock().unwrap() = "rotated".to_string();
    // Refresh hands out access-2, which the server then accepts.
    let page = client.list_children().await.unwrap();
    assert_eq!(page.results.len(), 1);
    assert_eq!(*backend.refresh_calls.lock().unwrap(), 1);
    assert_eq!(
        client.store().access_token().unwrap().as_deref(),
        Some("access-2")
    );
    // Refresh response did not rotate the refresh token, so it is kept.
    assert_eq!(
        client.store().refresh_token().unwrap().as_deref(),
        Some("refresh-1")
    );
    assert_eq!(backend.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_refresh_clears_credentials() {
    let (client, backend) = setup().await;
    client.login("parent", "secret").await.unwrap();
    *backend.valid_access.lock().unwrap() = "rotated".to_string();
    *backend.refresh_ok.lock().unwrap() = false;

    let err = client.list_children().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!client.is_authenticated());
    assert!(client.store().refresh_token().unwrap().is_none());
}

#[tokio::test]
async fn unauthorized_without_refresh_token_clears_access() {
    let (client, _backend) = setup().await;
    client
        .store()
        .save_tokens(&AuthTokens {
            access: "stale".into(),
            refresh: String::new(),
        })
        .unwrap();
    client.store().remove("refresh_token").unwrap();

    let err = client.list_children().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(client.store().access_token().unwrap().is_none());
}

#[tokio::test]
async fn invalid_profile_never_reaches_backend() {
    let (client, backend) = setup().await;
    let err = client
        .create_child(&ChildProfile::new("Sam", 11))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert!(backend.requests.lock().unwrap().is_empty());

    let child = client.create_child(&ChildProfile::new("Sam", 6)).await.unwrap();
    assert_eq!(child.age, 6);

    let updated = client
        .update_child(
            child.id,
            &ChildUpdate {
                age: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.age, 7);
}

#[tokio::test]
async fn session_lifecycle_is_logged_locally() {
    let (client, _backend) = setup().await;
    let child_id: Uuid = CHILD_ID.parse().unwrap();

    let start = client.start_session(child_id).await.unwrap();
    assert_eq!(start.session_id, 42);
    assert_eq!(start.livekit_room, format!("child_{CHILD_ID}_abc"));
    assert_eq!(client.store().open_sessions().unwrap().len(), 1);

    client.end_session(42).await.unwrap();
    assert!(client.store().open_sessions().unwrap().is_empty());

    let err = client.end_session(7).await.unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Session already ended.");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let history = client.list_sessions(child_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_active());
}

#[tokio::test]
async fn analytics_are_read_for_a_child() {
    let (client, _backend) = setup().await;
    let page = client.analytics(CHILD_ID.parse().unwrap()).await.unwrap();
    assert_eq!(page.results.len(), 1);
    let record = &page.results[0];
    assert_eq!(record.child_vocalizations, 17);
    assert_eq!(record.topics_detected, vec!["animals", "colors"]);
}

#[tokio::test]
async fn media_token_passes_backend_errors_through() {
    let (client, _backend) = setup().await;

    let ok = client.media_token("room-1", "child-1").await.unwrap();
    assert_eq!(ok.token.as_deref(), Some("aaa.bbb.ccc"));
    assert_eq!(ok.source.as_deref(), Some("generated"));

    let broken = client.media_token("broken", "child-1").await.unwrap();
    assert!(broken.token.is_none());
    assert!(broken.error.unwrap().contains("not configured"));

    let err = client.media_token("html", "child-1").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}
