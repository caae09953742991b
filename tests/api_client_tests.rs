// API gateway behavior against an in-process mock of the backend REST
// surface, covering bearer attachment and the one-shot refresh-and-replay
// recovery.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use medai_client::api::{
    extract_detail, ApiClient, ApiError, ImageAnalysisRequest, ListQuery, RegisterRequest,
};
use medai_client::auth::CredentialStore;
use medai_client::config::ApiConfig;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const STALE_TOKEN: &str = "stale-token";
const FRESH_TOKEN: &str = "fresh-token";

#[derive(Clone)]
struct MockState {
    refresh_ok: bool,
    refresh_calls: Arc<AtomicUsize>,
    resource_calls: Arc<AtomicUsize>,
}

impl MockState {
    fn new(refresh_ok: bool) -> Self {
        Self {
            refresh_ok,
            refresh_calls: Arc::new(AtomicUsize::new(0)),
            resource_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn bearer_is_fresh(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", FRESH_TOKEN))
        .unwrap_or(false)
}

async fn list_reports(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);

    if bearer_is_fresh(&headers) {
        (
            StatusCode::OK,
            Json(json!({"reports": [], "total": 0, "skip": 0, "limit": 20})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token expired"})),
        )
    }
}

async fn analyze_image(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);

    if bearer_is_fresh(&headers) {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "analysis_id": "a-1",
                "analysis": {"findings": "unremarkable"},
                "metadata": {},
                "message": "Image analyzed"
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token expired"})),
        )
    }
}

async fn refresh_token(State(state): State<MockState>) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if state.refresh_ok {
        (
            StatusCode::OK,
            Json(json!({
                "access_token": FRESH_TOKEN,
                "token_type": "bearer",
                "expires_in": 1800
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid refresh token"})),
        )
    }
}

async fn register_conflict() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"detail": "Username already registered"})),
    )
}

fn mock_router(state: MockState) -> Router {
    Router::new()
        .route("/reports", get(list_reports))
        .route("/images/analyze", post(analyze_image))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/register", post(register_conflict))
        .with_state(state)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn client_with_token(base_url: String, dir: &std::path::Path) -> (ApiClient, Arc<CredentialStore>) {
    let store = Arc::new(CredentialStore::open(dir).unwrap());
    store.set_access_token(STALE_TOKEN).unwrap();
    store.set_user_data(r#"{"username":"demo"}"#).unwrap();

    let config = ApiConfig {
        base_url,
        timeout_secs: 5,
    };
    let client = ApiClient::new(&config, Arc::clone(&store)).unwrap();
    (client, store)
}

#[tokio::test]
async fn test_unauthenticated_call_refreshes_and_replays_once() {
    let state = MockState::new(true);
    let base = serve(mock_router(state.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let (client, store) = client_with_token(base, dir.path());

    let page = client.list_reports(&ListQuery::default()).await.unwrap();

    assert_eq!(page.total, 0);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    // Original call plus exactly one replay
    assert_eq!(state.resource_calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.access_token().as_deref(), Some(FRESH_TOKEN));
    // The cached profile survives a successful refresh
    assert!(store.user_data().is_some());
}

#[tokio::test]
async fn test_refresh_failure_clears_session_and_propagates() {
    let state = MockState::new(false);
    let base = serve(mock_router(state.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let (client, store) = client_with_token(base, dir.path());

    let error = client.list_reports(&ListQuery::default()).await.unwrap_err();

    match error {
        ApiError::Unauthorized(message) => assert_eq!(message, "Token expired"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    // No replay after a failed refresh
    assert_eq!(state.resource_calls.load(Ordering::SeqCst), 1);
    assert!(store.access_token().is_none());
    assert!(store.user_data().is_none());
}

#[tokio::test]
async fn test_concurrent_unauthenticated_calls_share_one_refresh() {
    let state = MockState::new(true);
    let base = serve(mock_router(state.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let (client, _store) = client_with_token(base, dir.path());

    let query = ListQuery::default();
    let (a, b) = tokio::join!(client.list_reports(&query), client.list_reports(&query));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(
        state.refresh_calls.load(Ordering::SeqCst),
        1,
        "concurrent 401s must not produce duplicate refreshes"
    );
}

#[tokio::test]
async fn test_multipart_upload_replays_after_refresh() {
    let state = MockState::new(true);
    let base = serve(mock_router(state.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let (client, _store) = client_with_token(base, dir.path());

    let request = ImageAnalysisRequest {
        image_type: "XRAY".to_string(),
        patient_id: Some("P-1".to_string()),
        clinical_context: None,
    };
    let response = client
        .analyze_image(&request, "scan.png", vec![0u8; 32])
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.analysis_id, "a-1");
    // The multipart body was rebuilt for the replay, not byte-cloned
    assert_eq!(state.resource_calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_validation_error_surfaces_backend_detail() {
    let state = MockState::new(true);
    let base = serve(mock_router(state)).await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::open(dir.path()).unwrap());
    let client = ApiClient::new(
        &ApiConfig {
            base_url: base,
            timeout_secs: 5,
        },
        store,
    )
    .unwrap();

    let request = RegisterRequest {
        username: "demo".to_string(),
        password: "secret".to_string(),
        full_name: "Demo Doctor".to_string(),
        role: "doctor".to_string(),
    };
    let error = client.register(&request).await.unwrap_err();

    match error {
        ApiError::Validation(message) => assert_eq!(message, "Username already registered"),
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[test]
fn test_detail_extraction() {
    assert_eq!(
        extract_detail(r#"{"detail": "Incorrect username or password"}"#),
        "Incorrect username or password"
    );
    assert_eq!(
        extract_detail(r#"{"detail": [{"loc": ["body", "username"], "msg": "field required"}]}"#),
        "field required"
    );
    assert_eq!(extract_detail(r#"{"detail": []}"#), "Validation error");
    assert_eq!(extract_detail(""), "An unexpected error occurred");
    assert_eq!(extract_detail("gateway timeout"), "gateway timeout");
}
