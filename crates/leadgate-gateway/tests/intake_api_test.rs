//! Integration tests for the intake HTTP surface

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use leadgate_core::{
    DispatchTrigger, IntakeCoordinator, IntakeError, LedgerSnapshot, LedgerStore,
    MemoryLedgerStore, Payload, UpstreamFailure, VersionToken, WriteOutcome,
};
use leadgate_gateway::{Gateway, GatewayConfig, GatewayState};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Clone, Copy, Default, PartialEq)]
enum StoreMode {
    #[default]
    Healthy,
    ReadFails,
    WriteConflicts,
    Panics,
}

/// Memory ledger that counts calls and can misbehave on demand
#[derive(Default)]
struct TestStore {
    inner: MemoryLedgerStore,
    mode: StoreMode,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl TestStore {
    fn with_content(content: &str, mode: StoreMode) -> Self {
        Self {
            inner: MemoryLedgerStore::with_content(content),
            mode,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for TestStore {
    async fn read_ledger(&self) -> leadgate_core::Result<LedgerSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            StoreMode::ReadFails => Err(IntakeError::LedgerRead(UpstreamFailure::status(
                500,
                "internal detail",
            ))),
            StoreMode::Panics => panic!("ledger exploded"),
            _ => self.inner.read_ledger().await,
        }
    }

    async fn write_ledger(
        &self,
        content: &str,
        version: Option<&VersionToken>,
        message: &str,
    ) -> leadgate_core::Result<WriteOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.mode == StoreMode::WriteConflicts {
            return Ok(WriteOutcome::Conflict);
        }
        self.inner.write_ledger(content, version, message).await
    }
}

#[derive(Default)]
struct TestDispatcher {
    fired: Mutex<Vec<Payload>>,
    fail_with: Option<u16>,
}

impl TestDispatcher {
    fn count(&self) -> usize {
        self.fired.lock().unwrap().len()
    }
}

#[async_trait]
impl DispatchTrigger for TestDispatcher {
    async fn fire(&self, _event_type: &str, payload: &Payload) -> leadgate_core::Result<()> {
        self.fired.lock().unwrap().push(payload.clone());
        match self.fail_with {
            Some(status) => Err(IntakeError::Dispatch(UpstreamFailure::status(
                status,
                "Bad credentials",
            ))),
            None => Ok(()),
        }
    }
}

struct Harness {
    router: Router,
    store: Arc<TestStore>,
    dispatcher: Arc<TestDispatcher>,
}

fn harness(store: TestStore, dispatcher: TestDispatcher) -> Harness {
    let mut config = GatewayConfig::default();
    config.tracing = false;
    harness_with_config(config, store, dispatcher)
}

fn harness_with_config(config: GatewayConfig, store: TestStore, dispatcher: TestDispatcher) -> Harness {
    let store = Arc::new(store);
    let dispatcher = Arc::new(dispatcher);
    let coordinator = IntakeCoordinator::new(store.clone(), dispatcher.clone(), "scrape_leads");
    let state = GatewayState::with_coordinator(config, Some(Arc::new(coordinator)));

    Harness {
        router: Gateway::with_state(state).build_router(),
        store,
        dispatcher,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(raw) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            builder.body(Body::from(raw.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, parsed)
}

async fn post_intake(router: &Router, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, "/intake", Some(&body.to_string())).await
}

async fn intake_counters(router: &Router) -> Value {
    let (status, body) = send(router, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    body["intake"].clone()
}

#[tokio::test]
async fn test_new_email_is_admitted_and_recorded() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    let (status, body) = post_intake(
        &h.router,
        json!({"email": "new@z.com", "bedrijfsnaam": "Acme", "branche": "Bouw"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Success"}));
    assert_eq!(h.dispatcher.count(), 1);
    assert_eq!(
        h.dispatcher.fired.lock().unwrap()[0].get("bedrijfsnaam"),
        Some(&json!("Acme"))
    );
    assert_eq!(h.store.inner.content().await.as_deref(), Some("new@z.com\n"));

    let counters = intake_counters(&h.router).await;
    assert_eq!(counters["admitted"], json!(1));
    assert_eq!(counters["commit_conflicts"], json!(0));
}

#[tokio::test]
async fn test_known_email_in_any_case_hits_the_limit() {
    let h = harness(
        TestStore::with_content("a@x.com\nb@y.com\n", StoreMode::Healthy),
        TestDispatcher::default(),
    );

    let (status, body) = post_intake(&h.router, json!({"email": "A@X.COM"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"message": "LIMIT_REACHED"}));

    let (status, _) = post_intake(&h.router, json!({"email": "  b@y.com  "})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_submission_of_same_email_is_rejected() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    let (first, _) = post_intake(&h.router, json!({"email": "once@x.com"})).await;
    let (second, _) = post_intake(&h.router, json!({"email": "ONCE@x.com"})).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::FORBIDDEN);
    assert_eq!(h.dispatcher.count(), 1);
}

#[tokio::test]
async fn test_missing_email_is_bad_request_without_network_calls() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    let (status, body) = post_intake(&h.router, json!({"naam": "Jan"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"message": "Email is required"}));

    let (status, _) = post_intake(&h.router, json!({"email": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(intake_counters(&h.router).await["rejected"], json!(2));
}

#[tokio::test]
async fn test_multi_line_email_is_bad_request_without_network_calls() {
    let h = harness(
        TestStore::with_content("victim@y.com\n", StoreMode::Healthy),
        TestDispatcher::default(),
    );

    for _ in 0..3 {
        let (status, body) =
            post_intake(&h.router, json!({"email": "evil@x.com\nvictim@y.com"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"message": "Email must be a single line of text"}));
    }

    let (status, _) = post_intake(&h.router, json!({"email": "a@x.com\r\nb@y.com"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(h.store.inner.content().await.as_deref(), Some("victim@y.com\n"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected_as_json() {
    let mut config = GatewayConfig::default();
    config.tracing = false;
    config.max_body_bytes = 64;
    let h = harness_with_config(config, TestStore::default(), TestDispatcher::default());

    let padding = "x".repeat(256);
    let (status, body) =
        post_intake(&h.router, json!({"email": "new@z.com", "notes": padding})).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({"message": "Request body too large"}));

    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(intake_counters(&h.router).await["rejected"], json!(1));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    let (status, body) = send(&h.router, Method::POST, "/intake", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = send(&h.router, Method::POST, "/intake", Some("[1, 2]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_missing_credential_is_server_error_without_network_calls() {
    let mut config = GatewayConfig::default();
    config.tracing = false;
    let router = Gateway::with_state(GatewayState::with_coordinator(config, None)).build_router();

    let (status, body) = post_intake(&router, json!({"email": "new@z.com"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Server configuration error: Token missing"}));

    // The credential check comes first, even for an invalid body
    let (status, _) = post_intake(&router, json!({})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, status_body) = send(&router, Method::GET, "/status", None).await;
    assert_eq!(status_body["credential_configured"], json!(false));
    assert_eq!(status_body["intake"]["config_errors"], json!(2));
}

#[tokio::test]
async fn test_non_post_methods_are_rejected() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let (status, body) = send(&h.router, method, "/intake", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({"message": "Method not allowed"}));
    }
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_unreadable_ledger_fails_closed() {
    let h = harness(
        TestStore::with_content("", StoreMode::ReadFails),
        TestDispatcher::default(),
    );

    let (status, body) = post_intake(&h.router, json!({"email": "new@z.com"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"message": "GitHub API error: 500"}));
    assert!(!body.to_string().contains("internal detail"));
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(intake_counters(&h.router).await["upstream_failures"], json!(1));
}

#[tokio::test]
async fn test_failed_dispatch_leaves_ledger_alone() {
    let h = harness(
        TestStore::with_content("a@x.com\n", StoreMode::Healthy),
        TestDispatcher {
            fail_with: Some(401),
            ..Default::default()
        },
    );

    let (status, body) = post_intake(&h.router, json!({"email": "new@z.com"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"message": "GitHub API error: 401"}));
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.inner.content().await.as_deref(), Some("a@x.com\n"));

    // The email was not spent, so a retry is not treated as a duplicate
    let (_, body) = post_intake(&h.router, json!({"email": "new@z.com"})).await;
    assert_ne!(body, json!({"message": "LIMIT_REACHED"}));
}

#[tokio::test]
async fn test_ledger_conflict_after_dispatch_still_succeeds() {
    let h = harness(
        TestStore::with_content("a@x.com\n", StoreMode::WriteConflicts),
        TestDispatcher::default(),
    );

    let (status, body) = post_intake(&h.router, json!({"email": "new@z.com"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Success"}));
    assert_eq!(h.dispatcher.count(), 1);

    let counters = intake_counters(&h.router).await;
    assert_eq!(counters["admitted"], json!(1));
    assert_eq!(counters["commit_conflicts"], json!(1));
}

#[tokio::test]
async fn test_panics_become_generic_server_errors() {
    let h = harness(
        TestStore::with_content("", StoreMode::Panics),
        TestDispatcher::default(),
    );

    let (status, body) = post_intake(&h.router, json!({"email": "new@z.com"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Internal server error"}));
    assert_eq!(h.dispatcher.count(), 0);
}

#[tokio::test]
async fn test_health_reports_version() {
    let h = harness(TestStore::default(), TestDispatcher::default());

    let (status, body) = send(&h.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["version"], json!(leadgate_gateway::VERSION));
}
