#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use matflow_api::{
    auth::{self, Department, TokenVerifier},
    config::AppConfig,
    db,
    events::{self, ChangeFeed, EventSender},
    logging,
    notifications::{NotificationError, NotificationRequest, Notifier},
    services::AppServices,
    AppState,
};

const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Captures every dispatched notification so tests can assert routing.
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<NotificationRequest>>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &NotificationRequest) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Test harness: application state backed by a file-based SQLite database
/// in a fresh temporary directory. The background sync loop is NOT running;
/// tests drive cache refreshes explicitly via `?refresh=true` so cache
/// behavior stays deterministic.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub notifications: Arc<Mutex<Vec<NotificationRequest>>>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = db_dir.path().join("matflow_test.db");
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut cfg = AppConfig::new(
            database_url,
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 2;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let feed = ChangeFeed::default();
        let event_task = tokio::spawn(events::process_events(event_rx, feed.clone()));

        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Arc::new(RecordingNotifier { sent: sent.clone() });

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            feed,
            notifier,
            Duration::from_secs(300),
            logging::discard_logger(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg.clone(),
            event_sender,
            services,
        };

        let verifier = Arc::new(TokenVerifier::new(&cfg.jwt_secret));
        let router = Router::new()
            .nest(
                "/api/v1",
                matflow_api::api_v1_routes().layer(axum::middleware::from_fn_with_state(
                    verifier,
                    auth::require_auth,
                )),
            )
            .with_state(state.clone());

        Self {
            router,
            state,
            notifications: sent,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn engineer_token(&self) -> String {
        self.token("eng-1", "Asha", "asha@example.com", Department::Engineer)
    }

    pub fn regional_manager_token(&self) -> String {
        self.token("rm-1", "Ravi", "ravi@example.com", Department::RegionalManager)
    }

    pub fn store_manager_token(&self) -> String {
        self.token("sm-1", "Sunil", "sunil@example.com", Department::StoreManager)
    }

    fn token(&self, user_id: &str, name: &str, email: &str, department: Department) -> String {
        auth::issue_token(
            &self.state.config.jwt_secret,
            user_id,
            name,
            Some(email),
            department,
            3600,
        )
        .expect("failed to issue test token")
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("failed to build request"),
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    /// Drained copy of every notification dispatched so far.
    pub fn dispatched(&self) -> Vec<NotificationRequest> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn clear_notifications(&self) {
        self.notifications.lock().unwrap().clear();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn expect_json(response: Response, expected: StatusCode) -> Value {
    assert_eq!(response.status(), expected, "unexpected response status");
    response_json(response).await
}
