#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use retailx_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::account::{self, Role},
    services::{
        assistant::ChatAssistant, factory::ServiceFactory, notifications::Notifier,
        otp::InMemoryOtpStore,
    },
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "Sup3r-secret";

/// Records every code handed to it instead of sending mail.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .expect("notifier lock")
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_otp(&self, email: &str, code: &str, _role: Role) -> bool {
        self.sent
            .lock()
            .expect("notifier lock")
            .push((email.to_string(), code.to_string()));
        true
    }
}

/// Echoes the prompt back so tests can see it reached the assistant.
pub struct EchoAssistant;

#[async_trait]
impl ChatAssistant for EchoAssistant {
    async fn reply(&self, message: &str) -> String {
        format!("echo: {message}")
    }
}

/// Application router over a throwaway SQLite file and model folder.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub notifier: Arc<CapturingNotifier>,
    pub admin: account::Model,
    pub manager: account::Model,
    pub cashier: account::Model,
    admin_token: String,
    manager_token: String,
    cashier_token: String,
    model_dir: TempDir,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("db temp dir");
        let model_dir = TempDir::new().expect("model temp dir");
        let db_file = db_dir.path().join("retailx_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "redis://127.0.0.1:6379".to_string(),
            "test_secret_key_for_testing_purposes_only_and_long_enough_for_hs256".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.forecast.model_dir = model_dir.path().to_string_lossy().into_owned();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let auth = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let notifier = Arc::new(CapturingNotifier::default());

        let factory = ServiceFactory::new(db_arc.clone(), auth.clone(), cfg.clone());
        let accounts =
            factory.accounts_service_with(Arc::new(InMemoryOtpStore::new()), notifier.clone());
        let services = factory.container(accounts, Arc::new(EchoAssistant));

        let state = AppState {
            db: db_arc,
            config: cfg,
            auth: auth.clone(),
            services,
        };

        let seed = |role: Role, username: &'static str| {
            let accounts = state.services.accounts.clone();
            async move {
                accounts
                    .create_account(
                        role,
                        &format!("Test {username}"),
                        &format!("{username}@retailx.test"),
                        username,
                        TEST_PASSWORD,
                    )
                    .await
                    .expect("seed account")
            }
        };
        let admin = seed(Role::Admin, "admin1").await;
        let manager = seed(Role::Manager, "manager1").await;
        let cashier = seed(Role::Cashier, "cashier1").await;

        let token = |model: &account::Model| {
            auth.issue_token(model)
                .expect("issue test token")
                .access_token
        };
        let admin_token = token(&admin);
        let manager_token = token(&manager);
        let cashier_token = token(&cashier);

        let router = retailx_api::app_router(state.clone());

        Self {
            router,
            state,
            notifier,
            admin,
            manager,
            cashier,
            admin_token,
            manager_token,
            cashier_token,
            model_dir,
            _db_dir: db_dir,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn manager_token(&self) -> &str {
        &self.manager_token
    }

    pub fn cashier_token(&self) -> &str {
        &self.cashier_token
    }

    pub fn model_dir(&self) -> &Path {
        self.model_dir.path()
    }

    /// Drop a constant-valued model into the model folder.
    pub fn add_constant_model(&self, file_name: &str, value: f64) {
        let artifact = serde_json::json!({ "kind": "constant", "value": value });
        self.add_raw_model(file_name, &artifact.to_string());
    }

    pub fn add_raw_model(&self, file_name: &str, contents: &str) {
        std::fs::write(self.model_dir.path().join(file_name), contents)
            .expect("write model artifact");
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
