#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use product_copy_api::{
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    generation::{DescriptionGenerator, GenerationError},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

/// Generator double that returns a canned result and records what it was asked for.
pub struct StubGenerator {
    reply: Mutex<Result<String, String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Ok(text.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Err(message.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: Result<String, String>) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DescriptionGenerator for StubGenerator {
    async fn generate(&self, name: &str, attributes: &str) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), attributes.to_string()));
        self.reply
            .lock()
            .unwrap()
            .clone()
            .map_err(GenerationError::Remote)
    }
}

/// Helper harness for spinning up an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Fresh store and a generator that always succeeds.
    pub async fn new() -> Self {
        Self::with_generator(StubGenerator::replying("A generated description.")).await
    }

    pub async fn with_generator(generator: Arc<dyn DescriptionGenerator>) -> Self {
        let cfg = test_config();

        // One connection: every in-memory SQLite connection is its own database
        let pool = db::establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg, generator);
        let router = build_router(state.clone());

        Self { router, state }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

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

    /// Sends a raw body with a JSON content type, for malformed-payload cases.
    pub async fn request_raw(&self, method: Method, uri: &str, raw: &'static str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Creates a product through the API and returns the response body.
    pub async fn create_product(&self, name: &str, attributes: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/products",
                Some(serde_json::json!({ "name": name, "attributes": attributes })),
            )
            .await;
        assert_eq!(response.status(), 201, "create product should succeed");
        response_json(response).await
    }

    pub async fn list_products(&self) -> Vec<Value> {
        let response = self.request(Method::GET, "/api/products", None).await;
        assert_eq!(response.status(), 200);
        response_json(response)
            .await
            .as_array()
            .cloned()
            .expect("list body should be an array")
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
