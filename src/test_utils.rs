//! Test utilities for spinning up a MongoDB container and driving the router
//!
//! Each [`TestContext`] gets its own database inside a container, so tests can
//! run in parallel without seeing each other's collections.

#[cfg(any(test, feature = "test-utils"))]
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
#[cfg(any(test, feature = "test-utils"))]
use std::sync::Arc;
#[cfg(any(test, feature = "test-utils"))]
use testcontainers::{runners::AsyncRunner, ContainerAsync};
#[cfg(any(test, feature = "test-utils"))]
use testcontainers_modules::mongo::Mongo;
#[cfg(any(test, feature = "test-utils"))]
use tower::util::ServiceExt;

#[cfg(any(test, feature = "test-utils"))]
use crate::{config::Config, db::Database, AppState};

/// Host header sent with every test request; page urls are built from it.
pub const TEST_HOST: &str = "localhost:8000";

#[cfg(any(test, feature = "test-utils"))]
pub struct TestContext {
    pub app: Router,
    pub state: Arc<AppState>,
    pub container: Arc<ContainerAsync<Mongo>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestContext {
    /// Start a MongoDB container and connect a fresh database in it
    pub async fn new() -> Self {
        let container = Mongo::default()
            .start()
            .await
            .expect("Failed to start mongodb container");
        let host = container.get_host().await.expect("Failed to get mongodb host");
        let port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get mongodb port");

        let database_name = format!("test_{}", uuid::Uuid::new_v4().simple());
        let mut config = Config::with_url(format!("mongodb://{}:{}/{}", host, port, database_name));
        // A standalone test server only acknowledges w:1 writes quickly
        config.write_timeout_ms = 5_000;

        let db = Database::connect_with_config(&config)
            .await
            .expect("Failed to connect to test database");

        let state = Arc::new(AppState { db, config });
        let app = crate::create_app(state.clone());

        Self {
            app,
            state,
            container: Arc::new(container),
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Send a request through the router and decode the JSON body (`Null` when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, TEST_HOST);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("Failed to encode request body"))
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).expect("Failed to build request"))
            .await
            .expect("Router failed to respond");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response body is not JSON")
        };
        (status, json)
    }

    /// Drop every collection created by the test
    pub async fn cleanup(&self) {
        if let Err(e) = self.state.db.drop_all_collections().await {
            tracing::warn!("Failed to clean up test database {}: {}", self.state.db.name(), e);
        }
    }
}
