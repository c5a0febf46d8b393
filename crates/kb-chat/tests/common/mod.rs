//! Shared harness: the real router wired to wiremock stand-ins for the
//! RAG service and the generation endpoint

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kb_chat::config::KbConfig;
use kb_chat::providers::{IndexProvider, LlmProvider, OllamaLlm, RagServiceClient};
use kb_chat::server::{build_router, state::AppState};
use kb_chat::storage::Database;

pub const PASSWORD: &str = "Secret123";
const BOUNDARY: &str = "kbchatboundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub rag: MockServer,
    pub llm: MockServer,
    pub dir: tempfile::TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Start mocks answering every RAG endpoint with success, then build the app
pub async fn spawn_app_with(customize: impl FnOnce(&mut KbConfig)) -> TestApp {
    let rag = MockServer::start().await;
    let llm = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    for endpoint in ["/ingest", "/reset"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&rag)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": [] })))
        .mount(&rag)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&rag)
        .await;

    let mut config = KbConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.rag_service.base_url = rag.uri();
    config.llm.base_url = llm.uri();
    config.scraper.timeout_secs = 5;
    customize(&mut config);

    let db = Arc::new(Database::in_memory().unwrap());
    let index: Arc<dyn IndexProvider> = Arc::new(RagServiceClient::new(&config.rag_service).unwrap());
    let generator: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::new(&config.llm).unwrap());

    let state = AppState::with_providers(config, db, index, generator).unwrap();
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        rag,
        llm,
        dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"]["message"].as_str().unwrap_or_default().to_string()
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            body: body.to_vec(),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
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
        self.send(request).await
    }

    /// Register an account and return its token and user JSON
    pub async fn register(&self, username: &str) -> (String, Value) {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        let body = response.json();
        (body["token"].as_str().unwrap().to_string(), body["user"].clone())
    }

    pub async fn upload(
        &self,
        token: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/upload")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body("file", filename, content_type, data)))
            .unwrap();
        self.send(request).await
    }

    /// Request bodies the RAG mock received on `endpoint`
    pub async fn rag_requests(&self, endpoint: &str) -> Vec<Value> {
        self.rag
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }

    /// Mount a streamed answer made of `fragments`
    pub async fn mock_answer(&self, fragments: &[&str]) {
        let mut body = String::new();
        for fragment in fragments {
            body.push_str(&json!({ "response": fragment, "done": false }).to_string());
            body.push('\n');
        }
        body.push_str(&json!({ "response": "", "done": true }).to_string());
        body.push('\n');

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.llm)
            .await;
    }
}

pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// `(event, data)` pairs of an SSE body, keep-alive comments skipped
pub fn parse_sse(body: &str) -> Vec<(String, String)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = Vec::new();
            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                }
            }
            event.map(|e| (e, data.join("\n")))
        })
        .collect()
}
