//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;

/// One request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Recording mock backend. Responds 200 with `hit <METHOD> <path>`,
/// except `/status` which answers 418 to exercise status passthrough.
#[derive(Debug, Clone, Default)]
pub struct Backend {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Backend {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn find(&self, method: &str, path: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path == path)
    }
}

/// Start the mock backend on an ephemeral port.
pub async fn start_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let recorder = backend.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let recorder = recorder.clone();
        async move { record(recorder, request).await }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, backend)
}

async fn record(backend: Backend, request: Request<Body>) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let headers = request
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_ascii_lowercase(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .unwrap_or_default()
        .to_vec();

    backend.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query,
        headers,
        body,
    });

    let status = if path == "/status" {
        StatusCode::IM_A_TEAPOT
    } else {
        StatusCode::OK
    };

    (
        status,
        [("server", "mock-backend"), ("x-upstream-extra", "1")],
        format!("hit {method} {path}"),
    )
        .into_response()
}
