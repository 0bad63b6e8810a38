//! Mock LLM backend speaking the Anthropic, OpenAI and Gemini wire formats
//!
//! Every request is recorded and answered with the same canned reply.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

/// Canned reply served for every request
#[derive(Debug, Clone)]
pub enum Reply {
    /// `200` with a JSON body
    Json(serde_json::Value),
    /// `200` with an event stream body
    Events(String),
    /// Event stream that sends the given prefix and then never ends
    Stalled(String),
    /// Error status with a raw body
    Status(StatusCode, String),
}

/// Request as the mock received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

struct MockState {
    reply: Reply,
    requests: Mutex<Vec<Recorded>>,
}

/// Mock provider backend bound to an ephemeral local port
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Start the mock server, returning once it is listening
    pub async fn start(reply: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            reply,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/messages", routing::post(handle))
            .route("/v1/chat/completions", routing::post(handle))
            .route("/v1/models/{model_action}", routing::post(handle))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1` since providers append `/messages`, `/chat/completions`
    /// or `/models/{model}:{action}`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().expect("mock state poisoned").clone()
    }

    /// The only request received
    pub fn single_request(&self) -> Recorded {
        let mut requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.remove(0)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    state.requests.lock().expect("mock state poisoned").push(Recorded {
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        headers,
        body,
    });

    match state.reply.clone() {
        Reply::Json(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            value.to_string(),
        )
            .into_response(),
        Reply::Events(events) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], events).into_response(),
        Reply::Stalled(prefix) => {
            let chunks = stream::once(async move { Ok::<_, Infallible>(Bytes::from(prefix)) }).chain(stream::pending());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(chunks),
            )
                .into_response()
        }
        Reply::Status(status, body) => (status, body).into_response(),
    }
}
