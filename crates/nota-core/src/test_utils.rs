//! Test utilities for nota-core
//!
//! A mock HTTP server that plays both external parties of the pipeline: the
//! tax authority page that serves receipt HTML, and an OpenAI-compatible chat
//! completions endpoint with canned answers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Extraction answer matching the two-item "Food" receipt used across tests
pub const RECEIPT_JSON: &str = r#"{"Dados Nota":{"CNPJ":"11.111.111/0001-11","Número":"42","Série":"1","Emissão":"2024-01-01","Horário":"12:00:00"},"Produtos":[{"Id":"1","Text":"item1","Category":"Food","Traits":{"Quantidade":"1","Unidade":"UN","Valor Unitário":"5.00","Valor Total":"5.00"}},{"Id":"2","Text":"item2","Category":"Food","Traits":{"Quantidade":"1","Unidade":"UN","Valor Unitário":"10.00","Valor Total":"10.00"}}]}"#;

/// Advisory answer returned by default
pub const ADVISORY_TEXT: &str =
    "1. Comparação de valores: item2 é o mais caro.\n2. Sem variações.\n3. Compre no atacado.";

/// How long the slow page waits before answering
pub const SLOW_PAGE_DELAY: Duration = Duration::from_secs(5);

/// Canned model answers
#[derive(Debug, Clone)]
pub struct MockAnswers {
    pub extraction: String,
    pub advisory: String,
}

impl Default for MockAnswers {
    fn default() -> Self {
        Self {
            extraction: RECEIPT_JSON.to_string(),
            advisory: ADVISORY_TEXT.to_string(),
        }
    }
}

struct ServerState {
    answers: MockAnswers,
    chat_requests: Mutex<Vec<Value>>,
}

/// Mock receipt + model server for testing and development
pub struct MockReceiptServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Arc<ServerState>,
}

impl MockReceiptServer {
    /// Start the mock server on an available port with default answers
    pub async fn start() -> Self {
        Self::start_with(MockAnswers::default()).await
    }

    /// Start the mock server with custom model answers
    pub async fn start_with(answers: MockAnswers) -> Self {
        let state = Arc::new(ServerState {
            answers,
            chat_requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/nfce/:key", get(handle_receipt_page))
            .route("/missing", get(handle_missing))
            .route("/empty", get(handle_empty))
            .route("/slow", get(handle_slow))
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a receipt page that serves HTML
    pub fn receipt_url(&self, key: &str) -> String {
        format!("{}/nfce/{}", self.url(), key)
    }

    /// URL answering 404
    pub fn missing_url(&self) -> String {
        format!("{}/missing", self.url())
    }

    /// URL answering 200 with a blank body
    pub fn empty_url(&self) -> String {
        format!("{}/empty", self.url())
    }

    /// URL that answers after `SLOW_PAGE_DELAY`
    pub fn slow_url(&self) -> String {
        format!("{}/slow", self.url())
    }

    /// Bodies of every chat completion request received so far
    pub fn chat_requests(&self) -> Vec<Value> {
        self.state
            .chat_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockReceiptServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Minimal NFC-e consultation page
async fn handle_receipt_page(Path(key): Path<String>) -> Html<String> {
    Html(format!(
        "<html><body><div id=\"chave\">{}</div>\
         <table><tr><td>item1</td><td>5,00</td></tr>\
         <tr><td>item2</td><td>10,00</td></tr></table></body></html>",
        key
    ))
}

async fn handle_missing() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

async fn handle_empty() -> &'static str {
    "  \n  "
}

async fn handle_slow() -> Html<&'static str> {
    tokio::time::sleep(SLOW_PAGE_DELAY).await;
    Html("<html>late</html>")
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "object": "list", "data": [{ "id": "gpt-4", "object": "model" }] }))
}

/// Chat completions endpoint
///
/// Requests carrying receipt HTML get the extraction answer, everything else
/// the advisory answer.
async fn handle_chat(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let is_extraction = request["messages"]
        .as_array()
        .map(|messages| {
            messages.iter().any(|m| {
                m["content"]
                    .as_str()
                    .is_some_and(|c| c.contains("HTML da Nota Fiscal"))
            })
        })
        .unwrap_or(false);

    let content = if is_extraction {
        state.answers.extraction.clone()
    } else {
        state.answers.advisory.clone()
    };

    if let Ok(mut requests) = state.chat_requests.lock() {
        requests.push(request.clone());
    }

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request["model"],
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}
