//! Test doubles: an in-memory `ChatBackend` and a one-shot local HTTP
//! server standing in for the completion provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::{ChatBackend, TokenStream};
use crate::errors::AppError;
use crate::models::ChatMessage;

#[derive(Debug, Clone)]
pub enum Step {
    Token(&'static str),
    Fail(&'static str),
}

/// Replays a fixed script of tokens and records every message list it is
/// asked to complete.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Vec<Step>,
    hang_after_script: bool,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn tokens(tokens: &[&'static str]) -> Self {
        Self::new(tokens.iter().map(|t| Step::Token(*t)).collect())
    }

    pub fn new(script: Vec<Step>) -> Self {
        Self { script, ..Self::default() }
    }

    /// Never ends after the script is exhausted, like a provider that stalls.
    pub fn hanging(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether a stream handed out by this backend has been dropped.
    pub fn upstream_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ChatBackend for ScriptedBackend {
    fn stream(&self, messages: Vec<ChatMessage>) -> TokenStream {
        self.calls.lock().unwrap().push(messages);

        let items: Vec<Result<String, AppError>> = self
            .script
            .iter()
            .map(|step| match step {
                Step::Token(text) => Ok(text.to_string()),
                Step::Fail(message) => Err(AppError::inference(*message)),
            })
            .collect();

        let flag = DropFlag(Arc::clone(&self.dropped));
        let scripted = stream::iter(items).inspect(move |_| {
            let _ = &flag;
        });

        if self.hang_after_script {
            Box::pin(scripted.chain(stream::pending()))
        } else {
            Box::pin(scripted)
        }
    }
}

// ── Local provider ────────────────────────────────────────────────────────────

/// One HTTP request as the provider received it.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub body: serde_json::Value,
}

/// Serves exactly one HTTP exchange on a loopback port, replying with
/// `status` and `body`, and hands back what the client sent.
pub struct LocalProvider {
    pub base_url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl LocalProvider {
    /// Replies `200` with an event stream of `chat.completion.chunk` frames,
    /// one per delta, followed by `[DONE]`.
    pub async fn streaming(deltas: &[&str]) -> Self {
        let mut body = String::new();
        for (i, delta) in deltas.iter().enumerate() {
            let chunk = serde_json::json!({
                "id": "chatcmpl-local",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000 + i,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "delta": { "role": "assistant", "content": delta },
                    "finish_reason": null
                }]
            });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        let last = serde_json::json!({
            "id": "chatcmpl-local",
            "object": "chat.completion.chunk",
            "created": 1_700_000_100,
            "model": "gpt-4o-mini",
            "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }]
        });
        body.push_str(&format!("data: {last}\n\n"));
        body.push_str("data: [DONE]\n\n");
        Self::start("200 OK", "text/event-stream", body).await
    }

    /// Replies with a provider-side error.
    pub async fn failing(status: &str, message: &str) -> Self {
        let body = serde_json::json!({
            "error": { "message": message, "type": "invalid_request_error" }
        });
        Self::start(status, "application/json", body.to_string()).await
    }

    async fn start(status: &str, content_type: &str, body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            captured
        });

        Self { base_url: format!("http://{addr}/v1"), handle }
    }

    pub async fn request(self) -> CapturedRequest {
        self.handle.await.unwrap()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let body = serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap();

    CapturedRequest { method, path, body }
}
