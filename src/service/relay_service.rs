use std::sync::Arc;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::agent::ChatBackend;
use crate::models::{ChatRequest, RelayEvent};

/// Turns one chat request into a stream of relay events.
///
/// The event stream is the whole request lifecycle: it opens the upstream
/// stream only once polled past `start`, forwards tokens one at a time, and
/// ends right after the single terminal event. Dropping it mid-way drops the
/// upstream stream along with it.
#[derive(Clone)]
pub struct RelayService {
    backend: Arc<dyn ChatBackend>,
}

impl RelayService {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn relay(&self, body: &[u8]) -> impl Stream<Item = RelayEvent> + Send + 'static {
        let parsed = ChatRequest::parse(body);
        let backend = Arc::clone(&self.backend);

        stream! {
            let request = match parsed {
                Ok(request) => request,
                Err(e) => {
                    warn!(validation = e.is_validation(), "rejected chat request: {e}");
                    yield RelayEvent::error(e.to_string());
                    return;
                }
            };

            let messages = request.into_messages();
            info!(history_len = messages.len() - 1, "relaying chat request");

            let mut guard = DisconnectGuard::default();
            yield RelayEvent::start();

            let mut tokens = backend.stream(messages);
            let mut full_response = String::new();
            while let Some(token) = tokens.next().await {
                match token {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => {
                        full_response.push_str(&text);
                        yield RelayEvent::content(text);
                    }
                    Err(e) => {
                        error!(upstream = e.is_upstream(), "chat relay failed mid-stream: {e}");
                        guard.finished = true;
                        yield RelayEvent::error(e.to_string());
                        return;
                    }
                }
            }

            debug!(chars = full_response.chars().count(), "upstream stream finished");
            guard.finished = true;
            yield RelayEvent::done(full_response);
        }
    }
}

/// Logs when the event stream is dropped between `start` and its terminal
/// event, i.e. the client went away mid-response.
#[derive(Default)]
struct DisconnectGuard {
    finished: bool,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            info!("client disconnected before the response completed; upstream stream released");
        }
    }
}
