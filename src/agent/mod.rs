use std::pin::Pin;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use rig::agent::MultiTurnStreamItem;
use rig::message::Message as RigMessage;
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::{StreamedAssistantContent, StreamingChat};
use tracing::{debug, error};

use crate::config::{Config, SamplingParams};
use crate::errors::AppError;
use crate::models::{ChatMessage, MessageRole};

#[cfg(test)]
pub mod testing;

/// Incremental text fragments from the completion provider, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// A streaming chat-completion backend.
///
/// `stream` is lazy: no upstream work happens until the returned stream is
/// polled, and dropping it abandons the upstream call.
pub trait ChatBackend: Send + Sync {
    fn stream(&self, messages: Vec<ChatMessage>) -> TokenStream;
}

/// Splits the relay message list into what a rig agent expects: system turns
/// folded into the preamble, the trailing turn as the prompt, everything else
/// as chat history.
fn to_rig_request(messages: &[ChatMessage]) -> Option<(Option<String>, Vec<RigMessage>, RigMessage)> {
    let (last, earlier) = messages.split_last()?;

    let mut system_parts = Vec::new();
    let mut history = Vec::with_capacity(earlier.len());
    for m in earlier {
        match m.known_role() {
            Some(MessageRole::System) => system_parts.push(m.content.as_str()),
            Some(MessageRole::Assistant) => history.push(RigMessage::assistant(&m.content)),
            Some(MessageRole::User) => history.push(RigMessage::user(&m.content)),
            None => {
                debug!(role = %m.role, "forwarding unrecognised role as a user turn");
                history.push(RigMessage::user(&m.content));
            }
        }
    }

    let preamble = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    Some((preamble, history, RigMessage::user(&last.content)))
}

fn classify_error(message: String, base_url: &str) -> AppError {
    let lowered = message.to_lowercase();
    if lowered.contains("connection refused") || lowered.contains("error sending request") {
        AppError::UpstreamUnavailable { host: base_url.to_string() }
    } else {
        AppError::Inference { message }
    }
}

/// Streams chat completions from an OpenAI-compatible `/chat/completions`
/// endpoint through a rig agent. One client is built at startup and shared by every request; a fresh agent
/// is built per request so the sampling settings and preamble travel with it.
#[derive(Clone)]
pub struct OpenAiAgentService {
    client: openai::CompletionsClient,
    base_url: String,
    model: String,
    sampling: SamplingParams,
}

impl OpenAiAgentService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = openai::Client::builder()
            .api_key(config.api_key.as_str())
            .base_url(&config.base_url)
            .build()
            .map_err(|e| AppError::InvalidConfig {
                name: "OPENAI_BASE_URL".to_string(),
                message: e.to_string(),
            })?
            .completions_api();
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            sampling: config.sampling,
        })
    }
}

impl ChatBackend for OpenAiAgentService {
    fn stream(&self, messages: Vec<ChatMessage>) -> TokenStream {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let model = self.model.clone();
        let sampling = self.sampling;

        Box::pin(stream! {
            let Some((preamble, history, prompt)) = to_rig_request(&messages) else {
                yield Err(AppError::inference("no messages to send"));
                return;
            };

            let mut builder = client
                .agent(&model)
                .temperature(sampling.temperature)
                .max_tokens(sampling.max_tokens);
            if let Some(preamble) = &preamble {
                builder = builder.preamble(preamble);
            }
            let agent = builder.build();

            let mut upstream = agent.stream_chat(prompt, history).await;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(text))) => {
                        yield Ok(text.text);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(model = %model, "upstream completion failed: {e}");
                        yield Err(classify_error(e.to_string(), &base_url));
                        break;
                    }
                }
            }
        })
    }
}
