//! Ollama client: `POST /api/generate` with streaming enabled.
//!
//! The response body is newline-delimited JSON. Each line carries a
//! `response` fragment; the final line has `done: true`.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::config::OllamaConfig;
use crate::error::LlmError;

use super::{GenerationContext, ReplyGenerator, build_prompt};

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

struct DecodeState<S> {
    body: S,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> DecodeState<S> {
    /// Parse one line. Blank and malformed lines are skipped.
    fn take_line(&mut self, line: &[u8]) {
        if self.finished || line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(chunk) => {
                if !chunk.response.is_empty() {
                    self.pending.push_back(chunk.response);
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping malformed stream line"),
        }
    }

    fn take_complete_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.take_line(&line);
        }
    }
}

/// Decode an NDJSON byte stream into response fragments, lazily.
///
/// Lines may be split across chunks. The stream ends at the `done` line or
/// when the body ends; a transport error is yielded once and ends it.
pub fn decode_fragments<S, B, E>(body: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = DecodeState {
        body,
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buf.extend_from_slice(chunk.as_ref());
                    state.take_complete_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    let rest = std::mem::take(&mut state.buf);
                    state.take_line(&rest);
                    state.finished = true;
                }
            }
        }
    })
}

/// Generates replies with a local Ollama model.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: "ollama".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        tracing::info!(model = %config.model, base_url = %config.base_url, "Using Ollama");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ReplyGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        message: &str,
        context: &GenerationContext,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(message, context),
            "stream": true,
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "ollama".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: "ollama".into(),
                reason: format!("HTTP {status}"),
            });
        }

        let fragments = decode_fragments(Box::pin(resp.bytes_stream()));
        let mut fragments = std::pin::pin!(fragments);
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(|e| LlmError::InvalidResponse {
                provider: "ollama".into(),
                reason: e.to_string(),
            })?;
            text.push_str(&fragment);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "ollama".into(),
            });
        }
        Ok(text.to_string())
    }
}
