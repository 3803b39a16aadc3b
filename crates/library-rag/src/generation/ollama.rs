//! Ollama HTTP client for embeddings and streaming chat, with retry logic

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::llm::{ChatMessage, TextStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Base URL, without trailing slash
    base_url: String,
    /// Maximum retries
    max_retries: u32,
    /// Whole-request limit for non-streaming calls
    request_timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    ///
    /// The client itself only bounds connecting and the gap between reads, so
    /// a chat stream may run as long as fragments keep arriving. Non-streaming
    /// calls add `timeout_secs` as a whole-request limit.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .read_timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            request_timeout: timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed (attempt {}/{}): {}; retrying in {:?}",
                            attempt + 1,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("Retry loop ran zero attempts")))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).timeout(self.request_timeout).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts in one request; output order follows input order
    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let url = url.as_str();
        let client = &self.client;
        let timeout = self.request_timeout;

        self.retry_request(move || async move {
            let request = EmbedRequest { model, input: texts };

            let response = client
                .post(url)
                .timeout(timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::embedding(format!(
                    "Embedding failed: HTTP {} - {}",
                    status, body
                )));
            }

            let embed_response: EmbedResponse = response
                .json()
                .await
                .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

            Ok(embed_response.embeddings)
        })
        .await
    }

    /// Start a streaming chat completion.
    ///
    /// Only establishing the stream is retried; once fragments flow, a broken
    /// stream surfaces as an error item.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<TextStream> {
        let url = format!("{}/api/chat", self.base_url);
        let url = url.as_str();
        let client = &self.client;

        tracing::info!("Generating answer with model: {}", model);

        let response = self
            .retry_request(move || async move {
                let request = ChatRequest {
                    model,
                    messages,
                    stream: true,
                    options: ChatOptions { temperature },
                };

                let response = client
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::completion(format!("Chat request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::completion(format!(
                        "Chat failed: HTTP {} - {}",
                        status, body
                    )));
                }

                Ok(response)
            })
            .await?;

        Ok(decode_chat_stream(response.bytes_stream()))
    }
}

/// One NDJSON line of an Ollama `/api/chat` stream
#[derive(Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<ChatStreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatStreamMessage {
    #[serde(default)]
    content: String,
}

/// Splits a byte stream into NDJSON lines, tolerating lines cut across network chunks
#[derive(Default)]
pub(crate) struct ChatStreamDecoder {
    buffer: BytesMut,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl ChatStreamDecoder {
    /// Feed raw bytes; complete lines become pending fragments
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        if self.finished {
            return;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            self.handle_line(&line[..pos]);
            if self.finished {
                break;
            }
        }
    }

    /// Input ended; a trailing unterminated line is still decoded
    pub(crate) fn finish(&mut self) {
        if self.finished {
            return;
        }
        let rest = self.buffer.split();
        self.handle_line(&rest);
        if !self.finished {
            self.pending
                .push_back(Err(Error::completion("Answer stream ended before completion")));
            self.finished = true;
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<ChatStreamLine>(line) {
            Ok(parsed) => {
                if let Some(error) = parsed.error {
                    self.pending.push_back(Err(Error::completion(error)));
                    self.finished = true;
                    return;
                }
                if let Some(message) = parsed.message {
                    if !message.content.is_empty() {
                        self.pending.push_back(Ok(message.content));
                    }
                }
                if parsed.done {
                    self.finished = true;
                }
            }
            Err(e) => {
                self.pending
                    .push_back(Err(Error::completion(format!("Malformed stream line: {}", e))));
                self.finished = true;
            }
        }
    }

    pub(crate) fn next_pending(&mut self) -> Option<Result<String>> {
        self.pending.pop_front()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Turn a raw `/api/chat` body into a stream of text fragments
pub(crate) fn decode_chat_stream<S>(bytes: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = (Box::pin(bytes), ChatStreamDecoder::default());

    futures_util::stream::unfold(state, |(mut bytes, mut decoder)| async move {
        loop {
            if let Some(item) = decoder.next_pending() {
                return Some((item, (bytes, decoder)));
            }
            if decoder.is_finished() {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => decoder.feed(&chunk),
                Some(Err(e)) => {
                    decoder.finished = true;
                    return Some((
                        Err(Error::completion(format!("Stream error: {}", e))),
                        (bytes, decoder),
                    ));
                }
                None => decoder.finish(),
            }
        }
    })
    .boxed()
}
