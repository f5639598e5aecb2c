//! OpenAI Chat Completions provider with server-sent-event streaming.
//!
//! The request carries the persona's `temperature` and `logit_bias`. The
//! connection attempt is retried with exponential backoff on rate limiting,
//! server errors and transport failures; once the response headers arrive
//! the body is decoded on a background task and pushed into a bounded
//! channel as [`StreamChunk`]s.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::chat::cancel::{self, CancelSignal};
use crate::chat::message::{ChatMessage, ChatSettings};
use crate::llms::streaming::{
    ChannelStreamReceiver, StreamChunk, StreamReceiver, StreamUsage, StreamingChat,
};
use crate::utilities::config::{OpenAIConfig, DEFAULT_OPENAI_BASE_URL};
use crate::utilities::errors::BackendError;

/// Capacity of the chunk channel between the body reader and the consumer.
const STREAM_BUFFER: usize = 64;

/// Streaming chat client for the OpenAI Chat Completions API (and
/// compatible servers).
#[derive(Clone)]
pub struct OpenAIChatCompletion {
    model: String,
    api_key: String,
    base_url: String,
    max_retries: u32,
    initial_backoff: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAIChatCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIChatCompletion")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAIChatCompletion {
    /// Create a client for `model` against the public endpoint.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, BackendError> {
        Self::build(model.into(), api_key.into(), Duration::from_secs(120))
    }

    pub fn from_config(config: &OpenAIConfig) -> Result<Self, BackendError> {
        let client = Self::build(
            config.model.clone(),
            config.key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(client
            .with_base_url(config.base_url.clone())
            .with_max_retries(config.max_retries))
    }

    fn build(model: String, api_key: String, timeout: Duration) -> Result<Self, BackendError> {
        if api_key.trim().is_empty() {
            return Err(BackendError::MissingApiKey { model });
        }
        // Only the connection is time-limited; a reply may stream for longer.
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            model,
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the first retry; doubled after each further attempt.
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for a streaming Chat Completions call.
    pub fn build_request_body(&self, messages: &[ChatMessage], settings: &ChatSettings) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": settings.temperature,
            "stream": true,
        });

        if !settings.logit_biases.is_empty() {
            let bias: serde_json::Map<String, Value> = settings
                .logit_biases
                .iter()
                .map(|(token, bias)| (token.to_string(), json!(bias)))
                .collect();
            body["logit_bias"] = Value::Object(bias);
        }

        body
    }

    /// Send the request, retrying transient failures with exponential backoff.
    async fn open_stream(&self, body: &Value) -> Result<reqwest::Response, BackendError> {
        let endpoint = self.endpoint();
        let mut last_error = String::new();
        let mut retry_delay = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!(
                    "OpenAI API retry attempt {} after {:?}: {}",
                    attempt,
                    retry_delay,
                    last_error
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match self
                .client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = "Rate limited by OpenAI API (429)".to_string();
                continue;
            }

            if status.is_server_error() {
                last_error = format!("OpenAI API server error: {}", status);
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response);
        }

        Err(BackendError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl StreamingChat for OpenAIChatCompletion {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        settings: &ChatSettings,
        cancel: Option<CancelSignal>,
    ) -> Result<Box<dyn StreamReceiver>, BackendError> {
        log::debug!(
            "OpenAIChatCompletion.stream: model={}, messages={}, biases={}",
            self.model,
            messages.len(),
            settings.logit_biases.len(),
        );

        let body = self.build_request_body(&messages, settings);
        let response = self.open_stream(&body).await?;

        let (tx, rx) = ChannelStreamReceiver::pair(STREAM_BUFFER);
        tokio::spawn(pump(Box::pin(response.bytes_stream()), tx, cancel));
        Ok(Box::new(rx))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// SSE decoding
// ---------------------------------------------------------------------------

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq)]
enum SseFrame {
    Delta(String),
    Finished,
    Usage(StreamUsage),
    Done,
    Skip,
}

/// Splits a byte stream into complete `data:` payloads. Partial lines (and
/// partial UTF-8 sequences) are held until their newline arrives.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }

    /// Payload of a final line the body closed without terminating.
    fn finish(&mut self) -> Vec<String> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.buffer.push(b'\n');
        self.push(&[])
    }
}

fn parse_frame(data: &str) -> Result<SseFrame, BackendError> {
    if data == "[DONE]" {
        return Ok(SseFrame::Done);
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| BackendError::Stream(format!("malformed event: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(BackendError::Stream(message.to_string()));
    }

    let choice = value.get("choices").and_then(|c| c.get(0));
    if let Some(choice) = choice {
        let content = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if !content.is_empty() {
            return Ok(SseFrame::Delta(content.to_string()));
        }
        if choice.get("finish_reason").is_some_and(|r| !r.is_null()) {
            return Ok(SseFrame::Finished);
        }
    }

    if let Some(usage) = value.get("usage").filter(|u| !u.is_null()) {
        let field = |name: &str| usage.get(name).and_then(Value::as_i64).unwrap_or(0);
        return Ok(SseFrame::Usage(StreamUsage {
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            total_tokens: field("total_tokens"),
        }));
    }

    Ok(SseFrame::Skip)
}

/// Read the response body, forwarding chunks until `[DONE]`, an error,
/// cancellation, or the consumer going away.
async fn pump<S>(
    mut body: S,
    tx: tokio::sync::mpsc::Sender<StreamChunk>,
    cancel: Option<CancelSignal>,
) where
    S: futures::Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut decoder = SseDecoder::default();
    let mut usage = None;
    let mut finished = false;

    loop {
        let next = tokio::select! {
            _ = cancel::cancelled(cancel.as_ref()) => {
                log::debug!("OpenAI stream cancelled");
                return;
            }
            next = body.next() => next,
        };

        let (payloads, ended) = match next {
            Some(Ok(bytes)) => (decoder.push(&bytes), false),
            Some(Err(e)) => {
                let _ = tx.send(StreamChunk::Error { message: e.to_string() }).await;
                return;
            }
            None => (decoder.finish(), true),
        };

        for data in payloads {
            let chunk = match parse_frame(&data) {
                Ok(SseFrame::Delta(text)) => StreamChunk::TextDelta { text },
                Ok(SseFrame::Finished) => {
                    finished = true;
                    continue;
                }
                Ok(SseFrame::Usage(u)) => {
                    usage = Some(u);
                    continue;
                }
                Ok(SseFrame::Skip) => continue,
                Ok(SseFrame::Done) => {
                    let _ = tx.send(StreamChunk::Done { usage: usage.take() }).await;
                    return;
                }
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error { message: e.to_string() }).await;
                    return;
                }
            };
            log::trace!("OpenAI stream chunk: {:?}", chunk);
            if tx.send(chunk).await.is_err() {
                return;
            }
        }
        if ended {
            break;
        }
    }

    let last = if finished {
        StreamChunk::Done { usage }
    } else {
        StreamChunk::Error {
            message: "connection closed before the stream completed".to_string(),
        }
    };
    let _ = tx.send(last).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylometry::LogitBias;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> OpenAIChatCompletion {
        OpenAIChatCompletion::new("gpt-4o-mini", "sk-test").unwrap()
    }

    #[test]
    fn test_missing_api_key() {
        let err = OpenAIChatCompletion::new("gpt-4o-mini", "  ").unwrap_err();
        assert!(matches!(err, BackendError::MissingApiKey { .. }));
    }

    #[test]
    fn test_request_body_shape() {
        let settings = ChatSettings::with_biases(
            0.5,
            &[LogitBias::new(13, 10), LogitBias::new(0, -3)],
        );
        let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant("")];
        let body = client().build_request_body(&messages, &settings);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "");
        assert_eq!(body["logit_bias"]["13"], 10);
        assert_eq!(body["logit_bias"]["0"], -3);
    }

    #[test]
    fn test_request_body_without_bias() {
        let body = client().build_request_body(&[ChatMessage::user("hi")], &ChatSettings::new(0.0));
        assert!(body.get("logit_bias").is_none());
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let c = client().with_base_url("http://localhost:8080/v1/");
        assert_eq!(c.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let payloads = decoder.push(b":1}\r\n\r\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn test_decoder_flushes_unterminated_last_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec!["[DONE]".to_string()]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_decoder_handles_split_utf8() {
        let mut decoder = SseDecoder::default();
        let line = "data: caf\u{e9}\n".as_bytes();
        let (head, tail) = line.split_at(line.len() - 2);
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["caf\u{e9}".to_string()]);
    }

    #[test]
    fn test_parse_frames() {
        let delta = r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_frame(delta).unwrap(), SseFrame::Delta("Hel".into()));

        let role = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert_eq!(parse_frame(role).unwrap(), SseFrame::Skip);

        let stop = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_frame(stop).unwrap(), SseFrame::Finished);

        let usage = r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;
        assert!(matches!(parse_frame(usage).unwrap(), SseFrame::Usage(u) if u.total_tokens == 5));

        assert_eq!(parse_frame("[DONE]").unwrap(), SseFrame::Done);

        let error = r#"{"error":{"message":"overloaded"}}"#;
        assert!(matches!(parse_frame(error), Err(BackendError::Stream(m)) if m == "overloaded"));
        assert!(parse_frame("{oops").is_err());
    }

    /// Serve one canned HTTP response per accepted connection, in order.
    async fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        format!("http://{}/v1", addr)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= split + 4 + length {
                    return;
                }
            }
        }
    }

    fn sse_response(events: &[&str]) -> String {
        let body: String = events.iter().map(|e| format!("data: {}\n\n", e)).collect();
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{}",
            body
        )
    }

    fn status_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    async fn collect(rx: &mut Box<dyn StreamReceiver>) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.next().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn test_stream_end_to_end() {
        let base = serve(vec![sse_response(&[
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ])])
        .await;

        let provider = client().with_base_url(base);
        let mut rx = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .unwrap();

        let chunks = collect(&mut rx).await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta { text: "Hel".into() },
                StreamChunk::TextDelta { text: "lo".into() },
                StreamChunk::Done { usage: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let base = serve(vec![
            status_response("503 Service Unavailable", "busy"),
            sse_response(&[
                r#"{"choices":[{"delta":{"content":"ok"},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ]),
        ])
        .await;

        let provider = client()
            .with_base_url(base)
            .with_initial_backoff(Duration::from_millis(10));
        let mut rx = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .unwrap();
        let chunks = collect(&mut rx).await;
        assert_eq!(chunks[0], StreamChunk::TextDelta { text: "ok".into() });
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let base = serve(vec![status_response("401 Unauthorized", "bad key")]).await;
        let provider = client()
            .with_base_url(base)
            .with_initial_backoff(Duration::from_millis(10));
        let err = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Status { status: 401, ref body } if body == "bad key"));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let base = serve(vec![
            status_response("429 Too Many Requests", ""),
            status_response("429 Too Many Requests", ""),
        ])
        .await;
        let provider = client()
            .with_base_url(base)
            .with_max_retries(1)
            .with_initial_backoff(Duration::from_millis(10));
        let err = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::RetriesExhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_an_error() {
        let base = serve(vec![sse_response(&[
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        ])])
        .await;
        let provider = client().with_base_url(base);
        let mut rx = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .unwrap();
        let chunks = collect(&mut rx).await;
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], StreamChunk::Error { .. }));
    }

    #[tokio::test]
    async fn test_done_without_trailing_newline_completes() {
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\ndata: {}\n\ndata: [DONE]",
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#
        );
        let base = serve(vec![response]).await;
        let provider = client().with_base_url(base);
        let mut rx = provider
            .stream(vec![ChatMessage::user("hi")], &ChatSettings::new(0.0), None)
            .await
            .unwrap();
        let chunks = collect(&mut rx).await;
        assert_eq!(
            chunks,
            vec![
                StreamChunk::TextDelta { text: "Hel".into() },
                StreamChunk::Done { usage: None },
            ]
        );
    }
}
