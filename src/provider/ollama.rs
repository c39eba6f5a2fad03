//! Adapter for a local Ollama daemon.
//!
//! Chat uses `/api/chat` (NDJSON when streaming), embeddings `/api/embed`,
//! vision the chat endpoint with a base64 `images` array. The daemon's
//! diagnostics ("model 'x' not found, try pulling it first") are preserved
//! verbatim inside the returned error.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use super::{build_http_client, ChatProvider, EmbeddingProvider, ProviderMeta, VisionProvider};
use crate::capability::Capability;
use crate::types::{
    CallOptions, ChatOutcome, ImageSource, Message, MessageContent, StreamEvent, UsageInfo,
    VisionOutcome,
};
use crate::{BoxStream, Error, Result};

const NAME: &str = "ollama";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    available: AtomicBool,
    chat_model: String,
    embed_model: String,
    vision_model: String,
}

impl OllamaProvider {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| Error::configuration(format!("invalid ollama base url: {}", e)))?;
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            available: AtomicBool::new(true),
            chat_model: "llama3.1".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            vision_model: "llava".to_string(),
        })
    }

    pub fn with_models(
        mut self,
        chat: impl Into<String>,
        embed: impl Into<String>,
        vision: impl Into<String>,
    ) -> Self {
        self.chat_model = chat.into();
        self.embed_model = embed.into();
        self.vision_model = vision.into();
        self
    }

    /// Ping the daemon and update the availability flag.
    pub async fn probe(&self) -> bool {
        let up = match self.client.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(provider = NAME, error = %e, "ollama probe failed");
                false
            }
        };
        self.available.store(up, Ordering::Relaxed);
        up
    }

    /// Force the availability flag (composition-time override, tests).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn chat_body(messages: &[Message], model: &str, options: &CallOptions, stream: bool) -> Value {
        let msgs: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": model,
            "messages": msgs,
            "stream": stream,
        });
        let mut opts = serde_json::Map::new();
        if let Some(t) = options.temperature {
            opts.insert("temperature".into(), json!(t));
        }
        if let Some(mt) = options.max_tokens {
            opts.insert("num_predict".into(), json!(mt));
        }
        if !opts.is_empty() {
            body["options"] = Value::Object(opts);
        }
        if let Some(Value::Object(extra)) = &options.extra {
            for (k, v) in extra {
                body[k] = v.clone();
            }
        }
        body
    }

    async fn post_json(&self, path: &str, body: &Value, operation: &'static str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            debug!(provider = NAME, %status, body = %detail, "ollama error response");
            return Err(Error::provider_failure(
                NAME,
                operation,
                anyhow::anyhow!("HTTP {}: {}", status, daemon_error(&detail)),
            ));
        }
        Ok(resp.json().await?)
    }
}

/// Translate a unified message into Ollama's wire shape: text content plus an
/// `images` array of bare base64 payloads.
fn wire_message(m: &Message) -> Value {
    let role = serde_json::to_value(m.role).unwrap_or_else(|_| json!("user"));
    match &m.content {
        MessageContent::Text(s) => json!({ "role": role, "content": s }),
        MessageContent::Blocks(_) => {
            let images: Vec<&str> = match &m.content {
                MessageContent::Blocks(bs) => bs
                    .iter()
                    .filter_map(|b| match b {
                        crate::types::ContentBlock::Image { source } => Some(source.data.as_str()),
                        _ => None,
                    })
                    .collect(),
                _ => vec![],
            };
            let mut obj = json!({ "role": role, "content": m.text() });
            if !images.is_empty() {
                obj["images"] = json!(images);
            }
            obj
        }
    }
}

/// Pull the daemon's `error` field out of a response body, falling back to
/// the raw text.
fn daemon_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

fn usage_from(v: &Value) -> Option<UsageInfo> {
    let prompt = v.get("prompt_eval_count").and_then(|n| n.as_u64());
    let completion = v.get("eval_count").and_then(|n| n.as_u64());
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    let prompt = prompt.unwrap_or(0);
    let completion = completion.unwrap_or(0);
    Some(UsageInfo {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    })
}

/// Map one NDJSON frame to stream events. The `done: true` frame yields
/// metadata followed by the terminal event.
fn frame_events(v: &Value) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    if let Some(content) = v.pointer("/message/content").and_then(|c| c.as_str()) {
        if !content.is_empty() {
            out.push(StreamEvent::ContentDelta {
                content: content.to_string(),
            });
        }
    }
    if v.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        out.push(StreamEvent::Metadata {
            usage: usage_from(v),
            finish_reason: v
                .get("done_reason")
                .and_then(|r| r.as_str())
                .map(String::from),
        });
        out.push(StreamEvent::StreamEnd {
            finish_reason: v
                .get("done_reason")
                .and_then(|r| r.as_str())
                .map(String::from),
        });
    }
    out
}

/// Decode an NDJSON byte stream into stream events, one JSON object per line.
fn decode_ndjson(input: BoxStream<'static, bytes::Bytes>) -> BoxStream<'static, StreamEvent> {
    let frames = stream::unfold(
        (input, String::new()),
        move |(mut input, mut buf)| async move {
            loop {
                if let Some(idx) = buf.find('\n') {
                    let line = buf[..idx].trim().to_string();
                    buf = buf[idx + 1..].to_string();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&line) {
                        Ok(v) => return Some((Ok(v), (input, buf))),
                        Err(e) => return Some((Err(Error::Serialization(e)), (input, buf))),
                    }
                }
                match input.next().await {
                    Some(Ok(bytes)) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        continue;
                    }
                    Some(Err(e)) => return Some((Err(e), (input, buf))),
                    None => {
                        let line = buf.trim();
                        if line.is_empty() {
                            return None;
                        }
                        match serde_json::from_str::<Value>(line) {
                            Ok(v) => return Some((Ok(v), (input, String::new()))),
                            Err(_) => return None,
                        }
                    }
                }
            }
        },
    );

    let events = frames.flat_map(|frame| match frame {
        Ok(v) => stream::iter(frame_events(&v).into_iter().map(Ok).collect::<Vec<_>>()),
        Err(e) => stream::iter(vec![Err(e)]),
    });
    Box::pin(events)
}

impl ProviderMeta for OllamaProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn default_model(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Chat => Some(&self.chat_model),
            Capability::Embedding => Some(&self.embed_model),
            Capability::Vision => Some(&self.vision_model),
            _ => None,
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: &CallOptions,
    ) -> Result<ChatOutcome> {
        let body = Self::chat_body(messages, model, options, false);
        let v = self.post_json("/api/chat", &body, "chat").await?;
        let content = v
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        Ok(ChatOutcome {
            content,
            provider: NAME.to_string(),
            model: model.to_string(),
            usage: usage_from(&v),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
        options: &CallOptions,
    ) -> Result<BoxStream<'static, StreamEvent>> {
        let body = Self::chat_body(messages, model, options, true);
        let url = format!("{}/api/chat", self.base_url);
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::provider_failure(
                NAME,
                "chat_stream",
                anyhow::anyhow!("HTTP {}: {}", status, daemon_error(&detail)),
            ));
        }
        let bytes = resp.bytes_stream().map_err(Error::Transport);
        Ok(decode_ndjson(Box::pin(bytes)))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let body = json!({ "model": model, "input": texts });
        let v = self.post_json("/api/embed", &body, "embed").await?;
        let embeddings = v
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::provider_failure(
                    NAME,
                    "embed",
                    anyhow::anyhow!("response missing 'embeddings' array"),
                )
            })?;
        embeddings
            .iter()
            .map(|row| {
                serde_json::from_value::<Vec<f32>>(row.clone()).map_err(Error::Serialization)
            })
            .collect()
    }
}

#[async_trait]
impl VisionProvider for OllamaProvider {
    async fn analyze_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        model: &str,
    ) -> Result<VisionOutcome> {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [image.data],
            }],
            "stream": false,
        });
        let v = self.post_json("/api/chat", &body, "analyze_image").await?;
        let content = v
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        Ok(VisionOutcome {
            content,
            provider: NAME.to_string(),
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_wire_message_carries_images() {
        let m = Message::with_content(
            crate::types::MessageRole::User,
            MessageContent::blocks(vec![
                crate::types::ContentBlock::text("describe"),
                crate::types::ContentBlock::image_base64("QUJD".into(), None),
            ]),
        );
        let v = wire_message(&m);
        assert_eq!(v["content"], "describe");
        assert_eq!(v["images"][0], "QUJD");
    }

    #[test]
    fn test_daemon_error_extraction() {
        assert_eq!(
            daemon_error(r#"{"error":"model 'x' not found, try pulling it first"}"#),
            "model 'x' not found, try pulling it first"
        );
        assert_eq!(daemon_error("plain text"), "plain text");
    }

    #[test]
    fn test_done_frame_yields_metadata_and_end() {
        let v: Value = serde_json::from_str(
            r#"{"message":{"content":"!"},"done":true,"done_reason":"stop","prompt_eval_count":3,"eval_count":7}"#,
        )
        .unwrap();
        let events = frame_events(&v);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::ContentDelta { content } if content == "!"));
        match &events[1] {
            StreamEvent::Metadata { usage, .. } => {
                assert_eq!(usage.unwrap().total_tokens, 10);
            }
            other => panic!("expected metadata, got {:?}", other),
        }
        assert!(matches!(&events[2], StreamEvent::StreamEnd { .. }));
    }

    #[tokio::test]
    async fn test_decode_ndjson_split_across_chunks() {
        // One frame split across two byte chunks, then a done frame.
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"conte")),
            Ok(Bytes::from_static(
                b"nt\":\"hi\"},\"done\":false}\n{\"message\":{\"content\":\"\"},\"done\":true}\n",
            )),
        ];
        let input: BoxStream<'static, Bytes> = Box::pin(stream::iter(chunks));
        let events: Vec<_> = decode_ndjson(input)
            .map(|e| e.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert!(matches!(&events[0], StreamEvent::ContentDelta { content } if content == "hi"));
        assert!(matches!(events.last(), Some(StreamEvent::StreamEnd { .. })));
    }
}
