//! Adapter for any OpenAI-compatible endpoint.
//!
//! Covers hosted OpenAI as well as the many services speaking the same wire
//! format. Implements chat (SSE streaming), embeddings, vision via data-URL
//! content blocks, image generation, multipart speech-to-text, and
//! text-to-speech. This is a thin adapter, not an SDK: build request JSON,
//! execute, parse into the unified outcome.

use async_trait::async_trait;
use base64::Engine as _;
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    build_http_client, resolve_api_key, ChatProvider, EmbeddingProvider, ImageGenProvider,
    ProviderMeta, SpeechToTextProvider, TextToSpeechProvider, VisionProvider,
};
use crate::capability::Capability;
use crate::types::{
    CallOptions, ChatOutcome, ImageSource, MediaArtifact, MediaOutcome, Message, MessageContent,
    SpeechOutcome, StreamEvent, TranscriptOutcome, UsageInfo, VisionOutcome,
};
use crate::{BoxStream, Error, Result};

pub struct OpenAiCompatProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embed_model: String,
    vision_model: String,
    image_model: String,
    stt_model: String,
    tts_model: String,
}

impl OpenAiCompatProvider {
    /// A provider speaking the OpenAI wire format at `base_url`. The API key
    /// comes from the OS keyring (service "ai-hub", account = name), falling
    /// back to `<NAME>_API_KEY`.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let name = name.into().to_lowercase();
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| Error::configuration(format!("invalid base url for '{}': {}", name, e)))?;
        let api_key = resolve_api_key(&name);
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            name,
            chat_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    fn chat_body(messages: &[Message], model: &str, options: &CallOptions, stream: bool) -> Value {
        let msgs: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": model,
            "messages": msgs,
            "stream": stream,
        });
        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(mt) = options.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(Value::Object(extra)) = &options.extra {
            for (k, v) in extra {
                body[k] = v.clone();
            }
        }
        body
    }

    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            debug!(provider = %self.name, %status, body = %detail, "provider error response");
            return Err(Error::provider_failure(
                self.name.clone(),
                operation,
                anyhow::anyhow!("HTTP {}: {}", status, api_error(&detail)),
            ));
        }
        Ok(resp.json().await?)
    }
}

/// Translate a unified message into the OpenAI wire shape; image blocks
/// become `image_url` parts with a data URL.
fn wire_message(m: &Message) -> Value {
    let role = serde_json::to_value(m.role).unwrap_or_else(|_| json!("user"));
    match &m.content {
        MessageContent::Text(s) => json!({ "role": role, "content": s }),
        MessageContent::Blocks(blocks) => {
            let parts: Vec<Value> = blocks
                .iter()
                .map(|b| match b {
                    crate::types::ContentBlock::Text { text } => {
                        json!({ "type": "text", "text": text })
                    }
                    crate::types::ContentBlock::Image { source } => {
                        json!({ "type": "image_url", "image_url": { "url": data_url(source) } })
                    }
                })
                .collect();
            json!({ "role": role, "content": parts })
        }
    }
}

fn data_url(source: &ImageSource) -> String {
    if source.source_type == "url" {
        return source.data.clone();
    }
    format!(
        "data:{};base64,{}",
        source.media_type.as_deref().unwrap_or("image/png"),
        source.data
    )
}

/// Pull `error.message` out of an API error body, falling back to raw text.
fn api_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

fn usage_from(v: &Value) -> Option<UsageInfo> {
    v.get("usage").map(|u| UsageInfo {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
    })
}

/// Map one SSE payload to stream events.
fn sse_events(v: &Value) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    if let Some(content) = v.pointer("/choices/0/delta/content").and_then(|c| c.as_str()) {
        if !content.is_empty() {
            out.push(StreamEvent::ContentDelta {
                content: content.to_string(),
            });
        }
    }
    if let Some(usage) = usage_from(v) {
        out.push(StreamEvent::Metadata {
            usage: Some(usage),
            finish_reason: None,
        });
    }
    if let Some(reason) = v.pointer("/choices/0/finish_reason").and_then(|r| r.as_str()) {
        out.push(StreamEvent::StreamEnd {
            finish_reason: Some(reason.to_string()),
        });
    }
    out
}

/// Decode an SSE byte stream: frames split on blank lines, `data: ` prefix
/// stripped, `[DONE]` terminates.
fn decode_sse(input: BoxStream<'static, bytes::Bytes>) -> BoxStream<'static, StreamEvent> {
    let frames = stream::unfold(
        (input, String::new()),
        move |(mut input, mut buf)| async move {
            let parse = |raw: &str| -> Option<Value> {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with(':') {
                    return None;
                }
                let payload = trimmed.strip_prefix("data:").unwrap_or(trimmed).trim_start();
                serde_json::from_str(payload).ok()
            };
            let is_done =
                |raw: &str| -> bool { raw.trim().trim_start_matches("data:").trim() == "[DONE]" };

            loop {
                if let Some(idx) = buf.find("\n\n") {
                    let frame = buf[..idx].to_string();
                    buf = buf[idx + 2..].to_string();
                    if is_done(&frame) {
                        return None;
                    }
                    if let Some(v) = parse(&frame) {
                        return Some((Ok(v), (input, buf)));
                    }
                    continue;
                }
                match input.next().await {
                    Some(Ok(bytes)) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        continue;
                    }
                    Some(Err(e)) => return Some((Err(e), (input, buf))),
                    None => {
                        if is_done(&buf) {
                            return None;
                        }
                        if let Some(v) = parse(&buf) {
                            return Some((Ok(v), (input, String::new())));
                        }
                        return None;
                    }
                }
            }
        },
    );

    let events = frames.flat_map(|frame| match frame {
        Ok(v) => stream::iter(sse_events(&v).into_iter().map(Ok).collect::<Vec<_>>()),
        Err(e) => stream::iter(vec![Err(e)]),
    });
    Box::pin(events)
}

impl ProviderMeta for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        // Without credentials every call would fail authentication anyway.
        self.api_key.is_some()
    }

    fn default_model(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Chat => Some(&self.chat_model),
            Capability::Embedding => Some(&self.embed_model),
            Capability::Vision => Some(&self.vision_model),
            Capability::ImageGeneration => Some(&self.image_model),
            Capability::SpeechToText => Some(&self.stt_model),
            Capability::TextToSpeech => Some(&self.tts_model),
            _ => None,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: &CallOptions,
    ) -> Result<ChatOutcome> {
        let body = Self::chat_body(messages, model, options, false);
        let v = self
            .execute(self.request("/v1/chat/completions").json(&body), "chat")
            .await?;
        let content = v
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        Ok(ChatOutcome {
            content,
            provider: self.name.clone(),
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
        let resp = self
            .request("/v1/chat/completions")
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::provider_failure(
                self.name.clone(),
                "chat_stream",
                anyhow::anyhow!("HTTP {}: {}", status, api_error(&detail)),
            ));
        }
        let bytes = resp.bytes_stream().map_err(Error::Transport);
        Ok(decode_sse(Box::pin(bytes)))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let body = json!({ "model": model, "input": texts });
        let v = self
            .execute(self.request("/v1/embeddings").json(&body), "embed")
            .await?;
        let data = v.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
            Error::provider_failure(
                self.name.clone(),
                "embed",
                anyhow::anyhow!("response missing 'data' array"),
            )
        })?;
        // The API may return rows out of order; index field is authoritative.
        let mut rows: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
        for row in data {
            let index = row.get("index").and_then(|i| i.as_u64()).unwrap_or(rows.len() as u64);
            let vector: Vec<f32> = serde_json::from_value(
                row.get("embedding").cloned().unwrap_or(Value::Null),
            )?;
            rows.push((index as usize, vector));
        }
        rows.sort_by_key(|(i, _)| *i);
        Ok(rows.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl VisionProvider for OpenAiCompatProvider {
    async fn analyze_image(
        &self,
        image: &ImageSource,
        prompt: &str,
        model: &str,
    ) -> Result<VisionOutcome> {
        let messages = vec![Message::with_content(
            crate::types::MessageRole::User,
            MessageContent::blocks(vec![
                crate::types::ContentBlock::text(prompt),
                crate::types::ContentBlock::Image {
                    source: image.clone(),
                },
            ]),
        )];
        let body = Self::chat_body(&messages, model, &CallOptions::default(), false);
        let v = self
            .execute(
                self.request("/v1/chat/completions").json(&body),
                "analyze_image",
            )
            .await?;
        let content = v
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
        Ok(VisionOutcome {
            content,
            provider: self.name.clone(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ImageGenProvider for OpenAiCompatProvider {
    async fn generate_image(
        &self,
        prompt: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<MediaOutcome> {
        let mut body = json!({ "model": model, "prompt": prompt, "n": 1 });
        if let Some(Value::Object(extra)) = &options.extra {
            for (k, v) in extra {
                body[k] = v.clone();
            }
        }
        let v = self
            .execute(
                self.request("/v1/images/generations").json(&body),
                "generate_image",
            )
            .await?;
        let first = v.pointer("/data/0").ok_or_else(|| {
            Error::provider_failure(
                self.name.clone(),
                "generate_image",
                anyhow::anyhow!("response missing image data"),
            )
        })?;
        let artifact = if let Some(url) = first.get("url").and_then(|u| u.as_str()) {
            MediaArtifact::Url {
                url: url.to_string(),
            }
        } else if let Some(b64) = first.get("b64_json").and_then(|b| b.as_str()) {
            MediaArtifact::Base64 {
                data: b64.to_string(),
                media_type: "image/png".to_string(),
            }
        } else {
            return Err(Error::provider_failure(
                self.name.clone(),
                "generate_image",
                anyhow::anyhow!("image entry has neither url nor b64_json"),
            ));
        };
        Ok(MediaOutcome {
            artifact,
            provider: self.name.clone(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SpeechToTextProvider for OpenAiCompatProvider {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<TranscriptOutcome> {
        let ext = media_type.rsplit('/').next().unwrap_or("wav");
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("audio.{}", ext))
            .mime_str(media_type)
            .map_err(|e| Error::invalid_input(format!("bad audio media type: {}", e)))?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", model.to_string());
        if let Some(Value::Object(extra)) = &options.extra {
            for (k, v) in extra {
                if let Some(s) = v.as_str() {
                    form = form.text(k.clone(), s.to_string());
                }
            }
        }
        let v = self
            .execute(
                self.request("/v1/audio/transcriptions").multipart(form),
                "transcribe",
            )
            .await?;
        Ok(TranscriptOutcome {
            text: v.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string(),
            language: v
                .get("language")
                .and_then(|l| l.as_str())
                .map(String::from),
            provider: self.name.clone(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextToSpeechProvider for OpenAiCompatProvider {
    async fn synthesize(
        &self,
        text: &str,
        model: &str,
        options: &CallOptions,
    ) -> Result<SpeechOutcome> {
        let voice = options
            .extra
            .as_ref()
            .and_then(|e| e.get("voice"))
            .and_then(|v| v.as_str())
            .unwrap_or("alloy");
        let body = json!({ "model": model, "input": text, "voice": voice });
        let resp = self.request("/v1/audio/speech").json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(Error::provider_failure(
                self.name.clone(),
                "synthesize",
                anyhow::anyhow!("HTTP {}: {}", status, api_error(&detail)),
            ));
        }
        let media_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = resp.bytes().await?;
        Ok(SpeechOutcome {
            audio: base64::engine::general_purpose::STANDARD.encode(&bytes),
            media_type,
            provider: self.name.clone(),
            model: model.to_string(),
        })
    }
}
