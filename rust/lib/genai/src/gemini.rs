//! Google Gemini REST client — non-streaming and SSE streaming
//! generation. Only the text surface is used; no function calling.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{GenerationRequest, TextGenerator, TextStream};
use crate::error::GenerationError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How many undelivered chunks a streaming call may hold before the
/// producer blocks. Keeps memory bounded and makes consumer cancellation
/// propagate quickly.
const STREAM_BUFFER: usize = 16;

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Override the API base URL (tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, self.model, method)
    }

    fn check_key(&self) -> Result<(), GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::NotConfigured("no API key".into()));
        }
        Ok(())
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, GenerationError> {
        let resp = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), message });
        }
        Ok(resp)
    }
}

/// Build the `generateContent` request body.
pub fn build_body(req: &GenerationRequest) -> Value {
    let mut body = serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": req.prompt}]
        }],
        "generationConfig": {
            "temperature": req.temperature,
            "maxOutputTokens": req.max_output_tokens,
            "topP": req.top_p,
            "topK": req.top_k,
        }
    });
    if !req.system_instruction.is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{"text": req.system_instruction}]
        });
    }
    body
}

/// Pull the concatenated text out of one response payload.
///
/// A blocked prompt carries `promptFeedback.blockReason` instead of
/// candidates; that becomes [`GenerationError::ContentFiltered`].
pub fn extract_text(payload: &Value) -> Result<String, GenerationError> {
    if let Some(reason) = payload["promptFeedback"]["blockReason"].as_str() {
        return Err(GenerationError::ContentFiltered(reason.to_string()));
    }
    let parts = payload["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| GenerationError::Decode("no candidates in response".into()))?;
    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join(""))
}

/// Split complete SSE lines off the front of `buffer`, returning the
/// `data:` payloads. Incomplete trailing lines stay in the buffer.
pub fn drain_sse_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        let line = line.trim_end();
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim_start();
            if !payload.is_empty() && payload != "[DONE]" {
                payloads.push(payload.to_string());
            }
        }
    }
    payloads
}

struct ChunkStream(mpsc::Receiver<Result<String, GenerationError>>);

impl Stream for ChunkStream {
    type Item = Result<String, GenerationError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.0.poll_recv(cx)
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, req: GenerationRequest) -> Result<String, GenerationError> {
        self.check_key()?;
        let body = build_body(&req);
        debug!(model = %self.model, "gemini generateContent");
        let resp = self.post(&self.endpoint("generateContent"), &body).await?;
        let payload = resp
            .json::<Value>()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        extract_text(&payload)
    }

    async fn generate_stream(&self, req: GenerationRequest) -> Result<TextStream, GenerationError> {
        self.check_key()?;
        let body = build_body(&req);
        debug!(model = %self.model, "gemini streamGenerateContent");
        let resp = self
            .http
            .post(self.endpoint("streamGenerateContent"))
            .query(&[("key", self.api_key.as_str()), ("alt", "sse")])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), message });
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(GenerationError::Network(e))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for payload in drain_sse_lines(&mut buffer) {
                    let item = serde_json::from_str::<Value>(&payload)
                        .map_err(|e| GenerationError::Decode(e.to_string()))
                        .and_then(|v| extract_text(&v));
                    match item {
                        Ok(text) if text.is_empty() => continue,
                        item => {
                            // A closed receiver means the consumer went
                            // away; stop reading from upstream.
                            if tx.send(item).await.is_err() {
                                debug!("stream consumer gone, aborting generation");
                                return;
                            }
                        }
                    }
                }
            }
            if !buffer.trim().is_empty() {
                warn!("gemini stream ended with partial SSE line");
            }
        });

        Ok(Box::pin(ChunkStream(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_includes_generation_config() {
        let req = GenerationRequest::new("hello").with_system("be terse");
        let body = build_body(&req);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
    }

    #[test]
    fn body_omits_empty_system_instruction() {
        let body = build_body(&GenerationRequest::new("hello"));
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn extract_text_joins_parts() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Policy "}, {"text": "brief"}]}
            }]
        });
        assert_eq!(extract_text(&payload).unwrap(), "Policy brief");
    }

    #[test]
    fn extract_text_surfaces_block_reason() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(
            extract_text(&payload),
            Err(GenerationError::ContentFiltered(r)) if r == "SAFETY"
        ));
    }

    #[test]
    fn extract_text_rejects_empty_response() {
        assert!(matches!(
            extract_text(&json!({})),
            Err(GenerationError::Decode(_))
        ));
    }

    #[test]
    fn drain_sse_keeps_partial_lines() {
        let mut buf = "data: {\"a\":1}\n\ndata: {\"b\":2}\ndata: {\"tr".to_string();
        let payloads = drain_sse_lines(&mut buf);
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(buf, "data: {\"tr");

        buf.push_str("unc\":3}\n");
        assert_eq!(drain_sse_lines(&mut buf), vec!["{\"trunc\":3}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_sse_skips_done_marker() {
        let mut buf = "data: [DONE]\n".to_string();
        assert!(drain_sse_lines(&mut buf).is_empty());
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let client = GeminiClient::new("", "gemini-2.0-flash");
        let err = client.generate(GenerationRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }
}
