//! Concrete LLM backends.
//!
//! Each adapter builds its provider-specific request (endpoint, auth, and
//! payload shape), sends it, and pulls the generated text out of the
//! provider-specific response shape.
//!
//! | Provider | Endpoint | Auth |
//! |----------|----------|------|
//! | Bailian (DashScope) | OpenAI-compatible `chat/completions` | `Authorization: Bearer` |
//! | Gemini | `models/<model>:generateContent` | `key` query parameter |
//! | OpenAI-compatible | `{base}/chat/completions` | `Authorization: Bearer` |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::Provider;
use crate::error::ProviderError;

pub const BAILIAN_API_URL: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const BAILIAN_MODEL: &str = "qwen3.5-plus";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const OPENAI_DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f32 = 0.3;
const TOP_P: f32 = 0.8;
const GEMINI_TOP_K: u32 = 40;

// ---------------------------------------------------------------------------
// Chat completions (Bailian and OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize, Default)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Message content is either a plain string or a list of typed blocks.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// An OpenAI-style `chat/completions` backend.
///
/// Used for Bailian (DashScope compatible mode) and for any
/// OpenAI-compatible endpoint such as OpenAI itself or DeepSeek.
pub struct ChatCompletions {
    name: &'static str,
    endpoint: String,
    model: String,
    api_key: String,
    http: Client,
}

impl ChatCompletions {
    pub fn bailian(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            name: "Bailian",
            endpoint: BAILIAN_API_URL.to_string(),
            model: BAILIAN_MODEL.to_string(),
            api_key: api_key.into(),
            http,
        }
    }

    /// An OpenAI-compatible backend rooted at `base` (trailing slashes are
    /// ignored). Without an explicit model one is inferred from the base.
    pub fn openai_compatible(
        http: Client,
        api_key: impl Into<String>,
        base: Option<&str>,
        model: Option<&str>,
    ) -> Self {
        let base = normalize_api_base(base);
        let model = match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => infer_openai_model(&base).to_string(),
        };
        Self {
            name: "OpenAI-compatible",
            endpoint: format!("{base}/chat/completions"),
            model,
            api_key: api_key.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for ChatCompletions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletions")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Provider for ChatCompletions {
    fn name(&self) -> &str {
        self.name
    }

    fn describe(&self) -> String {
        format!("{} ({}, model={})", self.name, self.endpoint, self.model)
    }

    #[instrument(level = "debug", skip_all, fields(provider = self.name, model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };
        let request = self.http.post(&self.endpoint).bearer_auth(&self.api_key);
        let text = send(self.name, request, &body).await?;
        parse_chat_response(self.name, &text)
    }
}

/// Extract the generated text from a `chat/completions` response body.
///
/// A missing choice or missing content yields an empty string; block lists
/// contribute only their `text` blocks, joined by newlines.
pub fn parse_chat_response(provider: &str, body: &str) -> Result<String, ProviderError> {
    let response: ChatResponse = decode_body(provider, body)?;
    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Err(error_body(provider, &error));
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    Ok(match content {
        Some(MessageContent::Text(text)) => text,
        Some(MessageContent::Blocks(blocks)) => blocks
            .into_iter()
            .filter(|b| b.kind.as_deref() == Some("text"))
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    })
}

/// Trim `base`, drop trailing slashes, and fall back to the OpenAI default.
pub fn normalize_api_base(base: Option<&str>) -> String {
    let base = base.map(str::trim).filter(|b| !b.is_empty()).unwrap_or(OPENAI_DEFAULT_API_BASE);
    base.trim_end_matches('/').to_string()
}

/// Pick a sensible default model for an OpenAI-compatible base URL.
pub fn infer_openai_model(base: &str) -> &'static str {
    if base.to_lowercase().contains("deepseek") {
        "deepseek-chat"
    } else {
        OPENAI_DEFAULT_MODEL
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Google Gemini `generateContent` backend.
pub struct Gemini {
    endpoint: String,
    model: &'static str,
    api_key: String,
    http: Client,
}

impl Gemini {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{GEMINI_API_BASE}/{GEMINI_MODEL}:generateContent"),
            model: GEMINI_MODEL,
            api_key: api_key.into(),
            http,
        }
    }
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn describe(&self) -> String {
        format!("Gemini ({}, model={})", self.endpoint, self.model)
    }

    #[instrument(level = "debug", skip_all, fields(provider = "Gemini"))]
    async fn ask(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: GEMINI_TOP_K,
            },
        };
        let request = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())]);
        let text = send("Gemini", request, &body).await?;
        parse_gemini_response("Gemini", &text)
    }
}

/// Extract the generated text from a `generateContent` response body.
///
/// Text parts of the first candidate are concatenated; thought parts are
/// skipped. A missing candidate yields an empty string.
pub fn parse_gemini_response(provider: &str, body: &str) -> Result<String, ProviderError> {
    let response: GeminiResponse = decode_body(provider, body)?;
    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Err(error_body(provider, &error));
    }

    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// POST `body` as JSON and return the raw response text of a 2xx reply.
async fn send<B: Serialize>(
    provider: &str,
    request: RequestBuilder,
    body: &B,
) -> Result<String, ProviderError> {
    let t0 = Instant::now();
    let transport = |source| ProviderError::Transport {
        provider: provider.to_string(),
        source,
    };

    let response = request.json(body).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(
            provider,
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "API call failed"
        );
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await.map_err(transport)?;
    debug!(
        provider,
        bytes = text.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "API call succeeded"
    );
    Ok(text)
}

fn decode_body<T: DeserializeOwned + Default>(provider: &str, body: &str) -> Result<T, ProviderError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|source| ProviderError::Body {
        provider: provider.to_string(),
        source,
    })
}

fn error_body(provider: &str, error: &serde_json::Value) -> ProviderError {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    ProviderError::ErrorBody {
        provider: provider.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_plain_string_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_chat_response("Bailian", body).unwrap(), "hello");
    }

    #[test]
    fn test_chat_block_content_keeps_only_text_blocks() {
        let body = r#"{"choices":[{"message":{"content":[
            {"type":"text","text":"first"},
            {"type":"image_url","image_url":{"url":"x"}},
            {"type":"reasoning","text":"hidden"},
            {"type":"text","text":"second"}
        ]}}]}"#;
        assert_eq!(
            parse_chat_response("OpenAI-compatible", body).unwrap(),
            "first\nsecond"
        );
    }

    #[test]
    fn test_chat_missing_fields_yield_empty_text() {
        assert_eq!(parse_chat_response("x", r#"{"choices":[]}"#).unwrap(), "");
        assert_eq!(parse_chat_response("x", r#"{}"#).unwrap(), "");
        assert_eq!(
            parse_chat_response("x", r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(),
            ""
        );
        assert_eq!(parse_chat_response("x", "").unwrap(), "");
    }

    #[test]
    fn test_chat_error_body_is_failure() {
        let body = r#"{"error":{"message":"Invalid API key","code":"invalid_api_key"}}"#;
        let err = parse_chat_response("Bailian", body).unwrap_err();
        assert!(matches!(err, ProviderError::ErrorBody { .. }));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_chat_garbage_body_is_failure() {
        let err = parse_chat_response("Bailian", "<html>502</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Body { .. }));
    }

    #[test]
    fn test_gemini_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"text":"thinking...","thought":true},
            {"text":"Hello "},
            {"text":"world"}
        ]}}]}"#;
        assert_eq!(parse_gemini_response("Gemini", body).unwrap(), "Hello world");
    }

    #[test]
    fn test_gemini_missing_candidates() {
        assert_eq!(parse_gemini_response("Gemini", r#"{"candidates":[]}"#).unwrap(), "");
        assert_eq!(
            parse_gemini_response("Gemini", r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(),
            ""
        );
    }

    #[test]
    fn test_gemini_error_body() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = parse_gemini_response("Gemini", body).unwrap_err();
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[test]
    fn test_normalize_api_base() {
        assert_eq!(normalize_api_base(None), OPENAI_DEFAULT_API_BASE);
        assert_eq!(normalize_api_base(Some("  ")), OPENAI_DEFAULT_API_BASE);
        assert_eq!(
            normalize_api_base(Some("https://api.deepseek.com/v1//")),
            "https://api.deepseek.com/v1"
        );
    }

    #[test]
    fn test_infer_openai_model() {
        assert_eq!(infer_openai_model("https://api.DeepSeek.com/v1"), "deepseek-chat");
        assert_eq!(infer_openai_model(OPENAI_DEFAULT_API_BASE), OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn test_openai_compatible_construction() {
        let p = ChatCompletions::openai_compatible(
            Client::new(),
            "sk-test",
            Some("https://api.deepseek.com/"),
            None,
        );
        assert_eq!(p.endpoint(), "https://api.deepseek.com/chat/completions");
        assert_eq!(p.model(), "deepseek-chat");

        let p = ChatCompletions::openai_compatible(Client::new(), "sk-test", None, Some(" gpt-4.1 "));
        assert_eq!(p.model(), "gpt-4.1");
        assert!(!format!("{p:?}").contains("sk-test"));
    }

    #[test]
    fn test_gemini_describe_names_endpoint_and_model() {
        let p = Gemini::new(Client::new(), "gm-secret");
        assert_eq!(
            p.describe(),
            "Gemini (https://generativelanguage.googleapis.com/v1beta/models/gemini-3-flash-preview:generateContent, model=gemini-3-flash-preview)"
        );
        assert!(!p.describe().contains("gm-secret"));
        assert!(!format!("{p:?}").contains("gm-secret"));
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: BAILIAN_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], BAILIAN_MODEL);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("top_p").is_some());
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: GEMINI_TOP_K,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert!(json["generationConfig"].get("topP").is_some());
    }
}
