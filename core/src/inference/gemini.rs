//! Google Generative Language `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{InferenceClient, InferenceError, InferenceResult};
use crate::config::InferenceSettings;

/// Google Generative Language API base URL.
pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Model to use (e.g., "gemini-2.0-flash-lite").
    pub model: String,
    /// API root, without the `/models` suffix.
    pub base_url: String,
    /// Maximum tokens to generate.
    pub max_output_tokens: u32,
    /// Temperature for sampling (0.0-2.0).
    pub temperature: Option<f32>,
    /// Top-p sampling parameter.
    pub top_p: Option<f32>,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            base_url: GOOGLE_API_BASE.to_string(),
            max_output_tokens: 8192,
            temperature: None,
            top_p: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&InferenceSettings> for GeminiConfig {
    fn from(settings: &InferenceSettings) -> Self {
        Self {
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            max_output_tokens: settings.max_output_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Google error response format.
#[derive(Debug, Deserialize)]
struct GoogleError {
    code: Option<u16>,
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Non-streaming Gemini client. One request per `generate` call, no retries.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> InferenceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config, api_key))
    }

    /// Creates a client with a custom HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        config: GeminiConfig,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            api_key: api_key.into(),
        }
    }

    /// Build a client from settings, taking the key from `api_key` when
    /// given and otherwise from the configured environment variable.
    pub fn from_settings(
        settings: &InferenceSettings,
        api_key: Option<String>,
    ) -> InferenceResult<Self> {
        let key = api_key
            .or_else(|| std::env::var(&settings.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InferenceError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(GeminiConfig::from(settings), key)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request_body(&self, prompt: &str) -> Value {
        let mut gen_config = json!({
            "maxOutputTokens": self.config.max_output_tokens
        });
        if let Some(temp) = self.config.temperature {
            gen_config["temperature"] = json!(temp);
        }
        if let Some(top_p) = self.config.top_p {
            gen_config["topP"] = json!(top_p);
        }

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": gen_config,
        })
    }

    fn headers(&self) -> InferenceResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| InferenceError::InvalidApiKey)?;
        headers.insert(API_KEY_HEADER, key);
        Ok(headers)
    }
}

fn error_from_body(status: u16, body: String) -> InferenceError {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => InferenceError::ApiResponse {
            status: parsed.error.code.unwrap_or(status),
            message: parsed.error.message,
            error_type: parsed.error.status,
        },
        Err(_) => InferenceError::ApiResponse {
            status,
            message: body,
            error_type: None,
        },
    }
}

fn text_from_response(response: GenerateResponse) -> InferenceResult<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(InferenceError::PromptBlocked(reason));
    }

    if let Some(usage) = &response.usage_metadata {
        tracing::debug!(
            prompt_tokens = usage.prompt_token_count.unwrap_or(0),
            output_tokens = usage.candidates_token_count.unwrap_or(0),
            "Inference usage"
        );
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(InferenceError::EmptyResponse);
    };
    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(InferenceError::SafetyBlocked);
    }

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(InferenceError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> InferenceResult<String> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&self.build_request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), body));
        }

        let body = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::Parse(e.to_string()))?;
        text_from_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        GeminiClient::new(config, "test-key").unwrap()
    }

    #[test]
    fn request_body_carries_prompt_and_generation_config() {
        let client = GeminiClient::with_client(
            reqwest::Client::new(),
            GeminiConfig {
                temperature: Some(0.7),
                ..Default::default()
            },
            "k",
        );
        let body = client.build_request_body("hello");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 0.001);
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn parse_error_response() {
        let json =
            r#"{"error":{"code":400,"message":"Invalid request","status":"INVALID_ARGUMENT"}}"#;
        match error_from_body(500, json.to_string()) {
            InferenceError::ApiResponse {
                status,
                message,
                error_type,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid request");
                assert_eq!(error_type.as_deref(), Some("INVALID_ARGUMENT"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_error_body_kept_verbatim() {
        let err = error_from_body(502, "bad gateway".to_string());
        assert_eq!(err.to_string(), "API error (502): bad gateway");
    }

    #[test]
    fn multi_part_text_is_joined() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}],"role":"model"},"finishReason":"STOP"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(text_from_response(parsed).unwrap(), "ab");
    }

    #[test]
    fn safety_finish_is_typed_failure() {
        let json = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            text_from_response(parsed),
            Err(InferenceError::SafetyBlocked)
        ));
    }

    #[test]
    fn blocked_prompt_is_typed_failure() {
        let json = r#"{"promptFeedback":{"blockReason":"OTHER"}}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        match text_from_response(parsed) {
            Err(InferenceError::PromptBlocked(reason)) => assert_eq!(reason, "OTHER"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn from_settings_without_key_fails() {
        let settings = InferenceSettings {
            api_key_env: "REPOSCRIBE_TEST_UNSET_KEY_VAR".to_string(),
            ..Default::default()
        };
        let err = GeminiClient::from_settings(&settings, None).unwrap_err();
        assert!(matches!(err, InferenceError::MissingApiKey(ref var) if var == "REPOSCRIBE_TEST_UNSET_KEY_VAR"));
    }

    #[test]
    fn explicit_key_overrides_env() {
        let settings = InferenceSettings::default();
        let client = GeminiClient::from_settings(&settings, Some("explicit".to_string())).unwrap();
        assert_eq!(client.config().model, settings.model);
    }

    #[tokio::test]
    async fn key_with_control_characters_is_invalid() {
        let server = MockServer::start().await;
        let client = GeminiClient::new(
            GeminiConfig {
                base_url: server.uri(),
                ..Default::default()
            },
            "bad\nkey",
        )
        .unwrap();

        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, InferenceError::InvalidApiKey));
        assert!(!err.to_string().contains("not set"));
    }

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash-lite:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(
                json!({"contents": [{"parts": [{"text": "analyze this"}]}]}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "It is a parser."}], "role": "model"},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).generate("analyze this").await.unwrap();
        assert_eq!(text, "It is a parser.");
    }

    #[tokio::test]
    async fn generate_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("x").await.unwrap_err();
        assert_eq!(err.to_string(), "API error (429): Quota exceeded");
    }

    #[tokio::test]
    async fn generate_rejects_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "  "}]}, "finishReason": "STOP"}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("x").await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse));
    }
}
