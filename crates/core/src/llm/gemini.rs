use crate::config::{env_or, Settings};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::schema::to_gemini_schema;
use crate::llm::{LlmClient, Provider, StructuredRequest};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_google_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = env_or("GEMINI_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS);
        let timeout_secs = env_or("GEMINI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Gemini http client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request(&self, req: &StructuredRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: req.system.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: req.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json",
                response_schema: to_gemini_schema(&req.schema),
            },
        }
    }

    fn candidate_text(res: &GenerateContentResponse) -> String {
        res.candidates
            .iter()
            .flatten()
            .next()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.as_ref())
            .map(|parts| parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }

    fn extract_output(
        res: &GenerateContentResponse,
        raw_json: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let text = Self::candidate_text(res);
        if text.trim().is_empty() {
            let finish_reason = res
                .candidates
                .iter()
                .flatten()
                .next()
                .and_then(|c| c.finish_reason.clone());
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                "empty",
                format!("no candidate text (finish_reason={finish_reason:?})"),
            )
            .with_raw_response(raw_json)
            .into());
        }

        json::parse_json_output(&text).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Gemini, "parse", format!("{e:#}"))
                .with_raw_output(text)
                .with_raw_response(raw_json)
                .into()
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate_json(&self, req: StructuredRequest) -> anyhow::Result<serde_json::Value> {
        let body = self.build_request(&req);

        let res = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmDiagnosticsError::new(Provider::Gemini, "request", e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| LlmDiagnosticsError::new(Provider::Gemini, "request", e.to_string()))?;
        if !status.is_success() {
            return Err(
                LlmDiagnosticsError::new(Provider::Gemini, "http", format!("status={status}"))
                    .with_raw_output(text)
                    .into(),
            );
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Gemini, "parse", e.to_string()).with_raw_output(text.clone())
        })?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone()).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Gemini, "parse", e.to_string())
                .with_raw_response(raw_json.clone())
        })?;

        if let Some(usage) = &parsed.usage_metadata {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }

        Self::extract_output(&parsed, raw_json)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
