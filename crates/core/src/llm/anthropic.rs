use crate::config::{env_or, Settings};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{LlmClient, Provider, StructuredRequest};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = env_or("ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS);
        let timeout_secs = env_or("ANTHROPIC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let api_key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Anthropic, "request", format!("invalid api key header: {e}"))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(headers)
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest<'_>,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let headers = self.headers()?;

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| LlmDiagnosticsError::new(Provider::Anthropic, "request", e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| LlmDiagnosticsError::new(Provider::Anthropic, "request", e.to_string()))?;
        if !status.is_success() {
            let mut err = LlmDiagnosticsError::new(Provider::Anthropic, "http", format!("status={status}"))
                .with_raw_output(text.clone());
            if let Ok(raw) = serde_json::from_str::<serde_json::Value>(&text) {
                err = err.with_raw_response(raw);
            }
            return Err(err.into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Anthropic, "parse", e.to_string()).with_raw_output(text.clone())
        })?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone()).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Anthropic, "parse", e.to_string())
                .with_raw_response(raw_json.clone())
        })?;
        Ok((raw_json, parsed))
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse, tool_name: &str) -> Option<serde_json::Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input.clone()),
            _ => None,
        })
    }

    /// Reads the forced tool call, falling back to JSON in text blocks.
    fn extract_output(
        res: &CreateMessageResponse,
        raw_json: serde_json::Value,
        tool_name: &str,
    ) -> anyhow::Result<serde_json::Value> {
        if let Some(input) = Self::response_tool_input(res, tool_name) {
            return Ok(input);
        }

        let text = Self::response_text(res);
        if text.trim().is_empty() {
            return Err(LlmDiagnosticsError::new(
                Provider::Anthropic,
                "empty",
                format!("no tool_use or text content (stop_reason={:?})", res.stop_reason),
            )
            .with_raw_response(raw_json)
            .into());
        }

        json::parse_json_output(&text).map_err(|e| {
            LlmDiagnosticsError::new(Provider::Anthropic, "parse", format!("{e:#}"))
                .with_raw_output(text)
                .with_raw_response(raw_json)
                .into()
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_json(&self, req: StructuredRequest) -> anyhow::Result<serde_json::Value> {
        let body = CreateMessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: Some(&req.system),
            messages: vec![Message {
                role: "user",
                content: &req.prompt,
            }],
            tools: vec![Tool {
                name: req.schema_name,
                description: req.schema_description,
                input_schema: &req.schema,
            }],
            tool_choice: ToolChoice::Tool {
                name: req.schema_name,
            },
        };

        let (raw_json, res) = self.create_message(&body).await?;
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(
                max_tokens = self.max_tokens,
                "Anthropic stop_reason=max_tokens; output may be truncated"
            );
        }

        Self::extract_output(&res, raw_json, req.schema_name)
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    tools: Vec<Tool<'a>>,
    tool_choice: ToolChoice,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tool<'a> {
    name: &'static str,
    description: &'static str,
    input_schema: &'a serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}
