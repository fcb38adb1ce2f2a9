pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod json;
pub mod prompt;
pub mod schema;

use crate::config::{LlmProviderKind, Settings};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::prompt::PromptTemplate;
use crate::llm::schema::OutputSchema;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Anthropic,
    /// In-process stand-ins.
    Fake,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::Fake => "fake",
        })
    }
}

/// A fully rendered structured-output call.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system: String,
    pub prompt: String,
    pub schema_name: &'static str,
    pub schema_description: &'static str,
    pub schema: serde_json::Value,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Returns the model's JSON output. Implementations do not check it
    /// against `req.schema`; `generate` does that.
    async fn generate_json(&self, req: StructuredRequest) -> anyhow::Result<serde_json::Value>;
}

/// Renders `template` with `input`, runs it on `client`, and decodes the
/// output into the schema's type. Output that does not fit is a `schema`
/// stage failure.
pub async fn generate<I, O>(
    client: &dyn LlmClient,
    template: &PromptTemplate,
    input: &I,
    schema: &OutputSchema<O>,
) -> anyhow::Result<O>
where
    I: Serialize + ?Sized,
    O: DeserializeOwned,
{
    let vars = serde_json::to_value(input).context("failed to serialize prompt input")?;
    let prompt = template.render(&vars)?;

    let req = StructuredRequest {
        system: template.system.to_string(),
        prompt,
        schema_name: schema.name,
        schema_description: schema.description,
        schema: schema.json.clone(),
    };

    tracing::debug!(
        provider = %client.provider(),
        prompt = template.name,
        schema = schema.name,
        "invoking structured generation"
    );
    let value = client.generate_json(req).await?;

    serde_json::from_value::<O>(value.clone()).map_err(|e| {
        LlmDiagnosticsError::new(client.provider(), "schema", e.to_string())
            .with_raw_output(value.to_string())
            .into()
    })
}

pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    Ok(match settings.llm_provider {
        LlmProviderKind::Gemini => Arc::new(gemini::GeminiClient::from_settings(settings)?),
        LlmProviderKind::Anthropic => {
            Arc::new(anthropic::AnthropicClient::from_settings(settings)?)
        }
    })
}
