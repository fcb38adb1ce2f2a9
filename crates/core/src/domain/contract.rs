use crate::domain::market::Recommendation;
use crate::llm::schema::OutputSchema;
use anyhow::{ensure, Context};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Raw shape the model is asked to emit for a market analysis.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LlmMarketVerdict {
    /// The final recommendation.
    #[schemars(schema_with = "recommendation_schema")]
    pub recommendation: String,
    /// The recommendation translated into the requested language.
    #[serde(alias = "translatedRecommendation")]
    pub translated_recommendation: String,
    /// One short paragraph justifying the recommendation, in the requested language.
    pub reasoning: String,
}

fn recommendation_schema(_: &mut SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "string",
        "enum": Recommendation::ALL,
        "description": "The final recommendation."
    })
}

/// Validated verdict, ready to merge into an `AnalysisResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketVerdict {
    pub recommendation: Recommendation,
    pub recommendation_label: String,
    pub rationale: String,
}

impl LlmMarketVerdict {
    pub fn schema() -> OutputSchema<Self> {
        OutputSchema::derive(
            "emit_market_verdict",
            "Emit the final sell-or-wait verdict for the farmer as structured JSON",
        )
    }

    pub fn validate_and_into_verdict(self) -> anyhow::Result<MarketVerdict> {
        let recommendation = Recommendation::parse(&self.recommendation).with_context(|| {
            format!(
                "recommendation must be one of {:?} (got {:?})",
                Recommendation::ALL,
                self.recommendation
            )
        })?;

        let recommendation_label = self.translated_recommendation.trim().to_string();
        ensure!(
            !recommendation_label.is_empty(),
            "translated_recommendation must be non-empty"
        );

        // Collapse accidental paragraph breaks into one paragraph.
        let rationale = self
            .reasoning
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        ensure!(!rationale.is_empty(), "reasoning must be non-empty");

        Ok(MarketVerdict {
            recommendation,
            recommendation_label,
            rationale,
        })
    }
}
