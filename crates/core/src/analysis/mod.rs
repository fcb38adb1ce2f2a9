//! Market analysis: fetch recent prices, ask the model for a sell-or-wait
//! verdict, and assemble the chart-ready result.

mod error;
pub mod prompt;

pub use error::AnalysisError;

use crate::config::Settings;
use crate::domain::contract::{LlmMarketVerdict, MarketVerdict};
use crate::domain::display::{crop_condition_display, harvest_timing_display, language_name};
use crate::domain::market::{AnalysisRequest, AnalysisResult, MarketRegion, PricePoint};
use crate::ingest::PriceHistoryProvider;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{self, LlmClient};
use std::sync::Arc;
use tracing::Instrument;

const UNSPECIFIED_LOCATION: &str = "Not specified (all markets)";

/// Stateless request/response orchestrator over a price source and an LLM.
///
/// Every call performs exactly one price fetch followed by at most one
/// generation call; nothing is cached between calls.
#[derive(Clone)]
pub struct MarketAnalyzer {
    prices: Arc<dyn PriceHistoryProvider>,
    llm: Arc<dyn LlmClient>,
}

impl MarketAnalyzer {
    pub fn new(prices: Arc<dyn PriceHistoryProvider>, llm: Arc<dyn LlmClient>) -> Self {
        Self { prices, llm }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(
            crate::ingest::provider_from_settings(settings)?,
            llm::client_from_settings(settings)?,
        ))
    }

    pub fn price_provider_name(&self) -> &'static str {
        self.prices.provider_name()
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "market_analysis",
            %request_id,
            commodity = %request.commodity_name,
            language = %request.language,
            prices = self.prices.provider_name(),
            llm = %self.llm.provider(),
        );

        let result = self.run(request).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(res) => tracing::info!(
                recommendation = %res.recommendation,
                points = res.price_series.len(),
                "market analysis complete"
            ),
            Err(err)
                if matches!(
                    err,
                    AnalysisError::Validation(_) | AnalysisError::NoData { .. }
                ) =>
            {
                tracing::warn!(kind = err.kind(), error = %err, "market analysis rejected")
            }
            Err(err) => tracing::error!(
                kind = err.kind(),
                error = %err,
                detail = err.detail().unwrap_or_default(),
                "market analysis failed"
            ),
        });
        result
    }

    async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        request
            .validate()
            .map_err(|e| AnalysisError::Validation(e.to_string()))?;

        let commodity = request.commodity();
        let region = request.region();

        let price_series = self
            .prices
            .fetch_prices(commodity, region.as_ref())
            .await
            .map_err(|e| AnalysisError::Upstream {
                service: "market price",
                detail: format!("{e:#}"),
            })?;

        if price_series.is_empty() {
            return Err(AnalysisError::NoData {
                commodity: commodity.to_string(),
                region,
            });
        }
        tracing::debug!(points = price_series.len(), "fetched price history");

        let verdict = self
            .generate_verdict(request, region.as_ref(), &price_series)
            .await?;

        let language = request.language_code();
        Ok(AnalysisResult {
            commodity_name: commodity.to_string(),
            harvest_timing_display: harvest_timing_display(&request.harvest_timing, language),
            crop_condition_display: crop_condition_display(&request.crop_condition, language),
            recommendation: verdict.recommendation,
            recommendation_label: verdict.recommendation_label,
            rationale: verdict.rationale,
            price_series,
        })
    }

    async fn generate_verdict(
        &self,
        request: &AnalysisRequest,
        region: Option<&MarketRegion>,
        price_series: &[PricePoint],
    ) -> Result<MarketVerdict, AnalysisError> {
        let input = prompt::MarketPromptInput {
            commodity: request.commodity(),
            location: region
                .map(ToString::to_string)
                .unwrap_or_else(|| UNSPECIFIED_LOCATION.to_string()),
            // The model gets the English labels; the caller gets localized ones.
            harvest_time: harvest_timing_display(&request.harvest_timing, "en"),
            crop_condition: crop_condition_display(&request.crop_condition, "en"),
            language: language_name(request.language_code()),
            point_count: price_series.len(),
            historical_price_data: price_series,
        };

        let raw = llm::generate(
            self.llm.as_ref(),
            &prompt::MARKET_ANALYSIS,
            &input,
            &LlmMarketVerdict::schema(),
        )
        .await
        .map_err(classify_generation_error)?;

        raw.validate_and_into_verdict()
            .map_err(|e| AnalysisError::Generation {
                detail: format!("{e:#}"),
            })
    }
}

fn classify_generation_error(err: anyhow::Error) -> AnalysisError {
    let detail = format!("{err:#}");
    match err.downcast_ref::<LlmDiagnosticsError>() {
        Some(diag) if diag.is_transport() => AnalysisError::Upstream {
            service: "AI advisory",
            detail,
        },
        _ => AnalysisError::Generation { detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    #[test]
    fn transport_failures_are_upstream() {
        let err: anyhow::Error =
            LlmDiagnosticsError::new(Provider::Gemini, "request", "timed out").into();
        assert!(matches!(
            classify_generation_error(err),
            AnalysisError::Upstream { service: "AI advisory", .. }
        ));
    }

    #[test]
    fn output_failures_are_generation() {
        let err: anyhow::Error =
            LlmDiagnosticsError::new(Provider::Gemini, "schema", "missing key").into();
        assert!(matches!(
            classify_generation_error(err),
            AnalysisError::Generation { .. }
        ));

        let err = anyhow::anyhow!("failed to render prompt");
        assert!(matches!(
            classify_generation_error(err),
            AnalysisError::Generation { .. }
        ));
    }
}
