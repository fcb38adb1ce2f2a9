use crate::domain::market::MarketRegion;
use thiserror::Error;

/// Failures surfaced by `MarketAnalyzer::analyze`.
///
/// `Display` is the user-facing message; `detail()` carries the internal
/// cause for logs.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error(
        "No market data found for {commodity}{}. Please check your inputs or try a different market.",
        location_suffix(.region)
    )]
    NoData {
        commodity: String,
        region: Option<MarketRegion>,
    },

    #[error("Could not reach the {service} service. Please try again.")]
    Upstream {
        service: &'static str,
        detail: String,
    },

    #[error("Could not generate a market analysis. Please try again.")]
    Generation { detail: String },
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NoData { .. } => "no_data",
            Self::Upstream { .. } => "upstream",
            Self::Generation { .. } => "generation",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Upstream { detail, .. } | Self::Generation { detail } => Some(detail),
            _ => None,
        }
    }
}

fn location_suffix(region: &Option<MarketRegion>) -> String {
    region
        .as_ref()
        .map(|r| format!(" in {r}"))
        .unwrap_or_default()
}
