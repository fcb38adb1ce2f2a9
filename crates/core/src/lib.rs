pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod llm;

pub use analysis::{AnalysisError, MarketAnalyzer};

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LlmProviderKind {
        Gemini,
        Anthropic,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PriceSource {
        DataGov,
        Mock,
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub google_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub data_gov_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub llm_provider: LlmProviderKind,
        pub price_source: PriceSource,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let llm_provider = match std::env::var("LLM_PROVIDER") {
                Ok(v) => parse_llm_provider(&v)?,
                Err(_) => LlmProviderKind::Gemini,
            };
            let price_source = match std::env::var("PRICE_SOURCE") {
                Ok(v) => parse_price_source(&v)?,
                Err(_) => PriceSource::DataGov,
            };

            Ok(Self {
                google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                data_gov_api_key: std::env::var("DATA_GOV_IN_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                llm_provider,
                price_source,
            })
        }

        pub fn require_google_api_key(&self) -> anyhow::Result<&str> {
            self.google_api_key
                .as_deref()
                .context("GOOGLE_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_data_gov_api_key(&self) -> anyhow::Result<&str> {
            self.data_gov_api_key
                .as_deref()
                .context("DATA_GOV_IN_API_KEY is required")
        }
    }

    pub fn parse_llm_provider(s: &str) -> anyhow::Result<LlmProviderKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" | "googleai" => Ok(LlmProviderKind::Gemini),
            "anthropic" | "claude" => Ok(LlmProviderKind::Anthropic),
            other => anyhow::bail!("unsupported LLM_PROVIDER: {other}"),
        }
    }

    pub fn parse_price_source(s: &str) -> anyhow::Result<PriceSource> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data_gov" | "datagov" | "data.gov.in" => Ok(PriceSource::DataGov),
            "mock" => Ok(PriceSource::Mock),
            other => anyhow::bail!("unsupported PRICE_SOURCE: {other}"),
        }
    }

    /// Reads an env var and parses it, falling back to `default` when unset or unparseable.
    pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse::<T>().ok())
            .unwrap_or(default)
    }

}
