use crate::config::{PriceSource, Settings};
use crate::domain::market::{MarketRegion, PricePoint};
use crate::ingest::data_gov::DataGovClient;
use crate::ingest::mock::MockPriceProvider;
use anyhow::Result;
use std::sync::Arc;

/// Source of recent daily prices for a commodity.
///
/// Implementations return points oldest-first. An empty vector means the
/// source has no records for the query; it is not an error.
#[async_trait::async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_prices(
        &self,
        commodity: &str,
        region: Option<&MarketRegion>,
    ) -> Result<Vec<PricePoint>>;
}

pub fn provider_from_settings(settings: &Settings) -> Result<Arc<dyn PriceHistoryProvider>> {
    Ok(match settings.price_source {
        PriceSource::DataGov => Arc::new(DataGovClient::from_settings(settings)?),
        PriceSource::Mock => Arc::new(MockPriceProvider::new()),
    })
}
