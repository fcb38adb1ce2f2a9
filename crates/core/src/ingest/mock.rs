use crate::domain::market::{MarketRegion, PricePoint};
use crate::ingest::provider::PriceHistoryProvider;
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};

const WINDOW_DAYS: i64 = 5;

/// Offline price source: a fixed five-day window derived from the commodity
/// name, so demos and local runs need no data.gov.in key.
#[derive(Debug, Clone, Default)]
pub struct MockPriceProvider {
    today: Option<NaiveDate>,
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the calendar so labels are reproducible.
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    pub fn series(&self, commodity: &str) -> Vec<PricePoint> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let base_price = i64::from(simple_hash(&commodity.to_lowercase()) % 3000) + 1500;

        (0..WINDOW_DAYS)
            .rev()
            .map(|days_ago| {
                let fluctuation =
                    i64::from(simple_hash(&format!("{commodity}{days_ago}")) % 200) - 100;
                let label = if days_ago == 0 {
                    "Today".to_string()
                } else {
                    (today - Duration::days(days_ago)).format("%a").to_string()
                };
                PricePoint {
                    label,
                    price: (base_price + fluctuation) as f64,
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for MockPriceProvider {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_prices(
        &self,
        commodity: &str,
        _region: Option<&MarketRegion>,
    ) -> Result<Vec<PricePoint>> {
        tracing::debug!(commodity, "serving mock market prices");
        Ok(self.series(commodity))
    }
}

/// 32-bit `h * 31 + c` string hash over UTF-16 code units, absolute value.
fn simple_hash(s: &str) -> u32 {
    let hash = s.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    });
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> MockPriceProvider {
        // 2025-06-06 is a Friday.
        MockPriceProvider::with_today(NaiveDate::from_ymd_opt(2025, 6, 6).unwrap())
    }

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(simple_hash(""), 0);
        assert_eq!(simple_hash("a"), 97);
        assert_eq!(simple_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn series_is_deterministic_and_labelled() {
        let a = provider().series("Wheat");
        let b = provider().series("Wheat");
        assert_eq!(a, b);

        let labels: Vec<_> = a.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["Mon", "Tue", "Wed", "Thu", "Today"]);
    }

    #[test]
    fn prices_stay_in_band() {
        for crop in ["Wheat", "Tomato", "Onion", "धान"] {
            for p in provider().series(crop) {
                assert!((1400.0..4600.0).contains(&p.price), "{crop}: {}", p.price);
            }
        }
    }

    #[tokio::test]
    async fn ignores_region() {
        let region = MarketRegion {
            state: "Bihar".to_string(),
            market: "Patna".to_string(),
        };
        let p = provider();
        assert_eq!(
            p.fetch_prices("Onion", Some(&region)).await.unwrap(),
            p.fetch_prices("Onion", None).await.unwrap()
        );
    }
}
