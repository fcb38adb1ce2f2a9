//! End-to-end orchestration tests with in-process price sources and a
//! rule-following stand-in for the model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rakshak_core::domain::market::{
    AnalysisRequest, CropCondition, HarvestTiming, MarketRegion, PricePoint, Recommendation,
};
use rakshak_core::ingest::PriceHistoryProvider;
use rakshak_core::llm::error::LlmDiagnosticsError;
use rakshak_core::llm::{LlmClient, Provider, StructuredRequest};
use rakshak_core::{AnalysisError, MarketAnalyzer};
use serde_json::{json, Value};

struct FixedPrices {
    series: Vec<PricePoint>,
    fail: bool,
    calls: AtomicUsize,
    last_query: Mutex<Option<(String, Option<MarketRegion>)>>,
}

impl FixedPrices {
    fn new(prices: &[f64]) -> Arc<Self> {
        let series = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                label: format!("Day {}", i + 1),
                price,
            })
            .collect();
        Arc::new(Self {
            series,
            fail: false,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            series: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        })
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for FixedPrices {
    fn provider_name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_prices(
        &self,
        commodity: &str,
        region: Option<&MarketRegion>,
    ) -> anyhow::Result<Vec<PricePoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some((commodity.to_string(), region.cloned()));
        if self.fail {
            anyhow::bail!("data.gov.in HTTP 503 Service Unavailable");
        }
        Ok(self.series.clone())
    }
}

enum Behavior {
    /// Applies the prompt's trend and urgency rules to the embedded data.
    FollowRules,
    Respond(Value),
    Fail(&'static str),
}

struct ScenarioModel {
    behavior: Behavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScenarioModel {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

fn embedded_prices(prompt: &str) -> Vec<f64> {
    let start = prompt.rfind("\n[").expect("prompt embeds a JSON price array");
    let points: Vec<PricePoint> = serde_json::from_str(prompt[start..].trim()).unwrap();
    points.into_iter().map(|p| p.price).collect()
}

fn follow_rules(prompt: &str) -> Value {
    let prices = embedded_prices(prompt);
    let rising = match (prices.first(), prices.last()) {
        (Some(first), Some(last)) => last > first,
        _ => false,
    };
    let urgent = prompt.contains("At risk of spoiling soon") || prompt.contains("4 days ago");
    let sell = urgent || !rising;
    let hindi = prompt.contains("written in Hindi");

    let (recommendation, label, reasoning) = match (sell, hindi) {
        (true, true) => ("Sell Now", "अभी बेचें", "कीमतें गिर रही हैं और फसल जल्द खराब हो सकती है।"),
        (true, false) => ("Sell Now", "Sell Now", "Prices are not rising and the crop should be sold soon."),
        (false, true) => ("Wait", "रुकें", "कीमतें बढ़ रही हैं और फसल अच्छी हालत में है।"),
        (false, false) => ("Wait", "Wait", "Prices are trending upward and the crop can keep."),
    };
    json!({
        "recommendation": recommendation,
        "translated_recommendation": label,
        "reasoning": reasoning,
    })
}

#[async_trait::async_trait]
impl LlmClient for ScenarioModel {
    fn provider(&self) -> Provider {
        Provider::Fake
    }

    async fn generate_json(&self, req: StructuredRequest) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.prompt.clone());
        match &self.behavior {
            Behavior::FollowRules => Ok(follow_rules(&req.prompt)),
            Behavior::Respond(v) => Ok(v.clone()),
            Behavior::Fail(stage) => {
                Err(LlmDiagnosticsError::new(Provider::Fake, *stage, "boom").into())
            }
        }
    }
}

fn request(commodity: &str, timing: &str, condition: &str, language: &str) -> AnalysisRequest {
    AnalysisRequest {
        commodity_name: commodity.to_string(),
        state: None,
        market: None,
        harvest_timing: HarvestTiming::from(timing),
        crop_condition: CropCondition::from(condition),
        language: language.to_string(),
    }
}

#[tokio::test]
async fn rising_prices_and_perfect_crop_waits() {
    let prices = FixedPrices::new(&[1900.0, 1920.0, 1950.0, 2000.0, 2050.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices.clone(), model.clone());

    let res = analyzer
        .analyze(&request("Wheat", "just_now", "perfect", "en"))
        .await
        .unwrap();

    assert_eq!(res.recommendation, Recommendation::Wait);
    assert_eq!(res.commodity_name, "Wheat");
    assert_eq!(res.harvest_timing_display, "Just now harvested");
    assert_eq!(res.crop_condition_display, "Perfectly alright");
    assert_eq!(res.price_series, prices.series);
    assert_eq!(embedded_prices(&model.last_prompt()), [1900.0, 1920.0, 1950.0, 2000.0, 2050.0]);
}

#[tokio::test]
async fn falling_prices_and_poor_crop_sells_in_hindi() {
    let prices = FixedPrices::new(&[2200.0, 2100.0, 2000.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices.clone(), model.clone());

    let res = analyzer
        .analyze(&request("Tomato", "4_days_ago", "poor", "hi"))
        .await
        .unwrap();

    assert_eq!(res.recommendation, Recommendation::SellNow);
    assert_eq!(res.recommendation_label, "अभी बेचें");
    assert!(res.rationale.contains("फसल"));
    assert_eq!(res.crop_condition_display, "जल्द खराब होने का खतरा");
    assert_eq!(res.price_series.len(), 3);
    assert!(model.last_prompt().contains("written in Hindi"));
}

#[tokio::test]
async fn empty_history_is_no_data_and_skips_generation() {
    let prices = FixedPrices::new(&[]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices.clone(), model.clone());

    let mut req = request("Onion", "2_days_ago", "good", "en");
    req.state = Some("Bihar".to_string());
    req.market = Some("Patna".to_string());

    let err = analyzer.analyze(&req).await.unwrap_err();
    assert!(matches!(err, AnalysisError::NoData { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Onion") && msg.contains("Patna") && msg.contains("Bihar"));

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    let (commodity, region) = prices.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(commodity, "Onion");
    assert_eq!(region.unwrap().market, "Patna");
}

#[tokio::test]
async fn unknown_condition_displays_raw() {
    let prices = FixedPrices::new(&[1000.0, 1010.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices, model);

    let res = analyzer
        .analyze(&request("Rice", "just_now", "excellent", "en"))
        .await
        .unwrap();

    assert_eq!(res.crop_condition_display, "excellent");
    assert!(!res.harvest_timing_display.is_empty());
}

#[tokio::test]
async fn single_point_history_is_passed_through() {
    let prices = FixedPrices::new(&[1500.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices, model.clone());

    let res = analyzer
        .analyze(&request("Maize", "2_days_ago", "average", "en"))
        .await
        .unwrap();

    assert_eq!(res.price_series.len(), 1);
    assert!(model.last_prompt().contains("1 points"));
    assert!(model.last_prompt().contains("insufficient history"));
}

#[tokio::test]
async fn invalid_request_never_reaches_collaborators() {
    let prices = FixedPrices::new(&[1.0, 2.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices.clone(), model.clone());

    let err = analyzer
        .analyze(&request(" ", "just_now", "good", "en"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Validation(_)));

    let mut half_region = request("Wheat", "just_now", "good", "en");
    half_region.state = Some("Punjab".to_string());
    let err = analyzer.analyze(&half_region).await.unwrap_err();
    assert_eq!(err.to_string(), "Market is required when a state is given.");

    assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn price_source_outage_is_upstream() {
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(FixedPrices::failing(), model.clone());

    let err = analyzer
        .analyze(&request("Wheat", "just_now", "good", "en"))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Upstream { service: "market price", .. }));
    assert!(err.detail().unwrap().contains("503"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_transport_failure_is_upstream() {
    let analyzer = MarketAnalyzer::new(
        FixedPrices::new(&[1.0, 2.0]),
        ScenarioModel::new(Behavior::Fail("http")),
    );
    let err = analyzer
        .analyze(&request("Wheat", "just_now", "good", "en"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Upstream { .. }));
}

#[tokio::test]
async fn neutral_or_malformed_output_is_generation_error() {
    for bad in [
        json!({"recommendation": "Hold", "translated_recommendation": "Hold", "reasoning": "flat"}),
        json!({"recommendation": "Wait", "reasoning": "missing label"}),
        json!({"recommendation": "Wait", "translated_recommendation": " ", "reasoning": "blank label"}),
        json!("Sell Now"),
    ] {
        let prices = FixedPrices::new(&[1.0, 2.0]);
        let model = ScenarioModel::new(Behavior::Respond(bad.clone()));
        let analyzer = MarketAnalyzer::new(prices, model.clone());

        let err = analyzer
            .analyze(&request("Wheat", "just_now", "good", "en"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AnalysisError::Generation { .. }),
            "{bad} produced {err:?}"
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1, "no retries for {bad}");
    }
}

#[tokio::test]
async fn repeated_calls_keep_the_same_shape() {
    let prices = FixedPrices::new(&[1900.0, 1800.0, 1850.0]);
    let model = ScenarioModel::new(Behavior::FollowRules);
    let analyzer = MarketAnalyzer::new(prices, model);
    let req = request("Wheat", "2_days_ago", "good", "en");

    let a = analyzer.analyze(&req).await.unwrap();
    let b = analyzer.analyze(&req).await.unwrap();

    assert_eq!(a.price_series, b.price_series);
    assert_eq!(a.harvest_timing_display, b.harvest_timing_display);
    assert_eq!(a.crop_condition_display, b.crop_condition_display);
    let keys = |r: &rakshak_core::domain::market::AnalysisResult| {
        serde_json::to_value(r)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&a), keys(&b));
}
