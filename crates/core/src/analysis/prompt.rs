use crate::domain::market::PricePoint;
use crate::llm::prompt::PromptTemplate;
use serde::Serialize;

pub const MARKET_ANALYSIS: PromptTemplate = PromptTemplate {
    name: "market_analysis",
    system: "You are an expert agricultural market analyst advising Indian farmers on the best time to sell harvested crops. Respond only with the requested JSON.",
    body: r#"Advise the farmer whether to sell now or wait.

Analyze the provided data:
1. Price Trend: compare the earliest and latest prices in the historical data to identify a trend (upward, downward, or stable). If there are fewer than two data points, call the trend stable due to insufficient history.
2. Crop Urgency: assess the urgency to sell from the crop's condition and harvest time. A 'poor' condition or an older harvest requires a faster sale, even if the market trend is unfavorable. A 'perfect' condition crop can afford to wait for a better price.
3. Recommendation: choose exactly one of 'Sell Now' or 'Wait'. There is no neutral option.
   - Recommend 'Sell Now' if the price is high and might drop, or if the crop risks spoilage.
   - Recommend 'Wait' if the price trend is upward and the crop is in good enough condition to last.
4. Translated recommendation: the chosen recommendation written in {{language}}.
5. Reasoning: a short, clear justification in a single paragraph, written in {{language}}.

Crop Details:
- Name: {{commodity}}
- Location: {{location}}
- Harvested: {{harvest_time}}
- Condition: {{crop_condition}}

Historical Price Data (oldest first, rupees per quintal, {{point_count}} points):
{{json historical_price_data}}
"#,
};

#[derive(Debug, Serialize)]
pub struct MarketPromptInput<'a> {
    pub commodity: &'a str,
    pub location: String,
    pub harvest_time: String,
    pub crop_condition: String,
    pub language: String,
    pub point_count: usize,
    pub historical_price_data: &'a [PricePoint],
}
