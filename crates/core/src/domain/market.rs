use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How long ago the crop was harvested, as submitted by the farmer.
///
/// Identifiers outside the known set are kept verbatim in `Other` so that a
/// newer form can roll out ahead of the display tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HarvestTiming {
    JustNow,
    TwoDaysAgo,
    FourDaysAgo,
    Other(String),
}

impl HarvestTiming {
    pub fn as_str(&self) -> &str {
        match self {
            Self::JustNow => "just_now",
            Self::TwoDaysAgo => "2_days_ago",
            Self::FourDaysAgo => "4_days_ago",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for HarvestTiming {
    fn from(s: String) -> Self {
        match s.trim() {
            "just_now" => Self::JustNow,
            "2_days_ago" => Self::TwoDaysAgo,
            "4_days_ago" => Self::FourDaysAgo,
            _ => Self::Other(s),
        }
    }
}

/// Stands in for a missing field so validation can report it.
impl Default for HarvestTiming {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for HarvestTiming {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<HarvestTiming> for String {
    fn from(t: HarvestTiming) -> Self {
        t.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CropCondition {
    Perfect,
    Good,
    Average,
    Poor,
    Other(String),
}

impl CropCondition {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Perfect => "perfect",
            Self::Good => "good",
            Self::Average => "average",
            Self::Poor => "poor",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for CropCondition {
    fn from(s: String) -> Self {
        match s.trim() {
            "perfect" => Self::Perfect,
            "good" => Self::Good,
            "average" => Self::Average,
            "poor" => Self::Poor,
            _ => Self::Other(s),
        }
    }
}

impl Default for CropCondition {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for CropCondition {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<CropCondition> for String {
    fn from(c: CropCondition) -> Self {
        c.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Sell Now")]
    SellNow,
    #[serde(rename = "Wait")]
    Wait,
}

impl Recommendation {
    pub const ALL: [&'static str; 2] = ["Sell Now", "Wait"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SellNow => "Sell Now",
            Self::Wait => "Wait",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Sell Now" => Some(Self::SellNow),
            "Wait" => Some(Self::Wait),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRegion {
    pub state: String,
    pub market: String,
}

impl fmt::Display for MarketRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.market, self.state)
    }
}

/// One day's representative price, in rupees per quintal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(alias = "day")]
    pub label: String,
    pub price: f64,
}

/// Absent fields decode as blanks and are rejected by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default, alias = "commodity", alias = "commodityName")]
    pub commodity_name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(
        default,
        alias = "harvest_time",
        alias = "harvestTime",
        alias = "harvestTiming"
    )]
    pub harvest_timing: HarvestTiming,
    #[serde(default, alias = "cropCondition")]
    pub crop_condition: CropCondition,
    #[serde(default)]
    pub language: String,
}

impl AnalysisRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.commodity_name.trim().is_empty(),
            "Commodity name is required."
        );
        ensure_identifier("Harvest time", self.harvest_timing.as_str())?;
        ensure_identifier("Crop condition", self.crop_condition.as_str())?;
        ensure!(!self.language.trim().is_empty(), "Language is required.");
        ensure!(
            is_locale_code(self.language.trim()),
            "Language must be a locale code such as 'en' or 'hi' (got '{}').",
            self.language
        );

        match (non_blank(&self.state), non_blank(&self.market)) {
            (Some(_), Some(_)) | (None, None) => Ok(()),
            (Some(_), None) => bail!("Market is required when a state is given."),
            (None, Some(_)) => bail!("State is required when a market is given."),
        }
    }

    pub fn commodity(&self) -> &str {
        self.commodity_name.trim()
    }

    pub fn region(&self) -> Option<MarketRegion> {
        Some(MarketRegion {
            state: non_blank(&self.state)?.to_string(),
            market: non_blank(&self.market)?.to_string(),
        })
    }

    pub fn language_code(&self) -> &str {
        self.language.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub commodity_name: String,
    pub harvest_timing_display: String,
    pub crop_condition_display: String,
    pub recommendation: Recommendation,
    pub recommendation_label: String,
    pub rationale: String,
    pub price_series: Vec<PricePoint>,
}

/// Most recent mandi record for a commodity, for the price lookup card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceSummary {
    pub commodity: String,
    pub state: String,
    pub market: String,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
    pub arrival_date: String,
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn ensure_identifier(field: &str, value: &str) -> anyhow::Result<()> {
    let value = value.trim();
    ensure!(!value.is_empty(), "{field} is required.");
    ensure!(
        value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "{field} '{value}' is not recognized."
    );
    Ok(())
}

/// Accepts `ll`, `lll`, and `ll-RR` / `ll_RR` style codes.
fn is_locale_code(s: &str) -> bool {
    let mut parts = s.splitn(2, |c| c == '-' || c == '_');
    let lang = parts.next().unwrap_or_default();
    if !(2..=3).contains(&lang.len()) || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(region) => {
            (2..=4).contains(&region.len()) && region.chars().all(|c| c.is_ascii_alphanumeric())
        }
    }
}
