use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct DataGovResponse {
    #[serde(default)]
    pub records: Vec<DataGovRecord>,
}

/// One mandi row as published by data.gov.in. Prices arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataGovRecord {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub commodity: String,
    #[serde(default)]
    pub variety: String,
    /// DD/MM/YYYY
    #[serde(default)]
    pub arrival_date: String,
    #[serde(default, deserialize_with = "de_price")]
    pub min_price: Option<f64>,
    #[serde(default, deserialize_with = "de_price")]
    pub max_price: Option<f64>,
    #[serde(default, deserialize_with = "de_price")]
    pub modal_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub arrival_date: String,
    pub min_price: f64,
    pub max_price: f64,
    pub modal_price: f64,
}

fn de_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
