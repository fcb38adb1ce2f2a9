pub mod data_gov;
pub mod mock;
pub mod provider;
pub mod types;

pub use provider::{provider_from_settings, PriceHistoryProvider};
