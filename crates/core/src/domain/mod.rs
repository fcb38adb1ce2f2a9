pub mod contract;
pub mod display;
pub mod market;
