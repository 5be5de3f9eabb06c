mod alphavantage;
mod quote_source;

pub use alphavantage::AlphaVantageQuoteSource;
pub use quote_source::{FetchError, FetchOutcome, QuoteSnapshot, QuoteSource};
