use async_trait::async_trait;
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use thiserror::Error;

#[async_trait]
pub trait QuoteSource: Sync + Send {
    async fn fetch(&self, symbol: &str) -> FetchOutcome;
}

/// One successful quote. Replaced wholesale by the next one, never edited.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteSnapshot {
    pub price: Decimal,
    pub change: Decimal,
    pub observed_at: DateTime<Local>,
}

impl QuoteSnapshot {
    pub fn new(price: Decimal, change: Decimal) -> QuoteSnapshot {
        QuoteSnapshot {
            price,
            change,
            observed_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

pub type FetchOutcome = Result<QuoteSnapshot, FetchError>;
