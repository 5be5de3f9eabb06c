use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde_json::Value as JsonValue;

use super::quote_source::{FetchError, FetchOutcome, QuoteSnapshot, QuoteSource};

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageQuoteSource {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    attempts: AtomicU64,
}

impl AlphaVantageQuoteSource {
    pub fn new(client: Arc<Client>, api_key: String) -> AlphaVantageQuoteSource {
        AlphaVantageQuoteSource::with_base_url(client, api_key, ALPHA_VANTAGE_URL.to_owned())
    }

    pub fn with_base_url(
        client: Arc<Client>,
        api_key: String,
        base_url: String,
    ) -> AlphaVantageQuoteSource {
        AlphaVantageQuoteSource {
            client,
            api_key,
            base_url,
            attempts: AtomicU64::new(0),
        }
    }

    /// Requests made so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    async fn run_query(&self, symbol: &str) -> Result<JsonValue, FetchError> {
        let resp_payload = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let body = resp_payload
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageQuoteSource {
    async fn fetch(&self, symbol: &str) -> FetchOutcome {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Alpha Vantage: fetching {} (request #{})", symbol, attempt);
        let outcome = match self.run_query(symbol).await {
            Ok(response) => parse_global_quote(&response),
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(snapshot) => info!(
                "Fetched {} price: ${} (change: {}) at {}",
                symbol,
                snapshot.price.round_dp(2),
                snapshot.change.round_dp(2),
                snapshot.observed_at.format("%H:%M:%S")
            ),
            Err(FetchError::Upstream(message)) => error!("Alpha Vantage API error: {}", message),
            Err(FetchError::RateLimited(note)) => warn!("Alpha Vantage API limit warning: {}", note),
            Err(e) => error!("Alpha Vantage: {} for {}", e, symbol),
        }
        outcome
    }
}

/// Maps a GLOBAL_QUOTE body onto a snapshot. Error and advisory fields win
/// over any quote data present in the same body.
pub(crate) fn parse_global_quote(response: &JsonValue) -> FetchOutcome {
    if let Some(message) = response.get("Error Message") {
        return Err(FetchError::Upstream(json_text(message)));
    }
    for advisory in ["Note", "Information"] {
        if let Some(note) = response.get(advisory) {
            return Err(FetchError::RateLimited(json_text(note)));
        }
    }
    let quote = response
        .get("Global Quote")
        .and_then(JsonValue::as_object)
        .filter(|quote| !quote.is_empty())
        .ok_or_else(|| FetchError::Malformed("no Global Quote data in response".to_owned()))?;
    let price = match quote.get("05. price") {
        Some(value) => decimal_field("05. price", value)?,
        None => return Err(FetchError::Malformed("no price data in response".to_owned())),
    };
    if price < Decimal::ZERO {
        return Err(FetchError::Malformed(format!("negative price {}", price)));
    }
    let change = match quote.get("09. change") {
        Some(value) => decimal_field("09. change", value)?,
        None => Decimal::ZERO,
    };
    Ok(QuoteSnapshot::new(price, change))
}

fn decimal_field(name: &str, value: &JsonValue) -> Result<Decimal, FetchError> {
    let parsed = match value {
        JsonValue::String(s) => Decimal::from_str(s.trim()).ok(),
        JsonValue::Number(n) => n.as_f64().and_then(Decimal::from_f64),
        _ => None,
    };
    parsed.ok_or_else(|| FetchError::Malformed(format!("{} is not numeric: {}", name, value)))
}

fn json_text(value: &JsonValue) -> String {
    value
        .as_str()
        .map(str::to_owned)
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_price_and_change() {
        let body = json!({
            "Global Quote": {
                "01. symbol": "MSTR",
                "05. price": "350.1200",
                "09. change": "4.5000",
                "10. change percent": "1.3022%"
            }
        });
        let snapshot = parse_global_quote(&body).unwrap();
        assert_eq!(snapshot.price, dec("350.12"));
        assert_eq!(snapshot.change, dec("4.5"));
    }

    #[test]
    fn missing_change_defaults_to_zero() {
        let body = json!({ "Global Quote": { "05. price": "12.00" } });
        let snapshot = parse_global_quote(&body).unwrap();
        assert_eq!(snapshot.change, Decimal::ZERO);
    }

    #[test]
    fn numeric_json_fields_are_accepted() {
        let body = json!({ "Global Quote": { "05. price": 348.0, "09. change": -2.12 } });
        let snapshot = parse_global_quote(&body).unwrap();
        assert_eq!(snapshot.price, dec("348"));
        assert!(snapshot.change < Decimal::ZERO);
    }

    #[test]
    fn error_message_is_upstream_error() {
        let body = json!({ "Error Message": "Invalid API call." });
        assert_eq!(
            parse_global_quote(&body),
            Err(FetchError::Upstream("Invalid API call.".to_owned()))
        );
    }

    #[test]
    fn note_and_information_are_rate_limits() {
        let note = json!({ "Note": "Thank you for using Alpha Vantage!" });
        assert!(matches!(
            parse_global_quote(&note),
            Err(FetchError::RateLimited(_))
        ));
        let info = json!({ "Information": "standard API rate limit is 25 requests per day" });
        assert!(matches!(
            parse_global_quote(&info),
            Err(FetchError::RateLimited(_))
        ));
    }

    #[test]
    fn error_field_wins_over_quote_data() {
        let body = json!({
            "Error Message": "boom",
            "Global Quote": { "05. price": "1.00" }
        });
        assert!(matches!(
            parse_global_quote(&body),
            Err(FetchError::Upstream(_))
        ));
    }

    #[test]
    fn absent_or_empty_quote_is_malformed() {
        for body in [json!({}), json!({ "Global Quote": {} }), json!([1, 2, 3])] {
            assert!(matches!(
                parse_global_quote(&body),
                Err(FetchError::Malformed(_))
            ));
        }
    }

    #[test]
    fn bad_price_is_malformed() {
        for price in [json!("abc"), json!(""), json!(null), json!("-1.00")] {
            let body = json!({ "Global Quote": { "05. price": price } });
            assert!(matches!(
                parse_global_quote(&body),
                Err(FetchError::Malformed(_))
            ));
        }
        let no_price = json!({ "Global Quote": { "09. change": "1.00" } });
        assert!(matches!(
            parse_global_quote(&no_price),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn non_numeric_change_is_malformed() {
        let body = json!({ "Global Quote": { "05. price": "10.00", "09. change": "n/a" } });
        assert!(matches!(
            parse_global_quote(&body),
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error_and_counted() {
        let client = Arc::new(Client::new());
        let source = AlphaVantageQuoteSource::with_base_url(
            client,
            "demo".to_owned(),
            "http://127.0.0.1:1/query".to_owned(),
        );
        assert!(matches!(
            source.fetch("MSTR").await,
            Err(FetchError::Network(_))
        ));
        assert!(matches!(
            source.fetch("MSTR").await,
            Err(FetchError::Network(_))
        ));
        assert_eq!(source.attempts(), 2);
    }
}
