use rust_decimal::{Decimal, RoundingStrategy};

use crate::quotes::QuoteSnapshot;

/// Discord rejects nicknames longer than this many characters.
pub const MAX_LABEL_CHARS: usize = 32;

const RISING: &str = "📈";
const FALLING: &str = "📉";

pub struct LabelFormatter {
    symbol: String,
}

impl LabelFormatter {
    pub fn new(symbol: impl Into<String>) -> LabelFormatter {
        LabelFormatter {
            symbol: symbol.into(),
        }
    }

    /// Renders `$SYM: $123.45 📈`, dropping to `SYM: $123.45` when that does
    /// not fit. The result is never longer than [`MAX_LABEL_CHARS`].
    pub fn format(&self, snapshot: Option<&QuoteSnapshot>) -> String {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => return self.error_label(),
        };
        let price = price_string(snapshot.price);
        let glyph = if snapshot.change < Decimal::ZERO {
            FALLING
        } else {
            RISING
        };
        let primary = format!("${}: ${} {}", self.symbol, price, glyph);
        if char_len(&primary) <= MAX_LABEL_CHARS {
            return primary;
        }
        fit(format!("{}: ${}", self.symbol, price))
    }

    pub fn error_label(&self) -> String {
        fit(format!("{}: Error", self.symbol))
    }

    /// Shown while no quote has ever been fetched successfully.
    pub fn fetch_error_label(&self) -> String {
        fit(format!("{}: API Error", self.symbol))
    }
}

fn price_string(price: Decimal) -> String {
    format!(
        "{:.2}",
        price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn char_len(label: &str) -> usize {
    label.chars().count()
}

fn fit(label: String) -> String {
    if char_len(&label) <= MAX_LABEL_CHARS {
        label
    } else {
        label.chars().take(MAX_LABEL_CHARS).collect()
    }
}
