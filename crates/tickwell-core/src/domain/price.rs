use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Canonical output of every source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub price: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// One timestamped price point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplePrice {
    pub price: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Latest price of a symbol with the reference points used for change figures.
///
/// Serializes the derived `price_change_absolute` and
/// `price_change_percentage` next to the stored fields; deserialization
/// ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Price {
    pub price: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub opening_price: Decimal,
    pub previous_closing_price: Decimal,
}

impl Price {
    /// `price - previous_closing_price`, or zero without a previous close.
    pub fn price_change_absolute(&self) -> Decimal {
        if self.previous_closing_price.is_zero() {
            return Decimal::ZERO;
        }
        self.price - self.previous_closing_price
    }

    /// Change relative to the previous close, in percent. Zero without a previous close.
    pub fn price_change_percentage(&self) -> Decimal {
        if self.previous_closing_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.price - self.previous_closing_price)
            .checked_div(self.previous_closing_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Price", 7)?;
        state.serialize_field("price", &self.price)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("opening_price", &self.opening_price)?;
        state.serialize_field("previous_closing_price", &self.previous_closing_price)?;
        state.serialize_field("price_change_absolute", &self.price_change_absolute())?;
        state.serialize_field("price_change_percentage", &self.price_change_percentage())?;
        state.end()
    }
}
