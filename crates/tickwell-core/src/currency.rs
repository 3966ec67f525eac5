//! Currency normalization of prices and assembled quotes.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{Quote, SimplePrice};
use crate::{ServiceError, ValidationError};

/// Normalize a three-letter currency code to upper case.
pub fn parse_currency_code(input: &str) -> Result<String, ValidationError> {
    let code = input.trim();
    if code.len() == 3 && code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ValidationError::InvalidCurrency {
            value: input.to_string(),
        })
    }
}

/// Rate lookup collaborator.
pub trait ExchangeRateProvider: Send + Sync {
    /// Multiplier converting one unit of `from` into `to`.
    fn exchange_rate(&self, from: &str, to: &str) -> Result<Decimal, ServiceError>;
}

/// Fixed rate table keyed by upper-case currency codes.
#[derive(Debug, Clone)]
pub struct StaticExchangeRates {
    rates: HashMap<(String, String), Decimal>,
}

impl StaticExchangeRates {
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates
            .insert((from.to_ascii_uppercase(), to.to_ascii_uppercase()), rate);
        self
    }
}

impl Default for StaticExchangeRates {
    fn default() -> Self {
        Self::empty()
            .with_rate("EUR", "DKK", dec!(7.46))
            .with_rate("DKK", "EUR", dec!(0.134))
    }
}

impl ExchangeRateProvider for StaticExchangeRates {
    fn exchange_rate(&self, from: &str, to: &str) -> Result<Decimal, ServiceError> {
        self.rates
            .get(&(from.to_ascii_uppercase(), to.to_ascii_uppercase()))
            .copied()
            .ok_or_else(|| ServiceError::RateNotFound {
                from: from.to_string(),
                to: to.to_string(),
            })
    }
}

#[derive(Clone)]
pub struct CurrencyService {
    rates: Arc<dyn ExchangeRateProvider>,
}

impl CurrencyService {
    pub fn new(rates: Arc<dyn ExchangeRateProvider>) -> Self {
        Self { rates }
    }

    pub fn convert_currency(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
    ) -> Result<Decimal, ServiceError> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }
        Ok(amount * self.rates.exchange_rate(from, to)?)
    }

    /// Convert every monetary field of `quote` with one rate.
    ///
    /// Historical points must share the quote's currency; a mismatch fails the
    /// whole conversion and no partially converted quote is returned.
    pub fn convert_quote_currency(&self, quote: Quote, to: &str) -> Result<Quote, ServiceError> {
        let from = quote.price.currency.clone();
        if from.eq_ignore_ascii_case(to) {
            return Ok(quote);
        }

        let rate = self.rates.exchange_rate(&from, to)?;
        let target = to.to_ascii_uppercase();

        let historical_prices = quote
            .historical_prices
            .into_iter()
            .map(|point| {
                if !point.currency.eq_ignore_ascii_case(&from) {
                    return Err(ServiceError::CurrencyMismatch {
                        expected: from.clone(),
                        found: point.currency,
                    });
                }
                Ok(SimplePrice {
                    price: point.price * rate,
                    currency: target.clone(),
                    timestamp: point.timestamp,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut price = quote.price;
        price.price *= rate;
        price.opening_price *= rate;
        price.previous_closing_price *= rate;
        price.currency = target;

        Ok(Quote {
            symbol: quote.symbol,
            price,
            historical_prices,
        })
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new(Arc::new(StaticExchangeRates::default()))
    }
}
