use serde::{Deserialize, Serialize};

use super::{Price, SimplePrice, Symbol};

/// Assembled quote: the freshest price plus the history of the requested range.
///
/// `historical_prices` is ordered oldest first; an empty range is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: Price,
    pub historical_prices: Vec<SimplePrice>,
}
