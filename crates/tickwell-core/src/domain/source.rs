use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Stable identifiers of the external price sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SourceId {
    BorseFrankfurt,
    Marketscreener,
    Nasdaq,
    NasdaqEu,
    Yahoo,
    YFinanceApi,
}

impl SourceId {
    pub const ALL: [Self; 6] = [
        Self::BorseFrankfurt,
        Self::Marketscreener,
        Self::Nasdaq,
        Self::NasdaqEu,
        Self::Yahoo,
        Self::YFinanceApi,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BorseFrankfurt => "BORSFRA",
            Self::Marketscreener => "MARKETSCREENER",
            Self::Nasdaq => "NASDAQ",
            Self::NasdaqEu => "NASDAQ_EU",
            Self::Yahoo => "YAHOO",
            Self::YFinanceApi => "YFINANCEAPI",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    /// Identifiers are matched exactly; the store keeps them upper-case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownSourceId {
                value: value.to_string(),
            })
    }
}

impl TryFrom<String> for SourceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceId> for &'static str {
    fn from(value: SourceId) -> Self {
        value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip_through_strings() {
        for id in SourceId::ALL {
            assert_eq!(id.as_str().parse::<SourceId>(), Ok(id));
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = "BLOOMBERG".parse::<SourceId>().expect_err("must fail");
        assert!(matches!(err, ValidationError::UnknownSourceId { .. }));
    }
}
