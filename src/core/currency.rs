use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency identifier scoping a ledger.
///
/// Each net or gross position lives in exactly one currency; the engine
/// never converts between them. The code is opaque: an ISO 4217 code such as
/// `"USD"`, a token symbol, or a hex-encoded on-chain currency key.
///
/// # Examples
///
/// ```
/// use bilateral_settlement::core::currency::CurrencyCode;
///
/// let eth = CurrencyCode::new("ETH");
/// assert_eq!(eth.as_str(), "ETH");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
