use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a counterparty in a bilateral relationship.
///
/// Identifiers are compared byte-lexicographically, which is the order the
/// pair canonicalizer uses to decide which party becomes side 0. Callers are
/// expected to normalize identifiers (e.g. lowercase hex addresses) before
/// handing them to the engine: `0xAB` and `0xab` are different parties.
///
/// # Examples
///
/// ```
/// use bilateral_settlement::core::party::PartyId;
///
/// let alice = PartyId::new("0xaaaa");
/// let bob = PartyId::new("0xbbbb");
/// assert!(alice < bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes used for ordering and hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_equality() {
        let a = PartyId::new("0xaaaa");
        let b = PartyId::new("0xaaaa");
        let c = PartyId::new("0xbbbb");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_party_ordering_is_bytewise() {
        // Uppercase letters sort before lowercase in byte order.
        assert!(PartyId::new("0xB") < PartyId::new("0xa"));
        assert!(PartyId::new("0xa") < PartyId::new("0xab"));
    }

    #[test]
    fn test_party_serializes_transparently() {
        let json = serde_json::to_string(&PartyId::new("0xcafe")).unwrap();
        assert_eq!(json, "\"0xcafe\"");
    }
}
