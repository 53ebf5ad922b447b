//! Canonical identity for an unordered pair of counterparties.
//!
//! Upstream events report `(party0, party1)` in whatever order the initiating
//! call used. Every ledger is keyed by the canonical pair instead: the two
//! identifiers sorted byte-lexicographically into `(side0, side1)` and hashed
//! with Keccak-256. Amounts reported in caller order are re-mapped onto the
//! canonical sides with [`align`].

use crate::core::error::{Result, SettlementError};
use crate::core::party::PartyId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 32-byte storage key of a canonical pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairId([u8; 32]);

#[derive(Debug, Error)]
#[error("invalid pair id '{0}': expected 0x followed by 64 hex digits")]
pub struct ParsePairIdError(String);

impl PairId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairId({})", self.to_hex())
    }
}

impl FromStr for PairId {
    type Err = ParsePairIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| ParsePairIdError(s.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParsePairIdError(s.to_string()))?;
        Ok(PairId(array))
    }
}

impl Serialize for PairId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PairId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One of the two canonical sides of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Zero,
    One,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Zero => Side::One,
            Side::One => Side::Zero,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Zero => f.write_str("side0"),
            Side::One => f.write_str("side1"),
        }
    }
}

fn compare(a: &PartyId, b: &PartyId) -> Result<Ordering> {
    match a.as_bytes().cmp(b.as_bytes()) {
        Ordering::Equal => Err(SettlementError::CanonicalizationTie { party: a.clone() }),
        ord => Ok(ord),
    }
}

/// Keccak-256 over the length-prefixed (u32 big-endian) bytes of both sides.
fn hash_sides(side0: &PartyId, side1: &PartyId) -> PairId {
    let mut hasher = Keccak256::new();
    for party in [side0, side1] {
        let bytes = party.as_bytes();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(bytes);
    }
    PairId(hasher.finalize().into())
}

/// Order-independent pair identity: `pack(a, b) == pack(b, a)`.
pub fn pack(a: &PartyId, b: &PartyId) -> Result<PairId> {
    let id = match compare(a, b)? {
        Ordering::Less => hash_sides(a, b),
        _ => hash_sides(b, a),
    };
    Ok(id)
}

/// True iff the caller order `(a, b)` is the reverse of the canonical order.
pub fn is_flipped(a: &PartyId, b: &PartyId) -> Result<bool> {
    Ok(compare(a, b)? == Ordering::Greater)
}

/// Re-maps a pair of values given in caller order onto `(side0, side1)`.
pub fn align<T>(flipped: bool, first: T, second: T) -> (T, T) {
    if flipped {
        (second, first)
    } else {
        (first, second)
    }
}

/// An unordered counterparty pair with its sides fixed in canonical order.
///
/// Invariant: `side0 < side1` byte-lexicographically and `id` is the hash of
/// exactly those two sides.
///
/// # Examples
///
/// ```
/// use bilateral_settlement::core::pair::CanonicalPair;
/// use bilateral_settlement::core::party::PartyId;
///
/// let a = PartyId::new("0xaaaa");
/// let b = PartyId::new("0xbbbb");
/// let (pair, flipped) = CanonicalPair::orient(&b, &a).unwrap();
/// assert!(flipped);
/// assert_eq!(pair.side0(), &a);
/// assert_eq!(pair, CanonicalPair::new(&a, &b).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalPair {
    id: PairId,
    side0: PartyId,
    side1: PartyId,
}

impl CanonicalPair {
    pub fn new(a: &PartyId, b: &PartyId) -> Result<Self> {
        Self::orient(a, b).map(|(pair, _)| pair)
    }

    /// Canonical pair plus the flip indicator for the caller's order.
    pub fn orient(a: &PartyId, b: &PartyId) -> Result<(Self, bool)> {
        let flipped = is_flipped(a, b)?;
        let (side0, side1) = align(flipped, a, b);
        let pair = CanonicalPair {
            id: hash_sides(side0, side1),
            side0: side0.clone(),
            side1: side1.clone(),
        };
        Ok((pair, flipped))
    }

    pub fn id(&self) -> PairId {
        self.id
    }

    pub fn side0(&self) -> &PartyId {
        &self.side0
    }

    pub fn side1(&self) -> &PartyId {
        &self.side1
    }

    pub fn party(&self, side: Side) -> &PartyId {
        match side {
            Side::Zero => &self.side0,
            Side::One => &self.side1,
        }
    }

    pub fn side_of(&self, party: &PartyId) -> Option<Side> {
        if party == &self.side0 {
            Some(Side::Zero)
        } else if party == &self.side1 {
            Some(Side::One)
        } else {
            None
        }
    }
}

impl fmt::Display for CanonicalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.side0, self.side1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aaa() -> PartyId {
        PartyId::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
    }

    fn bbb() -> PartyId {
        PartyId::new("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
    }

    #[test]
    fn test_pack_is_order_independent() {
        assert_eq!(pack(&aaa(), &bbb()).unwrap(), pack(&bbb(), &aaa()).unwrap());
    }

    #[test]
    fn test_flip_indicator() {
        assert!(!is_flipped(&aaa(), &bbb()).unwrap());
        assert!(is_flipped(&bbb(), &aaa()).unwrap());
    }

    #[test]
    fn test_tie_rejected() {
        let err = pack(&aaa(), &aaa()).unwrap_err();
        assert_eq!(err, SettlementError::CanonicalizationTie { party: aaa() });
        assert!(is_flipped(&bbb(), &bbb()).is_err());
        assert!(CanonicalPair::new(&aaa(), &aaa()).is_err());
    }

    #[test]
    fn test_length_prefix_disambiguates() {
        // Plain concatenation would make these two pairs collide.
        let left = pack(&PartyId::new("ab"), &PartyId::new("c")).unwrap();
        let right = pack(&PartyId::new("a"), &PartyId::new("bc")).unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn test_distinct_pairs_distinct_ids() {
        let ccc = PartyId::new("0xcccc");
        assert_ne!(pack(&aaa(), &bbb()).unwrap(), pack(&aaa(), &ccc).unwrap());
    }

    #[test]
    fn test_align_swaps_only_when_flipped() {
        assert_eq!(align(false, 1, 2), (1, 2));
        assert_eq!(align(true, 1, 2), (2, 1));
    }

    #[test]
    fn test_canonical_pair_sides() {
        let (pair, flipped) = CanonicalPair::orient(&bbb(), &aaa()).unwrap();
        assert!(flipped);
        assert_eq!(pair.side0(), &aaa());
        assert_eq!(pair.side1(), &bbb());
        assert_eq!(pair.id(), pack(&aaa(), &bbb()).unwrap());
        assert_eq!(pair.side_of(&bbb()), Some(Side::One));
        assert_eq!(pair.side_of(&PartyId::new("0xdead")), None);
        assert_eq!(pair.party(Side::Zero), &aaa());
    }

    #[test]
    fn test_pair_id_hex_round_trip() {
        let id = pack(&aaa(), &bbb()).unwrap();
        let text = id.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 66);
        assert_eq!(text.parse::<PairId>().unwrap(), id);
        assert!("0x1234".parse::<PairId>().is_err());
    }
}
