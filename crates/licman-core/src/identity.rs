//! # Ledger Identity Newtypes
//!
//! Newtype wrappers for the identifiers that cross the ledger boundary.
//! These prevent accidental confusion between an account, a license
//! number, and a document reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A ledger account address (20 bytes).
///
/// Parsing accepts any hex case; equality and hashing operate on the raw
/// bytes, so `0xABC…` and `0xabc…` are the same account. Display is always
/// lowercase with a `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, used by the ledger as the "unreviewed" sentinel.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wrap raw account bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed, 40-hex-digit address in any letter case.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ValidationError::InvalidAddress(s.to_string()))?;
        if digits.len() != 40 {
            return Err(ValidationError::InvalidAddress(s.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| ValidationError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Raw account bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// First 8 characters of the hex form, for compact tables.
    pub fn short(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(8);
        s
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_hex()
    }
}

/// License identifier assigned by the ledger at registration.
///
/// Assigned in ascending order, so ordering by id is ordering by
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(pub u64);

impl LicenseId {
    /// The numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LicenseId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Reference to a document in the content-addressed store.
///
/// [`ContentAddress::new`] accepts only a bare CID: non-empty ASCII
/// alphanumerics, which covers base58 (`Qm…`) and base32 (`bafy…`)
/// identifiers. That is what the store returns on upload. References read
/// back from the ledger go through [`ContentAddress::from_ledger`] and are
/// kept exactly as stored, since the contract accepts any string. Whether a
/// reference can be turned into a gateway URL is a separate question,
/// answered by [`ContentAddress::gateway_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Validate and wrap a bare CID.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !is_bare_cid(&value) {
            return Err(ValidationError::InvalidContentAddress(value));
        }
        Ok(Self(value))
    }

    /// Wrap a reference exactly as the ledger holds it. Not validated.
    pub fn from_ledger(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The reference as a path under a gateway's `/ipfs/`, either `<cid>`
    /// or `<cid>/<segment>/…`.
    ///
    /// `None` when the root is not a bare CID or any further segment is
    /// empty, `.`, `..`, or contains characters outside the URL-unreserved
    /// set (`A-Z a-z 0-9 - . _ ~`).
    pub fn gateway_path(&self) -> Option<&str> {
        let mut segments = self.0.split('/');
        if !segments.next().is_some_and(is_bare_cid) {
            return None;
        }
        let tail_ok = segments.all(|seg| {
            !seg.is_empty()
                && seg != "."
                && seg != ".."
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        });
        tail_ok.then_some(self.0.as_str())
    }
}

fn is_bare_cid(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContentAddress> for String {
    fn from(value: ContentAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "0xAbCdEf0123456789AbCdEf0123456789AbCdEf01";
    const LOWER: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

    #[test]
    fn address_equality_ignores_hex_case() {
        let a = Address::parse(MIXED).unwrap();
        let b = Address::parse(LOWER).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), LOWER);
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x").is_err());
        assert!(Address::parse("0x123").is_err());
        assert!(Address::parse("abcdef0123456789abcdef0123456789abcdef0101").is_err());
        assert!(Address::parse("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
    }

    #[test]
    fn zero_address_is_sentinel() {
        let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
        assert!(!Address::parse(LOWER).unwrap().is_zero());
    }

    #[test]
    fn short_form_keeps_first_eight_chars() {
        assert_eq!(Address::parse(MIXED).unwrap().short(), "0xabcdef");
    }

    #[test]
    fn address_serde_uses_hex_string() {
        let a = Address::parse(MIXED).unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{LOWER}\""));
        let back: Address = serde_json::from_str(&format!("\"{MIXED}\"")).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }

    #[test]
    fn content_address_validation() {
        assert!(ContentAddress::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").is_ok());
        assert!(ContentAddress::new("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").is_ok());
        assert!(ContentAddress::new("").is_err());
        assert!(ContentAddress::new("Qm../etc/passwd").is_err());
        assert!(ContentAddress::new("Qm abc").is_err());
    }

    #[test]
    fn ledger_references_are_kept_verbatim() {
        for raw in ["", "QmDoc/license.pdf", "not a cid", "Qm../etc/passwd"] {
            let doc = ContentAddress::from_ledger(raw);
            assert_eq!(doc.as_str(), raw);
            let json = serde_json::to_string(&doc).unwrap();
            assert_eq!(serde_json::from_str::<ContentAddress>(&json).unwrap(), doc);
        }
    }

    #[test]
    fn gateway_path_accepts_cid_with_file_path() {
        let bare = ContentAddress::from_ledger("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
        assert_eq!(bare.gateway_path(), Some(bare.as_str()));
        let nested = ContentAddress::from_ledger("QmDoc/scans/license-2024_v1.pdf");
        assert_eq!(nested.gateway_path(), Some("QmDoc/scans/license-2024_v1.pdf"));
    }

    #[test]
    fn gateway_path_refuses_unsafe_references() {
        for raw in [
            "",
            "/QmDoc",
            "QmDoc/",
            "QmDoc//a.pdf",
            "QmDoc/../secret",
            "QmDoc/./a.pdf",
            "QmDoc/my license.pdf",
            "QmDoc/a?b=c",
            "Qm-Doc/a.pdf",
        ] {
            assert_eq!(ContentAddress::from_ledger(raw).gateway_path(), None, "{raw:?}");
        }
    }

    #[test]
    fn license_id_orders_numerically() {
        let mut ids = vec![LicenseId(10), LicenseId(2), LicenseId(7)];
        ids.sort();
        assert_eq!(ids, vec![LicenseId(2), LicenseId(7), LicenseId(10)]);
        assert_eq!(LicenseId(7).to_string(), "7");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any case mix of the same hex digits parses to the same account.
        #[test]
        fn parse_is_case_insensitive(bytes in any::<[u8; 20]>(), mask in any::<u64>()) {
            let lower = hex::encode(bytes);
            let mixed: String = lower
                .chars()
                .enumerate()
                .map(|(i, c)| if mask >> (i % 64) & 1 == 1 { c.to_ascii_uppercase() } else { c })
                .collect();
            let a = Address::parse(&format!("0x{lower}")).unwrap();
            let b = Address::parse(&format!("0x{mixed}")).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(a.as_bytes(), &bytes);
        }

        /// Display output parses back to the same account.
        #[test]
        fn display_parses_back(bytes in any::<[u8; 20]>()) {
            let a = Address::from_bytes(bytes);
            prop_assert_eq!(Address::parse(&a.to_string()).unwrap(), a);
        }
    }
}
