//! Handles and account identifiers
//!
//! Secure values never leave the coprocessor. Callers hold a 32-byte
//! [`Handle`] whose last byte tags the [`SecureType`] of the referenced value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separator for handle derivation
const HANDLE_DOMAIN: &[u8] = b"veilcast/handle/v1";

/// Type of an encrypted value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SecureType {
    Bool = 0x01,
    Uint8 = 0x02,
    Uint64 = 0x05,
}

impl SecureType {
    /// Decode a type tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(SecureType::Bool),
            0x02 => Some(SecureType::Uint8),
            0x05 => Some(SecureType::Uint64),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// 32-byte account identifier. The all-zero value is the null account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Account([u8; 32]);

impl Account {
    /// The null account
    pub const ZERO: Account = Account([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Account whose identifier is a single repeated byte (fixtures, tooling)
    pub fn repeat(byte: u8) -> Self {
        Self([byte; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string (optional `0x` prefix)
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Reference to a secure value held by the coprocessor
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Handle([u8; 32]);

impl Handle {
    /// Sentinel for "no value"
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Secure type encoded in the handle, `None` for the zero handle or a foreign tag
    pub fn secure_type(&self) -> Option<SecureType> {
        SecureType::from_tag(self.0[31])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}..{:02x})", &self.to_hex()[..12], self.0[31])
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Deterministic handle allocator
///
/// Handles depend only on the host, a counter and the operation inputs, so
/// replaying the same ordered invocations reproduces the same handles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandleDeriver {
    host: Account,
    counter: u64,
}

impl HandleDeriver {
    pub fn new(host: Account) -> Self {
        Self { host, counter: 0 }
    }

    /// Number of handles allocated so far
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Reset allocation to an earlier counter value
    pub fn rewind(&mut self, counter: u64) {
        self.counter = counter.min(self.counter);
    }

    /// Allocate the next handle for an operation result
    pub fn next(&mut self, op: &str, parts: &[&[u8]], ty: SecureType) -> Handle {
        self.counter += 1;

        let mut hasher = blake3::Hasher::new();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(self.host.as_bytes());
        hasher.update(&self.counter.to_le_bytes());
        hasher.update(op.as_bytes());
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }

        let mut bytes = *hasher.finalize().as_bytes();
        bytes[31] = ty.tag();
        Handle(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_handle_has_no_type() {
        assert!(Handle::ZERO.is_zero());
        assert_eq!(Handle::ZERO.secure_type(), None);
    }

    #[test]
    fn test_derived_handle_carries_type() {
        let mut deriver = HandleDeriver::new(Account::repeat(7));
        let h = deriver.next("trivial", &[&5u64.to_le_bytes()], SecureType::Uint64);
        assert_eq!(h.secure_type(), Some(SecureType::Uint64));
        assert!(!h.is_zero());
    }

    #[test]
    fn test_derivation_is_deterministic_and_unique() {
        let mut a = HandleDeriver::new(Account::repeat(1));
        let mut b = HandleDeriver::new(Account::repeat(1));

        let a1 = a.next("add", &[b"x"], SecureType::Uint64);
        let b1 = b.next("add", &[b"x"], SecureType::Uint64);
        assert_eq!(a1, b1);

        let a2 = a.next("add", &[b"x"], SecureType::Uint64);
        assert_ne!(a1, a2);
    }

    #[test]
    fn test_account_hex_roundtrip() {
        let acct = Account::repeat(0xAB);
        let parsed = Account::from_hex(&format!("0x{}", acct.to_hex())).unwrap();
        assert_eq!(acct, parsed);
        assert!(Account::ZERO.is_null());
    }
}
