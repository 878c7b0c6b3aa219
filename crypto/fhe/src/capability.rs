//! The secure value capability consumed by the settlement engine
//!
//! [`SecureCompute`] is the only surface the engine sees. Values are
//! addressed by [`Handle`]; nothing here returns a plaintext derived from a
//! secret operand.

use serde::{Deserialize, Serialize};

use crate::handle::{Account, Handle, SecureType};
use crate::input::{ExternalInput, InputProof};
use crate::FHEResult;

/// Operations on encrypted values, addressed by handle
pub trait SecureCompute {
    /// Account of the program this capability computes for
    fn host(&self) -> Account;

    /// Verify an external ciphertext and its proof, admitting it as a handle
    fn verify_input(
        &mut self,
        input: &ExternalInput,
        proof: &InputProof,
        sender: Account,
    ) -> FHEResult<Handle>;

    /// Encrypt a public constant
    fn trivial_u64(&mut self, value: u64) -> FHEResult<Handle>;

    /// Encrypt a public constant
    fn trivial_u8(&mut self, value: u8) -> FHEResult<Handle>;

    fn add(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    /// Encrypted `lhs > rhs`
    fn gt(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    /// Encrypted `lhs < rhs`
    fn lt(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    /// Encrypted `lhs == rhs`
    fn eq(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    fn and(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    fn or(&mut self, lhs: Handle, rhs: Handle) -> FHEResult<Handle>;

    /// Oblivious selection: `cond ? if_true : if_false`
    fn select(&mut self, cond: Handle, if_true: Handle, if_false: Handle) -> FHEResult<Handle>;

    /// Persistently grant `account` use and decryption rights on `handle`
    fn allow(&mut self, handle: Handle, account: Account) -> FHEResult<()>;

    /// Persistently grant the host itself rights on `handle`
    fn allow_this(&mut self, handle: Handle) -> FHEResult<()> {
        let host = self.host();
        self.allow(handle, host)
    }

    fn is_allowed(&self, handle: Handle, account: Account) -> bool;

    /// Discard `handle` and all its grants when the invocation commits
    ///
    /// For values the invocation supersedes. A rollback keeps them.
    fn release(&mut self, handle: Handle) -> FHEResult<()>;

    /// Drop grants scoped to the invocation that just finished
    ///
    /// On `commit`, values created by the invocation that nobody holds a
    /// persistent grant on are freed, together with released values.
    /// Without `commit`, every value and persistent grant the invocation
    /// created is discarded instead, and handle allocation rewinds to where
    /// the invocation started.
    fn end_transaction(&mut self, commit: bool);
}

/// A decrypted value, only ever produced by the user decryption workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearValue {
    Bool(bool),
    Uint8(u8),
    Uint64(u64),
}

impl ClearValue {
    pub fn secure_type(&self) -> SecureType {
        match self {
            ClearValue::Bool(_) => SecureType::Bool,
            ClearValue::Uint8(_) => SecureType::Uint8,
            ClearValue::Uint64(_) => SecureType::Uint64,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClearValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            ClearValue::Uint8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ClearValue::Uint64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Ciphertext arithmetic a [`crate::Coprocessor`] delegates to
///
/// Implementations assume operand types were already checked by the caller.
pub trait CiphertextBackend {
    type Value: Clone;

    fn name(&self) -> &'static str;

    /// Deserialize the ciphertext carried by an external input
    fn expand_input(&self, input: &ExternalInput) -> FHEResult<Self::Value>;

    fn trivial(&self, clear: ClearValue) -> FHEResult<Self::Value>;

    fn value_type(&self, value: &Self::Value) -> SecureType;

    fn add(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn gt(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn lt(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn eq(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn and(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn or(&self, lhs: &Self::Value, rhs: &Self::Value) -> FHEResult<Self::Value>;

    fn select(
        &self,
        cond: &Self::Value,
        if_true: &Self::Value,
        if_false: &Self::Value,
    ) -> FHEResult<Self::Value>;

    fn decrypt(&self, value: &Self::Value) -> FHEResult<ClearValue>;
}
