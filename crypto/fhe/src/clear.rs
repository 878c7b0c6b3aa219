//! Plaintext backend
//!
//! Same handle, access list and proof semantics as the TFHE backend, with
//! values held in the clear. Used by tests, benchmarks and local tooling
//! where key generation and bootstrapping would dominate.

use crate::capability::{CiphertextBackend, ClearValue};
use crate::handle::SecureType;
use crate::input::ExternalInput;
use crate::{FHEError, FHEResult};

/// Wire form of a plaintext "ciphertext": little-endian value bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearInput {
    Bool(bool),
    Uint8(u8),
    Uint64(u64),
}

impl ClearInput {
    pub fn secure_type(&self) -> SecureType {
        match self {
            ClearInput::Bool(_) => SecureType::Bool,
            ClearInput::Uint8(_) => SecureType::Uint8,
            ClearInput::Uint64(_) => SecureType::Uint64,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ClearInput::Bool(b) => vec![*b as u8],
            ClearInput::Uint8(v) => vec![*v],
            ClearInput::Uint64(v) => v.to_le_bytes().to_vec(),
        }
    }

    pub fn into_external(self) -> ExternalInput {
        ExternalInput::new(self.secure_type(), self.encode())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ClearBackend;

impl ClearBackend {
    fn ints(lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<(u64, u64, SecureType)> {
        match (lhs, rhs) {
            (ClearValue::Uint64(a), ClearValue::Uint64(b)) => Ok((*a, *b, SecureType::Uint64)),
            (ClearValue::Uint8(a), ClearValue::Uint8(b)) => {
                Ok((*a as u64, *b as u64, SecureType::Uint8))
            }
            _ => Err(FHEError::OperationFailed("integer operands required".into())),
        }
    }

    fn bools(lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<(bool, bool)> {
        match (lhs, rhs) {
            (ClearValue::Bool(a), ClearValue::Bool(b)) => Ok((*a, *b)),
            _ => Err(FHEError::OperationFailed("boolean operands required".into())),
        }
    }
}

impl CiphertextBackend for ClearBackend {
    type Value = ClearValue;

    fn name(&self) -> &'static str {
        "clear"
    }

    fn expand_input(&self, input: &ExternalInput) -> FHEResult<ClearValue> {
        let ct = input.ciphertext.as_slice();
        // Width decides the type; the coprocessor checks it against the declared one
        match ct.len() {
            1 => match input.value_type {
                SecureType::Bool if ct[0] <= 1 => Ok(ClearValue::Bool(ct[0] == 1)),
                SecureType::Bool => Err(FHEError::InvalidCiphertext("bool out of range".into())),
                _ => Ok(ClearValue::Uint8(ct[0])),
            },
            8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(ct);
                Ok(ClearValue::Uint64(u64::from_le_bytes(bytes)))
            }
            n => Err(FHEError::InvalidCiphertext(format!("unexpected width {}", n))),
        }
    }

    fn trivial(&self, clear: ClearValue) -> FHEResult<ClearValue> {
        Ok(clear)
    }

    fn value_type(&self, value: &ClearValue) -> SecureType {
        value.secure_type()
    }

    fn add(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        // Wrapping, as on ciphertexts
        let (a, b, ty) = Self::ints(lhs, rhs)?;
        Ok(match ty {
            SecureType::Uint8 => ClearValue::Uint8((a as u8).wrapping_add(b as u8)),
            _ => ClearValue::Uint64(a.wrapping_add(b)),
        })
    }

    fn gt(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        let (a, b, _) = Self::ints(lhs, rhs)?;
        Ok(ClearValue::Bool(a > b))
    }

    fn lt(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        let (a, b, _) = Self::ints(lhs, rhs)?;
        Ok(ClearValue::Bool(a < b))
    }

    fn eq(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        Ok(ClearValue::Bool(lhs == rhs))
    }

    fn and(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        let (a, b) = Self::bools(lhs, rhs)?;
        Ok(ClearValue::Bool(a && b))
    }

    fn or(&self, lhs: &ClearValue, rhs: &ClearValue) -> FHEResult<ClearValue> {
        let (a, b) = Self::bools(lhs, rhs)?;
        Ok(ClearValue::Bool(a || b))
    }

    fn select(
        &self,
        cond: &ClearValue,
        if_true: &ClearValue,
        if_false: &ClearValue,
    ) -> FHEResult<ClearValue> {
        match cond {
            ClearValue::Bool(true) => Ok(*if_true),
            ClearValue::Bool(false) => Ok(*if_false),
            _ => Err(FHEError::OperationFailed("condition must be boolean".into())),
        }
    }

    fn decrypt(&self, value: &ClearValue) -> FHEResult<ClearValue> {
        Ok(*value)
    }
}
