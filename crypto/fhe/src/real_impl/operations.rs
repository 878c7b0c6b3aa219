//! Homomorphic operations with TFHE-rs
//!
//! Stateless; the caller must have installed a server key on this thread.

use super::ciphertext::FHEValue;
use crate::{FHEError, FHEResult};
use tfhe::prelude::*;
use tfhe::FheBool;

fn mismatch(op: &str) -> FHEError {
    FHEError::OperationFailed(format!("{}: operand types differ or are unsupported", op))
}

/// FHE operations on typed ciphertexts
pub struct FHEOps;

impl FHEOps {
    /// Wrapping addition
    pub fn add(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Uint64(x), FHEValue::Uint64(y)) => Ok(FHEValue::Uint64(x + y)),
            (FHEValue::Uint8(x), FHEValue::Uint8(y)) => Ok(FHEValue::Uint8(x + y)),
            _ => Err(mismatch("add")),
        }
    }

    pub fn gt(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Uint64(x), FHEValue::Uint64(y)) => Ok(FHEValue::Bool(x.gt(y))),
            (FHEValue::Uint8(x), FHEValue::Uint8(y)) => Ok(FHEValue::Bool(x.gt(y))),
            _ => Err(mismatch("gt")),
        }
    }

    pub fn lt(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Uint64(x), FHEValue::Uint64(y)) => Ok(FHEValue::Bool(x.lt(y))),
            (FHEValue::Uint8(x), FHEValue::Uint8(y)) => Ok(FHEValue::Bool(x.lt(y))),
            _ => Err(mismatch("lt")),
        }
    }

    pub fn eq(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Uint64(x), FHEValue::Uint64(y)) => Ok(FHEValue::Bool(x.eq(y))),
            (FHEValue::Uint8(x), FHEValue::Uint8(y)) => Ok(FHEValue::Bool(x.eq(y))),
            (FHEValue::Bool(x), FHEValue::Bool(y)) => Ok(FHEValue::Bool(Self::xnor(x, y))),
            _ => Err(mismatch("eq")),
        }
    }

    pub fn and(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Bool(x), FHEValue::Bool(y)) => Ok(FHEValue::Bool(x & y)),
            _ => Err(mismatch("and")),
        }
    }

    pub fn or(a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        match (a, b) {
            (FHEValue::Bool(x), FHEValue::Bool(y)) => Ok(FHEValue::Bool(x | y)),
            _ => Err(mismatch("or")),
        }
    }

    /// Conditional select: if cond then a else b
    pub fn select(cond: &FHEValue, a: &FHEValue, b: &FHEValue) -> FHEResult<FHEValue> {
        let FHEValue::Bool(c) = cond else {
            return Err(mismatch("select"));
        };
        match (a, b) {
            (FHEValue::Uint64(x), FHEValue::Uint64(y)) => {
                Ok(FHEValue::Uint64(c.if_then_else(x, y)))
            }
            (FHEValue::Uint8(x), FHEValue::Uint8(y)) => Ok(FHEValue::Uint8(c.if_then_else(x, y))),
            (FHEValue::Bool(x), FHEValue::Bool(y)) => {
                // (c & x) | (!c & y)
                let not_c = !c;
                Ok(FHEValue::Bool((c & x) | (&not_c & y)))
            }
            _ => Err(mismatch("select")),
        }
    }

    fn xnor(x: &FheBool, y: &FheBool) -> FheBool {
        !(x ^ y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ClearValue;
    use crate::real_impl::KeySet;
    use crate::FHEConfig;

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_homomorphic_ops() {
        let keys = KeySet::generate(&FHEConfig { security_bits: 64 }).unwrap();
        keys.server.install();

        let a = FHEValue::encrypt(ClearValue::Uint64(100), &keys.client);
        let b = FHEValue::encrypt(ClearValue::Uint64(50), &keys.client);

        let sum = FHEOps::add(&a, &b).unwrap();
        assert_eq!(sum.decrypt(&keys.client), ClearValue::Uint64(150));

        let gt = FHEOps::gt(&a, &b).unwrap();
        assert_eq!(gt.decrypt(&keys.client), ClearValue::Bool(true));

        let lt = FHEOps::lt(&a, &b).unwrap();
        let picked = FHEOps::select(&lt, &a, &b).unwrap();
        assert_eq!(picked.decrypt(&keys.client), ClearValue::Uint64(50));
    }

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_boolean_ops() {
        let keys = KeySet::generate(&FHEConfig { security_bits: 64 }).unwrap();
        keys.server.install();

        let t = FHEValue::encrypt(ClearValue::Bool(true), &keys.client);
        let f = FHEValue::encrypt(ClearValue::Bool(false), &keys.client);

        let and = FHEOps::and(&t, &f).unwrap();
        assert_eq!(and.decrypt(&keys.client), ClearValue::Bool(false));
        let or = FHEOps::or(&t, &f).unwrap();
        assert_eq!(or.decrypt(&keys.client), ClearValue::Bool(true));
        let eq = FHEOps::eq(&t, &t).unwrap();
        assert_eq!(eq.decrypt(&keys.client), ClearValue::Bool(true));
        let sel = FHEOps::select(&f, &t, &f).unwrap();
        assert_eq!(sel.decrypt(&keys.client), ClearValue::Bool(false));
    }
}
