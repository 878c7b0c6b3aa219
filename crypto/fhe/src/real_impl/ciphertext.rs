//! FHE ciphertext types with TFHE-rs
//!
//! [`FHEValue`] is what the TFHE backend stores behind each handle.

use tfhe::prelude::*;
use tfhe::{FheBool, FheUint64, FheUint8};

use super::keys::ClientKey;
use crate::capability::ClearValue;
use crate::handle::SecureType;
use crate::{FHEError, FHEResult};

/// Encrypted value of one of the supported types
#[derive(Clone)]
pub enum FHEValue {
    Bool(FheBool),
    Uint8(FheUint8),
    Uint64(FheUint64),
}

impl FHEValue {
    pub fn secure_type(&self) -> SecureType {
        match self {
            FHEValue::Bool(_) => SecureType::Bool,
            FHEValue::Uint8(_) => SecureType::Uint8,
            FHEValue::Uint64(_) => SecureType::Uint64,
        }
    }

    /// Encrypt with the client key
    pub fn encrypt(value: ClearValue, client_key: &ClientKey) -> Self {
        let key = client_key.inner();
        match value {
            ClearValue::Bool(b) => FHEValue::Bool(FheBool::encrypt(b, key)),
            ClearValue::Uint8(v) => FHEValue::Uint8(FheUint8::encrypt(v, key)),
            ClearValue::Uint64(v) => FHEValue::Uint64(FheUint64::encrypt(v, key)),
        }
    }

    /// Noise-free encryption of a public constant; needs no key
    pub fn trivial(value: ClearValue) -> Self {
        match value {
            ClearValue::Bool(b) => FHEValue::Bool(FheBool::encrypt_trivial(b)),
            ClearValue::Uint8(v) => FHEValue::Uint8(FheUint8::encrypt_trivial(v)),
            ClearValue::Uint64(v) => FHEValue::Uint64(FheUint64::encrypt_trivial(v)),
        }
    }

    pub fn decrypt(&self, client_key: &ClientKey) -> ClearValue {
        let key = client_key.inner();
        match self {
            FHEValue::Bool(ct) => ClearValue::Bool(ct.decrypt(key)),
            FHEValue::Uint8(ct) => {
                let v: u8 = ct.decrypt(key);
                ClearValue::Uint8(v)
            }
            FHEValue::Uint64(ct) => {
                let v: u64 = ct.decrypt(key);
                ClearValue::Uint64(v)
            }
        }
    }

    /// Expand a compact ciphertext produced by [`super::PublicKey::encrypt_input`]
    pub fn expand_compact(value_type: SecureType, bytes: &[u8]) -> FHEResult<Self> {
        let invalid = |e: bincode::Error| FHEError::InvalidCiphertext(e.to_string());
        match value_type {
            SecureType::Uint64 => {
                let compact: tfhe::CompactFheUint64 = bincode::deserialize(bytes).map_err(invalid)?;
                Ok(FHEValue::Uint64(compact.expand()))
            }
            SecureType::Uint8 => {
                let compact: tfhe::CompactFheUint8 = bincode::deserialize(bytes).map_err(invalid)?;
                Ok(FHEValue::Uint8(compact.expand()))
            }
            SecureType::Bool => Err(FHEError::InvalidCiphertext(
                "boolean inputs are not supported".into(),
            )),
        }
    }
}

impl std::fmt::Debug for FHEValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FHEValue").field(&self.secure_type()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real_impl::KeySet;
    use crate::FHEConfig;

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_encrypt_decrypt() {
        let keys = KeySet::generate(&FHEConfig { security_bits: 64 }).unwrap();

        for clear in [
            ClearValue::Uint64(12345),
            ClearValue::Uint8(2),
            ClearValue::Bool(true),
        ] {
            let ct = FHEValue::encrypt(clear, &keys.client);
            assert_eq!(ct.secure_type(), clear.secure_type());
            assert_eq!(ct.decrypt(&keys.client), clear);
        }
    }

    #[test]
    #[ignore = "TFHE key generation is slow"]
    fn test_compact_input_expands() {
        let keys = KeySet::generate(&FHEConfig { security_bits: 64 }).unwrap();
        let input = keys.public.encrypt_u64(u64::MAX / 2).unwrap();

        let value = FHEValue::expand_compact(input.value_type, &input.ciphertext).unwrap();
        assert_eq!(value.decrypt(&keys.client), ClearValue::Uint64(u64::MAX / 2));

        assert!(FHEValue::expand_compact(SecureType::Uint64, &[1, 2, 3]).is_err());
    }
}
