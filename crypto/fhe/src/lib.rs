//! Veilcast secure value capability
//!
//! Encrypted values addressed by handle, with access control and input
//! verification, backed by TFHE-rs.
//!
//! # Architecture:
//! - [`SecureCompute`]: the capability the settlement engine programs against
//! - [`Coprocessor`]: handle store, access lists and input verification,
//!   generic over a [`CiphertextBackend`]
//! - [`TfheBackend`]: real homomorphic evaluation
//! - [`ClearBackend`]: plaintext evaluation for tests and tooling
//!
//! # Keys:
//! - ClientKey: decryption (key management role only)
//! - ServerKey: homomorphic operations (engine thread)
//! - PublicKey: client-side encryption of external inputs

pub mod acl;
pub mod capability;
pub mod clear;
pub mod coprocessor;
pub mod errors;
pub mod handle;
pub mod input;
mod real_impl;

pub use acl::AccessControlList;
pub use capability::{CiphertextBackend, ClearValue, SecureCompute};
pub use clear::{ClearBackend, ClearInput};
pub use coprocessor::Coprocessor;
pub use errors::FHEError;
pub use handle::{Account, Handle, HandleDeriver, SecureType};
pub use input::{ExternalInput, InputAttestor, InputProof, InputVerifier};
pub use real_impl::*;

/// FHE configuration
#[derive(Clone, Debug)]
pub struct FHEConfig {
    /// Security parameter (bits); below 128 selects small test parameters
    pub security_bits: u32,
}

impl Default for FHEConfig {
    fn default() -> Self {
        Self { security_bits: 128 }
    }
}

/// Result type for FHE operations
pub type FHEResult<T> = Result<T, FHEError>;

/// Coprocessor over plaintext values
pub type ClearCoprocessor = Coprocessor<ClearBackend>;

/// Coprocessor over TFHE ciphertexts
pub type TfheCoprocessor = Coprocessor<TfheBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = FHEConfig::default();
        assert_eq!(config.security_bits, 128);
    }
}
