//! Veilcast: confidential prediction settlement
//!
//! This is the root crate that re-exports the veilcast components and runs
//! the settlement engine as a single-writer service.
//!
//! ## Architecture Overview
//!
//! Participants submit encrypted forecasts (target value and direction) for
//! the current period. The owner records one public reference value per
//! period. Once a period has elapsed, each participant settles their own
//! forecast: the win decision and the reward are computed over ciphertexts,
//! and only the participant is granted access to the result.
//!
//! ## Crate Organization
//!
//! - `veilcast-fhe`: handle-addressed encrypted values, access grants and
//!   input proofs over TFHE-rs
//! - `veilcast-contracts`: the settlement state machine
//! - `veilcast-storage`: invocation journal and state snapshots (redb)

pub mod recovery;
pub mod service;

// Re-export all crates for integration testing
pub use veilcast_contracts as contracts;
pub use veilcast_fhe as fhe;
pub use veilcast_storage as storage;

/// Veilcast protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use veilcast_contracts::prelude::*;
    pub use veilcast_contracts::{EngineState, ForecastHandles, ForecastMetadata, LatestReference};
    pub use veilcast_fhe::{
        Account, ClearCoprocessor, ExternalInput, Handle, InputAttestor, InputProof,
        InputVerifier, SecureCompute, TfheCoprocessor,
    };
    pub use veilcast_storage::{JournalEntry, Storage, StorageConfig};
    pub use crate::recovery::recover;
    pub use crate::service::{ServiceError, ServiceHandle, ServiceStatus, SettlementService};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
