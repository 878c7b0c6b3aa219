//! Veilcast settlement core
//!
//! The confidential prediction-settlement state machine: single-owner access
//! control, the reference and forecast registries, oblivious settlement and
//! the encrypted rewards ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Invocation Flow                         │
//! ├─────────────────────────────────────────────────────┤
//! │  Invocation { caller, timestamp, call }             │
//! │      ↓                                              │
//! │  SettlementEngine::apply (staged copy, atomic)      │
//! │      ↓                                              │
//! │  access / reference / forecast / settlement         │
//! │      ↓                                              │
//! │  SecureCompute (handles, grants, oblivious select)  │
//! │      ↓                                              │
//! │  EngineState (committed, state root)                │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod clock;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod forecast;
pub mod ledger;
pub mod reference;
pub mod settlement;
pub mod state;
pub mod types;

// Re-export main types
pub use clock::{PeriodClock, DEFAULT_PERIOD_LENGTH};
pub use engine::{Call, EngineConfig, Invocation, SettlementEngine, TxReceipt};
pub use errors::{SettlementError, SettlementResult};
pub use events::EngineEvent;
pub use settlement::{evaluate_outcome, Outcome};
pub use state::EngineState;
pub use types::{
    Forecast, ForecastHandles, ForecastMetadata, ForecastProof, LatestReference, LedgerEntry,
    Period, ReferenceRecord, Timestamp, DIRECTION_ABOVE, DIRECTION_BELOW,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::engine::{Call, EngineConfig, Invocation, SettlementEngine, TxReceipt};
    pub use crate::errors::{SettlementError, SettlementResult};
    pub use crate::events::EngineEvent;
    pub use crate::types::{ForecastProof, Period, Timestamp, DIRECTION_ABOVE, DIRECTION_BELOW};
}
