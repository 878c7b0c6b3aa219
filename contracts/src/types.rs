//! Records held by the registries and the rewards ledger

use serde::{Deserialize, Serialize};
use veilcast_fhe::{Handle, InputProof};

/// Discrete settlement day
pub type Period = u64;

/// Seconds, supplied by the ordering layer with each invocation
pub type Timestamp = u64;

/// Encrypted direction meaning "reference ends above target"
pub const DIRECTION_ABOVE: u8 = 1;

/// Encrypted direction meaning "reference ends below target"
pub const DIRECTION_BELOW: u8 = 2;

/// Authoritative value recorded once for a period
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub value: u64,
    /// Zero means no record exists
    pub recorded_at: Timestamp,
}

impl ReferenceRecord {
    pub fn is_present(&self) -> bool {
        self.recorded_at != 0
    }
}

/// Most recent reference, as returned by the latest-reference accessor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestReference {
    pub period: Period,
    pub value: u64,
    pub recorded_at: Timestamp,
}

/// One account's forecast for one period
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub target: Handle,
    pub direction: Handle,
    pub stake: u64,
    pub submitted_at: Timestamp,
    pub settled: bool,
}

/// Public part of a forecast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub stake: u64,
    pub submitted_at: Timestamp,
    pub settled: bool,
}

/// Encrypted part of a forecast; zero handles when absent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastHandles {
    pub target: Handle,
    pub direction: Handle,
}

impl ForecastHandles {
    pub fn is_absent(&self) -> bool {
        self.target.is_zero() && self.direction.is_zero()
    }
}

/// Per-account rewards ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub points: Handle,
    pub last_outcome: Handle,
}

/// Proofs for the two encrypted fields of a forecast submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastProof {
    pub target: InputProof,
    pub direction: InputProof,
}
