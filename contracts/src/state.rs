//! Engine state
//!
//! The entire durable state of the engine: four keyed mappings plus the owner
//! and the last recorded period. Sorted maps keep iteration order, and so the
//! state root, independent of insertion history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use veilcast_fhe::{Account, Handle};

use crate::errors::{SettlementError, SettlementResult};
use crate::types::{Forecast, Period, ReferenceRecord, Timestamp};

const STATE_ROOT_DOMAIN: &[u8] = b"veilcast/state-root/v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub(crate) owner: Account,
    pub(crate) last_recorded_period: Period,
    pub(crate) references: BTreeMap<Period, ReferenceRecord>,
    pub(crate) forecasts: BTreeMap<(Account, Period), Forecast>,
    pub(crate) points: BTreeMap<Account, Handle>,
    pub(crate) last_outcome: BTreeMap<Account, Handle>,
    /// Engine bookkeeping, not covered by the state root
    pub(crate) last_timestamp: Timestamp,
    pub(crate) sequence: u64,
}

impl EngineState {
    /// Fresh state owned by the initializing caller
    pub fn genesis(owner: Account) -> SettlementResult<Self> {
        if owner.is_null() {
            return Err(SettlementError::InvalidOwner);
        }
        Ok(Self {
            owner,
            last_recorded_period: 0,
            references: BTreeMap::new(),
            forecasts: BTreeMap::new(),
            points: BTreeMap::new(),
            last_outcome: BTreeMap::new(),
            last_timestamp: 0,
            sequence: 0,
        })
    }

    pub fn owner(&self) -> Account {
        self.owner
    }

    pub fn last_recorded_period(&self) -> Period {
        self.last_recorded_period
    }

    pub fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }

    /// Number of committed invocations
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn reference(&self, period: Period) -> Option<&ReferenceRecord> {
        self.references.get(&period)
    }

    pub fn forecast(&self, account: &Account, period: Period) -> Option<&Forecast> {
        self.forecasts.get(&(*account, period))
    }

    pub fn points(&self, account: &Account) -> Option<Handle> {
        self.points.get(account).copied()
    }

    pub fn last_outcome(&self, account: &Account) -> Option<Handle> {
        self.last_outcome.get(account).copied()
    }

    pub fn references(&self) -> impl Iterator<Item = (Period, &ReferenceRecord)> {
        self.references.iter().map(|(p, r)| (*p, r))
    }

    pub fn forecasts(&self) -> impl Iterator<Item = (Account, Period, &Forecast)> {
        self.forecasts.iter().map(|((a, p), f)| (*a, *p, f))
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.len()
    }

    /// Accounts with a rewards ledger entry
    pub fn ledger_accounts(&self) -> usize {
        self.points.len()
    }

    /// Commitment to the business state
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STATE_ROOT_DOMAIN);
        hasher.update(self.owner.as_bytes());
        hasher.update(&self.last_recorded_period.to_le_bytes());

        hasher.update(&(self.references.len() as u64).to_le_bytes());
        for (period, record) in &self.references {
            hasher.update(&period.to_le_bytes());
            hasher.update(&record.value.to_le_bytes());
            hasher.update(&record.recorded_at.to_le_bytes());
        }

        hasher.update(&(self.forecasts.len() as u64).to_le_bytes());
        for ((account, period), forecast) in &self.forecasts {
            hasher.update(account.as_bytes());
            hasher.update(&period.to_le_bytes());
            hasher.update(forecast.target.as_bytes());
            hasher.update(forecast.direction.as_bytes());
            hasher.update(&forecast.stake.to_le_bytes());
            hasher.update(&forecast.submitted_at.to_le_bytes());
            hasher.update(&[forecast.settled as u8]);
        }

        for map in [&self.points, &self.last_outcome] {
            hasher.update(&(map.len() as u64).to_le_bytes());
            for (account, handle) in map {
                hasher.update(account.as_bytes());
                hasher.update(handle.as_bytes());
            }
        }

        *hasher.finalize().as_bytes()
    }

    /// Serialize state for persistence
    pub fn serialize(&self) -> SettlementResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize state from bytes
    pub fn deserialize(data: &[u8]) -> SettlementResult<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_rejects_null_owner() {
        assert_eq!(
            EngineState::genesis(Account::ZERO).unwrap_err(),
            SettlementError::InvalidOwner
        );
    }

    #[test]
    fn test_state_root_tracks_business_state() {
        let mut state = EngineState::genesis(Account::repeat(1)).unwrap();
        let root = state.state_root();

        // Bookkeeping does not move the root
        state.sequence = 9;
        state.last_timestamp = 1_000;
        assert_eq!(state.state_root(), root);

        state.references.insert(3, ReferenceRecord { value: 5, recorded_at: 10 });
        assert_ne!(state.state_root(), root);
    }

    #[test]
    fn test_state_serialization() {
        let mut state = EngineState::genesis(Account::repeat(2)).unwrap();
        state.references.insert(7, ReferenceRecord { value: 64_000, recorded_at: 99 });

        let bytes = state.serialize().unwrap();
        let restored = EngineState::deserialize(&bytes).unwrap();
        assert_eq!(state, restored);
        assert_eq!(state.state_root(), restored.state_root());
    }
}
