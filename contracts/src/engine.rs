//! Settlement engine: atomic application of ordered invocations
//!
//! Each invocation runs against a staged copy of the state. The copy replaces
//! the live state only when the handler succeeds; on failure the capability
//! rolls back the values it created as well, so a rejected invocation leaves
//! no trace and journal replay allocates the same handles.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use veilcast_fhe::{Account, ExternalInput, FHEError, Handle, SecureCompute};

use crate::clock::{PeriodClock, DEFAULT_PERIOD_LENGTH};
use crate::context::CallContext;
use crate::errors::{SettlementError, SettlementResult};
use crate::events::EngineEvent;
use crate::state::EngineState;
use crate::types::{
    ForecastHandles, ForecastMetadata, ForecastProof, LatestReference, Period, ReferenceRecord,
    Timestamp,
};
use crate::{access, forecast, reference, settlement};

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own account, holder of self-access grants
    pub host: Account,
    /// Seconds per period
    pub period_length: u64,
}

impl EngineConfig {
    pub fn new(host: Account) -> Self {
        Self {
            host,
            period_length: DEFAULT_PERIOD_LENGTH,
        }
    }

    pub fn with_period_length(mut self, period_length: u64) -> Self {
        self.period_length = period_length;
        self
    }
}

/// State transition requested by a caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    TransferOwnership {
        new_owner: Account,
    },
    RecordReference {
        value: u64,
    },
    SubmitForecast {
        target: ExternalInput,
        direction: ExternalInput,
        proof: ForecastProof,
        /// Native value transferred with the call
        stake: u128,
    },
    Confirm {
        period: Period,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::TransferOwnership { .. } => "transferOwnership",
            Call::RecordReference { .. } => "recordReference",
            Call::SubmitForecast { .. } => "submitForecast",
            Call::Confirm { .. } => "confirm",
        }
    }
}

/// One externally ordered invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub caller: Account,
    pub timestamp: Timestamp,
    pub call: Call,
}

impl Invocation {
    pub fn new(caller: Account, timestamp: Timestamp, call: Call) -> Self {
        Self {
            caller,
            timestamp,
            call,
        }
    }

    pub fn hash(&self) -> SettlementResult<[u8; 32]> {
        let bytes = bincode::serialize(self)?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }
}

/// Result of a committed invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub sequence: u64,
    pub tx_hash: [u8; 32],
    pub events: Vec<EngineEvent>,
    pub post_state_root: [u8; 32],
}

pub struct SettlementEngine<C: SecureCompute> {
    config: EngineConfig,
    clock: PeriodClock,
    state: EngineState,
    capability: C,
}

impl<C: SecureCompute> SettlementEngine<C> {
    /// Initialize a new engine owned by `owner`
    pub fn genesis(config: EngineConfig, owner: Account, capability: C) -> SettlementResult<Self> {
        let state = EngineState::genesis(owner)?;
        let engine = Self::from_parts(config, state, capability)?;
        info!(owner = %owner, host = %engine.config.host, "Engine initialized");
        Ok(engine)
    }

    /// Restore an engine around a previously committed state
    ///
    /// `capability` must hold every value the state references for settlement
    /// calls to succeed; owner calls never touch it.
    pub fn from_parts(
        config: EngineConfig,
        state: EngineState,
        capability: C,
    ) -> SettlementResult<Self> {
        if config.host.is_null() || capability.host() != config.host {
            return Err(SettlementError::Capability(FHEError::ConfigError(format!(
                "capability host {} does not match engine host {}",
                capability.host(),
                config.host
            ))));
        }
        let clock = PeriodClock::new(config.period_length);
        Ok(Self {
            config,
            clock,
            state,
            capability,
        })
    }

    /// Apply one invocation atomically
    pub fn apply(&mut self, invocation: &Invocation) -> SettlementResult<TxReceipt> {
        let tx_hash = invocation.hash()?;
        let result = self.execute(invocation);
        self.capability.end_transaction(result.is_ok());

        match result {
            Ok((staged, events)) => {
                let post_state_root = staged.state_root();
                self.state = staged;
                info!(
                    sequence = self.state.sequence,
                    call = invocation.call.name(),
                    caller = %invocation.caller,
                    root = %hex::encode(&post_state_root[..8]),
                    "Invocation committed"
                );
                Ok(TxReceipt {
                    sequence: self.state.sequence,
                    tx_hash,
                    events,
                    post_state_root,
                })
            }
            Err(err) => {
                warn!(
                    call = invocation.call.name(),
                    caller = %invocation.caller,
                    error = err.name(),
                    "Invocation rejected: {}",
                    err
                );
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        invocation: &Invocation,
    ) -> SettlementResult<(EngineState, Vec<EngineEvent>)> {
        let last = self.state.last_timestamp;
        if invocation.timestamp < last {
            return Err(SettlementError::TimestampRegression {
                last,
                got: invocation.timestamp,
            });
        }

        let mut staged = self.state.clone();
        let period = self.clock.period_at(invocation.timestamp);
        let mut ctx = CallContext::new(
            &mut staged,
            &mut self.capability,
            invocation.caller,
            invocation.timestamp,
            period,
        );

        match &invocation.call {
            Call::TransferOwnership { new_owner } => access::transfer_ownership(&mut ctx, *new_owner)?,
            Call::RecordReference { value } => reference::record_reference(&mut ctx, *value)?,
            Call::SubmitForecast {
                target,
                direction,
                proof,
                stake,
            } => forecast::submit_forecast(&mut ctx, target, direction, proof, *stake)?,
            Call::Confirm { period } => settlement::confirm(&mut ctx, *period)?,
        }

        let events = ctx.into_events();
        staged.last_timestamp = invocation.timestamp;
        staged.sequence += 1;
        Ok((staged, events))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    pub fn capability_mut(&mut self) -> &mut C {
        &mut self.capability
    }

    /// Split into configuration, committed state and capability
    pub fn into_parts(self) -> (EngineConfig, EngineState, C) {
        (self.config, self.state, self.capability)
    }

    pub fn current_period(&self, timestamp: Timestamp) -> Period {
        self.clock.period_at(timestamp)
    }

    pub fn clock(&self) -> PeriodClock {
        self.clock
    }

    pub fn owner(&self) -> Account {
        self.state.owner()
    }

    pub fn sequence(&self) -> u64 {
        self.state.sequence()
    }

    pub fn state_root(&self) -> [u8; 32] {
        self.state.state_root()
    }

    pub fn get_reference(&self, period: Period) -> ReferenceRecord {
        self.state.get_reference(period)
    }

    pub fn get_latest_reference(&self) -> LatestReference {
        self.state.get_latest_reference()
    }

    pub fn get_metadata(&self, account: &Account, period: Period) -> ForecastMetadata {
        self.state.get_metadata(account, period)
    }

    pub fn get_encrypted(&self, account: &Account, period: Period) -> ForecastHandles {
        self.state.get_encrypted(account, period)
    }

    pub fn get_points(&self, account: &Account) -> Handle {
        self.state.get_points(account)
    }

    pub fn get_last_outcome(&self, account: &Account) -> Handle {
        self.state.get_last_outcome(account)
    }
}

impl<C: SecureCompute> std::fmt::Debug for SettlementEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.config)
            .field("sequence", &self.state.sequence())
            .field("owner", &self.state.owner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use veilcast_fhe::{ClearBackend, ClearCoprocessor, InputVerifier};

    #[test]
    fn test_receipt_sequence_and_root() {
        let mut h = Harness::new();
        let genesis_root = h.engine.state_root();

        let inv = Invocation::new(owner(), at(1, 0), Call::RecordReference { value: 7 });
        let receipt = h.engine.apply(&inv).unwrap();

        assert_eq!(receipt.sequence, 1);
        assert_eq!(receipt.tx_hash, inv.hash().unwrap());
        assert_eq!(receipt.post_state_root, h.engine.state_root());
        assert_ne!(receipt.post_state_root, genesis_root);
        assert_eq!(h.engine.state().last_timestamp(), at(1, 0));
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let mut h = Harness::new();
        h.apply(owner(), at(1, 0), Call::RecordReference { value: 7 }).unwrap();
        let before = h.engine.state().clone();
        let allocated = h.engine.capability().handles_allocated();

        // Fails after the target was admitted: the direction proof is bogus
        let mut call = h.forecast(alice(), 10, 1, 5);
        if let Call::SubmitForecast { proof, .. } = &mut call {
            proof.direction.signature[0] ^= 0xFF;
        }
        assert!(h.apply(alice(), at(1, 5), call).is_err());

        assert_eq!(h.engine.state(), &before);
        assert_eq!(h.engine.sequence(), 1);
        assert_eq!(h.engine.capability().acl().transient_len(), 0);
        assert_eq!(h.engine.capability().handles_allocated(), allocated);
        assert_eq!(h.engine.capability().value_count(), 0);
    }

    #[test]
    fn test_timestamp_regression_rejected() {
        let mut h = Harness::new();
        h.apply(owner(), at(5, 0), Call::RecordReference { value: 7 }).unwrap();

        let err = h
            .apply(owner(), at(4, 0), Call::TransferOwnership { new_owner: alice() })
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::TimestampRegression { last: at(5, 0), got: at(4, 0) }
        );
        assert_eq!(h.engine.owner(), owner());
    }

    #[test]
    fn test_host_mismatch_rejected() {
        let cp = ClearCoprocessor::new(Account::repeat(0x77), ClearBackend, InputVerifier::new());
        let err = SettlementEngine::genesis(EngineConfig::new(host()), owner(), cp).unwrap_err();
        assert_eq!(err.name(), "Capability");
    }

    #[test]
    fn test_custom_period_length() {
        let cp = ClearCoprocessor::new(host(), ClearBackend, InputVerifier::new());
        let config = EngineConfig::new(host()).with_period_length(60);
        let mut engine = SettlementEngine::genesis(config, owner(), cp).unwrap();

        engine
            .apply(&Invocation::new(owner(), 125, Call::RecordReference { value: 3 }))
            .unwrap();
        assert_eq!(engine.get_latest_reference().period, 2);
        assert_eq!(engine.current_period(125), 2);
    }

    #[test]
    fn test_parts_roundtrip() {
        let mut h = Harness::new();
        h.apply(owner(), at(2, 0), Call::RecordReference { value: 11 }).unwrap();
        let root = h.engine.state_root();

        let (config, state, cp) = h.engine.into_parts();
        let restored = SettlementEngine::from_parts(config, state, cp).unwrap();
        assert_eq!(restored.state_root(), root);
        assert_eq!(restored.get_reference(2).value, 11);
    }
}
