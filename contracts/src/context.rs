//! Per-invocation execution context

use veilcast_fhe::{Account, SecureCompute};

use crate::events::EngineEvent;
use crate::state::EngineState;
use crate::types::{Period, Timestamp};

/// Everything a handler may touch while executing one invocation
///
/// `state` is a staged copy; the engine commits it only if the handler
/// returns `Ok`.
pub struct CallContext<'a, C: SecureCompute> {
    pub(crate) state: &'a mut EngineState,
    pub(crate) capability: &'a mut C,
    pub caller: Account,
    pub timestamp: Timestamp,
    /// Period containing `timestamp`
    pub period: Period,
    events: Vec<EngineEvent>,
}

impl<'a, C: SecureCompute> CallContext<'a, C> {
    pub fn new(
        state: &'a mut EngineState,
        capability: &'a mut C,
        caller: Account,
        timestamp: Timestamp,
        period: Period,
    ) -> Self {
        Self {
            state,
            capability,
            caller,
            timestamp,
            period,
            events: Vec::new(),
        }
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<EngineEvent> {
        self.events
    }
}
