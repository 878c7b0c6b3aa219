//! Reference registry: one authoritative value per period

use tracing::info;
use veilcast_fhe::SecureCompute;

use crate::access::only_owner;
use crate::context::CallContext;
use crate::errors::{SettlementError, SettlementResult};
use crate::events::EngineEvent;
use crate::state::EngineState;
use crate::types::{LatestReference, Period, ReferenceRecord};

pub fn record_reference<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    value: u64,
) -> SettlementResult<()> {
    only_owner(ctx.state, &ctx.caller)?;
    if value == 0 {
        return Err(SettlementError::InvalidPrice);
    }

    let period = ctx.period;
    let last_recorded = ctx.state.last_recorded_period;
    if period <= last_recorded {
        return Err(SettlementError::PriceAlreadyUpdated { period, last_recorded });
    }

    ctx.state.references.insert(
        period,
        ReferenceRecord {
            value,
            recorded_at: ctx.timestamp,
        },
    );
    ctx.state.last_recorded_period = period;

    info!(period, value, "Reference recorded");
    ctx.emit(EngineEvent::ReferenceRecorded {
        period,
        value,
        timestamp: ctx.timestamp,
    });
    Ok(())
}

impl EngineState {
    /// Zero-valued record when absent
    pub fn get_reference(&self, period: Period) -> ReferenceRecord {
        self.references.get(&period).copied().unwrap_or_default()
    }

    pub fn get_latest_reference(&self) -> LatestReference {
        let record = self.get_reference(self.last_recorded_period);
        LatestReference {
            period: self.last_recorded_period,
            value: record.value,
            recorded_at: record.recorded_at,
        }
    }
}
