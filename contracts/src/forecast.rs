//! Forecast registry: one encrypted forecast per account and period

use tracing::{debug, info};
use veilcast_fhe::{Account, ExternalInput, FHEError, Handle, InputProof, SecureCompute, SecureType};

use crate::context::CallContext;
use crate::errors::{SettlementError, SettlementResult};
use crate::events::EngineEvent;
use crate::state::EngineState;
use crate::types::{Forecast, ForecastHandles, ForecastMetadata, ForecastProof, Period};

pub fn submit_forecast<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    target: &ExternalInput,
    direction: &ExternalInput,
    proof: &ForecastProof,
    stake: u128,
) -> SettlementResult<()> {
    if stake == 0 {
        return Err(SettlementError::StakeRequired);
    }
    let stake = u64::try_from(stake).map_err(|_| SettlementError::StakeTooLarge(stake))?;

    let account = ctx.caller;
    let period = ctx.period;
    if let Some(existing) = ctx.state.forecast(&account, period) {
        if existing.stake != 0 {
            return Err(SettlementError::PredictionExists(period));
        }
    }

    let target = admit(ctx, target, &proof.target, SecureType::Uint64)?;
    let direction = admit(ctx, direction, &proof.direction, SecureType::Uint8)?;

    for handle in [target, direction] {
        ctx.capability.allow_this(handle)?;
        ctx.capability.allow(handle, account)?;
    }

    ctx.state.forecasts.insert(
        (account, period),
        Forecast {
            target,
            direction,
            stake,
            submitted_at: ctx.timestamp,
            settled: false,
        },
    );

    info!(account = %account, period, stake, "Forecast submitted");
    ctx.emit(EngineEvent::ForecastSubmitted {
        account,
        period,
        stake,
        timestamp: ctx.timestamp,
    });
    Ok(())
}

/// Verify one external input and check it carries the expected type
fn admit<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    input: &ExternalInput,
    proof: &InputProof,
    expected: SecureType,
) -> SettlementResult<Handle> {
    if input.value_type != expected {
        return Err(SettlementError::InputRejected(FHEError::TypeMismatch {
            expected,
            got: input.value_type,
        }));
    }
    let handle = ctx.capability.verify_input(input, proof, ctx.caller)?;
    debug!(handle = %handle, ?expected, "External input admitted");
    Ok(handle)
}

impl EngineState {
    /// `(stake, submitted_at, settled)`, zeros when absent
    pub fn get_metadata(&self, account: &Account, period: Period) -> ForecastMetadata {
        self.forecast(account, period)
            .map(|f| ForecastMetadata {
                stake: f.stake,
                submitted_at: f.submitted_at,
                settled: f.settled,
            })
            .unwrap_or_default()
    }

    /// Encrypted target and direction, zero handles when absent
    pub fn get_encrypted(&self, account: &Account, period: Period) -> ForecastHandles {
        self.forecast(account, period)
            .map(|f| ForecastHandles {
                target: f.target,
                direction: f.direction,
            })
            .unwrap_or_default()
    }
}
