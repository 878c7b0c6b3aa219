//! Settlement of elapsed forecasts
//!
//! Eligibility checks run on public data only. The win predicate and the
//! reward are computed by [`evaluate_outcome`] entirely through the secure
//! capability; no branch here depends on the target or the direction.

use tracing::info;
use veilcast_fhe::{FHEResult, Handle, SecureCompute};

use crate::context::CallContext;
use crate::errors::{SettlementError, SettlementResult};
use crate::events::EngineEvent;
use crate::ledger;
use crate::types::{Period, DIRECTION_ABOVE, DIRECTION_BELOW};

/// Encrypted result of evaluating one forecast
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Secure bool
    pub won: Handle,
    /// Secure u64: the stake when won, zero otherwise
    pub reward: Handle,
}

/// Obliviously decide a forecast against a reference value
///
/// A tie (reference equal to target) wins in neither direction, and a
/// direction outside {1, 2} never wins.
pub fn evaluate_outcome<C: SecureCompute>(
    capability: &mut C,
    reference: u64,
    target: Handle,
    direction: Handle,
    stake: u64,
) -> FHEResult<Outcome> {
    let reference = capability.trivial_u64(reference)?;
    let is_above = capability.gt(reference, target)?;
    let is_below = capability.lt(reference, target)?;

    let above = capability.trivial_u8(DIRECTION_ABOVE)?;
    let below = capability.trivial_u8(DIRECTION_BELOW)?;
    let wants_above = capability.eq(direction, above)?;
    let wants_below = capability.eq(direction, below)?;

    let won_above = capability.and(wants_above, is_above)?;
    let won_below = capability.and(wants_below, is_below)?;
    let won = capability.or(won_above, won_below)?;

    let stake = capability.trivial_u64(stake)?;
    let zero = capability.trivial_u64(0)?;
    let reward = capability.select(won, stake, zero)?;

    Ok(Outcome { won, reward })
}

pub fn confirm<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    period: Period,
) -> SettlementResult<()> {
    let account = ctx.caller;
    let forecast = match ctx.state.forecast(&account, period) {
        Some(f) if f.stake != 0 => *f,
        _ => return Err(SettlementError::PredictionMissing(period)),
    };
    if forecast.settled {
        return Err(SettlementError::PredictionAlreadyClaimed(period));
    }
    if period >= ctx.period {
        return Err(SettlementError::ConfirmationTooEarly {
            period,
            current: ctx.period,
        });
    }
    let reference = match ctx.state.reference(period) {
        Some(r) if r.is_present() => *r,
        _ => return Err(SettlementError::PriceNotAvailable(period)),
    };

    let outcome = evaluate_outcome(
        &mut *ctx.capability,
        reference.value,
        forecast.target,
        forecast.direction,
        forecast.stake,
    )?;
    ledger::accrue(ctx, account, &outcome)?;

    if let Some(f) = ctx.state.forecasts.get_mut(&(account, period)) {
        f.settled = true;
    }

    info!(account = %account, period, stake = forecast.stake, "Forecast confirmed");
    ctx.emit(EngineEvent::ForecastConfirmed {
        account,
        period,
        stake: forecast.stake,
    });
    Ok(())
}
