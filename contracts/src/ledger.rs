//! Rewards ledger: encrypted running points and last outcome per account

use tracing::debug;
use veilcast_fhe::{Account, Handle, SecureCompute};

use crate::context::CallContext;
use crate::errors::SettlementResult;
use crate::settlement::Outcome;
use crate::state::EngineState;
use crate::types::LedgerEntry;

/// Credit `outcome.reward` and overwrite the last outcome
///
/// The entry is created on first settlement, starting from an encrypted zero.
/// Points saturate at `u64::MAX` instead of wrapping. The handles being
/// replaced are released once the invocation commits.
pub(crate) fn accrue<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    account: Account,
    outcome: &Outcome,
) -> SettlementResult<()> {
    let previous = ctx.state.points(&account);
    let current = match previous {
        Some(points) => points,
        None => ctx.capability.trivial_u64(0)?,
    };
    let sum = ctx.capability.add(current, outcome.reward)?;
    let overflow = ctx.capability.lt(sum, current)?;
    let max = ctx.capability.trivial_u64(u64::MAX)?;
    let points = ctx.capability.select(overflow, max, sum)?;

    for handle in [points, outcome.won] {
        ctx.capability.allow_this(handle)?;
        ctx.capability.allow(handle, account)?;
    }

    let superseded = [previous, ctx.state.last_outcome(&account)];
    for handle in superseded.into_iter().flatten() {
        ctx.capability.release(handle)?;
    }

    ctx.state.points.insert(account, points);
    ctx.state.last_outcome.insert(account, outcome.won);
    debug!(account = %account, points = %points, "Ledger updated");
    Ok(())
}

impl EngineState {
    /// Zero handle if the account never settled
    pub fn get_points(&self, account: &Account) -> Handle {
        self.points(account).unwrap_or(Handle::ZERO)
    }

    /// Zero handle if the account never settled
    pub fn get_last_outcome(&self, account: &Account) -> Handle {
        self.last_outcome(account).unwrap_or(Handle::ZERO)
    }

    pub fn ledger_entry(&self, account: &Account) -> Option<LedgerEntry> {
        Some(LedgerEntry {
            points: self.points(account)?,
            last_outcome: self.last_outcome(account)?,
        })
    }
}
