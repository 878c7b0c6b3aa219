//! Single-owner access control

use tracing::info;
use veilcast_fhe::{Account, SecureCompute};

use crate::context::CallContext;
use crate::errors::{SettlementError, SettlementResult};
use crate::events::EngineEvent;
use crate::state::EngineState;

/// Reject callers other than the owner
pub fn only_owner(state: &EngineState, caller: &Account) -> SettlementResult<()> {
    if state.owner != *caller {
        return Err(SettlementError::OnlyOwner);
    }
    Ok(())
}

pub fn transfer_ownership<C: SecureCompute>(
    ctx: &mut CallContext<'_, C>,
    new_owner: Account,
) -> SettlementResult<()> {
    only_owner(ctx.state, &ctx.caller)?;
    if new_owner.is_null() {
        return Err(SettlementError::InvalidOwner);
    }

    let previous = ctx.state.owner;
    ctx.state.owner = new_owner;

    info!(previous = %previous, new = %new_owner, "Ownership transferred");
    ctx.emit(EngineEvent::OwnershipTransferred {
        previous,
        new: new_owner,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Call;
    use crate::test_utils::*;

    #[test]
    fn test_transfer_ownership() {
        let mut h = Harness::new();
        let new_owner = Account::repeat(0x0B);

        let receipt = h
            .apply(owner(), at(1, 0), Call::TransferOwnership { new_owner })
            .unwrap();
        assert_eq!(
            receipt.events,
            vec![EngineEvent::OwnershipTransferred { previous: owner(), new: new_owner }]
        );
        assert_eq!(h.engine.owner(), new_owner);

        // The previous owner lost its rights
        let err = h
            .apply(owner(), at(1, 1), Call::RecordReference { value: 1 })
            .unwrap_err();
        assert_eq!(err, SettlementError::OnlyOwner);
    }

    #[test]
    fn test_transfer_to_null_rejected() {
        let mut h = Harness::new();
        let err = h
            .apply(owner(), at(1, 0), Call::TransferOwnership { new_owner: Account::ZERO })
            .unwrap_err();
        assert_eq!(err, SettlementError::InvalidOwner);
        assert_eq!(h.engine.owner(), owner());
    }

    #[test]
    fn test_only_owner_may_transfer() {
        let mut h = Harness::new();
        let err = h
            .apply(alice(), at(1, 0), Call::TransferOwnership { new_owner: alice() })
            .unwrap_err();
        assert_eq!(err, SettlementError::OnlyOwner);
    }
}
