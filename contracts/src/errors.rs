//! Error types for the settlement engine

use thiserror::Error;
use veilcast_fhe::FHEError;

use crate::types::{Period, Timestamp};

/// Reasons an invocation is rejected
///
/// Every variant aborts the invocation without any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    // Authorization
    #[error("Caller is not the owner")]
    OnlyOwner,

    #[error("New owner is the null account")]
    InvalidOwner,

    // Reference registry
    #[error("Reference value must be non-zero")]
    InvalidPrice,

    #[error("Reference already recorded for period {period} (last recorded {last_recorded})")]
    PriceAlreadyUpdated { period: Period, last_recorded: Period },

    // Forecast submission
    #[error("Stake required")]
    StakeRequired,

    #[error("Stake {0} exceeds the 64-bit range")]
    StakeTooLarge(u128),

    #[error("Forecast already submitted for period {0}")]
    PredictionExists(Period),

    #[error("Encrypted input rejected: {0}")]
    InputRejected(FHEError),

    // Settlement
    #[error("No forecast for period {0}")]
    PredictionMissing(Period),

    #[error("Forecast for period {0} already claimed")]
    PredictionAlreadyClaimed(Period),

    #[error("Period {period} has not elapsed (current period {current})")]
    ConfirmationTooEarly { period: Period, current: Period },

    #[error("No reference recorded for period {0}")]
    PriceNotAvailable(Period),

    // Engine
    #[error("Timestamp {got} precedes last applied timestamp {last}")]
    TimestampRegression { last: Timestamp, got: Timestamp },

    #[error("Capability error: {0}")]
    Capability(FHEError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SettlementError {
    /// Stable name for logs and journal inspection
    pub fn name(&self) -> &'static str {
        match self {
            SettlementError::OnlyOwner => "OnlyOwner",
            SettlementError::InvalidOwner => "InvalidOwner",
            SettlementError::InvalidPrice => "InvalidPrice",
            SettlementError::PriceAlreadyUpdated { .. } => "PriceAlreadyUpdated",
            SettlementError::StakeRequired => "StakeRequired",
            SettlementError::StakeTooLarge(_) => "StakeTooLarge",
            SettlementError::PredictionExists(_) => "PredictionExists",
            SettlementError::InputRejected(_) => "InputRejected",
            SettlementError::PredictionMissing(_) => "PredictionMissing",
            SettlementError::PredictionAlreadyClaimed(_) => "PredictionAlreadyClaimed",
            SettlementError::ConfirmationTooEarly { .. } => "ConfirmationTooEarly",
            SettlementError::PriceNotAvailable(_) => "PriceNotAvailable",
            SettlementError::TimestampRegression { .. } => "TimestampRegression",
            SettlementError::Capability(_) => "Capability",
            SettlementError::Serialization(_) => "Serialization",
        }
    }
}

impl From<FHEError> for SettlementError {
    fn from(err: FHEError) -> Self {
        if err.is_input_rejection() {
            SettlementError::InputRejected(err)
        } else {
            SettlementError::Capability(err)
        }
    }
}

impl From<bincode::Error> for SettlementError {
    fn from(err: bincode::Error) -> Self {
        SettlementError::Serialization(err.to_string())
    }
}

/// Result type for engine operations
pub type SettlementResult<T> = Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_are_classified() {
        let rejected: SettlementError = FHEError::InvalidInputProof("bad".into()).into();
        assert_eq!(rejected.name(), "InputRejected");

        let internal: SettlementError = FHEError::OperationFailed("boom".into()).into();
        assert_eq!(internal.name(), "Capability");
    }
}
