//! Notifications emitted by committed invocations

use serde::{Deserialize, Serialize};
use veilcast_fhe::Account;

use crate::types::{Period, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    OwnershipTransferred {
        previous: Account,
        new: Account,
    },
    ReferenceRecorded {
        period: Period,
        value: u64,
        timestamp: Timestamp,
    },
    ForecastSubmitted {
        account: Account,
        period: Period,
        stake: u64,
        timestamp: Timestamp,
    },
    ForecastConfirmed {
        account: Account,
        period: Period,
        stake: u64,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            EngineEvent::ReferenceRecorded { .. } => "ReferenceRecorded",
            EngineEvent::ForecastSubmitted { .. } => "ForecastSubmitted",
            EngineEvent::ForecastConfirmed { .. } => "ForecastConfirmed",
        }
    }
}
