//! Query Commands - read public engine state and the journal

use anyhow::Context;
use clap::Args;
use serde_json::json;

use veilcast_contracts::Period;
use veilcast_storage::{JournalEntry, Storage};

use super::{operator_engine, parse_account, print_json, receipt_json, Workspace};

/// Show a recorded reference value
#[derive(Args)]
pub struct ReferenceCommand {
    /// Period to show (defaults to the latest recorded)
    #[arg(long)]
    period: Option<Period>,
}

impl ReferenceCommand {
    pub fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let config = workspace.load_config()?;
        let storage = workspace.open_storage(&config)?;
        let engine = operator_engine(&config, &storage)?;

        let value = match self.period {
            Some(period) => {
                let record = engine.get_reference(period);
                json!({
                    "period": period,
                    "value": record.value,
                    "recordedAt": record.recorded_at,
                    "present": record.is_present(),
                })
            }
            None => {
                let latest = engine.get_latest_reference();
                json!({
                    "period": latest.period,
                    "value": latest.value,
                    "recordedAt": latest.recorded_at,
                    "present": latest.recorded_at != 0,
                })
            }
        };
        print_json(&value)
    }
}

/// Show an account's forecast for a period
///
/// Only public metadata and handles are shown; the target and direction
/// stay encrypted.
#[derive(Args)]
pub struct ForecastCommand {
    /// Forecasting account (hex)
    #[arg(long)]
    account: String,

    /// Period of the forecast
    #[arg(long)]
    period: Period,
}

impl ForecastCommand {
    pub fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let account = parse_account(&self.account)?;
        let config = workspace.load_config()?;
        let storage = workspace.open_storage(&config)?;
        let engine = operator_engine(&config, &storage)?;

        let metadata = engine.get_metadata(&account, self.period);
        let handles = engine.get_encrypted(&account, self.period);
        print_json(&json!({
            "account": account.to_string(),
            "period": self.period,
            "stake": metadata.stake,
            "submittedAt": metadata.submitted_at,
            "settled": metadata.settled,
            "targetHandle": handles.target.to_string(),
            "directionHandle": handles.direction.to_string(),
            "pointsHandle": engine.get_points(&account).to_string(),
            "lastOutcomeHandle": engine.get_last_outcome(&account).to_string(),
        }))
    }
}

/// List committed invocations
#[derive(Args)]
pub struct JournalCommand {
    /// First sequence number to show
    #[arg(long, default_value_t = 1)]
    from: u64,

    /// Maximum number of entries
    #[arg(long, default_value_t = 20)]
    limit: u64,

    /// Only entries with this transaction hash (hex)
    #[arg(long, conflicts_with_all = ["from", "limit"])]
    hash: Option<String>,
}

impl JournalCommand {
    pub fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let config = workspace.load_config()?;
        let storage = workspace.open_storage(&config)?;

        let listed: Vec<_> = self
            .entries(&storage)?
            .iter()
            .map(|entry| {
                json!({
                    "call": entry.invocation.call.name(),
                    "caller": entry.invocation.caller.to_string(),
                    "timestamp": entry.invocation.timestamp,
                    "receipt": receipt_json(&entry.receipt),
                })
            })
            .collect();
        print_json(&json!(listed))
    }

    fn entries(&self, storage: &Storage) -> anyhow::Result<Vec<JournalEntry>> {
        if let Some(hash) = &self.hash {
            let hash = parse_hash(hash)?;
            return Ok(storage.journal.get_by_hash(&hash)?);
        }
        if self.limit == 0 {
            return Ok(Vec::new());
        }
        let to = self.from.saturating_add(self.limit - 1);
        Ok(storage.journal.range(self.from, to)?)
    }
}

fn parse_hash(value: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .with_context(|| format!("invalid transaction hash {:?}", value))?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("transaction hash must be 32 bytes"))
}
