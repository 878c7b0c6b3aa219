//! CLI Commands

mod init;
mod owner;
mod query;
mod status;

pub use init::InitCommand;
pub use owner::{RecordReferenceCommand, TransferOwnershipCommand};
pub use query::{ForecastCommand, JournalCommand, ReferenceCommand};
pub use status::StatusCommand;

use std::path::PathBuf;

use anyhow::Context;
use serde_json::{json, Value};

use veilcast::recovery::restore_latest;
use veilcast_contracts::{EngineEvent, SettlementEngine, Timestamp, TxReceipt};
use veilcast_fhe::{Account, ClearBackend, ClearCoprocessor, InputVerifier};
use veilcast_storage::Storage;

use crate::config::{default_config_path, default_data_dir, VeilcastConfig};

/// Resolved data directory and configuration file
pub struct Workspace {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    pub fn resolve(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config_path = config.unwrap_or_else(|| default_config_path(&data_dir));
        Self { data_dir, config_path }
    }

    pub fn load_config(&self) -> anyhow::Result<VeilcastConfig> {
        VeilcastConfig::load(&self.config_path).with_context(|| {
            format!(
                "loading {} (run `veilcast init` first)",
                self.config_path.display()
            )
        })
    }

    pub fn open_storage(&self, config: &VeilcastConfig) -> anyhow::Result<Storage> {
        let storage_config = config.storage_config(&self.data_dir);
        let path = storage_config.path.clone();
        Storage::with_config(storage_config)
            .with_context(|| format!("opening storage at {}", path.display()))
    }
}

/// Engine restored from the newest snapshot
///
/// The operator tool holds no ciphertexts: it can record references, hand
/// over ownership and read public state, but not settle forecasts.
pub fn operator_engine(
    config: &VeilcastConfig,
    storage: &Storage,
) -> anyhow::Result<SettlementEngine<ClearCoprocessor>> {
    let capability = ClearCoprocessor::new(config.host()?, ClearBackend, InputVerifier::new());
    let engine = restore_latest(storage, capability)?;
    if engine.config() != &config.engine_config()? {
        anyhow::bail!("Stored engine configuration differs from the config file");
    }
    Ok(engine)
}

pub fn parse_account(value: &str) -> anyhow::Result<Account> {
    Account::from_hex(value).with_context(|| format!("invalid account {:?}", value))
}

/// Current wall-clock time in seconds
pub fn now() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn receipt_json(receipt: &TxReceipt) -> Value {
    json!({
        "sequence": receipt.sequence,
        "txHash": hex::encode(receipt.tx_hash),
        "postStateRoot": hex::encode(receipt.post_state_root),
        "events": receipt.events.iter().map(event_json).collect::<Vec<_>>(),
    })
}

pub fn event_json(event: &EngineEvent) -> Value {
    match event {
        EngineEvent::OwnershipTransferred { previous, new } => json!({
            "event": event.name(),
            "previous": previous.to_string(),
            "new": new.to_string(),
        }),
        EngineEvent::ReferenceRecorded { period, value, timestamp } => json!({
            "event": event.name(),
            "period": period,
            "value": value,
            "timestamp": timestamp,
        }),
        EngineEvent::ForecastSubmitted { account, period, stake, timestamp } => json!({
            "event": event.name(),
            "account": account.to_string(),
            "period": period,
            "stake": stake,
            "timestamp": timestamp,
        }),
        EngineEvent::ForecastConfirmed { account, period, stake } => json!({
            "event": event.name(),
            "account": account.to_string(),
            "period": period,
            "stake": stake,
        }),
    }
}

pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
