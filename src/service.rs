//! Veilcast Settlement Service
//!
//! Runs one [`SettlementEngine`] on a dedicated thread that owns it
//! exclusively. Callers talk to it through a cloneable [`ServiceHandle`]:
//! every command is queued on an mpsc channel and answered on a oneshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SettlementService                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServiceHandle ──┐                                           │
//! │  ServiceHandle ──┼──► mpsc queue ──► engine thread           │
//! │  ServiceHandle ──┘                        │                  │
//! │                                  ┌────────▼────────┐         │
//! │                                  │ SettlementEngine│         │
//! │                                  │  apply / query  │         │
//! │                                  └────────┬────────┘         │
//! │                                  ┌────────▼────────┐         │
//! │                                  │ Storage (redb)  │         │
//! │                                  │ journal+snapshot│         │
//! │                                  └────────┬────────┘         │
//! │                          oneshot reply ◄──┘                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A committed invocation is persisted before its receipt is returned. If
//! persisting fails the in-memory engine is ahead of the journal, so the
//! service halts: further submissions are refused until it is recovered.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use veilcast_contracts::{
    ForecastHandles, ForecastMetadata, Invocation, LatestReference, Period, ReferenceRecord,
    SettlementEngine, SettlementError, TxReceipt,
};
use veilcast_fhe::{Account, Handle, SecureCompute};
use veilcast_storage::{JournalEntry, StateSnapshot, Storage, StorageError};

/// Maximum number of queued commands
pub const COMMAND_QUEUE_DEPTH: usize = 1024;

/// Errors from the settlement service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Service halted after a persistence failure")]
    Halted,
    #[error("Service stopped")]
    Stopped,
    #[error("Engine at sequence {engine} does not match journal at sequence {journal}")]
    OutOfSync { engine: u64, journal: u64 },
    #[error("Stored genesis does not match the engine")]
    GenesisMismatch,
    #[error("Journal replay diverged at sequence {sequence}: {reason}")]
    ReplayDivergence { sequence: u64, reason: String },
    #[error("Failed to start engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Snapshot of the service's committed position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    pub sequence: u64,
    pub state_root: [u8; 32],
    pub owner: Account,
    pub last_recorded_period: Period,
    /// Newest journal sequence, `None` without storage
    pub persisted_sequence: Option<u64>,
    pub halted: bool,
}

enum Command {
    Submit {
        invocation: Invocation,
        reply: oneshot::Sender<ServiceResult<TxReceipt>>,
    },
    LatestReference {
        reply: oneshot::Sender<LatestReference>,
    },
    Reference {
        period: Period,
        reply: oneshot::Sender<ReferenceRecord>,
    },
    ForecastMetadata {
        account: Account,
        period: Period,
        reply: oneshot::Sender<ForecastMetadata>,
    },
    ForecastHandles {
        account: Account,
        period: Period,
        reply: oneshot::Sender<ForecastHandles>,
    },
    Points {
        account: Account,
        reply: oneshot::Sender<Handle>,
    },
    LastOutcome {
        account: Account,
        reply: oneshot::Sender<Handle>,
    },
    StateRoot {
        reply: oneshot::Sender<[u8; 32]>,
    },
    Status {
        reply: oneshot::Sender<ServiceStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<ServiceStatus>,
    },
}

/// Entry point for running an engine as a service
pub struct SettlementService;

impl SettlementService {
    /// Move `engine` onto its own thread and start processing commands
    ///
    /// With `storage`, the engine must be at the journal's last sequence
    /// (see [`crate::recovery`]); an empty store receives the genesis snapshot.
    pub fn spawn<C>(
        engine: SettlementEngine<C>,
        storage: Option<Storage>,
    ) -> ServiceResult<ServiceHandle>
    where
        C: SecureCompute + Send + 'static,
    {
        if let Some(storage) = &storage {
            prepare_storage(&engine, storage)?;
        }

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let worker = Worker {
            engine,
            storage,
            halted: false,
        };
        std::thread::Builder::new()
            .name("veilcast-engine".into())
            .spawn(move || worker.run(rx))?;

        Ok(ServiceHandle { tx })
    }
}

fn prepare_storage<C: SecureCompute>(
    engine: &SettlementEngine<C>,
    storage: &Storage,
) -> ServiceResult<()> {
    let journal = storage.journal.last_sequence()?;
    if journal != engine.sequence() {
        return Err(ServiceError::OutOfSync {
            engine: engine.sequence(),
            journal,
        });
    }

    if journal == 0 {
        match storage.state.at(0)? {
            Some(genesis) if genesis.state_root != engine.state_root() => {
                return Err(ServiceError::GenesisMismatch);
            }
            Some(_) => {}
            None => {
                let genesis = StateSnapshot::new(engine.config().clone(), engine.state().clone());
                storage.record_genesis(&genesis)?;
                info!(root = %hex_prefix(&genesis.state_root), "Genesis snapshot stored");
            }
        }
    }
    Ok(())
}

struct Worker<C: SecureCompute> {
    engine: SettlementEngine<C>,
    storage: Option<Storage>,
    halted: bool,
}

impl<C: SecureCompute> Worker<C> {
    fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(
            sequence = self.engine.sequence(),
            persistent = self.storage.is_some(),
            "Settlement service started"
        );

        while let Some(command) = rx.blocking_recv() {
            match command {
                Command::Submit { invocation, reply } => {
                    let _ = reply.send(self.submit(invocation));
                }
                Command::LatestReference { reply } => {
                    let _ = reply.send(self.engine.get_latest_reference());
                }
                Command::Reference { period, reply } => {
                    let _ = reply.send(self.engine.get_reference(period));
                }
                Command::ForecastMetadata { account, period, reply } => {
                    let _ = reply.send(self.engine.get_metadata(&account, period));
                }
                Command::ForecastHandles { account, period, reply } => {
                    let _ = reply.send(self.engine.get_encrypted(&account, period));
                }
                Command::Points { account, reply } => {
                    let _ = reply.send(self.engine.get_points(&account));
                }
                Command::LastOutcome { account, reply } => {
                    let _ = reply.send(self.engine.get_last_outcome(&account));
                }
                Command::StateRoot { reply } => {
                    let _ = reply.send(self.engine.state_root());
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                Command::Shutdown { reply } => {
                    rx.close();
                    // Commands queued before the shutdown are still answered
                    while let Ok(command) = rx.try_recv() {
                        if let Command::Submit { invocation, reply } = command {
                            let _ = reply.send(self.submit(invocation));
                        }
                    }
                    self.finish();
                    let _ = reply.send(self.status());
                    return;
                }
            }
        }

        self.finish();
    }

    fn submit(&mut self, invocation: Invocation) -> ServiceResult<TxReceipt> {
        if self.halted {
            return Err(ServiceError::Halted);
        }

        let receipt = self.engine.apply(&invocation)?;

        if let Some(storage) = &self.storage {
            let snapshot = storage.config().snapshot_due(receipt.sequence).then(|| {
                StateSnapshot::new(self.engine.config().clone(), self.engine.state().clone())
            });
            let entry = JournalEntry::new(invocation, receipt.clone());
            if let Err(err) = storage.record(&entry, snapshot.as_ref()) {
                self.halted = true;
                error!(sequence = receipt.sequence, "Persisting invocation failed: {}", err);
                return Err(err.into());
            }
        }

        Ok(receipt)
    }

    fn status(&self) -> ServiceStatus {
        let persisted_sequence = self
            .storage
            .as_ref()
            .and_then(|storage| storage.journal.last_sequence().ok());
        ServiceStatus {
            sequence: self.engine.sequence(),
            state_root: self.engine.state_root(),
            owner: self.engine.owner(),
            last_recorded_period: self.engine.state().last_recorded_period(),
            persisted_sequence,
            halted: self.halted,
        }
    }

    fn finish(&self) {
        if let Some(storage) = &self.storage {
            match storage.prune() {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "Old snapshots pruned"),
                Err(err) => warn!("Snapshot pruning failed: {}", err),
            }
        }
        info!(
            sequence = self.engine.sequence(),
            root = %hex_prefix(&self.engine.state_root()),
            "Settlement service stopped"
        );
    }
}

fn hex_prefix(root: &[u8; 32]) -> String {
    hex::encode(&root[..8])
}

/// Cloneable handle to a running settlement service
#[derive(Clone, Debug)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
}

impl ServiceHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ServiceResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Apply one invocation; resolves once it is committed and persisted
    pub async fn submit(&self, invocation: Invocation) -> ServiceResult<TxReceipt> {
        self.request(|reply| Command::Submit { invocation, reply })
            .await?
    }

    pub async fn latest_reference(&self) -> ServiceResult<LatestReference> {
        self.request(|reply| Command::LatestReference { reply }).await
    }

    pub async fn reference(&self, period: Period) -> ServiceResult<ReferenceRecord> {
        self.request(|reply| Command::Reference { period, reply }).await
    }

    pub async fn forecast_metadata(
        &self,
        account: Account,
        period: Period,
    ) -> ServiceResult<ForecastMetadata> {
        self.request(|reply| Command::ForecastMetadata { account, period, reply })
            .await
    }

    pub async fn forecast_handles(
        &self,
        account: Account,
        period: Period,
    ) -> ServiceResult<ForecastHandles> {
        self.request(|reply| Command::ForecastHandles { account, period, reply })
            .await
    }

    pub async fn points(&self, account: Account) -> ServiceResult<Handle> {
        self.request(|reply| Command::Points { account, reply }).await
    }

    pub async fn last_outcome(&self, account: Account) -> ServiceResult<Handle> {
        self.request(|reply| Command::LastOutcome { account, reply }).await
    }

    pub async fn state_root(&self) -> ServiceResult<[u8; 32]> {
        self.request(|reply| Command::StateRoot { reply }).await
    }

    pub async fn status(&self) -> ServiceResult<ServiceStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Drain queued submissions and stop the engine thread
    pub async fn shutdown(&self) -> ServiceResult<ServiceStatus> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
