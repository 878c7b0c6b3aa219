//! Veilcast Storage Layer
//!
//! Provides persistent storage for the settlement engine.
//!
//! # Architecture
//!
//! The storage layer uses redb (an embedded database) for:
//! - The invocation journal (invocation + receipt per sequence number)
//! - A transaction hash index into the journal
//! - Engine state snapshots keyed by sequence number
//!
//! A committed invocation and the snapshot taken after it are written in a
//! single redb write transaction, so the journal and the latest snapshot
//! never disagree after a crash.

pub mod journal;
pub mod state;
mod error;

pub use error::{StorageError, StorageResult};
pub use journal::{JournalEntry, JournalStore};
pub use state::{StateSnapshot, StateStore};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use redb::Database;
use tracing::debug;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Database path
    pub path: PathBuf,
    /// Enable state snapshots
    pub enable_snapshots: bool,
    /// Snapshot interval (invocations)
    pub snapshot_interval: u64,
    /// Snapshots retained after pruning, zero keeps all
    pub snapshot_retention: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./veilcast_data/veilcast.db"),
            enable_snapshots: true,
            snapshot_interval: 1,
            snapshot_retention: 64,
        }
    }
}

impl StorageConfig {
    /// Whether a snapshot should accompany the entry at `sequence`
    pub fn snapshot_due(&self, sequence: u64) -> bool {
        self.enable_snapshots && self.snapshot_interval > 0 && sequence % self.snapshot_interval == 0
    }
}

/// Main storage interface
pub struct Storage {
    db: Arc<Database>,
    config: StorageConfig,
    pub state: StateStore,
    pub journal: JournalStore,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let config = StorageConfig {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Open storage with custom configuration
    pub fn with_config(config: StorageConfig) -> StorageResult<Self> {
        // Ensure directory exists
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&config.path)?;
        let db = Arc::new(db);

        // Initialize stores
        let state = StateStore::new(db.clone())?;
        let journal = JournalStore::new(db.clone())?;

        Ok(Self {
            db,
            config,
            state,
            journal,
        })
    }

    /// Get storage configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Persist a committed invocation, with an optional snapshot of the
    /// state it produced, in one write transaction
    pub fn record(
        &self,
        entry: &JournalEntry,
        snapshot: Option<&StateSnapshot>,
    ) -> StorageResult<()> {
        if let Some(snapshot) = snapshot {
            if snapshot.sequence != entry.sequence()
                || snapshot.state_root != entry.receipt.post_state_root
            {
                return Err(StorageError::SnapshotMismatch {
                    snapshot: snapshot.sequence,
                    entry: entry.sequence(),
                });
            }
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut journal = write_txn.open_table(journal::JOURNAL)?;
            let mut index = write_txn.open_multimap_table(journal::TX_INDEX)?;
            JournalStore::insert(&mut journal, &mut index, entry)?;

            if let Some(snapshot) = snapshot {
                let mut snapshots = write_txn.open_table(state::STATE_SNAPSHOTS)?;
                let mut latest = write_txn.open_table(state::LATEST_STATE)?;
                StateStore::insert(&mut snapshots, &mut latest, snapshot)?;
            }
        }
        write_txn.commit()?;

        debug!(
            sequence = entry.sequence(),
            snapshot = snapshot.is_some(),
            "Invocation persisted"
        );
        Ok(())
    }

    /// Persist a snapshot of a state that has no journal entry yet
    pub fn record_genesis(&self, snapshot: &StateSnapshot) -> StorageResult<()> {
        if snapshot.sequence != 0 {
            return Err(StorageError::InvalidData(format!(
                "genesis snapshot at sequence {}",
                snapshot.sequence
            )));
        }
        if self.journal.last_sequence()? != 0 {
            return Err(StorageError::InvalidData("journal is not empty".into()));
        }
        self.state.save_snapshot(snapshot)
    }

    /// Prune snapshots down to the configured retention
    pub fn prune(&self) -> StorageResult<usize> {
        if self.config.snapshot_retention == 0 {
            return Ok(0);
        }
        self.state.prune_snapshots(self.config.snapshot_retention)
    }

    /// Get database statistics
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            path: self.config.path.clone(),
            journal_len: self.journal.len().unwrap_or(0),
            last_sequence: self.journal.last_sequence().unwrap_or(0),
            state_snapshots: self.state.count().unwrap_or(0),
            latest_root: self.state.get_latest_root().unwrap_or(None),
        }
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub path: PathBuf,
    pub journal_len: u64,
    pub last_sequence: u64,
    pub state_snapshots: u64,
    pub latest_root: Option<[u8; 32]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use veilcast_contracts::{Call, EngineConfig, EngineState, Invocation, TxReceipt};
    use veilcast_fhe::Account;

    fn genesis_snapshot() -> StateSnapshot {
        StateSnapshot::new(
            EngineConfig::new(Account::repeat(0xEE)),
            EngineState::genesis(Account::repeat(0x0A)).unwrap(),
        )
    }

    /// Entry claiming the given sequence and root
    fn entry(sequence: u64, root: [u8; 32]) -> JournalEntry {
        let invocation = Invocation::new(
            Account::repeat(0x0A),
            sequence,
            Call::TransferOwnership { new_owner: Account::repeat(0x0B) },
        );
        let receipt = TxReceipt {
            sequence,
            tx_hash: invocation.hash().unwrap(),
            events: vec![],
            post_state_root: root,
        };
        JournalEntry::new(invocation, receipt)
    }

    #[test]
    fn test_storage_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let storage = Storage::open(&path).unwrap();
        let stats = storage.stats();

        assert_eq!(stats.journal_len, 0);
        assert_eq!(stats.last_sequence, 0);
        assert_eq!(stats.state_snapshots, 0);
        assert!(stats.latest_root.is_none());
    }

    #[test]
    fn test_storage_config() {
        let config = StorageConfig::default();
        assert!(config.enable_snapshots);
        assert!(config.snapshot_due(1));

        let sparse = StorageConfig { snapshot_interval: 4, ..StorageConfig::default() };
        assert!(!sparse.snapshot_due(3));
        assert!(sparse.snapshot_due(8));

        let disabled = StorageConfig { enable_snapshots: false, ..StorageConfig::default() };
        assert!(!disabled.snapshot_due(1));
    }

    #[test]
    fn test_record_writes_entry_and_snapshot() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("test.db")).unwrap();
        storage.record_genesis(&genesis_snapshot()).unwrap();

        let snapshot = genesis_snapshot();
        // The snapshot is taken at sequence 0, so relabel it for the entry
        let snapshot = StateSnapshot { sequence: 1, ..snapshot };
        let first = entry(1, snapshot.state_root);
        storage.record(&first, Some(&snapshot)).unwrap();

        assert_eq!(storage.journal.get(1).unwrap().unwrap(), first);
        assert_eq!(storage.state.get_latest_sequence().unwrap(), Some(1));
        assert_eq!(storage.stats().state_snapshots, 2);

        // Without a snapshot only the journal advances
        storage.record(&entry(2, [7u8; 32]), None).unwrap();
        assert_eq!(storage.journal.last_sequence().unwrap(), 2);
        assert_eq!(storage.state.get_latest_sequence().unwrap(), Some(1));
    }

    #[test]
    fn test_record_rejects_mismatched_snapshot() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("test.db")).unwrap();

        let snapshot = StateSnapshot { sequence: 1, ..genesis_snapshot() };
        let err = storage.record(&entry(1, [9u8; 32]), Some(&snapshot)).unwrap_err();
        assert!(matches!(err, StorageError::SnapshotMismatch { snapshot: 1, entry: 1 }));

        // Nothing was written
        assert_eq!(storage.journal.len().unwrap(), 0);
        assert_eq!(storage.state.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_append_rolls_back_snapshot() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("test.db")).unwrap();

        let snapshot = StateSnapshot { sequence: 3, ..genesis_snapshot() };
        let err = storage
            .record(&entry(3, snapshot.state_root), Some(&snapshot))
            .unwrap_err();
        assert!(matches!(err, StorageError::NonContiguous { expected: 1, got: 3 }));
        assert_eq!(storage.state.count().unwrap(), 0);
    }

    #[test]
    fn test_storage_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.record(&entry(1, [1u8; 32]), None).unwrap();
        }

        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.journal.last_sequence().unwrap(), 1);
        assert!(storage.record_genesis(&genesis_snapshot()).is_err());
    }
}
