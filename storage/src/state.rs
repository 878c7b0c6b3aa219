//! State storage for engine snapshots

use std::sync::Arc;
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{Deserialize, Serialize};
use veilcast_contracts::{EngineConfig, EngineState};
use crate::{StorageError, StorageResult};

/// Table for state snapshots by sequence number
pub(crate) const STATE_SNAPSHOTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("state_snapshots");

/// Table for latest state root and sequence
pub(crate) const LATEST_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("latest_state");

/// Stored engine snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Sequence number of the last committed invocation
    pub sequence: u64,
    /// State root after that invocation
    pub state_root: [u8; 32],
    /// Engine configuration the state was produced under
    pub config: EngineConfig,
    /// Full engine state
    pub state: EngineState,
}

impl StateSnapshot {
    pub fn new(config: EngineConfig, state: EngineState) -> Self {
        Self {
            sequence: state.sequence(),
            state_root: state.state_root(),
            config,
            state,
        }
    }

    /// Check the stored root against the stored state
    pub fn verify(&self) -> StorageResult<()> {
        if self.state.state_root() != self.state_root || self.state.sequence() != self.sequence {
            return Err(StorageError::Corruption(format!(
                "snapshot {} does not match its state",
                self.sequence
            )));
        }
        Ok(())
    }
}

/// State storage interface
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Create new state store
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(STATE_SNAPSHOTS)?;
            let _ = write_txn.open_table(LATEST_STATE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Save a state snapshot and mark it latest
    pub fn save_snapshot(&self, snapshot: &StateSnapshot) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut snapshots = write_txn.open_table(STATE_SNAPSHOTS)?;
            let mut latest = write_txn.open_table(LATEST_STATE)?;
            Self::insert(&mut snapshots, &mut latest, snapshot)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    pub(crate) fn insert(
        snapshots: &mut Table<'_, '_, u64, &'static [u8]>,
        latest: &mut Table<'_, '_, &'static str, &'static [u8]>,
        snapshot: &StateSnapshot,
    ) -> StorageResult<()> {
        let encoded = bincode::serialize(snapshot)?;
        snapshots.insert(snapshot.sequence, encoded.as_slice())?;
        latest.insert("root", snapshot.state_root.as_slice())?;
        latest.insert("sequence", &snapshot.sequence.to_le_bytes()[..])?;
        Ok(())
    }

    /// Get snapshot by sequence number
    pub fn at(&self, sequence: u64) -> StorageResult<Option<StateSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE_SNAPSHOTS)?;

        let result = match table.get(sequence)? {
            Some(data) => Some(bincode::deserialize(data.value())?),
            None => None,
        };

        Ok(result)
    }

    /// Latest snapshot, if any was ever saved
    pub fn latest(&self) -> StorageResult<Option<StateSnapshot>> {
        match self.get_latest_sequence()? {
            Some(sequence) => match self.at(sequence)? {
                Some(snapshot) => Ok(Some(snapshot)),
                None => Err(StorageError::StateNotFound(sequence)),
            },
            None => Ok(None),
        }
    }

    /// Get latest state root
    pub fn get_latest_root(&self) -> StorageResult<Option<[u8; 32]>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LATEST_STATE)?;

        let result = match table.get("root")? {
            Some(data) => {
                let root: [u8; 32] = data.value().try_into().map_err(|_| {
                    StorageError::InvalidData("Invalid root bytes".into())
                })?;
                Some(root)
            }
            None => None,
        };

        Ok(result)
    }

    /// Get latest sequence with a snapshot
    pub fn get_latest_sequence(&self) -> StorageResult<Option<u64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LATEST_STATE)?;

        let result = match table.get("sequence")? {
            Some(data) => {
                let arr: [u8; 8] = data.value().try_into().map_err(|_| {
                    StorageError::InvalidData("Invalid sequence bytes".into())
                })?;
                Some(u64::from_le_bytes(arr))
            }
            None => None,
        };

        Ok(result)
    }

    /// Get snapshot count
    pub fn count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE_SNAPSHOTS)?;
        Ok(table.len()?)
    }

    /// Delete old snapshots, keeping the newest `keep`
    ///
    /// The genesis snapshot (sequence 0) is never pruned; journal replay
    /// starts from it.
    pub fn prune_snapshots(&self, keep: u64) -> StorageResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATE_SNAPSHOTS)?;
        let all: Vec<u64> = table
            .iter()?
            .filter_map(|r| r.ok().map(|(k, _)| k.value()))
            .filter(|sequence| *sequence != 0)
            .collect();
        drop(table);
        drop(read_txn);

        if all.len() as u64 <= keep {
            return Ok(0);
        }

        let delete_count = all.len() - keep as usize;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(STATE_SNAPSHOTS)?;
            for sequence in all.iter().take(delete_count) {
                table.remove(*sequence)?;
            }
        }
        write_txn.commit()?;

        Ok(delete_count)
    }
}
