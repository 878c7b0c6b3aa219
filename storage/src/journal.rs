//! Invocation journal
//!
//! Every committed invocation is appended with its receipt under the
//! receipt's sequence number. Sequences are contiguous from 1, so replaying
//! the journal in order into a fresh engine reproduces the committed state.

use std::sync::Arc;
use redb::{
    Database, MultimapTable, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, Table,
    TableDefinition,
};
use serde::{Deserialize, Serialize};
use veilcast_contracts::{Invocation, TxReceipt};
use crate::{StorageError, StorageResult};

/// Table for journal entries by sequence number
pub(crate) const JOURNAL: TableDefinition<u64, &[u8]> = TableDefinition::new("journal");

/// Transaction hash -> sequences
///
/// Identical invocations (same caller, timestamp and call) hash alike and
/// may all commit, so one hash can map to several entries.
pub(crate) const TX_INDEX: MultimapTableDefinition<&[u8], u64> =
    MultimapTableDefinition::new("tx_hash_index");

/// Committed invocation with its receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub invocation: Invocation,
    pub receipt: TxReceipt,
}

impl JournalEntry {
    pub fn new(invocation: Invocation, receipt: TxReceipt) -> Self {
        Self { invocation, receipt }
    }

    pub fn sequence(&self) -> u64 {
        self.receipt.sequence
    }
}

/// Journal storage interface
pub struct JournalStore {
    db: Arc<Database>,
}

impl JournalStore {
    /// Create new journal store
    pub fn new(db: Arc<Database>) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOURNAL)?;
            let _ = write_txn.open_multimap_table(TX_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Append the next entry
    pub fn append(&self, entry: &JournalEntry) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut journal = write_txn.open_table(JOURNAL)?;
            let mut index = write_txn.open_multimap_table(TX_INDEX)?;
            Self::insert(&mut journal, &mut index, entry)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    pub(crate) fn insert(
        journal: &mut Table<'_, '_, u64, &'static [u8]>,
        index: &mut MultimapTable<'_, '_, &'static [u8], u64>,
        entry: &JournalEntry,
    ) -> StorageResult<()> {
        let last = match journal.last()? {
            Some((key, _)) => key.value(),
            None => 0,
        };
        let expected = last + 1;
        if entry.sequence() != expected {
            return Err(StorageError::NonContiguous {
                expected,
                got: entry.sequence(),
            });
        }

        let encoded = bincode::serialize(entry)?;
        journal.insert(entry.sequence(), encoded.as_slice())?;
        index.insert(entry.receipt.tx_hash.as_slice(), entry.sequence())?;
        Ok(())
    }

    /// Get entry by sequence number
    pub fn get(&self, sequence: u64) -> StorageResult<Option<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL)?;

        let result = match table.get(sequence)? {
            Some(data) => Some(bincode::deserialize(data.value())?),
            None => None,
        };

        Ok(result)
    }

    /// Every entry whose receipt carries `hash`, in sequence order
    pub fn get_by_hash(&self, hash: &[u8; 32]) -> StorageResult<Vec<JournalEntry>> {
        let sequences = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_multimap_table(TX_INDEX)?;
            let mut sequences = Vec::new();
            for sequence in index.get(hash.as_slice())? {
                sequences.push(sequence?.value());
            }
            sequences
        };

        let mut entries = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            match self.get(sequence)? {
                Some(entry) => entries.push(entry),
                None => {
                    return Err(StorageError::Corruption(format!(
                        "hash index points at missing entry {}",
                        sequence
                    )))
                }
            }
        }
        Ok(entries)
    }

    /// Entries with `from <= sequence <= to`, in order
    pub fn range(&self, from: u64, to: u64) -> StorageResult<Vec<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL)?;

        let mut entries = Vec::new();
        if from > to {
            return Ok(entries);
        }
        for item in table.range(from..=to)? {
            let (_, data) = item?;
            entries.push(bincode::deserialize(data.value())?);
        }

        Ok(entries)
    }

    /// Every entry, in order
    pub fn entries(&self) -> StorageResult<Vec<JournalEntry>> {
        self.range(1, u64::MAX)
    }

    /// Sequence of the newest entry, zero for an empty journal
    pub fn last_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL)?;
        let last = match table.last()? {
            Some((key, _)) => key.value(),
            None => 0,
        };
        Ok(last)
    }

    /// Get total entry count
    pub fn len(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use veilcast_contracts::{Call, EngineEvent};
    use veilcast_fhe::Account;

    fn entry(sequence: u64) -> JournalEntry {
        let invocation = Invocation::new(
            Account::repeat(0x0A),
            sequence * 10,
            Call::RecordReference { value: sequence },
        );
        let receipt = TxReceipt {
            sequence,
            tx_hash: invocation.hash().unwrap(),
            events: vec![EngineEvent::ReferenceRecorded {
                period: sequence,
                value: sequence,
                timestamp: sequence * 10,
            }],
            post_state_root: [sequence as u8; 32],
        };
        JournalEntry::new(invocation, receipt)
    }

    fn open_store() -> (tempfile::TempDir, JournalStore) {
        let dir = tempdir().unwrap();
        let db = Database::create(dir.path().join("test.db")).unwrap();
        let store = JournalStore::new(Arc::new(db)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_append_and_get() {
        let (_dir, store) = open_store();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.last_sequence().unwrap(), 0);

        let first = entry(1);
        store.append(&first).unwrap();

        assert_eq!(store.get(1).unwrap().unwrap(), first);
        assert_eq!(store.get_by_hash(&first.receipt.tx_hash).unwrap(), vec![first.clone()]);
        assert!(store.get(2).unwrap().is_none());
        assert!(store.get_by_hash(&[0u8; 32]).unwrap().is_empty());
        assert_eq!(store.last_sequence().unwrap(), 1);
    }

    #[test]
    fn test_repeated_invocation_keeps_every_index_entry() {
        let (_dir, store) = open_store();
        let first = entry(1);
        // Same invocation committed again right after
        let mut second = first.clone();
        second.receipt.sequence = 2;
        second.receipt.post_state_root = [0xAB; 32];
        store.append(&first).unwrap();
        store.append(&second).unwrap();

        let found = store.get_by_hash(&first.receipt.tx_hash).unwrap();
        assert_eq!(found, vec![first, second]);
    }

    #[test]
    fn test_append_must_be_contiguous() {
        let (_dir, store) = open_store();

        let err = store.append(&entry(2)).unwrap_err();
        assert!(matches!(err, StorageError::NonContiguous { expected: 1, got: 2 }));

        store.append(&entry(1)).unwrap();
        let err = store.append(&entry(1)).unwrap_err();
        assert!(matches!(err, StorageError::NonContiguous { expected: 2, got: 1 }));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_range() {
        let (_dir, store) = open_store();
        for sequence in 1..=6 {
            store.append(&entry(sequence)).unwrap();
        }

        let middle: Vec<u64> = store.range(2, 4).unwrap().iter().map(|e| e.sequence()).collect();
        assert_eq!(middle, vec![2, 3, 4]);
        assert_eq!(store.entries().unwrap().len(), 6);
        assert!(store.range(5, 2).unwrap().is_empty());
    }
}
