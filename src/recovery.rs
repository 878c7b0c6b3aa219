//! Engine recovery from storage
//!
//! Snapshots hold the committed [`EngineState`], which references encrypted
//! values by handle only. The values themselves live in the capability, so
//! a snapshot alone restores an engine that can serve owner calls and reads
//! but cannot settle. [`recover`] rebuilds everything by replaying the
//! journal from the genesis snapshot; handle derivation is deterministic, so
//! the replayed capability ends up holding the same handles.
//!
//! [`EngineState`]: veilcast_contracts::EngineState

use tracing::{info, warn};

use veilcast_contracts::SettlementEngine;
use veilcast_fhe::SecureCompute;
use veilcast_storage::{JournalEntry, StateSnapshot, Storage, StorageError};

use crate::service::{ServiceError, ServiceResult};

/// Rebuild the engine by replaying the whole journal into `capability`
///
/// `capability` must be fresh and trust the same input attestors as the
/// capability that produced the journal.
pub fn recover<C: SecureCompute>(
    storage: &Storage,
    capability: C,
) -> ServiceResult<SettlementEngine<C>> {
    let genesis = storage.state.at(0)?.ok_or(StorageError::StateNotFound(0))?;
    let engine = replay_from(storage, genesis, capability)?;
    check_latest(storage, &engine)?;

    info!(
        sequence = engine.sequence(),
        root = %hex::encode(&engine.state_root()[..8]),
        "Engine recovered from journal"
    );
    Ok(engine)
}

/// Restore the engine from the newest snapshot, replaying only the journal
/// tail written after it
///
/// The capability starts empty: the restored engine serves reads and owner
/// calls, but settling a forecast submitted before the snapshot fails with
/// an unknown handle.
pub fn restore_latest<C: SecureCompute>(
    storage: &Storage,
    capability: C,
) -> ServiceResult<SettlementEngine<C>> {
    let latest = storage
        .state
        .latest()?
        .ok_or(StorageError::StateNotFound(0))?;
    let engine = replay_from(storage, latest, capability)?;

    info!(
        sequence = engine.sequence(),
        root = %hex::encode(&engine.state_root()[..8]),
        "Engine restored from snapshot"
    );
    Ok(engine)
}

fn replay_from<C: SecureCompute>(
    storage: &Storage,
    snapshot: StateSnapshot,
    capability: C,
) -> ServiceResult<SettlementEngine<C>> {
    snapshot.verify()?;
    let from = snapshot.sequence + 1;
    let mut engine = SettlementEngine::from_parts(snapshot.config, snapshot.state, capability)?;

    for entry in storage.journal.range(from, u64::MAX)? {
        replay_entry(&mut engine, &entry)?;
    }
    Ok(engine)
}

/// Re-apply one journaled invocation and check it reproduces its receipt
pub fn replay_entry<C: SecureCompute>(
    engine: &mut SettlementEngine<C>,
    entry: &JournalEntry,
) -> ServiceResult<()> {
    let sequence = entry.sequence();
    let receipt = engine.apply(&entry.invocation).map_err(|err| {
        warn!(sequence, "Journaled invocation failed on replay: {}", err);
        ServiceError::ReplayDivergence {
            sequence,
            reason: err.to_string(),
        }
    })?;

    if receipt != entry.receipt {
        return Err(ServiceError::ReplayDivergence {
            sequence,
            reason: format!(
                "receipt mismatch, root {} expected {}",
                hex::encode(&receipt.post_state_root[..8]),
                hex::encode(&entry.receipt.post_state_root[..8])
            ),
        });
    }
    Ok(())
}

fn check_latest<C: SecureCompute>(
    storage: &Storage,
    engine: &SettlementEngine<C>,
) -> ServiceResult<()> {
    let journal = storage.journal.last_sequence()?;
    if engine.sequence() != journal {
        return Err(ServiceError::OutOfSync {
            engine: engine.sequence(),
            journal,
        });
    }

    if let Some(latest) = storage.state.latest()? {
        if latest.sequence == engine.sequence() && latest.state_root != engine.state_root() {
            return Err(ServiceError::ReplayDivergence {
                sequence: latest.sequence,
                reason: "latest snapshot root differs from replayed root".into(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use veilcast_contracts::{Call, EngineConfig, ForecastProof, Invocation, DEFAULT_PERIOD_LENGTH};
    use veilcast_fhe::{
        Account, ClearBackend, ClearCoprocessor, ClearInput, ClearValue, InputAttestor,
        InputVerifier,
    };
    use crate::service::SettlementService;

    fn host() -> Account {
        Account::repeat(0xEE)
    }

    fn owner() -> Account {
        Account::repeat(0x0A)
    }

    fn alice() -> Account {
        Account::repeat(0xA1)
    }

    fn at(period: u64, offset: u64) -> u64 {
        period * DEFAULT_PERIOD_LENGTH + offset
    }

    fn capability() -> ClearCoprocessor {
        let key = InputAttestor::from_seed([42u8; 32]).verifying_key();
        let verifier = InputVerifier::new().with_attestor(key).unwrap();
        ClearCoprocessor::new(host(), ClearBackend, verifier)
    }

    fn forecast(sender: Account, target: u64, direction: u8, stake: u128) -> Call {
        let attestor = InputAttestor::from_seed([42u8; 32]);
        let target = ClearInput::Uint64(target).into_external();
        let direction = ClearInput::Uint8(direction).into_external();
        let proof = ForecastProof {
            target: attestor.attest(&target, &host(), &sender),
            direction: attestor.attest(&direction, &host(), &sender),
        };
        Call::SubmitForecast { target, direction, proof, stake }
    }

    /// Run a win for alice through a persistent service, return the final root
    async fn populate(storage: Storage) -> [u8; 32] {
        let engine =
            SettlementEngine::genesis(EngineConfig::new(host()), owner(), capability()).unwrap();
        let service = SettlementService::spawn(engine, Some(storage)).unwrap();
        for invocation in [
            Invocation::new(owner(), at(100, 0), Call::RecordReference { value: 64_000 }),
            Invocation::new(alice(), at(100, 9), forecast(alice(), 63_000, 1, 50)),
            Invocation::new(alice(), at(101, 0), Call::Confirm { period: 100 }),
        ] {
            service.submit(invocation).await.unwrap();
        }
        service.shutdown().await.unwrap().state_root
    }

    #[tokio::test]
    async fn test_recover_reproduces_state_and_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("veilcast.db");
        let root = populate(Storage::open(&path).unwrap()).await;

        let storage = Storage::open(&path).unwrap();
        let engine = recover(&storage, capability()).unwrap();
        assert_eq!(engine.state_root(), root);
        assert_eq!(engine.sequence(), 3);

        let cp = engine.capability();
        let points = cp.user_decrypt(engine.get_points(&alice()), alice()).unwrap();
        assert_eq!(points, ClearValue::Uint64(50));

        // The recovered engine can keep serving
        let service = SettlementService::spawn(engine, Some(storage)).unwrap();
        service
            .submit(Invocation::new(owner(), at(101, 5), Call::RecordReference { value: 1 }))
            .await
            .unwrap();
        assert_eq!(service.shutdown().await.unwrap().persisted_sequence, Some(4));
    }

    #[tokio::test]
    async fn test_restore_latest_serves_owner_calls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("veilcast.db");
        let root = populate(Storage::open(&path).unwrap()).await;

        let storage = Storage::open(&path).unwrap();
        let empty = ClearCoprocessor::new(host(), ClearBackend, InputVerifier::new());
        let mut engine = restore_latest(&storage, empty).unwrap();
        assert_eq!(engine.state_root(), root);
        assert_eq!(engine.get_latest_reference().value, 64_000);

        engine
            .apply(&Invocation::new(owner(), at(102, 0), Call::RecordReference { value: 2 }))
            .unwrap();
    }

    #[tokio::test]
    async fn test_recover_requires_trusted_attestor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("veilcast.db");
        populate(Storage::open(&path).unwrap()).await;

        let storage = Storage::open(&path).unwrap();
        let untrusting = ClearCoprocessor::new(host(), ClearBackend, InputVerifier::new());
        let err = recover(&storage, untrusting).unwrap_err();
        assert!(matches!(err, ServiceError::ReplayDivergence { sequence: 2, .. }));
    }

    #[test]
    fn test_recover_empty_storage() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("veilcast.db")).unwrap();
        let err = recover(&storage, capability()).unwrap_err();
        assert!(matches!(err, ServiceError::Storage(StorageError::StateNotFound(0))));
    }
}
