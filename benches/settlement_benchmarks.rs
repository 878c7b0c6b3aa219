//! Performance Benchmarks for Veilcast Settlement
//!
//! Run with: cargo bench
//!
//! Uses the plaintext backend, so the numbers measure engine, access control
//! and storage overhead rather than homomorphic evaluation.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

use veilcast::contracts::{
    evaluate_outcome, Call, EngineConfig, ForecastProof, Invocation, SettlementEngine,
    DEFAULT_PERIOD_LENGTH,
};
use veilcast::fhe::{
    Account, ClearBackend, ClearCoprocessor, ClearInput, InputAttestor, InputVerifier,
    SecureCompute,
};
use veilcast::storage::{JournalEntry, StateSnapshot, Storage};

fn host() -> Account {
    Account::repeat(0xEE)
}

fn owner() -> Account {
    Account::repeat(0x0A)
}

fn at(period: u64, offset: u64) -> u64 {
    period * DEFAULT_PERIOD_LENGTH + offset
}

fn attestor() -> InputAttestor {
    InputAttestor::from_seed([3u8; 32])
}

fn engine() -> SettlementEngine<ClearCoprocessor> {
    let verifier = InputVerifier::new()
        .with_attestor(attestor().verifying_key())
        .unwrap();
    let cp = ClearCoprocessor::new(host(), ClearBackend, verifier);
    SettlementEngine::genesis(EngineConfig::new(host()), owner(), cp).unwrap()
}

fn forecast(attestor: &InputAttestor, sender: Account, target: u64, direction: u8) -> Call {
    let target = ClearInput::Uint64(target).into_external();
    let direction = ClearInput::Uint8(direction).into_external();
    let proof = ForecastProof {
        target: attestor.attest(&target, &host(), &sender),
        direction: attestor.attest(&direction, &host(), &sender),
    };
    Call::SubmitForecast { target, direction, proof, stake: 100 }
}

fn participant(i: usize) -> Account {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
    Account::from_bytes(bytes)
}

/// Engine with one reference and `n` open forecasts in period 1
fn populated(n: usize) -> (SettlementEngine<ClearCoprocessor>, Vec<Account>) {
    let attestor = attestor();
    let mut engine = engine();
    engine
        .apply(&Invocation::new(owner(), at(1, 0), Call::RecordReference { value: 1_000 }))
        .unwrap();
    let accounts: Vec<Account> = (0..n).map(participant).collect();
    for (i, account) in accounts.iter().enumerate() {
        let call = forecast(&attestor, *account, 900 + i as u64, 1 + (i % 2) as u8);
        engine
            .apply(&Invocation::new(*account, at(1, 1), call))
            .unwrap();
    }
    (engine, accounts)
}

// =============================================================================
// ENGINE BENCHMARKS
// =============================================================================

fn bench_evaluate_outcome(c: &mut Criterion) {
    c.bench_function("evaluate_outcome", |b| {
        b.iter_batched(
            || {
                let mut cp = ClearCoprocessor::new(host(), ClearBackend, InputVerifier::new());
                let target = cp.trivial_u64(500).unwrap();
                let direction = cp.trivial_u8(1).unwrap();
                (cp, target, direction)
            },
            |(mut cp, target, direction)| {
                evaluate_outcome(&mut cp, 600, target, direction, 10).unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_submit_forecast(c: &mut Criterion) {
    let attestor = attestor();
    let account = participant(0);
    let call = forecast(&attestor, account, 900, 1);

    c.bench_function("submit_forecast", |b| {
        b.iter_batched(
            engine,
            |mut engine| {
                engine
                    .apply(&Invocation::new(account, at(1, 0), call.clone()))
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_confirm_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("confirm_round");

    for n in [10usize, 100] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, n| {
            b.iter_batched(
                || populated(*n),
                |(mut engine, accounts)| {
                    for (i, account) in accounts.iter().enumerate() {
                        engine
                            .apply(&Invocation::new(
                                *account,
                                at(2, i as u64),
                                Call::Confirm { period: 1 },
                            ))
                            .unwrap();
                    }
                    engine
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_state_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_root");

    for n in [10usize, 1_000] {
        let (engine, _) = populated(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &engine, |b, engine| {
            b.iter(|| engine.state_root())
        });
    }

    group.finish();
}

// =============================================================================
// STORAGE BENCHMARKS
// =============================================================================

fn bench_record_with_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage_record");

    for n in [10usize, 1_000] {
        let (engine, _) = populated(n);
        let snapshot = StateSnapshot::new(engine.config().clone(), engine.state().clone());
        let invocation =
            Invocation::new(owner(), at(1, 0), Call::RecordReference { value: 1_000 });
        let receipt = {
            let mut fresh = self::engine();
            fresh.apply(&invocation).unwrap()
        };

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || {
                    let dir = tempdir().unwrap();
                    let storage = Storage::open(dir.path().join("bench.db")).unwrap();
                    (dir, storage)
                },
                |(dir, storage)| {
                    // Relabel so the snapshot matches the first journal entry
                    let snapshot = StateSnapshot {
                        sequence: 1,
                        state_root: receipt.post_state_root,
                        ..snapshot.clone()
                    };
                    let entry = JournalEntry::new(invocation.clone(), receipt.clone());
                    storage.record(&entry, Some(&snapshot)).unwrap();
                    drop(storage);
                    dir
                },
                BatchSize::PerIteration,
            )
        });
    }

    group.finish();
}

criterion_group!(
    engine_benches,
    bench_evaluate_outcome,
    bench_submit_forecast,
    bench_confirm_round,
    bench_state_root,
);

criterion_group!(storage_benches, bench_record_with_snapshot);

criterion_main!(engine_benches, storage_benches);
