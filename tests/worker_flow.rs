//! End-to-end worker and wire record tests

use assert_matches::assert_matches;
use hashcash_pow::worker::{WorkerFactory, WorkerType};
use hashcash_pow::{
    CancelCause, CancelToken, Challenge, Error, Hash, Interruption, SolutionRecord, SolveParams,
    TemplateLayout, VerificationFailure,
};
use std::time::Duration;

fn challenge(leading_zero_bit_count: i64, hash: Hash) -> Challenge {
    Challenge::builder()
        .leading_zero_bit_count(leading_zero_bit_count)
        .payload("dummy")
        .hash(hash)
        .layout(TemplateLayout::new("{leadingZeroBitCount}:{payload}:{nonce}").unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_every_worker_finds_a_verifiable_solution() {
    for worker_type in [WorkerType::Sequential, WorkerType::Cpu] {
        for hash in [
            Hash::sha256(),
            Hash::sha512(),
            Hash::blake2s256(),
            Hash::blake2b512(),
        ] {
            let worker = WorkerFactory::create(worker_type, 3);
            let solution = worker
                .solve(challenge(10, hash), SolveParams::new(), CancelToken::new())
                .await
                .unwrap();
            solution.verify().unwrap();
        }
    }
}

#[tokio::test]
async fn test_sequential_worker_matches_direct_solve() {
    let worker = WorkerFactory::create(WorkerType::Sequential, 0);
    let solution = worker
        .solve(challenge(5, Hash::sha256()), SolveParams::new(), CancelToken::new())
        .await
        .unwrap();
    assert_eq!(solution.nonce().to_string(), "37");
}

#[tokio::test]
async fn test_cpu_worker_reports_total_budget() {
    let worker = WorkerFactory::create(WorkerType::Cpu, 4);
    let result = worker
        .solve(
            challenge(100, Hash::sha256()),
            SolveParams::new().with_max_attempt_count(1000),
            CancelToken::new(),
        )
        .await;
    assert_matches!(
        result,
        Err(Error::Interrupted(Interruption::AttemptLimitExceeded {
            max_attempt_count: 1000
        }))
    );
}

#[tokio::test]
async fn test_workers_stop_on_cancellation() {
    for worker_type in [WorkerType::Sequential, WorkerType::Cpu] {
        let token = CancelToken::new();
        let worker = WorkerFactory::create(worker_type, 2);
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel_with("shutdown");
            })
        };

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            worker.solve(challenge(200, Hash::sha256()), SolveParams::new(), token),
        )
        .await
        .expect("worker did not observe cancellation");
        canceller.await.unwrap();

        assert_matches!(
            result,
            Err(Error::Interrupted(Interruption::Cancelled {
                cause: CancelCause::Reason(ref reason)
            })) if reason == "shutdown"
        );
    }
}

#[tokio::test]
async fn test_solution_record_survives_the_wire() {
    let worker = WorkerFactory::create(WorkerType::Cpu, 2);
    let solution = worker
        .solve(challenge(8, Hash::blake2s256()), SolveParams::new(), CancelToken::new())
        .await
        .unwrap();

    let json = SolutionRecord::from(&solution).to_json().unwrap();
    let received = SolutionRecord::from_json(&json)
        .unwrap()
        .into_solution()
        .unwrap();
    assert_eq!(received, solution);
    received.verify().unwrap();
}

#[tokio::test]
async fn test_tampered_record_fails_verification() {
    let solution = challenge(8, Hash::sha256())
        .solve(&CancelToken::new(), SolveParams::new())
        .unwrap();

    let mut record = SolutionRecord::from(&solution);
    record.challenge.payload = hex::encode("dummx");
    let tampered = record.into_solution().unwrap();
    assert_matches!(
        tampered.verify(),
        Err(Error::Verification(VerificationFailure::HashSumMismatch { .. }))
    );

    let mut record = SolutionRecord::from(&solution);
    record.hash_sum = "00".parse().unwrap();
    assert_matches!(
        record.into_solution(),
        Err(Error::Validation(_))
    );
}
