//! CPU worker implementation
//!
//! Multi-threaded search: task `i` of `n` tries `start + i`, `start + i + n`,
//! `start + i + 2n`, ... so the tasks never hash the same nonce. The first
//! solution found cancels the remaining tasks.

use super::{solve_span, Worker};
use crate::cancel::CancelToken;
use crate::challenge::{Challenge, SolveParams};
use crate::error::Interruption;
use crate::solution::Solution;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Instant;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn, Instrument};

/// CPU worker using multiple blocking tasks
#[derive(Debug, Clone)]
pub struct CpuWorker {
    thread_count: usize,
}

impl CpuWorker {
    /// Create a new CPU worker with specified thread count (0 = one per CPU)
    pub fn new(thread_count: usize) -> Self {
        let thread_count = if thread_count == 0 {
            num_cpus::get()
        } else {
            thread_count
        };

        debug!("Creating CPU worker with {} threads", thread_count);

        Self { thread_count }
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    async fn run(
        &self,
        challenge: Challenge,
        mut params: SolveParams,
        cancellation: CancelToken,
    ) -> Result<Solution> {
        let start = task::spawn_blocking(move || params.initial_nonce().map(|nonce| (nonce, params)))
            .await
            .map_err(|e| Error::worker(self.worker_type(), e.to_string()))??;
        let (start, params) = start;

        let threads = self.thread_count as u64;
        let max_attempt_count = params.max_attempt_count;

        info!(
            "Starting CPU search with {} threads from nonce {}",
            self.thread_count, start
        );

        let started = Instant::now();
        let group = cancellation.child_token();
        let mut tasks = JoinSet::new();
        for index in 0..threads {
            let challenge = challenge.clone();
            let token = group.clone();
            let start = start.advanced_by(index);
            let budget = max_attempt_count.map(|max| task_budget(max, threads, index));
            let span = tracing::debug_span!("search_task", index);
            tasks.spawn_blocking(move || {
                let _enter = span.enter();
                challenge.search(start, threads, budget, &token)
            });
        }

        let mut found: Option<Solution> = None;
        let mut failure: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| Error::worker(self.worker_type(), e.to_string()))
                .and_then(|result| result);
            match result {
                Ok(solution) => {
                    group.cancel();
                    if found.is_none() {
                        found = Some(solution);
                    }
                }
                Err(err) if err.is_interruption() => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                Err(err) => {
                    warn!("CPU search task failed: {}", err);
                    group.cancel();
                    if failure.as_ref().map_or(true, Error::is_interruption) {
                        failure = Some(err);
                    }
                }
            }
        }

        if let Some(solution) = found {
            info!(
                nonce = %solution.nonce(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "CPU search found solution"
            );
            return Ok(solution);
        }

        let err = match failure {
            Some(Error::Interrupted(Interruption::AttemptLimitExceeded { .. })) => {
                Interruption::AttemptLimitExceeded {
                    max_attempt_count: max_attempt_count.unwrap_or_default(),
                }
                .into()
            }
            Some(err) => err,
            None => Error::worker(self.worker_type(), "no search tasks ran"),
        };
        info!("CPU search stopped without a solution: {}", err);
        Err(err)
    }
}

/// Share of `max` attempts for task `index` of `threads`; shares sum to `max`
fn task_budget(max: u64, threads: u64, index: u64) -> u64 {
    max / threads + u64::from(index < max % threads)
}

#[async_trait]
impl Worker for CpuWorker {
    fn worker_type(&self) -> &'static str {
        "cpu"
    }

    async fn solve(
        &self,
        challenge: Challenge,
        params: SolveParams,
        cancellation: CancelToken,
    ) -> Result<Solution> {
        let span = solve_span(self.worker_type(), &challenge);
        self.run(challenge, params, cancellation)
            .instrument(span)
            .await
    }
}
