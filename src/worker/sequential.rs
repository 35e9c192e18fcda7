//! Single-threaded worker

use super::{solve_span, Worker};
use crate::cancel::CancelToken;
use crate::challenge::{Challenge, SolveParams};
use crate::solution::Solution;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::task;
use tracing::{info, Instrument};

/// Runs [`Challenge::solve`] on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialWorker;

impl SequentialWorker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Worker for SequentialWorker {
    fn worker_type(&self) -> &'static str {
        "sequential"
    }

    async fn solve(
        &self,
        challenge: Challenge,
        params: SolveParams,
        cancellation: CancelToken,
    ) -> Result<Solution> {
        let span = solve_span(self.worker_type(), &challenge);
        let blocking_span = span.clone();

        async move {
            let solution = task::spawn_blocking(move || {
                let _enter = blocking_span.enter();
                challenge.solve(&cancellation, params)
            })
            .await
            .map_err(|e| Error::worker("sequential", e.to_string()))??;

            info!(nonce = %solution.nonce(), "solution found");
            Ok(solution)
        }
        .instrument(span)
        .await
    }
}
