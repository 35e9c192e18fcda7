//! Solving workers
//!
//! A [`Worker`] runs the search for a challenge off the async executor. The
//! sequential worker is a thin wrapper around [`Challenge::solve`]; the CPU
//! worker partitions the nonce space across blocking tasks.

use crate::cancel::CancelToken;
use crate::challenge::{Challenge, SolveParams};
use crate::solution::Solution;
use crate::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Span;

pub mod cpu;
pub mod sequential;

pub use cpu::CpuWorker;
pub use sequential::SequentialWorker;

/// Worker trait
///
/// Implementations must honour the cancellation token and the attempt budget
/// in `params`, and must only return solutions that verify.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Get the worker type name for logging
    fn worker_type(&self) -> &'static str;

    /// Search for a solution to `challenge`
    async fn solve(
        &self,
        challenge: Challenge,
        params: SolveParams,
        cancellation: CancelToken,
    ) -> Result<Solution>;
}

/// Worker types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerType {
    /// Single search loop on the blocking pool
    Sequential,
    /// Multi-threaded search over interleaved nonces
    Cpu,
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Sequential => write!(f, "sequential"),
            WorkerType::Cpu => write!(f, "cpu"),
        }
    }
}

/// Worker factory
pub struct WorkerFactory;

impl WorkerFactory {
    /// Create a worker of the given type; `thread_count` 0 means one per CPU
    pub fn create(worker_type: WorkerType, thread_count: usize) -> Box<dyn Worker> {
        match worker_type {
            WorkerType::Sequential => Box::new(SequentialWorker::new()),
            WorkerType::Cpu => Box::new(CpuWorker::new(thread_count)),
        }
    }
}

/// Span wrapping one solve
pub fn solve_span(worker_type: &str, challenge: &Challenge) -> Span {
    tracing::info_span!(
        "solve",
        worker = worker_type,
        hash = %challenge.hash(),
        leading_zero_bit_count = challenge.leading_zero_bit_count().get()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_factory() {
        assert_eq!(
            WorkerFactory::create(WorkerType::Sequential, 0).worker_type(),
            "sequential"
        );
        assert_eq!(WorkerFactory::create(WorkerType::Cpu, 2).worker_type(), "cpu");
    }

    #[test]
    fn test_worker_type_display() {
        assert_eq!(WorkerType::Sequential.to_string(), "sequential");
        assert_eq!(WorkerType::Cpu.to_string(), "cpu");
    }
}
