mod flight_analytics;
pub mod operations;

use std::fmt::Debug;

use async_trait::async_trait;
pub use flight_analytics::{FlightAnalytics, Step, WorkerIdentity};

use crate::db::DB;
use crate::error::WorkloadResult;

/// A workload unit instantiated once per simulated user.
///
/// The harness calls `setup` once, then repeatedly asks for a cycle and
/// executes every step of it in order before asking again.
#[async_trait]
pub trait Workload: Send {
    type Step: Copy + Debug + Send + Sync;

    async fn setup<T: DB>(&mut self, db: &T, worker_id: usize, total_workers: usize)
        -> WorkloadResult<()>;

    fn produce_cycle(&self) -> Vec<Self::Step>;

    async fn execute<T: DB>(&mut self, step: Self::Step, db: &T) -> WorkloadResult<()>;
}
