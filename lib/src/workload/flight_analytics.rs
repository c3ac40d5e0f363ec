use async_trait::async_trait;
use log::{info, warn};

use super::operations::{self, CycleState, OperationContext};
use super::Workload;
use crate::db::DB;
use crate::error::{WorkloadError, WorkloadResult};
use crate::properties::{Options, WorkerConfig};
use crate::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    QueryRecord,
    ScheduleRollup,
    AirlineRollup,
    DepartureRollup,
    ArrivalRollup,
    Details,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::QueryRecord => "queryRecord",
            Step::ScheduleRollup => "scheduleRollup",
            Step::AirlineRollup => "airlineRollup",
            Step::DepartureRollup => "departureRollup",
            Step::ArrivalRollup => "arrivalRollup",
            Step::Details => "details",
        }
    }

    /// Whether the step sleeps for the configured delay once it commits.
    pub fn is_paced(&self) -> bool {
        !matches!(self, Step::QueryRecord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub id: usize,
    pub total_workers: usize,
}

/// Read-mostly analytics over the flight snapshot schema.
#[derive(Debug, Clone)]
pub struct FlightAnalytics {
    config: WorkerConfig,
    identity: Option<WorkerIdentity>,
    state: CycleState,
}

impl FlightAnalytics {
    pub fn new(options: &Options) -> WorkloadResult<Self> {
        Ok(Self::with_config(WorkerConfig::from_options(options)?))
    }

    pub fn with_config(config: WorkerConfig) -> Self {
        Self {
            config,
            identity: None,
            state: CycleState::default(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<WorkerIdentity> {
        self.identity
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    fn context(&self, step: Step) -> WorkloadResult<OperationContext> {
        let identity = self.identity.ok_or(WorkloadError::NotInitialized {
            operation: step.name(),
        })?;
        Ok(OperationContext {
            worker: identity.id,
            delay: self.config.delay(),
        })
    }
}

#[async_trait]
impl Workload for FlightAnalytics {
    type Step = Step;

    async fn setup<T: DB>(
        &mut self,
        db: &T,
        worker_id: usize,
        total_workers: usize,
    ) -> WorkloadResult<()> {
        self.identity = Some(WorkerIdentity {
            id: worker_id,
            total_workers,
        });
        let init_error = |source| WorkloadError::Initialization {
            worker: worker_id,
            source,
        };
        db.set_autocommit(true).await.map_err(init_error)?;
        let rows = db.query(&Statement::ServerVersion).await.map_err(init_error)?;
        info!(
            "worker {} of {} ready, delay {}ms",
            worker_id,
            total_workers,
            self.config.delay_millis()
        );
        match rows.iter().find_map(|row| row.values().next()) {
            Some(version) => info!("worker {}: server version {}", worker_id, version),
            None => warn!("worker {}: server did not report a version", worker_id),
        }
        Ok(())
    }

    fn produce_cycle(&self) -> Vec<Step> {
        vec![
            Step::QueryRecord,
            Step::ScheduleRollup,
            Step::AirlineRollup,
            Step::DepartureRollup,
            Step::ArrivalRollup,
            Step::Details,
        ]
    }

    async fn execute<T: DB>(&mut self, step: Step, db: &T) -> WorkloadResult<()> {
        let ctx = self.context(step)?;
        let state = &mut self.state;
        let result = match step {
            Step::QueryRecord => operations::query_record(&ctx, db, state).await,
            Step::ScheduleRollup => operations::schedule_rollup(&ctx, db).await,
            Step::AirlineRollup => operations::airline_rollup(&ctx, db, state).await,
            Step::DepartureRollup => operations::departure_rollup(&ctx, db, state).await,
            Step::ArrivalRollup => operations::arrival_rollup(&ctx, db, state).await,
            Step::Details => operations::details(&ctx, db, state).await,
        };
        if let Err(e) = &result {
            warn!("{}", e);
        }
        result
    }
}
