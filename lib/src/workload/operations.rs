//! The six operations of a flight analytics cycle.
//!
//! Every operation runs exactly one statement inside its own follower-read
//! transaction. All but [`query_record`] then sleep for the configured delay.
//! The sampled flight is threaded through an explicit [`CycleState`]:
//! `query_record` is its only writer, the rollups only read it.

use std::time::Duration;

use anyhow::{anyhow, Context};
use log::debug;

use super::Step;
use crate::db::{Row, Staleness, DB};
use crate::error::{WorkloadError, WorkloadResult};
use crate::statement::{RollupCall, Routine, Statement, FLIGHT_KEY_COLUMNS};

const READ_MODE: Staleness = Staleness::FollowerRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightKey {
    pub airline_id: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub model: String,
}

impl FlightKey {
    pub fn new(
        airline_id: impl Into<String>,
        departure_airport: impl Into<String>,
        arrival_airport: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            airline_id: airline_id.into(),
            departure_airport: departure_airport.into(),
            arrival_airport: arrival_airport.into(),
            model: model.into(),
        }
    }

    fn from_row(mut row: Row) -> anyhow::Result<Self> {
        let mut take = |column: &str| {
            row.remove(column)
                .ok_or_else(|| anyhow!("sampled row has no `{}` column", column))
        };
        let [airline, departure, arrival, model] = FLIGHT_KEY_COLUMNS;
        Ok(Self {
            airline_id: take(airline)?,
            departure_airport: take(departure)?,
            arrival_airport: take(arrival)?,
            model: take(model)?,
        })
    }
}

/// Flight sampled by the last successful `query_record`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    flight: Option<FlightKey>,
}

impl CycleState {
    pub fn with_flight(flight: FlightKey) -> Self {
        Self {
            flight: Some(flight),
        }
    }

    pub fn flight(&self) -> Option<&FlightKey> {
        self.flight.as_ref()
    }

    fn require(&self, ctx: &OperationContext, step: Step) -> WorkloadResult<&FlightKey> {
        self.flight.as_ref().ok_or(WorkloadError::StaleState {
            operation: step.name(),
            worker: ctx.worker,
        })
    }
}

/// Per-worker settings every operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    pub worker: usize,
    pub delay: Duration,
}

/// Runs one statement in a follower-read transaction and commits it.
async fn in_snapshot<T: DB>(
    ctx: &OperationContext,
    step: Step,
    db: &T,
    statement: &Statement,
) -> WorkloadResult<Vec<Row>> {
    let query_error = |source| WorkloadError::Query {
        operation: step.name(),
        worker: ctx.worker,
        source,
    };
    debug!("worker {}: {} -> {:?}", ctx.worker, step.name(), statement);
    db.begin_read_snapshot(READ_MODE)
        .await
        .context("begin follower-read transaction")
        .map_err(query_error)?;
    let rows = match db.query(statement).await {
        Ok(rows) => rows,
        Err(e) => {
            // The transaction is closed either way; the query error is reported.
            if let Err(close) = db.commit().await {
                debug!(
                    "worker {}: {} failed to close transaction: {:#}",
                    ctx.worker,
                    step.name(),
                    close
                );
            }
            return Err(query_error(e));
        }
    };
    db.commit().await.context("commit").map_err(query_error)?;
    Ok(rows)
}

async fn pace(ctx: &OperationContext) {
    tokio::time::sleep(ctx.delay).await;
}

async fn rollup<T: DB>(
    ctx: &OperationContext,
    step: Step,
    db: &T,
    routine: Routine,
    args: Vec<String>,
) -> WorkloadResult<()> {
    let call = RollupCall::new(routine, args).map_err(|source| WorkloadError::Query {
        operation: step.name(),
        worker: ctx.worker,
        source,
    })?;
    in_snapshot(ctx, step, db, &Statement::Rollup(call)).await?;
    if step.is_paced() {
        pace(ctx).await;
    }
    Ok(())
}

/// Samples one random flight and records it in `state`.
///
/// `state` is only replaced once the whole row has been read, so a failure
/// leaves the previous cycle's flight in place.
pub async fn query_record<T: DB>(
    ctx: &OperationContext,
    db: &T,
    state: &mut CycleState,
) -> WorkloadResult<()> {
    let step = Step::QueryRecord;
    let rows = in_snapshot(ctx, step, db, &Statement::SampleFlight).await?;
    let row = rows.into_iter().next().ok_or(WorkloadError::NoResult {
        operation: step.name(),
        worker: ctx.worker,
    })?;
    let flight = FlightKey::from_row(row).map_err(|source| WorkloadError::Query {
        operation: step.name(),
        worker: ctx.worker,
        source,
    })?;
    state.flight = Some(flight);
    Ok(())
}

pub async fn schedule_rollup<T: DB>(ctx: &OperationContext, db: &T) -> WorkloadResult<()> {
    rollup(ctx, Step::ScheduleRollup, db, Routine::ScheduleRollup, vec![]).await
}

pub async fn airline_rollup<T: DB>(
    ctx: &OperationContext,
    db: &T,
    state: &CycleState,
) -> WorkloadResult<()> {
    let step = Step::AirlineRollup;
    let flight = state.require(ctx, step)?;
    let args = vec![flight.airline_id.clone()];
    rollup(ctx, step, db, Routine::AirlineRollup, args).await
}

pub async fn departure_rollup<T: DB>(
    ctx: &OperationContext,
    db: &T,
    state: &CycleState,
) -> WorkloadResult<()> {
    let step = Step::DepartureRollup;
    let flight = state.require(ctx, step)?;
    let args = vec![
        flight.airline_id.clone(),
        flight.departure_airport.clone(),
    ];
    rollup(ctx, step, db, Routine::DepartureRollup, args).await
}

pub async fn arrival_rollup<T: DB>(
    ctx: &OperationContext,
    db: &T,
    state: &CycleState,
) -> WorkloadResult<()> {
    let step = Step::ArrivalRollup;
    let flight = state.require(ctx, step)?;
    let args = vec![
        flight.airline_id.clone(),
        flight.departure_airport.clone(),
        flight.arrival_airport.clone(),
    ];
    rollup(ctx, step, db, Routine::ArrivalRollup, args).await
}

pub async fn details<T: DB>(
    ctx: &OperationContext,
    db: &T,
    state: &CycleState,
) -> WorkloadResult<()> {
    let step = Step::Details;
    let flight = state.require(ctx, step)?;
    let args = vec![
        flight.airline_id.clone(),
        flight.departure_airport.clone(),
        flight.arrival_airport.clone(),
        flight.model.clone(),
    ];
    rollup(ctx, step, db, Routine::FlightDetails, args).await
}
