//! Typed descriptors for every statement the flight workload issues.
//!
//! Flight keys read from the snapshot table are never spliced into SQL text.
//! A rollup call renders positional placeholders (`$1`, `$2`, ...) and carries
//! its arguments separately, so a backend binds them as parameters.

use anyhow::{anyhow, bail, Result};
use sql_builder::SqlBuilder;

pub const FLIGHT_SNAPSHOT_TABLE: &str = "flight_snapshot";

/// Columns sampled from [`FLIGHT_SNAPSHOT_TABLE`], in select order.
pub const FLIGHT_KEY_COLUMNS: [&str; 4] = [
    "airline_id",
    "departure_airport",
    "arrival_airport",
    "model",
];

const SERVER_VERSION_SQL: &str = "SELECT version();";

/// Server-side rollup and lookup routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    ScheduleRollup,
    AirlineRollup,
    DepartureRollup,
    ArrivalRollup,
    FlightDetails,
}

impl Routine {
    pub fn name(&self) -> &'static str {
        match self {
            Routine::ScheduleRollup => "getScheduleRollup",
            Routine::AirlineRollup => "getAirlineRollup",
            Routine::DepartureRollup => "getDepartureRollup",
            Routine::ArrivalRollup => "getArrivalRollup",
            Routine::FlightDetails => "getFlightDetails",
        }
    }

    /// Number of key arguments the routine takes.
    pub fn arity(&self) -> usize {
        match self {
            Routine::ScheduleRollup => 0,
            Routine::AirlineRollup => 1,
            Routine::DepartureRollup => 2,
            Routine::ArrivalRollup => 3,
            Routine::FlightDetails => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupCall {
    routine: Routine,
    args: Vec<String>,
}

impl RollupCall {
    pub fn new(routine: Routine, args: Vec<String>) -> Result<Self> {
        if args.len() != routine.arity() {
            bail!(
                "{} takes {} argument(s), got {}",
                routine.name(),
                routine.arity(),
                args.len()
            );
        }
        Ok(Self { routine, args })
    }

    pub fn routine(&self) -> Routine {
        self.routine
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Diagnostic query run once at setup.
    ServerVersion,
    /// One uniformly random row of the flight snapshot.
    SampleFlight,
    Rollup(RollupCall),
}

impl Statement {
    /// Renders the statement for a PostgreSQL-wire server.
    pub fn to_sql(&self) -> Result<String> {
        match self {
            Statement::ServerVersion => Ok(SERVER_VERSION_SQL.to_string()),
            Statement::SampleFlight => SqlBuilder::select_from(FLIGHT_SNAPSHOT_TABLE)
                .fields(&FLIGHT_KEY_COLUMNS)
                .order_by("random()", false)
                .limit(1)
                .sql()
                .map_err(|e| anyhow!("failed to render flight sample: {}", e)),
            Statement::Rollup(call) => {
                let placeholders = (1..=call.args.len())
                    .map(|i| format!("${}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                let target = format!("{}({})", call.routine.name(), placeholders);
                SqlBuilder::select_from(target)
                    .sql()
                    .map_err(|e| anyhow!("failed to render {}: {}", call.routine.name(), e))
            }
        }
    }

    /// Values bound to the rendered placeholders, in order.
    pub fn params(&self) -> &[String] {
        match self {
            Statement::Rollup(call) => call.args(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_flight_selects_one_random_row() {
        let sql = Statement::SampleFlight.to_sql().unwrap();
        assert!(sql.starts_with("SELECT airline_id, departure_airport, arrival_airport, model"));
        assert!(sql.contains("FROM flight_snapshot"));
        assert!(sql.contains("ORDER BY random()"));
        assert!(sql.contains("LIMIT 1"));
    }

    #[test]
    fn rollup_binds_keys_as_placeholders() {
        let call = RollupCall::new(
            Routine::DepartureRollup,
            vec!["AA'; DROP TABLE flight_snapshot; --".into(), "JFK".into()],
        )
        .unwrap();
        let statement = Statement::Rollup(call);
        let sql = statement.to_sql().unwrap();
        assert!(sql.contains("getDepartureRollup($1, $2)"));
        assert!(!sql.contains("DROP"));
        assert_eq!(statement.params().len(), 2);
    }

    #[test]
    fn parameterless_rollup() {
        let call = RollupCall::new(Routine::ScheduleRollup, vec![]).unwrap();
        let statement = Statement::Rollup(call);
        assert!(statement.to_sql().unwrap().contains("getScheduleRollup()"));
        assert!(statement.params().is_empty());
    }

    #[test]
    fn rollup_rejects_wrong_arity() {
        assert!(RollupCall::new(Routine::FlightDetails, vec!["AA".into()]).is_err());
        assert!(RollupCall::new(Routine::ScheduleRollup, vec!["AA".into()]).is_err());
    }
}
