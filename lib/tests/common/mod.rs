#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use flightload::db::{Row, Staleness, DB};
use flightload::statement::Statement;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Autocommit(bool),
    Begin(Staleness),
    Query(Statement),
    Commit,
}

/// Handle call that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Begin,
    Query,
    Commit,
}

pub type CallLog = Arc<Mutex<Vec<(Instant, Call)>>>;

/// In-memory handle that records every call and serves canned rows.
///
/// Like a real session it refuses to begin a transaction while one is open.
#[derive(Default)]
pub struct RecordingDb {
    calls: CallLog,
    flights: Mutex<Vec<Row>>,
    open: Mutex<bool>,
    fail_next: Mutex<Option<FailAt>>,
    unreachable: bool,
}

pub fn flight_row(airline: &str, departure: &str, arrival: &str, model: &str) -> Row {
    HashMap::from([
        ("airline_id".to_string(), airline.to_string()),
        ("departure_airport".to_string(), departure.to_string()),
        ("arrival_airport".to_string(), arrival.to_string()),
        ("model".to_string(), model.to_string()),
    ])
}

impl RecordingDb {
    pub fn with_flights(flights: Vec<Row>) -> Self {
        Self {
            flights: Mutex::new(flights),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Records into `calls`, which outlives the handle.
    pub fn with_call_log(calls: CallLog) -> Self {
        Self {
            calls,
            ..Default::default()
        }
    }

    /// Makes the next `at` call fail.
    pub fn fail_next(&self, at: FailAt) {
        *self.fail_next.lock().unwrap() = Some(at);
    }

    pub fn in_transaction(&self) -> bool {
        *self.open.lock().unwrap()
    }

    fn take_failure(&self, at: FailAt) -> bool {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next == Some(at) {
            *fail_next = None;
            return true;
        }
        false
    }

    pub fn set_flights(&self, flights: Vec<Row>) {
        *self.flights.lock().unwrap() = flights;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    /// Workload statements, without the setup diagnostic.
    pub fn statements(&self) -> Vec<Statement> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(Statement::ServerVersion) => None,
                Call::Query(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl DB for RecordingDb {
    async fn set_autocommit(&self, on: bool) -> Result<()> {
        if self.unreachable {
            bail!("connection refused");
        }
        self.record(Call::Autocommit(on));
        Ok(())
    }

    async fn begin_read_snapshot(&self, staleness: Staleness) -> Result<()> {
        self.record(Call::Begin(staleness));
        let mut open = self.open.lock().unwrap();
        if *open {
            bail!("cannot start a transaction within a transaction");
        }
        if self.take_failure(FailAt::Begin) {
            bail!("no follower replica available");
        }
        *open = true;
        Ok(())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.record(Call::Query(statement.clone()));
        if self.take_failure(FailAt::Query) {
            bail!("relation \"flight_snapshot\" does not exist");
        }
        Ok(match statement {
            Statement::ServerVersion => vec![HashMap::from([(
                "version".to_string(),
                "recording 1.0".to_string(),
            )])],
            Statement::SampleFlight => {
                self.flights.lock().unwrap().iter().take(1).cloned().collect()
            }
            Statement::Rollup(_) => vec![],
        })
    }

    async fn commit(&self) -> Result<()> {
        self.record(Call::Commit);
        *self.open.lock().unwrap() = false;
        if self.take_failure(FailAt::Commit) {
            bail!("restart transaction");
        }
        Ok(())
    }
}
