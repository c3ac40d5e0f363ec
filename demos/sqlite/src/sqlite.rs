use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use flightload::db::{Row, Staleness, DB};
use flightload::statement::{Routine, Statement, FLIGHT_SNAPSHOT_TABLE};
use itertools::iproduct;
use log::debug;
use rand::rngs::SmallRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection};

const AIRLINES: [&str; 5] = ["AA", "DL", "UA", "B6", "AS"];
const AIRPORTS: [&str; 6] = ["JFK", "LAX", "ORD", "ATL", "SFO", "SEA"];
const MODELS: [&str; 4] = ["737", "757", "A320", "A321"];

/// Flight snapshot database backed by a local SQLite file.
///
/// SQLite has neither follower reads nor stored routines, so snapshot
/// transactions are plain deferred transactions and each rollup routine is
/// rendered as an equivalent aggregate over the snapshot table.
pub struct SQLite {
    conn: Mutex<Connection>,
}

impl SQLite {
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                airline_id TEXT NOT NULL,
                departure_airport TEXT NOT NULL,
                arrival_airport TEXT NOT NULL,
                model TEXT NOT NULL
            );",
            FLIGHT_SNAPSHOT_TABLE
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    /// Fills an empty snapshot table with `count` random routes.
    pub fn seed(&self, count: usize) -> Result<()> {
        let mut conn = self.conn()?;
        let existing: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", FLIGHT_SNAPSHOT_TABLE),
            [],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(());
        }
        let mut rng = SmallRng::seed_from_u64(0);
        let flights = iproduct!(AIRLINES, AIRPORTS, AIRPORTS, MODELS)
            .filter(|(_, departure, arrival, _)| departure != arrival)
            .choose_multiple(&mut rng, count);
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} (airline_id, departure_airport, arrival_airport, model)
                 VALUES (?1, ?2, ?3, ?4)",
                FLIGHT_SNAPSHOT_TABLE
            ))?;
            for (airline, departure, arrival, model) in &flights {
                insert.execute(params![airline, departure, arrival, model])?;
            }
        }
        tx.commit()?;
        debug!("seeded {} flights", flights.len());
        Ok(())
    }
}

fn rollup_sql(routine: Routine) -> String {
    let (group, filter) = match routine {
        Routine::ScheduleRollup => ("airline_id", ""),
        Routine::AirlineRollup => ("departure_airport", "airline_id = ?1"),
        Routine::DepartureRollup => (
            "arrival_airport",
            "airline_id = ?1 AND departure_airport = ?2",
        ),
        Routine::ArrivalRollup => (
            "model",
            "airline_id = ?1 AND departure_airport = ?2 AND arrival_airport = ?3",
        ),
        Routine::FlightDetails => {
            return format!(
                "SELECT * FROM {} WHERE airline_id = ?1 AND departure_airport = ?2 \
                 AND arrival_airport = ?3 AND model = ?4",
                FLIGHT_SNAPSHOT_TABLE
            )
        }
    };
    let filter = if filter.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", filter)
    };
    format!(
        "SELECT {group}, COUNT(*) AS flights FROM {table}{filter} GROUP BY {group}",
        group = group,
        table = FLIGHT_SNAPSHOT_TABLE,
        filter = filter
    )
}

fn text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("{:?}", b),
    }
}

#[async_trait]
impl DB for SQLite {
    async fn set_autocommit(&self, on: bool) -> Result<()> {
        // Outside an explicit transaction SQLite always autocommits.
        if !on {
            bail!("sqlite handle only supports autocommit");
        }
        Ok(())
    }

    async fn begin_read_snapshot(&self, staleness: Staleness) -> Result<()> {
        debug!("{:?} read served from the local file", staleness);
        self.conn()?.execute_batch("BEGIN DEFERRED")?;
        Ok(())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        let sql = match statement {
            Statement::ServerVersion => "SELECT sqlite_version() AS version".to_string(),
            Statement::SampleFlight => statement.to_sql()?,
            Statement::Rollup(call) => rollup_sql(call.routine()),
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params_from_iter(statement.params()), |row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Ok((name.clone(), text(row.get_ref(i)?))))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        Ok(rows)
    }

    async fn commit(&self) -> Result<()> {
        self.conn()?.execute_batch("COMMIT")?;
        Ok(())
    }
}
