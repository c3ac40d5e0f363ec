use anyhow::Result;
use flightload::flightload_main;
use sqlite::SQLite;
use std::path::Path;

mod sqlite;

const SEED_FLIGHTS: usize = 500;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let path = Path::new("flights.db");
    SQLite::new(path)?.seed(SEED_FLIGHTS)?;
    flightload_main(|_| SQLite::new(path)).await
}
