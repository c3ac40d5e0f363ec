use crate::db::DB;
use crate::workload::Workload;
use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use log::info;
use std::fs;
use std::time::{Duration, Instant};
use workload::FlightAnalytics;

use error::WorkloadResult;
use properties::WorkerConfig;
use structopt::StructOpt;

pub mod db;
pub mod error;
pub mod properties;
pub mod statement;
pub mod workload;

#[derive(StructOpt, Debug)]
#[structopt(name = "flightload")]
struct Opt {
    /// TOML file holding the workload options.
    #[structopt(short, long)]
    workload: Option<String>,
    #[structopt(short, long, default_value = "1")]
    threads: usize,
    #[structopt(short, long, default_value = "10")]
    cycles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub cycles: usize,
    pub operations: usize,
    pub runtime: Duration,
}

/// Sets the worker up once and drains `cycles` freshly produced cycles.
pub async fn run_worker<W: Workload, T: DB>(
    wl: &mut W,
    db: &T,
    worker_id: usize,
    total_workers: usize,
    cycles: usize,
) -> WorkloadResult<WorkerReport> {
    let start = Instant::now();
    wl.setup(db, worker_id, total_workers).await?;
    let mut operations = 0;
    for _ in 0..cycles {
        for step in wl.produce_cycle() {
            wl.execute(step, db).await?;
            operations += 1;
        }
    }
    Ok(WorkerReport {
        worker: worker_id,
        cycles,
        operations,
        runtime: start.elapsed(),
    })
}

pub struct Output {
    pub n_workers: usize,
    pub operations: usize,
    pub runtime: Duration,
    pub throughput: f64,
}

/// Runs `n_workers` workers in parallel, each on its own handle from `connect`.
pub async fn flightload_run<T, F>(
    connect: F,
    config: WorkerConfig,
    n_workers: usize,
    cycles: usize,
) -> Result<Output>
where
    T: DB + 'static,
    F: Fn(usize) -> Result<T>,
{
    // Every handle is opened before any worker starts.
    let handles = (0..n_workers)
        .map(|id| connect(id).with_context(|| format!("failed to connect worker {}", id)))
        .collect::<Result<Vec<T>>>()?;
    let start = Instant::now();
    let workers: Vec<_> = handles
        .into_iter()
        .enumerate()
        .map(|(id, db)| {
            tokio::task::spawn(async move {
                let mut wl = FlightAnalytics::with_config(config);
                run_worker(&mut wl, &db, id, n_workers, cycles).await
            })
        })
        .collect();
    let mut operations = 0;
    for joined in join_all(workers).await {
        let report = joined.map_err(|e| anyhow!("worker task panicked: {}", e))??;
        info!(
            "worker {} finished {} operations in {}ms",
            report.worker,
            report.operations,
            report.runtime.as_millis()
        );
        operations += report.operations;
    }
    let runtime = start.elapsed();
    let throughput = operations as f64 / runtime.as_secs_f64();
    Ok(Output {
        n_workers,
        operations,
        runtime,
        throughput,
    })
}

pub async fn flightload_main<T, F>(connect: F) -> Result<()>
where
    T: DB + 'static,
    F: Fn(usize) -> Result<T>,
{
    let opt = Opt::from_args();

    let config = match &opt.workload {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read options from {}", path))?;
            WorkerConfig::from_toml_str(&raw)?
        }
        None => WorkerConfig::default(),
    };

    let output = flightload_run(connect, config, opt.threads, opt.cycles).await?;

    println!("[OVERALL], ThreadCount, {}", output.n_workers);
    println!("[OVERALL], Operations, {}", output.operations);
    println!("[OVERALL], RunTime(ms), {}", output.runtime.as_millis());
    println!("[OVERALL], Throughput(ops/sec), {}", output.throughput);

    Ok(())
}
