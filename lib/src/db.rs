use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::statement::Statement;

/// A single result row, keyed by column name.
pub type Row = HashMap<String, String>;

/// Read-consistency mode for a snapshot transaction.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Serve reads from a recent replica snapshot instead of the leaseholder.
    FollowerRead,
}

impl Staleness {
    pub fn begin_sql(&self) -> &'static str {
        match self {
            Staleness::FollowerRead => {
                "BEGIN TRANSACTION AS OF SYSTEM TIME follower_read_timestamp();"
            }
        }
    }
}

/// Data-access handle owned by exactly one worker.
#[async_trait]
pub trait DB: Send + Sync {
    async fn set_autocommit(&self, on: bool) -> Result<()>;
    async fn begin_read_snapshot(&self, staleness: Staleness) -> Result<()>;
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>>;
    async fn commit(&self) -> Result<()>;
}
