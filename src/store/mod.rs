//! Persistence seams of the pipeline.
//!
//! Three stores with deliberately narrow surfaces: a run-scoped staging
//! area, the production dataset, and the run log. Production has no
//! incremental write path at all; the commit step's clear-then-bulk-insert
//! is the only way data reaches it.

pub mod memory;

use crate::models::{ListingRecord, ScrapeRun};
use anyhow::Result;

pub use memory::{MemoryProduction, MemoryRunLog, MemoryStaging};

/// Run-scoped holding store for extracted records. Identity-keyed: a second
/// `put` with the same external id overwrites the first.
pub trait StagingSink {
    fn put(&mut self, record: ListingRecord) -> Result<()>;
    fn clear_all(&mut self) -> Result<()>;
    /// Current staged records in ascending external-id order
    fn staged(&self) -> Result<Vec<ListingRecord>>;
}

/// The live dataset. Only the commit step writes here, and only as a full
/// replacement.
pub trait ProductionStore {
    fn clear_all(&mut self) -> Result<()>;
    fn bulk_insert(&mut self, records: Vec<ListingRecord>) -> Result<()>;
}

/// Append-and-update log of scrape runs; the sole source of truth for
/// whether a run succeeded.
pub trait RunLogStore {
    fn create(&mut self, run: &ScrapeRun) -> Result<RunId>;
    fn update(&mut self, id: RunId, run: &ScrapeRun) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub u64);
