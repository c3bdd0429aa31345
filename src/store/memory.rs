//! In-memory store implementations, used by the binary for snapshot dumps
//! and by the test suite.

use super::{ProductionStore, RunId, RunLogStore, StagingSink};
use crate::models::{ListingRecord, ScrapeRun};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

/// Identity-keyed staging area; the `BTreeMap` keeps drain order
/// deterministic.
#[derive(Debug, Default)]
pub struct MemoryStaging {
    records: BTreeMap<u64, ListingRecord>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StagingSink for MemoryStaging {
    fn put(&mut self, record: ListingRecord) -> Result<()> {
        // Last extraction of an advertisement within a run wins
        self.records.insert(record.external_id, record);
        Ok(())
    }

    fn clear_all(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }

    fn staged(&self) -> Result<Vec<ListingRecord>> {
        Ok(self.records.values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProduction {
    records: Vec<ListingRecord>,
}

impl MemoryProduction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }
}

impl ProductionStore for MemoryProduction {
    fn clear_all(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }

    fn bulk_insert(&mut self, records: Vec<ListingRecord>) -> Result<()> {
        self.records.extend(records);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRunLog {
    runs: Vec<ScrapeRun>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &[ScrapeRun] {
        &self.runs
    }

    pub fn latest(&self) -> Option<&ScrapeRun> {
        self.runs.last()
    }
}

impl RunLogStore for MemoryRunLog {
    fn create(&mut self, run: &ScrapeRun) -> Result<RunId> {
        self.runs.push(run.clone());
        Ok(RunId(self.runs.len() as u64 - 1))
    }

    fn update(&mut self, id: RunId, run: &ScrapeRun) -> Result<()> {
        let slot = self
            .runs
            .get_mut(id.0 as usize)
            .ok_or_else(|| anyhow!("no run with id {}", id.0))?;
        *slot = run.clone();
        Ok(())
    }
}
