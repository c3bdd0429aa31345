//! Test support: a scripted catalog session and operation-logging store
//! doubles. Compiled into the library so the integration suite can drive
//! the whole pipeline without a browser.

use crate::models::{ListingRecord, ScrapeRun};
use crate::scrapers::browser::HtmlHandle;
use crate::scrapers::traits::{AutomationSession, ElementHandle, WaitOutcome};
use crate::scrapers::traversal::{
    LISTING_CONTAINER_SELECTOR, NEXT_CONTROL_SELECTOR, NEXT_LINK_SELECTOR, RESULT_COUNT_SELECTOR,
    SEARCH_BUTTON_SELECTOR,
};
use crate::store::{ProductionStore, RunId, RunLogStore, StagingSink};
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// A well-formed listing card for the given advertisement id
pub fn listing_card(id: u64) -> String {
    format!(
        r#"<div class="talalati-sor">
             <h3><a href="https://x.hu/szemelyauto/opel/astra/opel-astra-{id}">OPEL ASTRA {id}</a></h3>
             <div class="pricefield-primary">1 000 000 Ft</div>
             <div class="talalatisor-info adatok"><span class="info">Benzin</span><span class="info">2015</span></div>
           </div>"#
    )
}

/// A promotional slot without the mandatory title link
pub fn broken_card() -> String {
    r#"<div class="talalati-sor"><div class="banner">Hirdetés</div></div>"#.to_string()
}

/// Scripted automation session over a fixed sequence of pages.
///
/// Failure modes are opt-in fields: a page whose container never appears,
/// or a challenge hook that starts failing after N invocations.
pub struct FakeCatalogSession {
    pages: Vec<Vec<String>>,
    current: usize,
    /// 1-based page on which the session currently waits
    awaiting: u32,
    pub has_search_button: bool,
    /// Total the catalog reports above the first page, when set
    pub total_results: Option<u32>,
    /// 1-based page whose listing container never appears
    pub timeout_on_page: Option<u32>,
    /// Challenge hook fails on this (1-based) invocation
    pub challenge_fails_at: Option<u32>,
    pub wait_calls: u32,
    pub challenge_calls: u32,
    pub closed: bool,
}

impl FakeCatalogSession {
    pub fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            current: 0,
            awaiting: 1,
            has_search_button: true,
            total_results: None,
            timeout_on_page: None,
            challenge_fails_at: None,
            wait_calls: 0,
            challenge_calls: 0,
            closed: false,
        }
    }
}

impl AutomationSession for FakeCatalogSession {
    fn navigate(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        if selector == NEXT_LINK_SELECTOR {
            self.current += 1;
            self.awaiting += 1;
        }
        Ok(())
    }

    fn wait_for_selector(&mut self, _selector: &str, _timeout: Duration) -> Result<WaitOutcome> {
        self.wait_calls += 1;
        if self.timeout_on_page == Some(self.awaiting) {
            Ok(WaitOutcome::TimedOut)
        } else {
            Ok(WaitOutcome::Appeared)
        }
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
        let html_list: Vec<String> = match selector {
            LISTING_CONTAINER_SELECTOR => self.pages[self.current].clone(),
            SEARCH_BUTTON_SELECTOR if self.has_search_button => {
                vec![r#"<button class="btn-search">Keresés</button>"#.to_string()]
            }
            RESULT_COUNT_SELECTOR => match self.total_results {
                Some(total) => {
                    vec![format!(r#"<div class="talalatszam">{total} találat</div>"#)]
                }
                None => Vec::new(),
            },
            NEXT_CONTROL_SELECTOR => {
                if self.current + 1 < self.pages.len() {
                    vec![r##"<li class="next"><a href="#">»</a></li>"##.to_string()]
                } else {
                    vec![r#"<li class="next disabled"><span>»</span></li>"#.to_string()]
                }
            }
            _ => Vec::new(),
        };
        Ok(html_list
            .iter()
            .map(|h| Box::new(HtmlHandle::from_fragment(h)) as Box<dyn ElementHandle>)
            .collect())
    }

    fn resolve_challenge(&mut self) -> Result<()> {
        self.challenge_calls += 1;
        if self.challenge_fails_at == Some(self.challenge_calls) {
            bail!("challenge interstitial did not clear");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Everything the commit step may do to production, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionOp {
    ClearAll,
    BulkInsert(usize),
}

/// Production double that logs each operation so tests can assert the
/// clear-then-insert commit happens atomically, with nothing in between.
#[derive(Debug, Default)]
pub struct RecordingProduction {
    pub ops: Vec<ProductionOp>,
    pub records: Vec<ListingRecord>,
}

impl RecordingProduction {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductionStore for RecordingProduction {
    fn clear_all(&mut self) -> Result<()> {
        self.ops.push(ProductionOp::ClearAll);
        self.records.clear();
        Ok(())
    }

    fn bulk_insert(&mut self, records: Vec<ListingRecord>) -> Result<()> {
        self.ops.push(ProductionOp::BulkInsert(records.len()));
        self.records.extend(records);
        Ok(())
    }
}

/// Staging double that counts clears, on top of the identity-keyed map
#[derive(Debug, Default)]
pub struct RecordingStaging {
    records: BTreeMap<u64, ListingRecord>,
    pub clear_calls: u32,
}

impl RecordingStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StagingSink for RecordingStaging {
    fn put(&mut self, record: ListingRecord) -> Result<()> {
        self.records.insert(record.external_id, record);
        Ok(())
    }

    fn clear_all(&mut self) -> Result<()> {
        self.clear_calls += 1;
        self.records.clear();
        Ok(())
    }

    fn staged(&self) -> Result<Vec<ListingRecord>> {
        Ok(self.records.values().cloned().collect())
    }
}

/// Run-log double exposing the stored runs directly
#[derive(Debug, Default)]
pub struct RecordingRunLog {
    pub runs: Vec<ScrapeRun>,
}

impl RecordingRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&ScrapeRun> {
        self.runs.last()
    }
}

impl RunLogStore for RecordingRunLog {
    fn create(&mut self, run: &ScrapeRun) -> Result<RunId> {
        self.runs.push(run.clone());
        Ok(RunId(self.runs.len() as u64 - 1))
    }

    fn update(&mut self, id: RunId, run: &ScrapeRun) -> Result<()> {
        self.runs[id.0 as usize] = run.clone();
        Ok(())
    }
}
