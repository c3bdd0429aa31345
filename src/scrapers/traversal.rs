//! Drives the catalog's search-and-paginate flow and feeds every listing
//! card through the extractor.

use crate::config::HarvestConfig;
use crate::scrapers::extract::extract_listing;
use crate::scrapers::normalize::clean_price;
use crate::scrapers::traits::{AutomationSession, WaitOutcome};
use crate::store::StagingSink;
use anyhow::Result;
use std::thread;
use tracing::{debug, info, warn};

pub const LISTING_CONTAINER_SELECTOR: &str = ".talalati-sor";
pub const SEARCH_BUTTON_SELECTOR: &str = "button.btn-search";
pub const NEXT_CONTROL_SELECTOR: &str = "li.next";
pub const NEXT_LINK_SELECTOR: &str = "li.next a";
/// Catalog-reported total result count, shown above the first page
pub const RESULT_COUNT_SELECTOR: &str = ".talalatszam";

/// How one traversal ended. Critical automation failures are not an
/// outcome; they propagate as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalOutcome {
    /// Natural end of pagination
    Finished {
        pages: u32,
        extracted: u32,
        skipped: u32,
        /// Catalog-reported total, 0 when the page did not offer one
        expected_total: u32,
    },
    /// Listing container never appeared on this page within the retry
    /// budget. Terminal: a partial page set must never pass for a full
    /// catalog.
    PageTimeout { page: u32 },
}

/// Counters for one processed page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub page: u32,
    pub extracted: u32,
    pub skipped: u32,
}

enum TraversalState {
    Init,
    Searching,
    AwaitingListPage(u32),
    ProcessingPage(u32),
    Finished,
    Aborted(u32),
}

enum Advance {
    NextPage,
    End,
}

pub struct PageTraverser<'a> {
    session: &'a mut dyn AutomationSession,
    staging: &'a mut dyn StagingSink,
    config: &'a HarvestConfig,
    pages: u32,
    extracted: u32,
    skipped: u32,
    expected_total: u32,
}

impl<'a> PageTraverser<'a> {
    pub fn new(
        session: &'a mut dyn AutomationSession,
        staging: &'a mut dyn StagingSink,
        config: &'a HarvestConfig,
    ) -> Self {
        Self {
            session,
            staging,
            config,
            pages: 0,
            extracted: 0,
            skipped: 0,
            expected_total: 0,
        }
    }

    /// Runs the state machine to completion. `on_page` fires once per
    /// successfully processed page, letting the caller keep the run log's
    /// counters current.
    pub fn run(mut self, on_page: &mut dyn FnMut(&PageStats)) -> Result<TraversalOutcome> {
        let mut state = TraversalState::Init;
        loop {
            state = match state {
                TraversalState::Init => {
                    info!(url = %self.config.start_url, "opening catalog");
                    self.session.navigate(&self.config.start_url)?;
                    thread::sleep(self.config.post_nav_pause());
                    self.session.resolve_challenge()?;
                    TraversalState::Searching
                }
                TraversalState::Searching => {
                    self.trigger_search()?;
                    TraversalState::AwaitingListPage(1)
                }
                TraversalState::AwaitingListPage(page) => match self.await_listing_page(page)? {
                    WaitOutcome::Appeared => TraversalState::ProcessingPage(page),
                    WaitOutcome::TimedOut => TraversalState::Aborted(page),
                },
                TraversalState::ProcessingPage(page) => {
                    if page == 1 {
                        self.expected_total = self.read_expected_total()?;
                    }
                    let stats = self.process_page(page)?;
                    on_page(&stats);
                    match self.advance(page)? {
                        Advance::NextPage => TraversalState::AwaitingListPage(page + 1),
                        Advance::End => TraversalState::Finished,
                    }
                }
                TraversalState::Finished => {
                    info!(
                        pages = self.pages,
                        extracted = self.extracted,
                        skipped = self.skipped,
                        "pagination exhausted"
                    );
                    return Ok(TraversalOutcome::Finished {
                        pages: self.pages,
                        extracted: self.extracted,
                        skipped: self.skipped,
                        expected_total: self.expected_total,
                    });
                }
                TraversalState::Aborted(page) => {
                    warn!(page, "listing container never appeared, aborting run");
                    return Ok(TraversalOutcome::PageTimeout { page });
                }
            };
        }
    }

    /// Clicks the search control if the catalog shows one. A deep link
    /// straight into the listing view has no search control; that is the
    /// listing page already, not a failure.
    fn trigger_search(&mut self) -> Result<()> {
        if self.session.query_all(SEARCH_BUTTON_SELECTOR)?.is_empty() {
            debug!("no search control, assuming listing view");
            return Ok(());
        }
        info!("triggering search");
        self.session.click(SEARCH_BUTTON_SELECTOR)?;
        thread::sleep(self.config.post_nav_pause());
        self.session.resolve_challenge()?;
        Ok(())
    }

    /// Bounded wait for the listing container. Exhausting the budget is
    /// fatal to the run, never a "last page" signal.
    fn await_listing_page(&mut self, page: u32) -> Result<WaitOutcome> {
        for attempt in 1..=self.config.page_load_attempts {
            let outcome = self
                .session
                .wait_for_selector(LISTING_CONTAINER_SELECTOR, self.config.page_load_timeout())?;
            if outcome == WaitOutcome::Appeared {
                return Ok(WaitOutcome::Appeared);
            }
            warn!(
                page,
                attempt,
                budget = self.config.page_load_attempts,
                "listing container not yet present"
            );
            if attempt < self.config.page_load_attempts {
                thread::sleep(self.config.retry_pause());
            }
        }
        Ok(WaitOutcome::TimedOut)
    }

    /// Feeds every card on the current page through the extractor. One bad
    /// card is counted and skipped, never aborts the page.
    fn process_page(&mut self, page: u32) -> Result<PageStats> {
        let cards = self.session.query_all(LISTING_CONTAINER_SELECTOR)?;
        let mut stats = PageStats {
            page,
            extracted: 0,
            skipped: 0,
        };
        for card in &cards {
            match extract_listing(card.as_ref()) {
                Some(record) => {
                    debug!(id = record.external_id, title = %record.title, "extracted");
                    self.staging.put(record)?;
                    stats.extracted += 1;
                }
                None => stats.skipped += 1,
            }
        }
        info!(
            page,
            cards = cards.len(),
            extracted = stats.extracted,
            skipped = stats.skipped,
            "page processed"
        );
        self.pages += 1;
        self.extracted += stats.extracted;
        self.skipped += stats.skipped;
        Ok(stats)
    }

    /// Locates the next-page control and advances, or reports the natural
    /// end of pagination. A disabled control, and defensively a control
    /// with no link inside, both end the traversal.
    fn advance(&mut self, page: u32) -> Result<Advance> {
        let Some(control) = self.session.query_all(NEXT_CONTROL_SELECTOR)?.into_iter().next()
        else {
            debug!(page, "no next-page control");
            return Ok(Advance::End);
        };
        let disabled = control
            .attribute("class")
            .map(|c| c.split_whitespace().any(|c| c == "disabled"))
            .unwrap_or(false);
        if disabled {
            debug!(page, "next-page control disabled");
            return Ok(Advance::End);
        }
        if control.find("a").is_none() {
            debug!(page, "next-page control has no link");
            return Ok(Advance::End);
        }
        self.session.click(NEXT_LINK_SELECTOR)?;
        thread::sleep(self.config.paginate_pause());
        self.session.resolve_challenge()?;
        Ok(Advance::NextPage)
    }

    fn read_expected_total(&mut self) -> Result<u32> {
        let total = self
            .session
            .query_all(RESULT_COUNT_SELECTOR)?
            .first()
            .and_then(|e| e.inner_text())
            .as_deref()
            .and_then(clean_price)
            .unwrap_or(0);
        if total > 0 {
            info!(total, "catalog reports total result count");
        }
        Ok(total)
    }
}
