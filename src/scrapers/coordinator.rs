//! Owns the run lifecycle and the staged-to-production commit protocol.
//!
//! Production is only ever written here, and only as a full replacement.
//! A run that timed out, failed, or yielded too little leaves production
//! exactly as it was.

use crate::config::HarvestConfig;
use crate::models::{RunStatus, ScrapeRun};
use crate::scrapers::traits::AutomationSession;
use crate::scrapers::traversal::{PageStats, PageTraverser, TraversalOutcome};
use crate::store::{ProductionStore, RunId, RunLogStore, StagingSink};
use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

pub struct RunCoordinator<'a, S, P, L>
where
    S: StagingSink,
    P: ProductionStore,
    L: RunLogStore,
{
    staging: &'a mut S,
    production: &'a mut P,
    run_log: &'a mut L,
    config: &'a HarvestConfig,
}

impl<'a, S, P, L> RunCoordinator<'a, S, P, L>
where
    S: StagingSink,
    P: ProductionStore,
    L: RunLogStore,
{
    pub fn new(
        staging: &'a mut S,
        production: &'a mut P,
        run_log: &'a mut L,
        config: &'a HarvestConfig,
    ) -> Self {
        Self {
            staging,
            production,
            run_log,
            config,
        }
    }

    /// Runs one full harvest. The session is closed and staging cleared on
    /// every path out of here; the returned run mirrors what the run log
    /// records and is the sole statement of success or failure.
    pub fn execute(mut self, session: &mut dyn AutomationSession) -> Result<ScrapeRun> {
        let mut run = ScrapeRun::started();
        info!(started_at = %run.started_at, "scrape run started");

        // Staging never carries data across runs. Setup failures flow into
        // the same close-then-settle tail as traversal failures, so the
        // session is released on this path too.
        let setup = self
            .staging
            .clear_all()
            .and_then(|()| self.run_log.create(&run));
        let (run_id, outcome) = match setup {
            Ok(run_id) => {
                let outcome = self.traverse(session, &mut run, run_id);
                (Some(run_id), outcome)
            }
            Err(err) => (None, Err(err)),
        };

        // The browser/profile is released before any verdict is reached,
        // success or failure alike.
        if let Err(err) = session.close() {
            warn!(error = %format!("{err:#}"), "session close failed");
        }

        if let Err(err) = self.settle(outcome, &mut run) {
            error!(error = %format!("{err:#}"), "run settlement failed");
            run.status = RunStatus::CriticalError(format!("{err:#}"));
            let _ = self.staging.clear_all();
        }

        run.ended_at = Some(Utc::now());
        if let Some(run_id) = run_id {
            self.run_log.update(run_id, &run)?;
        }
        info!(status = ?run.status, actual = run.actual_count, "scrape run ended");
        Ok(run)
    }

    fn traverse(
        &mut self,
        session: &mut dyn AutomationSession,
        run: &mut ScrapeRun,
        run_id: RunId,
    ) -> Result<TraversalOutcome> {
        let run_log = &mut *self.run_log;
        let mut total = 0u32;
        let mut on_page = |stats: &PageStats| {
            total += stats.extracted;
            run.actual_count = total;
            if let Err(err) = run_log.update(run_id, run) {
                warn!(page = stats.page, error = %format!("{err:#}"), "run log update failed");
            }
        };
        PageTraverser::new(session, &mut *self.staging, self.config).run(&mut on_page)
    }

    /// Terminal decision: replace production or discard the harvest.
    fn settle(&mut self, outcome: Result<TraversalOutcome>, run: &mut ScrapeRun) -> Result<()> {
        match outcome {
            Ok(TraversalOutcome::Finished {
                pages,
                extracted,
                skipped,
                expected_total,
            }) => {
                run.expected_count = expected_total;
                run.status = RunStatus::CompletedPending;

                let staged = self.staging.staged()?;
                let count = staged.len() as u32;
                run.actual_count = count;
                info!(pages, extracted, skipped, staged = count, "traversal finished");

                if count >= self.config.commit_threshold {
                    // Atomic replace: clear, bulk insert, nothing in between
                    self.production.clear_all()?;
                    self.production.bulk_insert(staged)?;
                    self.staging.clear_all()?;
                    run.status = RunStatus::CommittedSuccess;
                    info!(count, "staged snapshot committed to production");
                } else {
                    self.staging.clear_all()?;
                    run.status = RunStatus::DiscardedInsufficient;
                    warn!(
                        count,
                        threshold = self.config.commit_threshold,
                        "harvest below threshold, production left untouched"
                    );
                }
            }
            Ok(TraversalOutcome::PageTimeout { page }) => {
                self.staging.clear_all()?;
                run.status = RunStatus::PageTimeout(page);
                warn!(page, "run aborted on page timeout, production left untouched");
            }
            Err(err) => {
                self.staging.clear_all()?;
                run.status = RunStatus::CriticalError(format!("{err:#}"));
                error!(error = %format!("{err:#}"), "automation failure, production left untouched");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        broken_card, listing_card, FakeCatalogSession, ProductionOp, RecordingProduction,
        RecordingRunLog, RecordingStaging,
    };

    fn run_pipeline(
        mut session: FakeCatalogSession,
        threshold: u32,
    ) -> (
        ScrapeRun,
        FakeCatalogSession,
        RecordingStaging,
        RecordingProduction,
        RecordingRunLog,
    ) {
        let mut staging = RecordingStaging::new();
        let mut production = RecordingProduction::new();
        let mut run_log = RecordingRunLog::new();
        let config = HarvestConfig::for_tests(threshold);

        let run = RunCoordinator::new(&mut staging, &mut production, &mut run_log, &config)
            .execute(&mut session)
            .unwrap();
        (run, session, staging, production, run_log)
    }

    #[test]
    fn above_threshold_run_replaces_production_atomically() {
        let session = FakeCatalogSession::new(vec![
            vec![listing_card(1), listing_card(2)],
            vec![listing_card(3), listing_card(4), listing_card(5)],
        ]);
        let (run, session, staging, production, run_log) = run_pipeline(session, 4);

        assert_eq!(run.status, RunStatus::CommittedSuccess);
        assert_eq!(run.actual_count, 5);
        assert!(run.ended_at.is_some());
        assert_eq!(
            production.ops,
            vec![ProductionOp::ClearAll, ProductionOp::BulkInsert(5)]
        );
        let ids: Vec<u64> = production.records.iter().map(|r| r.external_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(staging.is_empty());
        assert!(session.closed);
        assert_eq!(run_log.latest().unwrap().status, RunStatus::CommittedSuccess);
    }

    #[test]
    fn below_threshold_run_is_discarded_and_production_untouched() {
        let session = FakeCatalogSession::new(vec![vec![listing_card(1), listing_card(2)]]);
        let (run, session, staging, production, _) = run_pipeline(session, 100);

        assert_eq!(run.status, RunStatus::DiscardedInsufficient);
        assert_eq!(run.actual_count, 2);
        assert!(production.ops.is_empty());
        assert!(staging.is_empty());
        assert!(session.closed);
    }

    #[test]
    fn page_timeout_aborts_without_commit() {
        let mut session = FakeCatalogSession::new(vec![
            vec![listing_card(1)],
            vec![listing_card(2)],
        ]);
        session.timeout_on_page = Some(2);
        let (run, session, staging, production, run_log) = run_pipeline(session, 0);

        assert_eq!(run.status, RunStatus::PageTimeout(2));
        assert!(production.ops.is_empty());
        assert!(staging.is_empty());
        assert!(session.closed);
        assert_eq!(run_log.latest().unwrap().status, RunStatus::PageTimeout(2));
    }

    #[test]
    fn challenge_failure_becomes_critical_error_and_releases_the_session() {
        let mut session = FakeCatalogSession::new(vec![vec![listing_card(1)]]);
        session.challenge_fails_at = Some(1);
        let (run, session, staging, production, _) = run_pipeline(session, 0);

        match &run.status {
            RunStatus::CriticalError(message) => {
                assert!(message.contains("challenge"), "unexpected message: {message}")
            }
            other => panic!("expected CriticalError, got {other:?}"),
        }
        assert!(production.ops.is_empty());
        assert!(staging.is_empty());
        assert!(session.closed);
    }

    #[test]
    fn skipped_cards_do_not_count_toward_the_threshold() {
        // 2 + 3 cards, one of them a promotional slot; threshold 4 means the
        // 4 real records are exactly enough
        let session = FakeCatalogSession::new(vec![
            vec![listing_card(1), listing_card(2)],
            vec![listing_card(3), broken_card(), listing_card(4)],
        ]);
        let (run, _, _, production, _) = run_pipeline(session, 4);

        assert_eq!(run.status, RunStatus::CommittedSuccess);
        assert_eq!(run.actual_count, 4);
        assert_eq!(production.records.len(), 4);
    }

    #[test]
    fn run_log_create_failure_still_releases_the_session() {
        struct BrokenRunLog;
        impl RunLogStore for BrokenRunLog {
            fn create(&mut self, _run: &ScrapeRun) -> Result<RunId> {
                anyhow::bail!("run log unavailable")
            }
            fn update(&mut self, _id: RunId, _run: &ScrapeRun) -> Result<()> {
                anyhow::bail!("run log unavailable")
            }
        }

        let mut session = FakeCatalogSession::new(vec![vec![listing_card(1)]]);
        let mut staging = RecordingStaging::new();
        let mut production = RecordingProduction::new();
        let mut run_log = BrokenRunLog;
        let config = HarvestConfig::for_tests(0);

        let run = RunCoordinator::new(&mut staging, &mut production, &mut run_log, &config)
            .execute(&mut session)
            .unwrap();

        assert!(session.closed);
        assert!(matches!(run.status, RunStatus::CriticalError(_)));
        assert!(production.ops.is_empty());
        assert!(staging.is_empty());
    }

    #[test]
    fn duplicate_advertisement_within_a_run_commits_once() {
        let session = FakeCatalogSession::new(vec![
            vec![listing_card(1), listing_card(7)],
            vec![listing_card(7), listing_card(9)],
        ]);
        let (run, _, _, production, _) = run_pipeline(session, 2);

        assert_eq!(run.status, RunStatus::CommittedSuccess);
        assert_eq!(run.actual_count, 3);
        let ids: Vec<u64> = production.records.iter().map(|r| r.external_id).collect();
        assert_eq!(ids, vec![1, 7, 9]);
    }
}
