use serde::Deserialize;
use std::time::Duration;

/// Tunables for one harvest run.
///
/// The commit threshold is deliberately configuration rather than a constant:
/// its correct value tracks the real size of the catalog and will drift.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Entry URL of the catalog
    pub start_url: String,
    /// Minimum staged record count required before a run may replace
    /// production. A run below this is discarded wholesale: stale-but-complete
    /// data beats fresh-but-partial.
    pub commit_threshold: u32,
    /// Attempts to wait for the listing container before a page counts as
    /// timed out
    pub page_load_attempts: u32,
    /// Timeout of a single wait-for-container attempt, milliseconds
    pub page_load_timeout_ms: u64,
    /// Pause between wait attempts, milliseconds
    pub retry_pause_ms: u64,
    /// Pause after triggering pagination, letting the next page start
    /// rendering, milliseconds
    pub paginate_pause_ms: u64,
    /// Pause after the initial navigation and the search click, milliseconds
    pub post_nav_pause_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.hasznaltauto.hu/".to_string(),
            commit_threshold: 10_000,
            page_load_attempts: 3,
            page_load_timeout_ms: 10_000,
            retry_pause_ms: 2_000,
            paginate_pause_ms: 4_000,
            post_nav_pause_ms: 3_000,
        }
    }
}

impl HarvestConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn paginate_pause(&self) -> Duration {
        Duration::from_millis(self.paginate_pause_ms)
    }

    pub fn post_nav_pause(&self) -> Duration {
        Duration::from_millis(self.post_nav_pause_ms)
    }

    /// Config suited to scripted sessions: no pauses, single-attempt waits
    /// aside, the retry budget stays at its production value.
    pub fn for_tests(commit_threshold: u32) -> Self {
        Self {
            start_url: "https://catalog.test/".to_string(),
            commit_threshold,
            page_load_timeout_ms: 0,
            retry_pause_ms: 0,
            paginate_pause_ms: 0,
            post_nav_pause_ms: 0,
            ..Self::default()
        }
    }
}
