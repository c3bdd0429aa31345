use anyhow::Result;
use std::time::Duration;

/// Outcome of waiting for a selector to appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Appeared,
    TimedOut,
}

/// One rendered catalog fragment, queryable for sub-elements.
///
/// Every accessor is optional: a missing sub-element is a value, not an
/// error, so extraction code decides per field whether absence is a skip or
/// a default.
pub trait ElementHandle {
    fn inner_text(&self) -> Option<String>;
    fn attribute(&self, name: &str) -> Option<String>;
    fn find(&self, selector: &str) -> Option<Box<dyn ElementHandle>>;
    fn find_all(&self, selector: &str) -> Vec<Box<dyn ElementHandle>>;
}

/// Blocking surface of the page-rendering/automation engine.
///
/// The pipeline is strictly sequential; every call here blocks until the
/// engine is done. Errors from these methods are fatal to the run.
pub trait AutomationSession {
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn click(&mut self, selector: &str) -> Result<()>;
    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<WaitOutcome>;
    fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>>;
    /// Resolve any anti-automation interstitial currently shown. Opaque:
    /// either it returns resolved or it fails the run.
    fn resolve_challenge(&mut self) -> Result<()>;
    /// Release the underlying browser/profile resources. Called on every
    /// exit path, success or failure.
    fn close(&mut self) -> Result<()>;
}
