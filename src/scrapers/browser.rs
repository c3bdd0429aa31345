//! Headless-Chrome implementation of the automation session.
//!
//! Element handles are captured as outer-HTML fragments and re-parsed with
//! `scraper`, so all extraction code works on plain HTML and tests can build
//! handles from string fixtures.

use crate::scrapers::traits::{AutomationSession, ElementHandle, WaitOutcome};
use anyhow::{bail, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Selector of the anti-automation interstitial
const CHALLENGE_SELECTOR: &str = "#challenge-running, #challenge-form";
const CHALLENGE_GRACE: Duration = Duration::from_secs(3);
const CHALLENGE_ATTEMPTS: u32 = 5;

/// Element handle backed by an owned HTML fragment
pub struct HtmlHandle {
    doc: Html,
}

impl HtmlHandle {
    pub fn from_fragment(html: &str) -> Self {
        Self {
            doc: Html::parse_fragment(html),
        }
    }

    /// First real element of the fragment. `parse_fragment` wraps content in
    /// a synthetic root, which carries no attributes of its own.
    fn root(&self) -> ElementRef<'_> {
        let wrapper = self.doc.root_element();
        wrapper
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .unwrap_or(wrapper)
    }

    fn selector(selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(sel) => Some(sel),
            Err(err) => {
                warn!(selector, ?err, "unparseable selector");
                None
            }
        }
    }
}

impl ElementHandle for HtmlHandle {
    fn inner_text(&self) -> Option<String> {
        Some(self.root().text().collect::<String>())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.root().value().attr(name).map(str::to_string)
    }

    fn find(&self, selector: &str) -> Option<Box<dyn ElementHandle>> {
        let sel = Self::selector(selector)?;
        self.root()
            .select(&sel)
            .next()
            .map(|el| Box::new(Self::from_fragment(&el.html())) as Box<dyn ElementHandle>)
    }

    fn find_all(&self, selector: &str) -> Vec<Box<dyn ElementHandle>> {
        let Some(sel) = Self::selector(selector) else {
            return Vec::new();
        };
        self.root()
            .select(&sel)
            .map(|el| Box::new(Self::from_fragment(&el.html())) as Box<dyn ElementHandle>)
            .collect()
    }
}

/// Live browser session over one tab.
///
/// Acquired once per run; the coordinator closes it on every exit path.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn new() -> Result<Self> {
        info!("Launching headless Chrome...");
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;
        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl AutomationSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.tab
            .navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .with_context(|| format!("Navigation to {url} failed"))?;
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        debug!(selector, "clicking");
        let element = self
            .tab
            .find_element(selector)
            .with_context(|| format!("No clickable element for {selector}"))?;
        element
            .click()
            .with_context(|| format!("Click on {selector} failed"))?;
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<WaitOutcome> {
        // The engine reports "not found within the deadline" as an error;
        // the distinction the pipeline needs is appeared-or-not.
        match self
            .tab
            .wait_for_element_with_custom_timeout(selector, timeout)
        {
            Ok(_) => Ok(WaitOutcome::Appeared),
            Err(err) => {
                debug!(selector, ?err, "selector did not appear");
                Ok(WaitOutcome::TimedOut)
            }
        }
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<Box<dyn ElementHandle>>> {
        let elements = match self.tab.find_elements(selector) {
            Ok(els) => els,
            // "no element" comes back as an error from the engine
            Err(_) => return Ok(Vec::new()),
        };
        let mut handles: Vec<Box<dyn ElementHandle>> = Vec::with_capacity(elements.len());
        for element in elements {
            let html = element
                .get_content()
                .context("Failed to capture element HTML")?;
            handles.push(Box::new(HtmlHandle::from_fragment(&html)));
        }
        Ok(handles)
    }

    fn resolve_challenge(&mut self) -> Result<()> {
        for attempt in 1..=CHALLENGE_ATTEMPTS {
            if self.tab.find_elements(CHALLENGE_SELECTOR).is_err() {
                return Ok(());
            }
            debug!(attempt, "challenge interstitial present, waiting it out");
            thread::sleep(CHALLENGE_GRACE);
        }
        bail!("Challenge interstitial did not clear after {CHALLENGE_ATTEMPTS} attempts")
    }

    fn close(&mut self) -> Result<()> {
        info!("Closing browser session");
        self.tab.close(true).context("Failed to close tab")?;
        Ok(())
    }
}
