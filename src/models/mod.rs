use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fuel type of an advertised vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    Hybrid,
    Lpg,
    Cng,
    #[default]
    Unknown,
}

/// One harvested vehicle advertisement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Numeric id at the end of the listing URL; two records with the same
    /// id are the same advertisement.
    pub external_id: u64,
    pub url: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub price: Option<u32>,
    pub sale_price: Option<u32>,
    pub has_no_price: bool,
    pub is_rentable: bool,
    pub fuel: FuelType,
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub engine_cc: Option<u32>,
    pub power_hp: Option<u32>,
    pub power_kw: Option<u32>,
    pub mileage_km: Option<u32>,
    /// Sorted and de-duplicated
    pub tags: Vec<String>,
    pub description_snippet: String,
    pub seller: String,
    pub scraped_at: DateTime<Utc>,
}

/// States of a scrape run as recorded in the run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Started,
    /// Listing container never appeared on this page within the retry budget
    PageTimeout(u32),
    /// Automation engine or challenge resolution failed
    CriticalError(String),
    /// Traversal finished, commit decision not yet taken
    CompletedPending,
    CommittedSuccess,
    DiscardedInsufficient,
}

/// One execution of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub status: RunStatus,
    /// Catalog-reported total, when the first page offered it
    pub expected_count: u32,
    pub actual_count: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ScrapeRun {
    pub fn started() -> Self {
        Self {
            status: RunStatus::Started,
            expected_count: 0,
            actual_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// True once the run can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RunStatus::PageTimeout(_)
                | RunStatus::CriticalError(_)
                | RunStatus::CommittedSuccess
                | RunStatus::DiscardedInsufficient
        )
    }
}
