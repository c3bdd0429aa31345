//! Harvests vehicle listings from a paginated catalog and atomically
//! replaces a production dataset with the snapshot, gated on the run being
//! complete and large enough.

pub mod config;
pub mod models;
pub mod scrapers;
pub mod store;
pub mod testutil;
