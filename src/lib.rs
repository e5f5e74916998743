//! Scholarship Pipeline Library
//!
//! Scrapes scholarship postings, removes near-duplicate re-posts and loads
//! the result into MySQL.

pub mod combine;
pub mod dates;
pub mod db;
pub mod dedup;
pub mod files;
pub mod normalize;
pub mod scrapers;
pub mod similarity;
pub mod storage;
pub mod types;

pub use dedup::{DedupStats, DetectorConfig, DuplicateChecker};
pub use types::*;
