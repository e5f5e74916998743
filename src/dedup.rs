//! Near-Duplicate Detection Module
//!
//! Scholarship aggregators re-post the same programme under slightly
//! different titles. `DuplicateChecker` keeps the first posting it sees and
//! rejects later ones that match it closely enough:
//! - identical normalized titles are always duplicates
//! - similar titles are duplicates only when a second field agrees
//!   (deadline, host university, or host country plus deadline)

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_title;
use crate::similarity::similarity;
use crate::types::Record;

/// Similarity thresholds. Every comparison is strict (`>`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub title_threshold: f64,
    pub university_threshold: f64,
    pub country_threshold: f64,
    pub deadline_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.85,
            university_threshold: 0.70,
            country_threshold: 0.80,
            deadline_threshold: 0.60,
        }
    }
}

impl DetectorConfig {
    pub fn with_title_threshold(mut self, threshold: f64) -> Self {
        self.title_threshold = threshold;
        self
    }
}

/// Why a record was judged a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactTitle,
    SameDeadline,
    SimilarUniversity,
    SimilarCountryAndDeadline,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::ExactTitle => write!(f, "exact title"),
            MatchReason::SameDeadline => write!(f, "similar title, same deadline"),
            MatchReason::SimilarUniversity => write!(f, "similar title, similar university"),
            MatchReason::SimilarCountryAndDeadline => {
                write!(f, "similar title, similar country and deadline")
            }
        }
    }
}

/// The accepted record a candidate collided with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateMatch {
    /// Index into [`DuplicateChecker::accepted`].
    pub index: usize,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub total_processed: usize,
    pub duplicates_found: usize,
    pub unique_scholarships: usize,
}

/// Tracks accepted records for one run and classifies new ones.
#[derive(Debug)]
pub struct DuplicateChecker<R> {
    config: DetectorConfig,
    accepted: Vec<R>,
    // normalized title of accepted[i]
    titles: Vec<String>,
    duplicate_count: usize,
}

impl<R: Record> Default for DuplicateChecker<R> {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl<R: Record> DuplicateChecker<R> {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            accepted: Vec::new(),
            titles: Vec::new(),
            duplicate_count: 0,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Submit a record. Returns `true` when it was accepted as unique.
    ///
    /// Records whose title normalizes to nothing are always accepted.
    pub fn submit(&mut self, record: R) -> bool {
        let title = normalize_title(record.title().unwrap_or(""));

        if let Some(found) = self.find_match_normalized(&record, &title) {
            self.duplicate_count += 1;
            debug!(
                "Duplicate ({}): {:?} matches accepted #{}",
                found.reason,
                record.title().unwrap_or(""),
                found.index
            );
            return false;
        }

        self.accepted.push(record);
        self.titles.push(title);
        true
    }

    /// Check a record against the accepted set without recording anything.
    pub fn find_match(&self, record: &R) -> Option<DuplicateMatch> {
        let title = normalize_title(record.title().unwrap_or(""));
        self.find_match_normalized(record, &title)
    }

    fn find_match_normalized(&self, record: &R, title: &str) -> Option<DuplicateMatch> {
        if title.is_empty() {
            return None;
        }

        if let Some(index) = self.titles.iter().position(|t| t == title) {
            return Some(DuplicateMatch {
                index,
                reason: MatchReason::ExactTitle,
            });
        }

        self.accepted
            .iter()
            .zip(&self.titles)
            .enumerate()
            .filter(|(_, (_, existing_title))| {
                similarity(title, existing_title) > self.config.title_threshold
            })
            .find_map(|(index, (existing, _))| {
                self.corroborate(record, existing)
                    .map(|reason| DuplicateMatch { index, reason })
            })
    }

    /// Second-field evidence that two similarly titled records are the same.
    fn corroborate(&self, candidate: &R, existing: &R) -> Option<MatchReason> {
        let deadlines = candidate.deadline().zip(existing.deadline());

        if let Some((a, b)) = deadlines {
            if a == b {
                return Some(MatchReason::SameDeadline);
            }
        }

        if let Some((a, b)) = candidate.host_university().zip(existing.host_university()) {
            if similarity(a, b) > self.config.university_threshold {
                return Some(MatchReason::SimilarUniversity);
            }
        }

        if let (Some((country_a, country_b)), Some((deadline_a, deadline_b))) =
            (candidate.host_country().zip(existing.host_country()), deadlines)
        {
            if similarity(country_a, country_b) > self.config.country_threshold
                && similarity(deadline_a, deadline_b) > self.config.deadline_threshold
            {
                return Some(MatchReason::SimilarCountryAndDeadline);
            }
        }

        None
    }

    /// Accepted records, in submission order.
    pub fn accepted(&self) -> &[R] {
        &self.accepted
    }

    pub fn into_accepted(self) -> Vec<R> {
        self.accepted
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            total_processed: self.accepted.len() + self.duplicate_count,
            duplicates_found: self.duplicate_count,
            unique_scholarships: self.accepted.len(),
        }
    }
}
