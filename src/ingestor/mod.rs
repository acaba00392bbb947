//! Discovery and snapshot ingestion runs.

pub mod contracts;
pub mod snapshots;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use contracts::ContractIngestor;
pub use snapshots::{SnapshotIngestor, SnapshotSettings, WriteOutcome};

/// What a failed underlying does to the rest of a discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryFailurePolicy {
    /// Return the error; later underlyings are not processed.
    #[default]
    Abort,
    /// Record the underlying as failed and move on to the next one.
    ContinueWithNextAsset,
}

impl FromStr for DiscoveryFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" | "continue_with_next_asset" => Ok(Self::ContinueWithNextAsset),
            other => Err(Error::Config(format!("Unknown discovery failure policy: {}", other))),
        }
    }
}

/// What a snapshot write that failed for good does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotFailurePolicy {
    /// Count it and keep going.
    #[default]
    Swallow,
    /// Finish the current page, then return the first failure.
    Propagate,
}

impl FromStr for SnapshotFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swallow" => Ok(Self::Swallow),
            "propagate" => Ok(Self::Propagate),
            other => Err(Error::Config(format!("Unknown snapshot failure policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Underlyings attempted
    pub assets: usize,
    /// Contracts returned by the provider
    pub listed: usize,
    /// Contracts left after the range filter
    pub matched: usize,
    pub stored: usize,
    pub failed_assets: Vec<String>,
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "assets={} listed={} matched={} stored={} failed_assets=[{}]",
            self.assets,
            self.listed,
            self.matched,
            self.stored,
            self.failed_assets.join(",")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub pages: usize,
    /// Active contracts read from the store
    pub contracts: usize,
    /// Snapshots the provider returned
    pub fetched: usize,
    pub written: usize,
    pub duplicates: usize,
    pub never_active: usize,
    pub failed: usize,
}

impl SnapshotReport {
    pub fn record(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written += 1,
            WriteOutcome::Duplicate => self.duplicates += 1,
            WriteOutcome::NeverActive => self.never_active += 1,
            WriteOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for SnapshotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pages={} contracts={} fetched={} written={} duplicates={} never_active={} failed={}",
            self.pages,
            self.contracts,
            self.fetched,
            self.written,
            self.duplicates,
            self.never_active,
            self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("abort".parse::<DiscoveryFailurePolicy>().unwrap(), DiscoveryFailurePolicy::Abort);
        assert_eq!(
            "Continue".parse::<DiscoveryFailurePolicy>().unwrap(),
            DiscoveryFailurePolicy::ContinueWithNextAsset
        );
        assert_eq!("propagate".parse::<SnapshotFailurePolicy>().unwrap(), SnapshotFailurePolicy::Propagate);
        assert!("retry".parse::<SnapshotFailurePolicy>().is_err());
    }

    #[test]
    fn test_report_tallies_outcomes() {
        let mut report = SnapshotReport::default();
        report.record(&WriteOutcome::Written);
        report.record(&WriteOutcome::Written);
        report.record(&WriteOutcome::Duplicate);
        report.record(&WriteOutcome::Failed(Error::Database("lock timeout".into())));

        assert_eq!(report.written, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 1);
        assert!(report.to_string().contains("written=2"));
    }
}
