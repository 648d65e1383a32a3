//! Types for the round driver.

use chrono::{DateTime, Utc};

use crate::balancer::LoadBalanceOutcome;
use crate::config::Config;
use crate::control::{FilterOutcome, PauseAction, PauseOutcome};
use crate::dedup::{DedupMode, DedupOutcome};
use crate::fleet::{FleetError, OperationFailure};
use crate::report::{
    CategoryReport, ErrorReport, ForceStartOutcome, MissingFilesNotice, StatusReport,
};
use crate::search::{SearchOutcome, SearchQuery};

/// Operations selected for each round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operations {
    /// Load balancing headroom. `None` disables balancing.
    pub headroom: Option<u64>,
    pub pause: bool,
    pub resume: bool,
    pub filters: bool,
    /// Status report plus force-start normalisation.
    pub status: bool,
    pub categories: bool,
    pub dedup: Option<DedupMode>,
    pub search: Option<SearchQuery>,
    pub errors: bool,
}

impl Operations {
    /// Reject combinations that cannot run together.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.pause && self.resume {
            return Err(FleetError::InvalidArgument(
                "pause and resume cannot be requested together".to_string(),
            ));
        }
        if self.search.as_ref().is_some_and(SearchQuery::is_empty) {
            return Err(FleetError::InvalidArgument(
                "search needs a theme or a hash".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pause_action(&self) -> Option<PauseAction> {
        match (self.pause, self.resume) {
            (true, false) => Some(PauseAction::Pause),
            (false, true) => Some(PauseAction::Resume),
            _ => None,
        }
    }

    /// Missing-files notices accompany either totals report.
    pub fn wants_missing_files(&self) -> bool {
        self.categories || self.status
    }

    /// Error dumps also accompany a resume.
    pub fn wants_errors(&self) -> bool {
        self.errors || self.resume
    }

    /// Whether any selected operation reads the shared snapshot.
    pub fn needs_snapshot(&self) -> bool {
        self.status
            || self.categories
            || self.dedup.is_some()
            || self.pause_action().is_some()
            || self.wants_errors()
    }

    pub fn is_empty(&self) -> bool {
        !self.needs_snapshot()
            && self.headroom.is_none()
            && !self.filters
            && self.search.is_none()
    }
}

/// Settings shared by every round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSettings {
    /// Source of the IP filter list.
    pub filter_url: String,
}

impl RoundSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter_url: config.filters.url.clone(),
        }
    }
}

/// Everything one round produced.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records in the shared snapshot.
    pub snapshot_size: usize,
    pub categories: Option<CategoryReport>,
    pub status: Option<StatusReport>,
    pub force_start: Option<ForceStartOutcome>,
    pub dedup: Option<DedupOutcome>,
    pub balance: Option<LoadBalanceOutcome>,
    pub search: Option<SearchOutcome>,
    pub pause: Option<PauseOutcome>,
    pub filters: Option<FilterOutcome>,
    pub errors: Option<ErrorReport>,
    /// `missingFiles` records, collected once when either totals report ran.
    pub missing_files: Vec<MissingFilesNotice>,
    /// Every failure collected during the round.
    pub failures: Vec<OperationFailure>,
}

impl RoundReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ForumThemeId;

    #[test]
    fn test_pause_and_resume_conflict() {
        let ops = Operations {
            pause: true,
            resume: true,
            ..Default::default()
        };
        assert!(matches!(ops.validate(), Err(FleetError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_search_rejected() {
        let ops = Operations {
            search: Some(SearchQuery::default()),
            ..Default::default()
        };
        assert!(ops.validate().is_err());

        let ops = Operations {
            search: Some(SearchQuery::by_theme(ForumThemeId(1))),
            ..Default::default()
        };
        assert!(ops.validate().is_ok());
    }

    #[test]
    fn test_resume_implies_error_dump() {
        let ops = Operations {
            resume: true,
            ..Default::default()
        };
        assert_eq!(ops.pause_action(), Some(PauseAction::Resume));
        assert!(ops.wants_errors());
        assert!(ops.needs_snapshot());
    }

    #[test]
    fn test_snapshot_not_needed_for_fleet_level_operations() {
        let ops = Operations {
            headroom: Some(2),
            filters: true,
            search: Some(SearchQuery::by_hash("aa")),
            ..Default::default()
        };
        assert!(!ops.needs_snapshot());
        assert!(!ops.is_empty());
        assert!(Operations::default().is_empty());
    }
}
