use std::fmt;
use std::sync::Arc;

use crate::endpoint::{Endpoint, EndpointId, TorrentRecord};
use crate::fleet::ForumThemeId;

/// What to look for across the fleet. A record matches when either
/// criterion matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub theme: Option<ForumThemeId>,
    /// Info hash, compared case-insensitively.
    pub hash: Option<String>,
}

impl SearchQuery {
    pub fn new(theme: Option<ForumThemeId>, hash: Option<String>) -> Self {
        Self { theme, hash }
    }

    pub fn by_theme(theme: ForumThemeId) -> Self {
        Self::new(Some(theme), None)
    }

    pub fn by_hash(hash: impl Into<String>) -> Self {
        Self::new(None, Some(hash.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.theme.is_none() && self.hash.is_none()
    }

    /// Whether a record with `hash` and resolved `theme` matches.
    pub fn matches(&self, hash: &str, theme: Option<ForumThemeId>) -> bool {
        let theme_match = matches!((self.theme, theme), (Some(q), Some(t)) if q == t);
        let hash_match = self
            .hash
            .as_deref()
            .is_some_and(|q| q.eq_ignore_ascii_case(hash));
        theme_match || hash_match
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.theme, &self.hash) {
            (Some(theme), Some(hash)) => write!(f, "theme {} or hash {}", theme, hash),
            (Some(theme), None) => write!(f, "theme {}", theme),
            (None, Some(hash)) => write!(f, "hash {}", hash),
            (None, None) => f.write_str("nothing"),
        }
    }
}

/// One record queued for inspection by a search worker.
#[derive(Clone)]
pub struct SearchJob {
    pub endpoint_index: usize,
    pub endpoint: Arc<dyn Endpoint>,
    pub record: TorrentRecord,
}

/// A record that satisfied the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub endpoint_index: usize,
    pub endpoint: EndpointId,
    pub record: TorrentRecord,
    /// Theme resolved for the record, when a theme query was set.
    pub theme: Option<ForumThemeId>,
}
