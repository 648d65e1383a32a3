//! Forum theme identity parsed from torrent comments.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Tracker marker followed by `=<digits>` at the end of the comment.
static THEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"rutracker.*=([0-9]+)$").expect("theme pattern is valid"));

/// Numeric forum topic identity correlating the same content across endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForumThemeId(pub u64);

impl ForumThemeId {
    /// Extract the theme from a comment. Returns `None` when the comment does
    /// not carry one, or when the digits overflow.
    pub fn extract(descriptor: &str) -> Option<Self> {
        THEME_PATTERN
            .captures(descriptor)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(ForumThemeId)
    }
}

impl FromStr for ForumThemeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ForumThemeId)
    }
}

impl fmt::Display for ForumThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
