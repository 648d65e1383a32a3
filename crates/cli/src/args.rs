//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use qbfleet_core::balancer::MAX_QUEUE_LIMIT;
use qbfleet_core::dedup::DedupMode;
use qbfleet_core::search::SearchQuery;
use qbfleet_core::{ForumThemeId, Operations};

/// Operate a fleet of qBittorrent instances as one unit.
#[derive(Debug, Parser)]
#[command(name = "qbfleet", version)]
pub struct Args {
    /// Path to the fleet configuration file
    pub config: PathBuf,

    /// Tune the download queue: active slots = stalled downloads + N (0 disables)
    #[arg(
        short = 'q',
        long = "queue",
        value_name = "N",
        default_value_t = 0,
        value_parser = clap::value_parser!(u64).range(0..=MAX_QUEUE_LIMIT)
    )]
    pub queue: u64,

    /// Repeat rounds until interrupted
    #[arg(short = 'l', long = "loop")]
    pub looping: bool,

    /// Pause every torrent
    #[arg(short, long, conflicts_with = "resume")]
    pub pause: bool,

    /// Resume every torrent (also dumps errored torrents)
    #[arg(short, long)]
    pub resume: bool,

    /// Renew IP filter lists
    #[arg(short, long)]
    pub filters: bool,

    /// Per-state totals, with force-start normalisation
    #[arg(short, long)]
    pub info: bool,

    /// Search by forum theme id
    #[arg(short, long, value_name = "THEME")]
    pub search: Option<ForumThemeId>,

    /// Search by info hash
    #[arg(long, value_name = "HASH")]
    pub search_hash: Option<String>,

    /// Per-category totals
    #[arg(short, long)]
    pub categories: bool,

    /// Find and remove duplicates by forum theme id
    #[arg(short, long)]
    pub doubles: bool,

    /// Report duplicates without removing them
    #[arg(long, requires = "doubles")]
    pub dry_run: bool,

    /// Exit with code 1 if any torrent is in a state that keeps it out of reports
    #[arg(long)]
    pub check: bool,

    /// Dump errored torrents
    #[arg(short, long)]
    pub errors: bool,

    /// Colored output
    #[arg(long)]
    pub color: bool,

    /// Fewer messages: no banner, no connection details
    #[arg(short = 'm', long)]
    pub silent: bool,
}

impl Args {
    /// Operations to run each round.
    pub fn operations(&self) -> Operations {
        let hash = self
            .search_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        let search = (self.search.is_some() || hash.is_some())
            .then(|| SearchQuery::new(self.search, hash));

        let dedup = self.doubles.then_some(if self.dry_run {
            DedupMode::ReportOnly
        } else {
            DedupMode::Delete
        });

        Operations {
            headroom: (self.queue > 0).then_some(self.queue),
            pause: self.pause,
            resume: self.resume,
            filters: self.filters,
            status: self.info,
            categories: self.categories,
            dedup,
            search,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("qbfleet").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_pause_conflicts_with_resume() {
        assert!(parse(&["fleet.toml", "-p", "-r"]).is_err());
        assert!(parse(&["fleet.toml", "-p"]).is_ok());
    }

    #[test]
    fn test_zero_queue_disables_balancing() {
        let args = parse(&["fleet.toml", "-q", "0"]).unwrap();
        assert_eq!(args.operations().headroom, None);

        let args = parse(&["fleet.toml", "--queue", "3"]).unwrap();
        assert_eq!(args.operations().headroom, Some(3));
    }

    #[test]
    fn test_queue_rejects_values_out_of_range() {
        assert!(parse(&["fleet.toml", "-q", "18446744073709551615"]).is_err());
        assert!(parse(&["fleet.toml", "-q", "2147483648"]).is_err());
        assert!(parse(&["fleet.toml", "-q", "-1"]).is_err());

        let args = parse(&["fleet.toml", "-q", "2147483647"]).unwrap();
        assert_eq!(args.operations().headroom, Some(2147483647));
    }

    #[test]
    fn test_search_flags_build_query() {
        let args = parse(&["fleet.toml", "-s", "6012345", "--search-hash", "ABCD"]).unwrap();
        let query = args.operations().search.unwrap();
        assert_eq!(query.theme, Some(ForumThemeId(6012345)));
        assert_eq!(query.hash.as_deref(), Some("ABCD"));

        let args = parse(&["fleet.toml", "--search-hash", " "]).unwrap();
        assert!(args.operations().search.is_none());

        assert!(parse(&["fleet.toml", "-s", "abc"]).is_err());
    }

    #[test]
    fn test_dry_run_requires_doubles() {
        assert!(parse(&["fleet.toml", "--dry-run"]).is_err());

        let args = parse(&["fleet.toml", "-d", "--dry-run"]).unwrap();
        assert_eq!(args.operations().dedup, Some(DedupMode::ReportOnly));

        let args = parse(&["fleet.toml", "-d"]).unwrap();
        assert_eq!(args.operations().dedup, Some(DedupMode::Delete));
    }

    #[test]
    fn test_config_path_is_required() {
        assert!(parse(&[]).is_err());
    }
}
