//! Per-category totals.

use std::collections::{BTreeSet, HashMap};

use crate::fleet::FleetSnapshot;

/// Running totals for one category label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryAggregate {
    pub size_bytes: u64,
    pub count: usize,
    /// Distinct normalized save-path roots, sorted.
    pub paths: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub label: String,
    pub aggregate: CategoryAggregate,
}

/// Categories sorted by descending size, ties by label.
#[derive(Debug, Clone, Default)]
pub struct CategoryReport {
    pub rows: Vec<CategoryRow>,
}

impl CategoryReport {
    pub fn build(snapshot: &FleetSnapshot) -> Self {
        let mut buckets: HashMap<&str, CategoryAggregate> = HashMap::new();

        for (_, record) in snapshot.records() {
            let bucket = buckets.entry(record.category.as_str()).or_default();
            bucket.size_bytes += record.size_bytes;
            bucket.count += 1;
            bucket.paths.insert(normalize_save_path(&record.save_path));
        }

        let mut rows: Vec<CategoryRow> = buckets
            .into_iter()
            .map(|(label, aggregate)| CategoryRow {
                label: label.to_string(),
                aggregate,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.aggregate
                .size_bytes
                .cmp(&a.aggregate.size_bytes)
                .then_with(|| a.label.cmp(&b.label))
        });

        Self { rows }
    }

    pub fn get(&self, label: &str) -> Option<&CategoryAggregate> {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .map(|row| &row.aggregate)
    }

    pub fn total_size(&self) -> u64 {
        self.rows.iter().map(|row| row.aggregate.size_bytes).sum()
    }
}

/// Truncate a save path at its first purely numeric segment.
///
/// Numeric segments are per-item directories (topic ids and the like), so the
/// prefix before them identifies where a category lives. The result always
/// ends with exactly one separator. Windows-style paths are recognised when
/// they contain backslashes and no forward slashes.
pub fn normalize_save_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let sep = if path.contains('\\') && !path.contains('/') {
        '\\'
    } else {
        '/'
    };

    let kept: Vec<&str> = path
        .split(sep)
        .take_while(|segment| !is_numeric_segment(segment))
        .collect();

    let mut root = kept.join(&sep.to_string());
    while root.ends_with(sep) {
        root.pop();
    }
    root.push(sep);
    root
}

fn is_numeric_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::endpoint::ListFilter;
    use crate::fleet::Fleet;
    use crate::testing::{fixtures, MockEndpoint};

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_normalize_truncates_at_numeric_segment() {
        assert_eq!(normalize_save_path("/data/films/6012345/extra"), "/data/films/");
        assert_eq!(normalize_save_path("/data/films"), "/data/films/");
        assert_eq!(normalize_save_path("/data/films/"), "/data/films/");
        assert_eq!(normalize_save_path("/1080p/films"), "/1080p/films/");
        assert_eq!(normalize_save_path("/123/films"), "/");
    }

    #[test]
    fn test_normalize_windows_paths() {
        assert_eq!(normalize_save_path(r"D:\Torrents\42\"), r"D:\Torrents\");
        assert_eq!(normalize_save_path(r"D:\Torrents"), r"D:\Torrents\");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_save_path(""), "");
    }

    #[tokio::test]
    async fn test_category_totals_across_endpoints() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let b = Arc::new(MockEndpoint::new("b", 8080));
        a.add_torrent(fixtures::record_in_category("m1", "movies", GIB, "/data/movies/1"))
            .await;
        a.add_torrent(fixtures::record_in_category("m2", "movies", 2 * GIB, "/data/movies/2"))
            .await;
        b.add_torrent(fixtures::record_in_category("m3", "movies", 3 * GIB, "/mnt/movies"))
            .await;
        b.add_torrent(fixtures::record_in_category("s1", "series", 10 * GIB, "/data/tv/7"))
            .await;

        let fleet = Fleet::new(vec![a, b]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let report = CategoryReport::build(&snapshot);

        let movies = report.get("movies").unwrap();
        assert_eq!(movies.size_bytes, 6 * GIB);
        assert_eq!(movies.count, 3);
        assert_eq!(
            movies.paths.iter().cloned().collect::<Vec<_>>(),
            vec!["/data/movies/".to_string(), "/mnt/movies/".to_string()]
        );

        // Sorted by descending size
        assert_eq!(report.rows[0].label, "series");
        assert_eq!(report.rows[1].label, "movies");
    }

    #[tokio::test]
    async fn test_category_sizes_are_conserved() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        for (i, (cat, size)) in [("x", 5), ("y", 7), ("", 11), ("x", 13)].iter().enumerate() {
            a.add_torrent(fixtures::record_in_category(
                &format!("h{}", i),
                cat,
                *size,
                "/data",
            ))
            .await;
        }

        let fleet = Fleet::new(vec![a]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let report = CategoryReport::build(&snapshot);

        assert_eq!(report.total_size(), snapshot.total_size());
        assert_eq!(report.total_size(), 36);
    }

    #[tokio::test]
    async fn test_equal_sizes_sort_by_label() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent(fixtures::record_in_category("1", "b", 5, "/d")).await;
        a.add_torrent(fixtures::record_in_category("2", "a", 5, "/d")).await;

        let fleet = Fleet::new(vec![a]);
        let report = CategoryReport::build(&FleetSnapshot::fetch(&fleet, ListFilter::All).await);
        let labels: Vec<_> = report.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }
}
