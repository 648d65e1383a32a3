//! Terminal tables for round results.

use qbfleet_core::balancer::LoadBalanceOutcome;
use qbfleet_core::control::{FilterOutcome, GateOutcome, GateVerdict, PauseOutcome};
use qbfleet_core::dedup::DedupOutcome;
use qbfleet_core::report::{CategoryReport, ErrorReport, MissingFilesNotice, StatusReport};
use qbfleet_core::search::SearchOutcome;
use qbfleet_core::{ConnectionStatus, OperationFailure, RoundReport};
use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Size in GiB with two decimals.
pub fn gib(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / GIB)
}

fn table<T: Tabled>(title: &str, rows: impl IntoIterator<Item = T>) -> Table {
    let mut table = Table::new(rows);
    table.with(Panel::header(title));
    table.with(Style::blank());
    table
}

#[derive(Tabled)]
struct ConnectionRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Session")]
    session: String,
    #[tabled(rename = "Version")]
    version: String,
}

#[derive(Tabled)]
struct CategoryTableRow {
    #[tabled(rename = "Cat")]
    label: String,
    #[tabled(rename = "Size, GiB")]
    size: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Paths")]
    paths: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "Status")]
    label: String,
    #[tabled(rename = "TotalSize, GiB")]
    size: String,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct DuplicateRow {
    #[tabled(rename = "Theme")]
    theme: String,
    #[tabled(rename = "Kept")]
    kept: String,
    #[tabled(rename = "Removed")]
    removed: String,
}

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Stalled")]
    stalled: u64,
    #[tabled(rename = "Active limit")]
    limit: u64,
}

#[derive(Tabled)]
struct TorrentRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Added")]
    added: String,
    #[tabled(rename = "Save path")]
    save_path: String,
}

#[derive(Tabled)]
struct MissingRow {
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Save path")]
    save_path: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Error")]
    error: String,
}

fn torrent_row(endpoint: &impl ToString, record: &qbfleet_core::TorrentRecord) -> TorrentRow {
    TorrentRow {
        endpoint: endpoint.to_string(),
        hash: record.hash.clone(),
        name: record.name.clone(),
        state: record.state.to_string(),
        added: record
            .added_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        save_path: record.save_path.clone(),
    }
}

pub fn connections(statuses: &[ConnectionStatus]) -> Table {
    table(
        "Endpoints",
        statuses.iter().map(|s| ConnectionRow {
            endpoint: s.endpoint.to_string(),
            session: match &s.error {
                Some(error) => format!("{:?}: {}", s.state, error),
                None => format!("{:?}", s.state),
            },
            version: s.version.clone().unwrap_or_default(),
        }),
    )
}

pub fn categories(report: &CategoryReport) -> Table {
    table(
        "Categories",
        report.rows.iter().map(|row| CategoryTableRow {
            label: row.label.clone(),
            size: gib(row.aggregate.size_bytes),
            count: row.aggregate.count,
            paths: row
                .aggregate
                .paths
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join("|"),
        }),
    )
}

pub fn statuses(report: &StatusReport) -> Table {
    table(
        "Statuses",
        report.rows.iter().map(|row| StatusTableRow {
            label: row.key.label(),
            size: gib(row.aggregate.size_bytes),
            count: row.aggregate.count,
        }),
    )
}

fn missing_files(notices: &[MissingFilesNotice]) -> Table {
    table(
        "Missing files",
        notices.iter().map(|n| MissingRow {
            endpoint: n.endpoint.to_string(),
            name: n.name.clone(),
            save_path: n.save_path.clone(),
        }),
    )
}

pub fn duplicates(outcome: &DedupOutcome) -> Table {
    table(
        "Duplicates",
        outcome.plan.groups.iter().map(|group| DuplicateRow {
            theme: group.theme.to_string(),
            kept: group
                .survivor()
                .map(|m| format!("{} {} ({})", m.endpoint, m.record.hash, m.record.name))
                .unwrap_or_default(),
            removed: group
                .redundant()
                .iter()
                .map(|m| format!("{} {}", m.endpoint, m.record.hash))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    )
}

pub fn queues(outcome: &LoadBalanceOutcome) -> Table {
    table(
        "Download queues",
        outcome.decisions.iter().map(|d| QueueRow {
            endpoint: d.endpoint.to_string(),
            stalled: d.stalled,
            limit: d.new_limit,
        }),
    )
}

pub fn search_matches(outcome: &SearchOutcome) -> Table {
    table(
        &format!("Search: {} of {} matched", outcome.matches.len(), outcome.inspected),
        outcome
            .matches
            .iter()
            .map(|m| torrent_row(&m.endpoint, &m.record)),
    )
}

pub fn errored(report: &ErrorReport) -> Table {
    table(
        "Errored torrents",
        report
            .torrents
            .iter()
            .map(|t| torrent_row(&t.endpoint, &t.record)),
    )
}

pub fn failures(failures: &[OperationFailure]) -> Table {
    table(
        "Failures",
        failures.iter().map(|f| FailureRow {
            operation: f.operation.to_string(),
            endpoint: f
                .endpoint
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "fleet".to_string()),
            error: f.error.clone(),
        }),
    )
}

fn pause_line(outcome: &PauseOutcome) -> String {
    format!(
        "Batch applied on {} endpoint(s), {} torrent(s)",
        outcome.endpoints, outcome.torrents
    )
}

fn filters_line(outcome: &FilterOutcome) -> String {
    format!(
        "IP filter: {} bytes written to {} file(s), {} endpoint(s) reloaded",
        outcome.bytes,
        outcome.paths_written.len(),
        outcome.endpoints_reloaded
    )
}

pub fn gate_line(outcome: &GateOutcome) -> String {
    match &outcome.verdict {
        GateVerdict::Clear => "Status check: clear".to_string(),
        GateVerdict::Blocked {
            endpoint,
            hash,
            name,
            state,
        } => format!(
            "Status check: blocked by {} on {} ({} \"{}\")",
            state, endpoint, hash, name
        ),
    }
}

/// Print every section the round produced.
pub fn print_round(report: &RoundReport) {
    if let Some(outcome) = &report.balance {
        println!("{}", queues(outcome));
    }
    if let Some(outcome) = &report.filters {
        println!("{}", filters_line(outcome));
    }
    if let Some(cats) = &report.categories {
        println!("{}", categories(cats));
    }
    if let Some(status) = &report.status {
        println!("{}", statuses(status));
    }
    if !report.missing_files.is_empty() {
        println!("{}", missing_files(&report.missing_files));
    }
    if let Some(outcome) = &report.force_start {
        if outcome.cleared + outcome.forced > 0 {
            println!(
                "Force start: cleared on {}, set on {}",
                outcome.cleared, outcome.forced
            );
        }
    }
    if let Some(outcome) = &report.dedup {
        println!("{}", duplicates(outcome));
        println!(
            "Duplicates: {} planned, {} removed",
            outcome.plan.deletion_count(),
            outcome.deleted
        );
    }
    if let Some(outcome) = &report.search {
        println!("{}", search_matches(outcome));
    }
    if let Some(outcome) = &report.pause {
        println!("{}", pause_line(outcome));
    }
    if let Some(errors) = &report.errors {
        println!("{}", errored(errors));
    }
    if !report.failures.is_empty() {
        println!("{}", failures(&report.failures));
    }
}
