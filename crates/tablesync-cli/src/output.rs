//! Table and JSON rendering for command results

use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use tablesync_connection::SavedConnection;
use tablesync_core::TableStat;
use tablesync_migrate::{RunVerdict, SyncReport, TableSyncStatus};

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(*h)));
    table
}

/// Pretty-print any serializable result
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Human-readable byte size (1024 based)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Connection profile as shown to users, without the password
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView<'a> {
    pub id: String,
    pub name: &'a str,
    pub driver: &'a str,
    pub address: String,
    pub user: Option<&'a str>,
    pub database: Option<&'a str>,
}

impl<'a> From<&'a SavedConnection> for ConnectionView<'a> {
    fn from(conn: &'a SavedConnection) -> Self {
        Self {
            id: conn.id.to_string(),
            name: &conn.name,
            driver: &conn.driver,
            address: conn.address(),
            user: conn.user.as_deref(),
            database: conn.database.as_deref(),
        }
    }
}

pub fn render_connections(connections: &[SavedConnection]) -> String {
    if connections.is_empty() {
        return "No saved connections".to_string();
    }
    let mut table = new_table(&["ID", "Name", "Driver", "Address", "User", "Database"]);
    for conn in connections {
        table.add_row(vec![
            Cell::new(conn.id),
            Cell::new(&conn.name),
            Cell::new(&conn.driver),
            Cell::new(conn.address()),
            Cell::new(conn.user.as_deref().unwrap_or("")),
            Cell::new(conn.database.as_deref().unwrap_or("")),
        ]);
    }
    table.to_string()
}

pub fn render_stats(stats: &[TableStat]) -> String {
    if stats.is_empty() {
        return "No tables".to_string();
    }
    let mut table = new_table(&["Table", "Rows", "Size"]);
    for stat in stats {
        table.add_row(vec![
            Cell::new(&stat.name),
            Cell::new(stat.row_count),
            Cell::new(format_bytes(stat.size_bytes)),
        ]);
    }
    table.to_string()
}

pub fn render_verdict(verdict: &RunVerdict) -> String {
    let mut table = new_table(&["Table", "Source rows", "Target rows", "Status", "Reasons"]);
    for check in &verdict.checks {
        let target_rows = if check.target_exists() {
            check.target_rows.to_string()
        } else {
            "-".to_string()
        };
        let status = if check.blocking {
            Cell::new("BLOCKED").fg(Color::Red)
        } else {
            Cell::new("ok").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&check.name),
            Cell::new(check.source_rows),
            Cell::new(target_rows),
            status,
            Cell::new(check.reason_text()),
        ]);
    }

    let summary = if verdict.blocked {
        format!(
            "Migration blocked by {} table(s): {}",
            verdict.blocking_tables().len(),
            verdict.blocking_tables().join(", ")
        )
    } else {
        format!("Ready to migrate {} table(s)", verdict.checks.len())
    };
    format!("{}\n{}", table, summary)
}

pub fn render_report(report: &SyncReport) -> String {
    let mut table = new_table(&["Table", "Status", "Rows copied", "Elapsed", "Error"]);
    for outcome in &report.outcomes {
        let color = match outcome.status {
            TableSyncStatus::Succeeded => Color::Green,
            TableSyncStatus::Failed => Color::Red,
            TableSyncStatus::Skipped => Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(&outcome.name),
            Cell::new(outcome.status).fg(color),
            Cell::new(outcome.rows_copied),
            Cell::new(format!("{} ms", outcome.elapsed_ms)),
            Cell::new(outcome.error_detail.as_deref().unwrap_or("")),
        ]);
    }
    format!(
        "{}\n{} succeeded, {} failed, {} skipped, {} rows copied",
        table,
        report.succeeded_count,
        report.failed_count,
        report.skipped_count,
        report.rows_copied
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tablesync_migrate::{CheckReason, TableCheckResult, TableSyncOutcome};

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_empty_listings() {
        assert_eq!(render_connections(&[]), "No saved connections");
        assert_eq!(render_stats(&[]), "No tables");
    }

    #[test]
    fn test_connection_view_hides_password() {
        let conn = SavedConnection::new("prod", "mysql")
            .with_host("db.internal", 3306)
            .with_credentials("app", Some("hunter2".into()));
        let json = to_json(&ConnectionView::from(&conn)).unwrap();
        assert!(json.contains("\"address\": \"db.internal:3306\""));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_stats_table_contains_rows() {
        let out = render_stats(&[TableStat::new("orders", 1200, 2048)]);
        assert!(out.contains("orders"));
        assert!(out.contains("1200"));
        assert!(out.contains("2.0 KB"));
    }

    #[test]
    fn test_blocked_verdict_summary() {
        let verdict = RunVerdict::new(vec![
            TableCheckResult {
                name: "customers".into(),
                source_rows: 10,
                target_rows: 0,
                blocking: false,
                reasons: vec![CheckReason::TargetAbsent],
            },
            TableCheckResult {
                name: "orders".into(),
                source_rows: 5,
                target_rows: 3,
                blocking: true,
                reasons: vec![CheckReason::TargetTableExists, CheckReason::TargetHasRows],
            },
        ]);

        let out = render_verdict(&verdict);
        assert!(out.contains("BLOCKED"));
        assert!(out.ends_with("Migration blocked by 1 table(s): orders"));
    }

    #[test]
    fn test_report_summary_line() {
        let report = SyncReport::new(vec![
            TableSyncOutcome::succeeded("a", 7, 12),
            TableSyncOutcome::failed("b", "data copy failed: boom", 3),
            TableSyncOutcome::skipped("c"),
        ]);

        let out = render_report(&report);
        assert!(out.contains("data copy failed: boom"));
        assert!(out.ends_with("1 succeeded, 1 failed, 1 skipped, 7 rows copied"));
    }

    #[test]
    fn test_report_json_uses_camel_case() {
        let report = SyncReport::new(vec![TableSyncOutcome::succeeded("a", 7, 12)]);
        let json = to_json(&report).unwrap();
        assert!(json.contains("\"rowsCopied\": 7"));
    }
}
