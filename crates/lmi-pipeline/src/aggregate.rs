//! Merges module tables into the set handed to the output sink.

use lmi_core::{truncate_chars, Cell, Table, TableSet, MAX_TABLE_NAME_LEN};

use crate::run::PipelineRun;

/// Table emitted when no module produced any rows.
pub const RUN_SUMMARY_TABLE: &str = "Run Summary";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collects the non-empty tables of every module that produced data,
/// prefixed with the module's display name, in canonical module order.
///
/// The result is never empty: with nothing to show it holds a single
/// [`RUN_SUMMARY_TABLE`] describing the failure.
#[must_use]
pub fn aggregate_tables(run: &PipelineRun) -> TableSet {
    let mut aggregated = TableSet::new();

    for progress in &run.progress {
        let Some(result) = progress.result.as_ref() else {
            continue;
        };
        if !result.status.produced_data() {
            continue;
        }
        for (name, table) in result.tables.iter() {
            if table.is_empty() {
                continue;
            }
            let key = truncate_chars(
                &format!("{} - {name}", progress.display_name),
                MAX_TABLE_NAME_LEN,
            );
            if aggregated.insert(key.clone(), table.clone()).is_some() {
                tracing::warn!(
                    run_id = %run.run_id,
                    table = %key,
                    "aggregated table name collision; later table replaces earlier"
                );
            }
        }
    }

    if aggregated.is_empty() {
        aggregated.insert(RUN_SUMMARY_TABLE, run_summary(run));
    }
    aggregated
}

fn run_summary(run: &PipelineRun) -> Table {
    let modules_run = run
        .progress
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut errors = run.errors.clone();
    for progress in &run.progress {
        if let Some(result) = progress.result.as_ref() {
            errors.extend(
                result
                    .errors
                    .iter()
                    .map(|e| format!("{}: {e}", progress.display_name)),
            );
        }
    }
    let errors = if errors.is_empty() {
        "Unknown error".to_string()
    } else {
        errors.join("; ")
    };

    let completed = run
        .completed_at
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default();

    let mut table = Table::new([
        "Topic",
        "Status",
        "Modules Run",
        "Errors",
        "Started",
        "Completed",
    ]);
    table.push_row(vec![
        Cell::from(run.topic.as_str()),
        Cell::from("Failed - No data collected"),
        Cell::from(modules_run),
        Cell::from(errors),
        Cell::from(run.started_at.format(TIMESTAMP_FORMAT).to_string()),
        Cell::from(completed),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use lmi_core::{ModuleKind, ModuleResult, ModuleStatus};

    use super::*;
    use crate::run::{ModuleProgress, RunRequest};

    fn run_with(results: Vec<(ModuleKind, &str, ModuleResult)>) -> PipelineRun {
        let request = RunRequest::new("analyst@example.com", "Data Engineering", ["jobs"]);
        let mut run = PipelineRun::new(&request);
        for (kind, display, result) in results {
            let mut progress = ModuleProgress::pending(kind, display);
            progress.status = result.status;
            progress.result = Some(result);
            run.progress.push(progress);
        }
        run
    }

    fn one_row(columns: &[&str]) -> Table {
        let mut table = Table::new(columns.iter().copied());
        table.push_row(vec![Cell::from("x")]);
        table
    }

    #[test]
    fn prefixes_tables_with_display_name() {
        let mut tables = TableSet::new();
        tables.insert("Job Postings", one_row(&["title"]));
        tables.insert("Empty", Table::new(["a"]));
        let run = run_with(vec![(
            ModuleKind::Jobs,
            "Job Postings & Labor Data",
            ModuleResult::completed(tables),
        )]);

        let aggregated = aggregate_tables(&run);
        let names: Vec<_> = aggregated.names().collect();
        assert_eq!(names, vec!["Job Postings & Labor Data - Job Postings"]);
    }

    #[test]
    fn partial_results_contribute() {
        let mut tables = TableSet::new();
        tables.insert("Courses", one_row(&["title"]));
        let result = ModuleResult::from_outcome(tables, vec!["edX: timeout".into()], vec![]);
        assert_eq!(result.status, ModuleStatus::Partial);
        let run = run_with(vec![(ModuleKind::Courses, "Online Courses", result)]);

        let aggregated = aggregate_tables(&run);
        assert!(aggregated.get("Online Courses - Courses").is_some());
    }

    #[test]
    fn long_keys_are_truncated() {
        let long = "T".repeat(150);
        let mut tables = TableSet::new();
        tables.insert(long, one_row(&["a"]));
        let run = run_with(vec![(ModuleKind::Jobs, "Jobs", ModuleResult::completed(tables))]);

        let aggregated = aggregate_tables(&run);
        let name = aggregated.names().next().map(str::to_string).unwrap_or_default();
        assert_eq!(name.chars().count(), MAX_TABLE_NAME_LEN);
    }

    #[test]
    fn empty_aggregate_becomes_run_summary() {
        let run = run_with(vec![(
            ModuleKind::Trends,
            "Search Trends",
            ModuleResult::failed(vec!["Failed to fetch Google Trends data: 500".into()]),
        )]);

        let aggregated = aggregate_tables(&run);
        assert_eq!(aggregated.len(), 1);
        let summary = aggregated.get(RUN_SUMMARY_TABLE).expect("summary table");
        assert_eq!(summary.len(), 1);
        let row = &summary.rows[0];
        assert_eq!(row[0], Cell::from("Data Engineering"));
        assert_eq!(row[1], Cell::from("Failed - No data collected"));
        assert_eq!(row[2], Cell::from("trends"));
        assert_eq!(
            row[3],
            Cell::from("Search Trends: Failed to fetch Google Trends data: 500")
        );
    }

    #[test]
    fn run_summary_without_errors_says_unknown() {
        let run = run_with(vec![]);
        let aggregated = aggregate_tables(&run);
        let summary = aggregated.get(RUN_SUMMARY_TABLE).expect("summary table");
        assert_eq!(summary.rows[0][3], Cell::from("Unknown error"));
    }
}
