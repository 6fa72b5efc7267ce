//! Output formatters for reports and history.

use clap::ValueEnum;
use comfy_table::Table;
use scriptor_core::{ExecutedScript, Report};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// Script names only, one per line
    Porcelain,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Porcelain => write!(f, "porcelain"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format the outcome of a run.
    fn format_report(&self, report: &Report) -> String;

    /// Format history records.
    fn format_history(&self, records: &[ExecutedScript]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Porcelain => Box::new(PorcelainFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &Report) -> String {
        if !report.planned().is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Script", "Status", "Planned action"]);
            for step in report.planned() {
                table.add_row(vec![
                    step.name.clone(),
                    step.classification.to_string(),
                    step.action.to_string(),
                ]);
            }
            return table.to_string();
        }

        if report.is_empty() {
            return "Nothing to execute".to_string();
        }

        let mut table = records_table(report.executed_scripts());
        table.add_row(vec![
            "".to_string(),
            "".to_string(),
            report.status().to_string(),
            report.total_duration_millis().to_string(),
            String::new(),
        ]);
        table.to_string()
    }

    fn format_history(&self, records: &[ExecutedScript]) -> String {
        if records.is_empty() {
            return "No executed scripts".to_string();
        }
        records_table(records).to_string()
    }
}

fn records_table(records: &[ExecutedScript]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Script", "Action", "Status", "Duration (ms)", "Output"]);
    for record in records {
        table.add_row(vec![
            record.name.clone(),
            record.action.to_string(),
            record.execution_status.to_string(),
            record.execution_duration_in_millis.to_string(),
            first_line(&record.execution_output).to_string(),
        ]);
    }
    table
}

fn first_line(output: &str) -> &str {
    output.lines().next().unwrap_or("")
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &Report) -> String {
        let planned: Vec<serde_json::Value> = report
            .planned()
            .iter()
            .map(|step| {
                serde_json::json!({
                    "name": step.name,
                    "checksum": step.checksum,
                    "classification": step.classification.to_string(),
                    "action": step.action.to_string(),
                })
            })
            .collect();
        let value = serde_json::json!({
            "status": report.status().to_string(),
            "executedScripts": report.executed_scripts(),
            "planned": planned,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    fn format_history(&self, records: &[ExecutedScript]) -> String {
        serde_json::to_string_pretty(records).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

/// Names only, for scripting.
pub struct PorcelainFormatter;

impl Formatter for PorcelainFormatter {
    fn format_report(&self, report: &Report) -> String {
        if report.planned().is_empty() {
            names(report.executed_scripts())
        } else {
            report
                .planned()
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    fn format_history(&self, records: &[ExecutedScript]) -> String {
        names(records)
    }
}

fn names(records: &[ExecutedScript]) -> String {
    records
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
