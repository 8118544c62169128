//! Structured output writer supporting JSON and human-readable modes.

use serde::Serialize;
use serde_json::Value;

use crate::cli_style::{self, Icons, Theme};
use crate::error::{ErrorCategory, ProbeError};
use crate::payload::{field_text, RemotePayload};
use crate::schema::TableSchema;

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// JSON document printed when a run fails
#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub category: String,
    pub exit_code: i32,
    pub error: String,
}

impl FailureReport {
    pub fn from_error(err: &ProbeError) -> Self {
        Self {
            success: false,
            category: err.category().to_string(),
            exit_code: err.exit_code(),
            error: sanitize_error(&err.to_string()),
        }
    }
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Numbered `number - description` listing of a read response
    pub fn records(&self, table: &str, payload: &RemotePayload) {
        match self.mode {
            OutputMode::Json => print_json(payload),
            OutputMode::Human => {
                cli_style::section_header(&format!("{} records", table));
                for (i, record) in payload.records().iter().enumerate() {
                    println!("{}", record_line(i + 1, record));
                }
                println!(
                    "{}",
                    Theme::muted(format!("{} record(s)", payload.records().len()))
                );
            }
        }
    }

    /// Rules flagged as customized
    pub fn customized_rules(&self, application: &str, rules: &[&Value]) {
        match self.mode {
            OutputMode::Json => print_json(&rules),
            OutputMode::Human => {
                cli_style::section_header(&format!(
                    "Potentially customized business rules on {}",
                    application
                ));
                if rules.is_empty() {
                    cli_style::print_info("No customized business rules found");
                }
                for (i, rule) in rules.iter().enumerate() {
                    println!("{}", rule_line(i + 1, rule));
                }
            }
        }
    }

    pub fn schema(&self, schema: &TableSchema) {
        match self.mode {
            OutputMode::Json => print_json(schema),
            OutputMode::Human => {
                cli_style::section_header(&format!("Schema of {}", schema.table));
                let rows: Vec<(String, String)> = schema
                    .fields
                    .iter()
                    .map(|(name, tag)| (name.clone(), tag.to_string()))
                    .collect();
                println!("{}", cli_style::pair_table(("Field", "Type"), &rows));
            }
        }
    }

    /// The record returned by a create call
    pub fn created(&self, table: &str, payload: &RemotePayload) {
        match self.mode {
            OutputMode::Json => print_json(payload),
            OutputMode::Human => {
                cli_style::section_header(&format!("New {} record", table));
                let record = payload.record();
                let number = record
                    .and_then(|r| r.get("number"))
                    .map(crate::payload::display_value)
                    .unwrap_or_else(|| "(no number)".to_string());
                cli_style::print_success(&format!("Created {} record {}", table, number));
                if let Some(sys_id) = record.and_then(|r| r.get("sys_id")) {
                    println!(
                        "  {} sys_id {}",
                        Theme::muted(Icons::BULLET),
                        Theme::value(crate::payload::display_value(sys_id))
                    );
                }
            }
        }
    }

    /// Report a failed run. Always on stdout, in both modes.
    pub fn failure(&self, err: &ProbeError) {
        match self.mode {
            OutputMode::Json => print_json(&FailureReport::from_error(err)),
            OutputMode::Human => cli_style::print_error(&err.to_string(), suggestion(err)),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

fn suggestion(err: &ProbeError) -> Option<&'static str> {
    match err.category() {
        ErrorCategory::Configuration => {
            Some("Pass --instance, --username, --password and --application, or use --config")
        }
        ErrorCategory::Remote => Some("Check the credentials and the application table name"),
        _ => None,
    }
}

/// `N. {number} - {description}`; absent fields show as empty
pub fn record_line(n: usize, record: &Value) -> String {
    format!(
        "{}. {} - {}",
        n,
        field_text(record, "number").unwrap_or_default(),
        field_text(record, "description").unwrap_or_default()
    )
}

/// `N. {sys_name} (created by X, updated by Y)`
pub fn rule_line(n: usize, rule: &Value) -> String {
    format!(
        "{}. {} (created by {}, updated by {})",
        n,
        field_text(rule, "sys_name").unwrap_or_default(),
        field_text(rule, "sys_created_by").unwrap_or_default(),
        field_text(rule, "sys_updated_by").unwrap_or_default()
    )
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}
