//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ModelInfo;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Print any server response as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Name/Description table under a heading
pub fn render_model_info(heading: &str, models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return format!("\n{}\n\nNo models configured", heading);
    }

    let rows: Vec<ModelRow> = models
        .iter()
        .map(|m| ModelRow {
            name: m.name.clone(),
            description: m.description.clone(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!("\n{}\n\n{}", heading, table)
}

/// `true` when the body is a request-level error envelope
pub fn is_error_envelope(body: &Value) -> bool {
    body.get("errors").is_some()
}

/// Plain listing of an `errors` array
pub fn render_errors(errors: &Value) -> String {
    let mut out = String::new();
    push_errors(&mut out, errors, true);
    out
}

fn push_errors(out: &mut String, errors: &Value, with_model: bool) {
    for error in errors.as_array().map(Vec::as_slice).unwrap_or_default() {
        if let Some(model) = error.get("model").and_then(Value::as_str).filter(|_| with_model) {
            out.push_str(&format!("Model: {}\n", model));
        }
        out.push_str(&format!("Error type: {}\n", text(&error["type"])));
        out.push_str(&format!("Error message: {}\n", text(&error["error"])));
    }
}

/// Per-model dump of a prediction result map. Each model is headed by its
/// name; successful payloads list each key with its value as pretty JSON,
/// failed models list their errors.
pub fn render_prediction(results: &Value) -> String {
    let mut out = String::new();
    let Some(models) = results.as_object() else {
        return pretty(results);
    };

    for (model_name, model_results) in models {
        out.push_str(&format!("Model: {}\n", model_name));
        if let Some(errors) = model_results.get("errors") {
            push_errors(&mut out, errors, false);
            continue;
        }
        match model_results.as_object() {
            Some(fields) => {
                for (key, value) in fields {
                    out.push_str(key);
                    out.push('\n');
                    out.push_str(&pretty(value));
                    out.push('\n');
                }
            }
            None => {
                out.push_str(&pretty(model_results));
                out.push('\n');
            }
        }
    }
    out
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "unknown".to_string(),
        other => other.to_string(),
    }
}
