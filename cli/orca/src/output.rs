//! Output formatting: kubectl-style tables, JSON, and YAML.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

/// Output format selected with `-o/--output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            "yaml" => Self::Yaml,
            _ => Self::Table,
        }
    }
}

/// Pretty-print a value as JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a value as YAML.
pub fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// Print an aligned table. Columns listed in `phase_columns` are
/// colorized by phase after padding, so alignment is computed on the
/// plain text.
pub fn print_table(headers: &[&str], rows: &[Vec<String>], phase_columns: &[usize]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header_line.trim_end());

    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let padded = format!("{:<width$}", cell, width = widths[i]);
                if phase_columns.contains(&i) {
                    color_phase_padded(cell, padded)
                } else {
                    padded
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

/// Colorize a phase string for inline use (describe output).
pub fn color_phase(phase: &str) -> String {
    color_phase_padded(phase, phase.to_string())
}

fn color_phase_padded(phase: &str, padded: String) -> String {
    match phase {
        "Ready" | "Succeeded" => padded.green().to_string(),
        "Failed" => padded.red().to_string(),
        "Busy" | "Running" => padded.yellow().to_string(),
        "Terminating" => padded.magenta().to_string(),
        "Terminated" => padded.bright_black().to_string(),
        _ => padded,
    }
}

/// Human-readable age relative to now: `5s`, `3m`, `2h`, `4d`.
pub fn format_age(timestamp: Option<DateTime<Utc>>) -> String {
    let Some(timestamp) = timestamp else {
        return "<unknown>".to_string();
    };
    let elapsed = Utc::now() - timestamp;
    let seconds = elapsed.num_seconds().max(0);
    match seconds {
        0..=59 => format!("{seconds}s"),
        60..=3599 => format!("{}m", seconds / 60),
        3600..=86399 => format!("{}h", seconds / 3600),
        _ => format!("{}d", seconds / 86400),
    }
}

/// `<none>` placeholder for empty values.
pub fn or_none(value: &str) -> String {
    if value.is_empty() {
        "<none>".to_string()
    } else {
        value.to_string()
    }
}

/// Comma-joined list, or `<none>`.
pub fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "<none>".to_string()
    } else {
        items.join(", ")
    }
}
