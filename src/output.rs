//! Rendering of probe reports and query results.
//!
//! All renderers are pure and return the text to print.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::db::{QueryResult, Value};
use crate::error::{AhtiError, Result};
use crate::probe::ProbeReport;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Rows as a list of tuples, e.g. `[(1,), (1,)]`.
    #[default]
    Rows,
    /// Aligned table with a header.
    Table,
    /// JSON document.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rows" => Ok(Self::Rows),
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: rows, table, or json"
            )),
        }
    }
}

/// Renders a full probe report.
pub fn render_report(report: &ProbeReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Rows => Ok(render_rows(&report.result)),
        OutputFormat::Table => {
            let mut out = String::new();
            let _ = writeln!(out, "Connection: {}", report.connection);
            for step in &report.steps {
                let _ = writeln!(
                    out,
                    "  {:<17} {:>9.1} ms  {}",
                    step.step.as_str(),
                    step.elapsed.as_secs_f64() * 1000.0,
                    step.detail
                );
            }
            out.push('\n');
            out.push_str(&render_table(&report.result));
            Ok(out)
        }
        OutputFormat::Json => to_json(report),
    }
}

/// Renders the result of an ad-hoc query.
pub fn render_query(result: &QueryResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Rows => Ok(render_rows(result)),
        OutputFormat::Table => Ok(render_table(result)),
        OutputFormat::Json => to_json(result),
    }
}

/// Renders rows as a list of tuples.
pub fn render_rows(result: &QueryResult) -> String {
    let rows: Vec<String> = result
        .rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(literal).collect();
            if values.len() == 1 {
                format!("({},)", values[0])
            } else {
                format!("({})", values.join(", "))
            }
        })
        .collect();

    format!("[{}]", rows.join(", "))
}

/// Renders an aligned table with a row-count footer.
pub fn render_table(result: &QueryResult) -> String {
    let headers: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_display_string).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    if !headers.is_empty() {
        let header_line: Vec<String> = headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", header_line.join(" | ").trim_end());

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", separator.join("-+-"));

        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{c:<w$}"))
                .collect();
            let _ = writeln!(out, "{}", line.join(" | ").trim_end());
        }
    }

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    let _ = write!(out, "({} {noun})", result.row_count);
    if let Some(warning) = result.truncation_warning() {
        let _ = write!(out, "\n{warning}");
    }
    out
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AhtiError::internal(format!("Failed to encode JSON output: {e}")))
}

/// Literal form of a value inside a row tuple.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => float_literal(*f),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Bytes(bytes) => {
            let mut out = String::from("b'");
            for b in bytes {
                match b {
                    b'\\' => out.push_str("\\\\"),
                    b'\'' => out.push_str("\\'"),
                    0x20..=0x7e => out.push(*b as char),
                    _ => {
                        let _ = write!(out, "\\x{b:02x}");
                    }
                }
            }
            out.push('\'');
            out
        }
    }
}

/// Shortest float form, switching to an exponent outside `1e-4..1e16`.
fn float_literal(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sci = format!("{f:e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if f != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}
