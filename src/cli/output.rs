//! Terminal rendering for `propcal`.
//!
//! Result rows go to stdout as `tabled` tables, or as pretty JSON under
//! `--json` so runs can be piped into other tooling. Status lines are only
//! printed in table mode by the handlers.

use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl From<bool> for OutputMode {
    /// `true` when `--json` was passed
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Render result rows for `mode`. An empty table renders as a placeholder
/// line; empty JSON stays a valid `[]`.
pub fn render_rows<T: Tabled + Serialize>(rows: &[T], mode: OutputMode) -> serde_json::Result<String> {
    match mode {
        OutputMode::Table if rows.is_empty() => Ok("(no rows)".to_string()),
        OutputMode::Table => Ok(Table::new(rows).to_string()),
        OutputMode::Json => serde_json::to_string_pretty(rows),
    }
}

pub fn print_items<T: Tabled + Serialize>(rows: &[T], mode: OutputMode) -> anyhow::Result<()> {
    println!("{}", render_rows(rows, mode)?);
    Ok(())
}

/// Pretty JSON regardless of mode
pub fn print_item<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

pub fn print_kv(key: &str, value: &str) {
    println!("{key}: {value}");
}

/// Green status line
pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Yellow status line
pub fn print_warn(msg: &str) {
    println!("\x1b[33m{msg}\x1b[0m");
}

/// Format a 0-1 ratio as a percentage
pub fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Tabled)]
    struct Row {
        agent: &'static str,
        weight: f64,
    }

    #[test]
    fn json_flag_selects_mode() {
        assert_eq!(OutputMode::from(true), OutputMode::Json);
        assert_eq!(OutputMode::from(false), OutputMode::Table);
    }

    #[test]
    fn rows_render_in_both_modes() {
        let rows = [Row { agent: "DVOA", weight: 2.5 }];
        let table = render_rows(&rows, OutputMode::Table).unwrap();
        assert!(table.contains("agent") && table.contains("DVOA"), "{table}");

        let json: serde_json::Value =
            serde_json::from_str(&render_rows(&rows, OutputMode::Json).unwrap()).unwrap();
        assert_eq!(json[0]["weight"], 2.5);

        let empty: [Row; 0] = [];
        assert_eq!(render_rows(&empty, OutputMode::Table).unwrap(), "(no rows)");
        assert_eq!(render_rows(&empty, OutputMode::Json).unwrap(), "[]");
    }

    #[test]
    fn pct_rounds_to_one_decimal() {
        assert_eq!(pct(0.5), "50.0%");
        assert_eq!(pct(2.0 / 3.0), "66.7%");
    }
}
