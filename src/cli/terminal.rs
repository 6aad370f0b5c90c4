//! Terminal capability detection, styling and plain-text tables

use kyc_console::notify::{Level, Notifier};
use owo_colors::{OwoColorize, colors::css};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

fn stderr_supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stderr).is_some()
}

/// Detects terminal width, returning None if not available
pub fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Check if terminal is narrow (< 60 columns)
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 60)
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Color as failure (red)
    fn danger(&self) -> String;
    /// Color as info (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        if supports_color() {
            self.fg::<css::Green>().to_string()
        } else {
            self.to_string()
        }
    }

    fn warning(&self) -> String {
        if supports_color() {
            self.fg::<css::Orange>().to_string()
        } else {
            self.to_string()
        }
    }

    fn danger(&self) -> String {
        if supports_color() {
            self.fg::<css::Crimson>().to_string()
        } else {
            self.to_string()
        }
    }

    fn info(&self) -> String {
        if supports_color() {
            self.fg::<css::LightBlue>().to_string()
        } else {
            self.to_string()
        }
    }

    fn dim(&self) -> String {
        if supports_color() {
            self.dimmed().to_string()
        } else {
            self.to_string()
        }
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn danger(&self) -> String {
        self.as_str().danger()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}

/// Colours a backend status (case, change, screening) by how good it is.
pub fn status(value: &str) -> String {
    match value {
        "APPROVED" | "CLOSED" | "COMPLETED" | "NO_HIT" | "REVIEWED" | "UP" | "ACTIVE" => {
            value.success()
        }
        "REJECTED" | "FAILED" | "HIT" | "DOWN" | "TERMINATED" => value.danger(),
        "PENDING" | "IN_PROGRESS" | "IN_REVIEW" | "NOT_RUN" => value.warning(),
        other => other.to_string(),
    }
}

/// Prints notifications to stderr, one line each.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, level: Level, message: &str) {
        let prefix = match level {
            Level::Info => "ℹ",
            Level::Success => "✔",
            Level::Warning => "⚠",
            Level::Error => "✖",
        };
        let line = format!("{prefix} {message}");
        if !stderr_supports_color() {
            eprintln!("{line}");
            return;
        }
        match level {
            Level::Info => eprintln!("{}", line.fg::<css::LightBlue>()),
            Level::Success => eprintln!("{}", line.fg::<css::Green>()),
            Level::Warning => eprintln!("{}", line.fg::<css::Orange>()),
            Level::Error => eprintln!("{}", line.fg::<css::Crimson>()),
        }
    }
}

/// A left-aligned table with a dashed rule under the header.
///
/// On narrow terminals each row is printed as stacked `header: value` lines
/// instead.
#[derive(Debug)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub const fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(header.len())
            })
            .collect()
    }

    /// Renders the table as lines of text.
    pub fn render(&self, narrow: bool) -> Vec<String> {
        if narrow {
            return self
                .rows
                .iter()
                .flat_map(|row| {
                    self.headers
                        .iter()
                        .zip(row)
                        .map(|(header, cell)| format!("{header}: {cell}"))
                        .chain(std::iter::once(String::new()))
                })
                .collect();
        }

        let widths = self.widths();
        let line = |cells: &mut dyn Iterator<Item = String>| {
            cells
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(line(&mut self.headers.iter().map(ToString::to_string)));
        lines.push(line(&mut widths.iter().map(|width| "-".repeat(*width))));
        for row in &self.rows {
            lines.push(line(&mut row.iter().cloned()));
        }
        lines
    }

    /// Prints the table, or `empty` in dim text when it has no rows.
    pub fn print(&self, empty: &str) {
        if self.is_empty() {
            println!("{}", empty.dim());
            return;
        }
        for line in self.render(is_narrow()) {
            println!("{line}");
        }
    }
}

/// Displays an optional value, with a dash for missing ones.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(vec!["ID", "Name"]);
        table.row(vec!["1".into(), "Ada Lovelace".into()]);
        table.row(vec!["12".into(), "Bo".into()]);
        table
    }

    #[test]
    fn pads_columns_to_widest_cell() {
        assert_eq!(
            sample().render(false),
            [
                "ID  Name",
                "--  ------------",
                "1   Ada Lovelace",
                "12  Bo",
            ]
        );
    }

    #[test]
    fn narrow_layout_stacks_fields() {
        assert_eq!(
            sample().render(true),
            ["ID: 1", "Name: Ada Lovelace", "", "ID: 12", "Name: Bo", ""]
        );
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(or_dash::<i64>(None), "-");
        assert_eq!(or_dash(Some(3)), "3");
    }
}
