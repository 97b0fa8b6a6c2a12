//! Output formatting shared by lens results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum width of free-text columns in tables
pub const DEFAULT_NAME_MAX_LEN: usize = 32;

/// Output format for terminal results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Table with rounded borders
    #[default]
    Table,
    Markdown,
    /// Compact JSON array
    Json,
    JsonPretty,
    /// One JSON object per line
    JsonLine,
    /// Pipe-separated values with a header line
    Psv,
}

impl OutputFormat {
    const NAMES: [&'static str; 6] = [
        "table",
        "markdown",
        "json",
        "json-pretty",
        "json-line",
        "psv",
    ];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => Self::NAMES[0],
            Self::Markdown => Self::NAMES[1],
            Self::Json => Self::NAMES[2],
            Self::JsonPretty => Self::NAMES[3],
            Self::JsonLine => Self::NAMES[4],
            Self::Psv => Self::NAMES[5],
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonl" => Ok(Self::JsonLine),
            "psv" => Ok(Self::Psv),
            _ => Err(format!(
                "unknown output format '{}', expected one of: {}",
                s,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Render rows in any of the output formats.
///
/// `psv_header` and `psv_line` are only used for [`OutputFormat::Psv`].
#[cfg(feature = "display")]
pub fn render_rows<T, F>(rows: &[T], format: OutputFormat, psv_header: &str, psv_line: F) -> String
where
    T: tabled::Tabled + Serialize + Clone,
    F: Fn(&T) -> String,
{
    use tabled::settings::Style;
    use tabled::Table;

    match format {
        OutputFormat::Table => Table::new(rows.to_vec()).with(Style::rounded()).to_string(),
        OutputFormat::Markdown => Table::new(rows.to_vec()).with(Style::markdown()).to_string(),
        OutputFormat::Json => serde_json::to_string(rows).unwrap_or_default(),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows).unwrap_or_default(),
        OutputFormat::JsonLine => rows
            .iter()
            .filter_map(|r| serde_json::to_string(r).ok())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Psv => std::iter::once(psv_header.to_string())
            .chain(rows.iter().map(psv_line))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Shorten text to `max_len` characters, ending in "..." when cut
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    let kept: String = name.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}
