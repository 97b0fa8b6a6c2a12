//! Input and output tables
//!
//! The input is a headerless, whitespace-delimited table of
//! `ip_count src_ip` rows, e.g. the output of `sort | uniq -c` over a list
//! of addresses. The output is a CSV with the input columns followed by one
//! column per [`LookupRecord`] field.

use crate::lens::cymru::{LookupRecord, RECORD_COLUMNS};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Input column names, as written in the output header
pub const INPUT_COLUMNS: [&str; 2] = ["ip_count", "src_ip"];

/// One row of the input table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRow {
    /// Carried through verbatim
    pub ip_count: String,
    pub src_ip: String,
}

/// Parse an input table from any reader.
///
/// Blank lines are skipped. Any other line must have exactly two columns.
pub fn parse_input_table<R: BufRead>(reader: R) -> Result<Vec<InputRow>> {
    let mut rows = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [ip_count, src_ip] => rows.push(InputRow {
                ip_count: ip_count.to_string(),
                src_ip: src_ip.to_string(),
            }),
            other => {
                return Err(anyhow!(
                    "line {}: expected 2 columns (ip_count src_ip), found {}",
                    line_no,
                    other.len()
                ))
            }
        }
    }
    Ok(rows)
}

pub fn read_input_table(path: &Path) -> Result<Vec<InputRow>> {
    let file = File::open(path)
        .with_context(|| format!("Unable to open input file {}", path.display()))?;
    parse_input_table(BufReader::new(file))
        .with_context(|| format!("Invalid input file {}", path.display()))
}

/// Addresses to look up, in row order
pub fn addresses(rows: &[InputRow]) -> Vec<String> {
    rows.iter().map(|r| r.src_ip.clone()).collect()
}

/// Write input rows joined column-wise with their records as CSV
pub fn write_enriched<W: Write>(
    writer: W,
    rows: &[InputRow],
    records: &[LookupRecord],
) -> Result<()> {
    if rows.len() != records.len() {
        return Err(anyhow!(
            "{} input rows but {} lookup records",
            rows.len(),
            records.len()
        ));
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(INPUT_COLUMNS.iter().chain(RECORD_COLUMNS.iter()))?;
    for (row, record) in rows.iter().zip(records) {
        let columns = record.columns();
        wtr.write_record(
            [row.ip_count.as_str(), row.src_ip.as_str()]
                .into_iter()
                .chain(columns.iter().map(|c| c.as_str())),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_enriched_csv(path: &Path, rows: &[InputRow], records: &[LookupRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Unable to create output file {}", path.display()))?;
    write_enriched(file, rows, records)
        .with_context(|| format!("Failed to write output file {}", path.display()))
}
