use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Number of tab-separated columns a well-formed reference row carries.
const REFERENCE_COLUMNS: usize = 11;

/// One row of the flat reference table. Column layout:
/// topic id/name, subfield id/name, field id/name, domain id/name,
/// keywords, summary, link.
#[derive(Debug, Clone)]
pub struct ReferenceRow {
    pub topic_id: String,
    pub topic_name: String,
    pub subfield_id: String,
    pub subfield_name: String,
    pub field_id: String,
    pub field_name: String,
    pub domain_id: String,
    pub domain_name: String,
    pub keywords: String,
    pub summary: String,
    pub link: String,
}

/// Returns `None` for rows with fewer than the expected 11 columns.
pub fn parse_reference_row(line: &str) -> Option<ReferenceRow> {
    let cols: Vec<&str> = line.trim().split('\t').collect();
    if cols.len() < REFERENCE_COLUMNS {
        return None;
    }

    Some(ReferenceRow {
        topic_id: cols[0].to_string(),
        topic_name: cols[1].to_string(),
        subfield_id: cols[2].to_string(),
        subfield_name: cols[3].to_string(),
        field_id: cols[4].to_string(),
        field_name: cols[5].to_string(),
        domain_id: cols[6].to_string(),
        domain_name: cols[7].to_string(),
        keywords: cols[8].to_string(),
        summary: cols[9].to_string(),
        link: cols[10].to_string(),
    })
}

/// Reads the whole reference table, skipping malformed rows with a warning.
pub fn read_reference_table<P: AsRef<Path>>(path: P) -> Result<Vec<ReferenceRow>> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_reference_row(&line) {
            Some(row) => rows.push(row),
            None => warn!("Skipping malformed row {} (fewer than 11 columns)", line_num + 1),
        }
    }

    Ok(rows)
}

pub fn domain_openalex_id(raw_id: &str) -> String {
    format!("https://openalex.org/domains/{raw_id}")
}

pub fn field_openalex_id(raw_id: &str) -> String {
    format!("https://openalex.org/fields/{raw_id}")
}

pub fn subfield_openalex_id(raw_id: &str) -> String {
    format!("https://openalex.org/subfields/{raw_id}")
}

pub fn topic_openalex_id(raw_id: &str) -> String {
    format!("https://openalex.org/T{raw_id}")
}
