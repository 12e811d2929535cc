//! Bulk rule upload parsing
//!
//! Accepts comma- or tab-separated text. The delimiter is taken from the
//! first line: tabs win if they outnumber commas. A first row naming the rule
//! columns is a header and rows are decoded by name; otherwise rows are read
//! positionally as `id, project, task, jira, description`.

use aidea_common::record::{decode, HeaderIndex, Record};
use aidea_common::Rule;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// Pick `\t` or `,` from the first line of `body`
pub fn detect_delimiter(body: &str) -> u8 {
    let first_line = body.lines().next().unwrap_or_default();
    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();

    if tabs > 0 && tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// True if `row` reads as a header of rule column names
fn is_header(row: &csv::StringRecord) -> bool {
    let named = row
        .iter()
        .filter(|cell| {
            let cell = cell.trim().trim_start_matches('\u{feff}');
            Rule::COLUMNS.iter().any(|c| c.name.eq_ignore_ascii_case(cell))
        })
        .count();
    named >= 2
}

/// Parse an uploaded rule table
pub fn parse_rule_upload(body: &str) -> ApiResult<Vec<Rule>> {
    let delimiter = detect_delimiter(body);
    info!(
        delimiter = if delimiter == b'\t' { "tab" } else { "comma" },
        "Parsing rule upload"
    );

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(body.as_bytes());

    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::BadRequest(format!("Error parsing CSV: {e}")))?;

    let Some(first) = rows.first() else {
        return Err(ApiError::BadRequest("CSV file is empty".to_string()));
    };

    let (headers, data, positional) = if is_header(first) {
        let names: Vec<&str> = first.iter().collect();
        (HeaderIndex::new(&names), &rows[1..], false)
    } else {
        (HeaderIndex::positional::<Rule>(), &rows[..], true)
    };

    let line_offset = if positional { 1 } else { 2 };
    let mut rules = Vec::with_capacity(data.len());
    for (i, row) in data.iter().enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if positional && row.len() < Rule::COLUMNS.len() {
            warn!(
                line = i + line_offset,
                cells = row.len(),
                "Rule row has fewer than {} columns, skipping",
                Rule::COLUMNS.len()
            );
            continue;
        }

        let cells: Vec<&str> = row.iter().map(str::trim).collect();
        let decoded = decode::<Rule, _>(&cells, &headers);
        if decoded.partial {
            warn!(line = i + line_offset, "Rule row is missing columns");
        }
        rules.push(decoded.record);
    }

    if rules.is_empty() {
        return Err(ApiError::BadRequest("No valid rules found in CSV".to_string()));
    }
    Ok(rules)
}
