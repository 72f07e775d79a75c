//! Tab-separated listings of filings and diagnostics

use crate::diagnostics::Diagnostics;
use crate::resource::{FilingSet, Record};
use std::io::{self, Write};

/// Writes the filings of a set as tab-separated rows
///
/// The header holds the columns of [`FilingSet::columns`]; missing values
/// are empty cells.
pub fn write_filings<W: Write>(out: &mut W, filings: &FilingSet) -> io::Result<()> {
    let columns = filings.columns();
    writeln!(out, "{}", columns.join("\t"))?;

    for filing in filings {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                filing
                    .field_value(column)
                    .map(|value| value.to_string().replace(['\t', '\n'], " "))
                    .unwrap_or_default()
            })
            .collect();
        writeln!(out, "{}", row.join("\t"))?;
    }
    Ok(())
}

/// Writes the individual diagnostics of a query
pub fn write_diagnostics<W: Write>(out: &mut W, diagnostics: &Diagnostics) -> io::Result<()> {
    for duplicate in diagnostics.duplicate_filings() {
        writeln!(
            out,
            "duplicate\tfiling {}\t{}",
            duplicate.api_id, duplicate.request_url
        )?;
    }
    for missing in diagnostics.missing_references() {
        writeln!(
            out,
            "missing\t{} {}\t{} {}",
            missing.from,
            missing.from_id,
            missing.target,
            missing.target_id.as_deref().unwrap_or("(not declared)")
        )?;
    }
    for orphan in diagnostics.orphans() {
        writeln!(out, "orphan\t{} {}", orphan.kind, orphan.api_id)?;
    }
    for (api_type, origin) in diagnostics.unexpected_resource_types() {
        writeln!(out, "unexpected\t{}\t{}", api_type, origin)?;
    }
    for failure in diagnostics.value_failures() {
        writeln!(
            out,
            "value\t{} {}\t{}\t{}\t{:?}",
            failure.record,
            failure.api_id.as_deref().unwrap_or("?"),
            failure.field,
            failure.reason,
            failure.value
        )?;
    }
    Ok(())
}

/// Writes key path retrieval counts, sorted by record and key path
pub fn write_key_path_availability<W: Write>(
    out: &mut W,
    diagnostics: &Diagnostics,
) -> io::Result<()> {
    writeln!(out, "record\tkey_path\tsuccess\ttotal")?;
    for row in diagnostics.key_path_availability() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            row.record, row.key_path, row.success_count, row.total_count
        )?;
    }
    for (record, key_path) in diagnostics.unaccessed_key_paths() {
        writeln!(out, "{}\t{}\tunread\t", record, key_path)?;
    }
    Ok(())
}
