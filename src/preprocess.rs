//! Row-level cleaning of per-database estimate tables.

use crate::input::{EstimateTable, InputError};
use crate::models::meta::diagnostics::{DiagnosticStage, Diagnostics, RemovalReason};

/// Drop rows whose bounded columns are infinite, missing, or out of bounds.
///
/// Columns are processed in the order given. For each column the steps run
/// in order (infinite, missing, above `max_values[i]`, below `min_values[i]`)
/// and each step only sees rows that survived every earlier step. Bounds are
/// inclusive. Every step that removes rows records a warning.
///
/// An empty result is not an error; a warning is recorded and callers handle
/// the empty table.
///
/// # Errors
///
/// Returns `InputError` if a named column is absent or the bound slices do
/// not match the column list.
pub fn clean_columns(
    table: &EstimateTable,
    columns: &[&str],
    min_values: &[f64],
    max_values: &[f64],
    diagnostics: &mut Diagnostics,
) -> Result<EstimateTable, InputError> {
    if min_values.len() != columns.len() || max_values.len() != columns.len() {
        return Err(InputError::BoundsLengthMismatch {
            columns: columns.len(),
            min: min_values.len(),
            max: max_values.len(),
        });
    }
    let indices = columns
        .iter()
        .map(|column| {
            table
                .column_index(column)
                .ok_or_else(|| InputError::MissingColumn {
                    column: (*column).to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut kept: Vec<usize> = (0..table.nrows()).collect();
    for (position, column_index) in indices.into_iter().enumerate() {
        let column = columns[position];
        let min = min_values[position];
        let max = max_values[position];
        let value = |row: usize| table.values[(row, column_index)];

        retain_rows(&mut kept, column, RemovalReason::Infinite, diagnostics, |row| {
            !value(row).is_infinite()
        });
        retain_rows(&mut kept, column, RemovalReason::Missing, diagnostics, |row| {
            !value(row).is_nan()
        });
        retain_rows(&mut kept, column, RemovalReason::AboveMaximum(max), diagnostics, |row| {
            value(row) <= max
        });
        retain_rows(&mut kept, column, RemovalReason::BelowMinimum(min), diagnostics, |row| {
            value(row) >= min
        });
    }

    if kept.is_empty() {
        diagnostics.warn(
            DiagnosticStage::Cleaning,
            format!(
                "no rows left after cleaning {} input rows on columns {}",
                table.nrows(),
                columns.join(", ")
            ),
        );
    }

    Ok(table.select_rows(&kept))
}

fn retain_rows(
    kept: &mut Vec<usize>,
    column: &str,
    reason: RemovalReason,
    diagnostics: &mut Diagnostics,
    keep: impl Fn(usize) -> bool,
) {
    let before = kept.len();
    kept.retain(|&row| keep(row));
    let removed = before - kept.len();
    if removed > 0 {
        diagnostics.record_removal(column, removed, reason);
    }
}
