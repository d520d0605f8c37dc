//! # Meta-analysis inputs
//!
//! Defines the two input shapes accepted by the meta-analysis: a uniform
//! table of per-database estimates with labelled columns, and a collection of
//! per-database patient-level survival records.
//!
//! Missing table cells are encoded as `NaN`; infinite cells as `±inf`.
//!
//! # Examples
//!
//! ```
//! use faer::Mat;
//! use random_effects_meta::EstimateTable;
//!
//! let values = Mat::from_fn(3, 2, |i, j| if j == 0 { 0.1 * f64::from(u8::try_from(i).unwrap_or(0)) } else { 0.1 });
//! let table = EstimateTable::new(vec!["logRr".into(), "seLogRr".into()], values);
//!
//! assert!(table.validate().is_ok());
//! assert_eq!(table.column_index("seLogRr"), Some(1));
//! ```
//!
//! ```
//! use faer::Mat;
//! use random_effects_meta::EstimateTable;
//!
//! let values = Mat::from_fn(3, 2, |_i, _j| 0.1);
//! let table = EstimateTable::new(vec!["logRr".into()], values);
//!
//! assert!(table.validate().is_err());
//! ```

use faer::Mat;
use thiserror::Error;

pub mod patient_level;

pub use patient_level::PatientLevelData;

/// Errors returned when validating or cleaning meta-analysis inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("table has {labels} column labels but {columns} value columns")]
    LabelCountMismatch { labels: usize, columns: usize },
    #[error("column label `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("column `{column}` not found in table")]
    MissingColumn { column: String },
    #[error("{columns} columns were named for cleaning but {min} minimum and {max} maximum bounds were given")]
    BoundsLengthMismatch {
        columns: usize,
        min: usize,
        max: usize,
    },
    #[error(
        "patient-level database {database}: stratum ({strata}), outcome ({outcomes}), time ({times}), and covariate ({covariates}) lengths must match"
    )]
    PatientLevelLengthMismatch {
        database: usize,
        strata: usize,
        outcomes: usize,
        times: usize,
        covariates: usize,
    },
    #[error("patient-level database {database}, row {row}: outcome must be 0 or 1, found {value}")]
    InvalidOutcome {
        database: usize,
        row: usize,
        value: u8,
    },
    #[error("patient-level database {database}, row {row}: time must be finite and non-negative")]
    InvalidTime { database: usize, row: usize },
    #[error("patient-level database {database}, row {row}: covariate must be finite")]
    NonFiniteCovariate { database: usize, row: usize },
}

/// Uniform tabular frame of per-database estimates.
///
/// Each row is one database; each column is identified by its label.
#[derive(Debug, Clone)]
pub struct EstimateTable {
    pub labels: Vec<String>,
    pub values: Mat<f64>,
}

impl EstimateTable {
    #[must_use]
    pub const fn new(labels: Vec<String>, values: Mat<f64>) -> Self {
        Self { labels, values }
    }

    /// Build a table from named columns of equal length.
    ///
    /// Shorter columns are padded with `NaN` (missing).
    #[must_use]
    pub fn from_columns(columns: &[(&str, &[f64])]) -> Self {
        let nrows = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
        let labels = columns.iter().map(|(label, _)| (*label).to_string()).collect();
        let values = Mat::from_fn(nrows, columns.len(), |row, col| {
            columns[col].1.get(row).copied().unwrap_or(f64::NAN)
        });
        Self { labels, values }
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    #[must_use]
    pub fn has_column(&self, label: &str) -> bool {
        self.column_index(label).is_some()
    }

    #[must_use]
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|candidate| candidate == label)
    }

    /// Values of one column in row order.
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<f64> {
        (0..self.values.nrows())
            .map(|row| self.values[(row, index)])
            .collect()
    }

    /// Values of one row in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Vec<f64> {
        (0..self.values.ncols())
            .map(|col| self.values[(index, col)])
            .collect()
    }

    /// Keep only the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            labels: self.labels.clone(),
            values: Mat::from_fn(rows.len(), self.values.ncols(), |i, j| {
                self.values[(rows[i], j)]
            }),
        }
    }

    /// # Errors
    ///
    /// Returns `InputError` if labels and value columns disagree or a label repeats.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.labels.len() != self.values.ncols() {
            return Err(InputError::LabelCountMismatch {
                labels: self.labels.len(),
                columns: self.values.ncols(),
            });
        }
        for (index, label) in self.labels.iter().enumerate() {
            if self.labels[..index].contains(label) {
                return Err(InputError::DuplicateColumn(label.clone()));
            }
        }
        Ok(())
    }
}

/// The two input shapes accepted by the meta-analysis.
#[derive(Debug, Clone)]
pub enum MetaAnalysisInput {
    /// One row per database with labelled columns.
    Table(EstimateTable),
    /// One stratified survival record set per database.
    PatientLevel(Vec<PatientLevelData>),
}

impl From<EstimateTable> for MetaAnalysisInput {
    fn from(table: EstimateTable) -> Self {
        Self::Table(table)
    }
}

impl From<Vec<PatientLevelData>> for MetaAnalysisInput {
    fn from(databases: Vec<PatientLevelData>) -> Self {
        Self::PatientLevel(databases)
    }
}

impl MetaAnalysisInput {
    /// Number of databases (rows or record sets) before any cleaning.
    #[must_use]
    pub fn database_count(&self) -> usize {
        match self {
            Self::Table(table) => table.nrows(),
            Self::PatientLevel(databases) => databases.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_label_count_mismatch() {
        let table = EstimateTable::new(vec!["logRr".into()], Mat::from_fn(2, 2, |_i, _j| 1.0));
        let err = table.validate().expect_err("label mismatch should fail");
        assert_eq!(
            err,
            InputError::LabelCountMismatch {
                labels: 1,
                columns: 2
            }
        );
    }

    #[test]
    fn validate_rejects_duplicate_labels() {
        let table = EstimateTable::new(
            vec!["mu".into(), "mu".into()],
            Mat::from_fn(1, 2, |_i, _j| 1.0),
        );
        let err = table.validate().expect_err("duplicate label should fail");
        assert_eq!(err, InputError::DuplicateColumn("mu".into()));
    }

    #[test]
    fn from_columns_pads_short_columns_with_missing() {
        let table = EstimateTable::from_columns(&[("logRr", &[0.1, 0.2]), ("seLogRr", &[0.1])]);
        assert_eq!(table.nrows(), 2);
        assert!(table.values[(1, 1)].is_nan());
        assert_eq!(table.column(0), vec![0.1, 0.2]);
    }

    #[test]
    fn select_rows_preserves_requested_order() {
        let table = EstimateTable::from_columns(&[("x", &[1.0, 2.0, 3.0])]);
        let picked = table.select_rows(&[2, 0]);
        assert_eq!(picked.column(0), vec![3.0, 1.0]);
        assert_eq!(picked.labels, table.labels);
    }

    #[test]
    fn database_count_covers_both_shapes() {
        let table = EstimateTable::from_columns(&[("x", &[1.0, 2.0])]);
        assert_eq!(MetaAnalysisInput::from(table).database_count(), 2);
        let pooled = MetaAnalysisInput::from(vec![PatientLevelData::default()]);
        assert_eq!(pooled.database_count(), 1);
    }
}
