//! Patient-level survival record sets.
//!
//! One `PatientLevelData` holds the stratified survival records of a single
//! database, used when that database contributes its full Cox partial
//! likelihood instead of an approximation.

use super::InputError;

/// Stratified survival records for one database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientLevelData {
    pub stratum_id: Vec<i64>,
    /// Outcome indicator, `1` for an event and `0` for censoring.
    pub y: Vec<u8>,
    pub time: Vec<f64>,
    /// Covariate whose log hazard ratio is being synthesised.
    pub x: Vec<f64>,
}

impl PatientLevelData {
    #[must_use]
    pub const fn new(stratum_id: Vec<i64>, y: Vec<u8>, time: Vec<f64>, x: Vec<f64>) -> Self {
        Self {
            stratum_id,
            y,
            time,
            x,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.y.iter().filter(|&&outcome| outcome == 1).count()
    }

    /// # Errors
    ///
    /// Returns `InputError` if lengths disagree or a record is malformed.
    /// `database` is only used to label the error.
    pub fn validate(&self, database: usize) -> Result<(), InputError> {
        let rows = self.y.len();
        if self.stratum_id.len() != rows || self.time.len() != rows || self.x.len() != rows {
            return Err(InputError::PatientLevelLengthMismatch {
                database,
                strata: self.stratum_id.len(),
                outcomes: rows,
                times: self.time.len(),
                covariates: self.x.len(),
            });
        }
        for row in 0..rows {
            if self.y[row] > 1 {
                return Err(InputError::InvalidOutcome {
                    database,
                    row,
                    value: self.y[row],
                });
            }
            if !(self.time[row].is_finite() && self.time[row] >= 0.0) {
                return Err(InputError::InvalidTime { database, row });
            }
            if !self.x[row].is_finite() {
                return Err(InputError::NonFiniteCovariate { database, row });
            }
        }
        Ok(())
    }
}
