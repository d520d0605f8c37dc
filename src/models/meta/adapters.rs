//! Conversion of detected inputs into typed data sets and sampler data models.

use crate::input::{EstimateTable, MetaAnalysisInput, PatientLevelData};
use crate::preprocess::clean_columns;

use super::detect::parse_support_points;
use super::diagnostics::{DiagnosticStage, Diagnostics};
use super::sampler::DataModel;
use super::types::{LikelihoodType, MetaAnalysisError};

const EFFECT_BOUND: f64 = 100.0;
const MIN_SCALE: f64 = 1.0e-5;
const MAX_SCALE: f64 = 100.0;

/// Normal approximation of one database's likelihood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalEstimate {
    pub log_rr: f64,
    pub se_log_rr: f64,
}

/// Three-parameter approximation shared by the skew-normal and custom shapes.
///
/// `shape` is `alpha` for skew-normal rows and `gamma` for custom rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametricEstimate {
    pub mu: f64,
    pub sigma: f64,
    pub shape: f64,
}

/// Log-likelihood values over support points shared by every row.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEstimates {
    pub points: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

/// Per-database estimates of exactly one likelihood type, in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
    Normal(Vec<NormalEstimate>),
    SkewNormal(Vec<ParametricEstimate>),
    CustomParametric(Vec<ParametricEstimate>),
    Grid(GridEstimates),
    PatientLevel(Vec<PatientLevelData>),
}

impl DataSet {
    #[must_use]
    pub const fn likelihood_type(&self) -> LikelihoodType {
        match self {
            Self::Normal(_) => LikelihoodType::Normal,
            Self::SkewNormal(_) => LikelihoodType::SkewNormal,
            Self::CustomParametric(_) => LikelihoodType::CustomParametric,
            Self::Grid(_) => LikelihoodType::Grid,
            Self::PatientLevel(_) => LikelihoodType::PatientLevel,
        }
    }

    /// Number of databases.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Normal(rows) => rows.len(),
            Self::SkewNormal(rows) | Self::CustomParametric(rows) => rows.len(),
            Self::Grid(grid) => grid.rows.len(),
            Self::PatientLevel(databases) => databases.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate, clean, and convert an input into the data set of `likelihood_type`.
///
/// Parametric shapes are cleaned on their bounded columns; grid and
/// patient-level inputs are only checked structurally.
///
/// # Errors
///
/// Returns `MetaAnalysisError` if the input shape does not fit the type, a
/// required column is absent, or the input is structurally malformed.
pub fn prepare_data_set(
    input: &MetaAnalysisInput,
    likelihood_type: LikelihoodType,
    diagnostics: &mut Diagnostics,
) -> Result<DataSet, MetaAnalysisError> {
    match (likelihood_type, input) {
        (LikelihoodType::PatientLevel, MetaAnalysisInput::PatientLevel(databases)) => {
            prepare_patient_level(databases, diagnostics)
        }
        (LikelihoodType::PatientLevel, MetaAnalysisInput::Table(_))
        | (_, MetaAnalysisInput::PatientLevel(_)) => {
            Err(MetaAnalysisError::InputShapeMismatch { likelihood_type })
        }
        (LikelihoodType::Normal, MetaAnalysisInput::Table(table)) => {
            let cleaned = clean_required(
                table,
                likelihood_type,
                &["logRr", "seLogRr"],
                &[-EFFECT_BOUND, MIN_SCALE],
                &[EFFECT_BOUND, MAX_SCALE],
                diagnostics,
            )?;
            let rows = (0..cleaned.nrows())
                .map(|row| NormalEstimate {
                    log_rr: cleaned.values[(row, 0)],
                    se_log_rr: cleaned.values[(row, 1)],
                })
                .collect();
            Ok(DataSet::Normal(rows))
        }
        (LikelihoodType::SkewNormal, MetaAnalysisInput::Table(table)) => Ok(DataSet::SkewNormal(
            prepare_parametric(table, likelihood_type, "alpha", diagnostics)?,
        )),
        (LikelihoodType::CustomParametric, MetaAnalysisInput::Table(table)) => {
            Ok(DataSet::CustomParametric(prepare_parametric(
                table,
                likelihood_type,
                "gamma",
                diagnostics,
            )?))
        }
        (LikelihoodType::Grid, MetaAnalysisInput::Table(table)) => prepare_grid(table),
    }
}

/// Feed a data set into a finished sampler data model, preserving row order.
///
/// # Errors
///
/// Returns `MetaAnalysisError::Sampler` if the data set is empty or a row is
/// rejected by the data model.
pub fn build_data_model(data_set: &DataSet) -> Result<DataModel, MetaAnalysisError> {
    let mut model = DataModel::new(data_set.likelihood_type());
    match data_set {
        DataSet::Normal(rows) => {
            for row in rows {
                model.add_likelihood_row(&[row.log_rr, row.se_log_rr], &[])?;
            }
        }
        DataSet::SkewNormal(rows) | DataSet::CustomParametric(rows) => {
            for row in rows {
                model.add_likelihood_row(&[row.mu, row.sigma, row.shape], &[])?;
            }
        }
        DataSet::Grid(grid) => {
            for row in &grid.rows {
                model.add_likelihood_row(row, &grid.points)?;
            }
        }
        DataSet::PatientLevel(databases) => {
            for database in databases {
                model.add_patient_level_data(
                    &database.stratum_id,
                    &database.y,
                    &database.time,
                    &database.x,
                )?;
            }
        }
    }
    model.finish()?;
    Ok(model)
}

fn clean_required(
    table: &EstimateTable,
    likelihood_type: LikelihoodType,
    columns: &[&'static str],
    min_values: &[f64],
    max_values: &[f64],
    diagnostics: &mut Diagnostics,
) -> Result<EstimateTable, MetaAnalysisError> {
    table.validate()?;
    if let Some(&column) = columns.iter().find(|column| !table.has_column(column)) {
        return Err(MetaAnalysisError::MissingColumn {
            column,
            likelihood_type,
        });
    }
    let cleaned = clean_columns(table, columns, min_values, max_values, diagnostics)?;
    let projected = columns
        .iter()
        .filter_map(|column| cleaned.column_index(column))
        .collect::<Vec<_>>();
    Ok(EstimateTable::new(
        columns.iter().map(|column| (*column).to_string()).collect(),
        faer::Mat::from_fn(cleaned.nrows(), projected.len(), |row, col| {
            cleaned.values[(row, projected[col])]
        }),
    ))
}

fn prepare_parametric(
    table: &EstimateTable,
    likelihood_type: LikelihoodType,
    shape_column: &'static str,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ParametricEstimate>, MetaAnalysisError> {
    let cleaned = clean_required(
        table,
        likelihood_type,
        &["mu", "sigma", shape_column],
        &[-EFFECT_BOUND, MIN_SCALE, -EFFECT_BOUND],
        &[EFFECT_BOUND, MAX_SCALE, EFFECT_BOUND],
        diagnostics,
    )?;
    Ok((0..cleaned.nrows())
        .map(|row| ParametricEstimate {
            mu: cleaned.values[(row, 0)],
            sigma: cleaned.values[(row, 1)],
            shape: cleaned.values[(row, 2)],
        })
        .collect())
}

fn prepare_grid(table: &EstimateTable) -> Result<DataSet, MetaAnalysisError> {
    table.validate()?;
    let points = parse_support_points(&table.labels)?;
    if points.is_empty() {
        return Err(MetaAnalysisError::EmptyGrid);
    }
    let rows = (0..table.nrows()).map(|row| table.row(row)).collect();
    Ok(DataSet::Grid(GridEstimates { points, rows }))
}

fn prepare_patient_level(
    databases: &[PatientLevelData],
    diagnostics: &mut Diagnostics,
) -> Result<DataSet, MetaAnalysisError> {
    for (index, database) in databases.iter().enumerate() {
        database.validate(index)?;
        if database.event_count() == 0 {
            diagnostics.warn(
                DiagnosticStage::Detection,
                format!(
                    "patient-level database {} has no events and contributes a flat likelihood",
                    index + 1
                ),
            );
        }
    }
    Ok(DataSet::PatientLevel(databases.to_vec()))
}
