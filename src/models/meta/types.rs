//! Core public types for the meta-analysis module.

use std::fmt;

use thiserror::Error;

use super::diagnostics::Diagnostics;
use super::posterior::PosteriorSummary;
use super::sampler::{AcceptanceRates, ProposalTuning, SamplerError};
use crate::inference::{ChainConfig, InferenceError};
use crate::input::InputError;

/// Errors returned by meta-analysis configuration, classification, and fitting.
#[derive(Debug, Error)]
pub enum MetaAnalysisError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidChain(#[from] InferenceError),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error("grid column {column} has non-numeric label `{label}`")]
    MalformedGrid { label: String, column: usize },
    #[error("{likelihood_type} input is missing required column `{column}`")]
    MissingColumn {
        column: &'static str,
        likelihood_type: LikelihoodType,
    },
    #[error("grid input has no support points")]
    EmptyGrid,
    #[error("{likelihood_type} likelihood cannot be built from this input shape")]
    InputShapeMismatch { likelihood_type: LikelihoodType },
    #[error("{name} must be positive and finite, found {value}")]
    InvalidPrior { name: &'static str, value: f64 },
    #[error("sampler returned {found} traces; at least {minimum} are required")]
    MalformedTrace { found: usize, minimum: usize },
    #[error("sampler trace {index} has {found} draws, expected {expected}")]
    InconsistentTraceLength {
        index: usize,
        found: usize,
        expected: usize,
    },
    #[error("sampler returned no retained draws")]
    EmptyTrace,
    #[error("invalid proposal tuning configuration")]
    InvalidProposalTuning,
}

/// Representation of the per-database likelihood approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikelihoodType {
    /// Normal approximation: `(logRr, seLogRr)`.
    Normal,
    /// Skew-normal approximation: `(mu, sigma, alpha)`.
    SkewNormal,
    /// Custom parametric approximation: `(mu, sigma, gamma)`.
    CustomParametric,
    /// Log-likelihood values over shared support points.
    Grid,
    /// Full stratified survival records per database.
    PatientLevel,
}

impl LikelihoodType {
    /// Short label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::SkewNormal => "skew normal",
            Self::CustomParametric => "custom",
            Self::Grid => "grid",
            Self::PatientLevel => "pooled",
        }
    }
}

impl fmt::Display for LikelihoodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full configuration of one meta-analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaAnalysisConfig {
    pub chain: ChainConfig,
    /// `[mu prior sd, tau prior sd]`.
    pub prior_sd: [f64; 2],
    /// Proposal tuning for the bundled random-walk sampler.
    pub tuning: ProposalTuning,
}

impl Default for MetaAnalysisConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            prior_sd: [2.0, 0.5],
            tuning: ProposalTuning::default(),
        }
    }
}

impl MetaAnalysisConfig {
    /// # Errors
    ///
    /// Returns `MetaAnalysisError` if any configuration block is invalid.
    pub fn validate(self) -> Result<(), MetaAnalysisError> {
        self.chain.validate()?;
        super::priors::build_prior(self.prior_sd)?;
        if !self.tuning.is_valid() {
            return Err(MetaAnalysisError::InvalidProposalTuning);
        }
        Ok(())
    }
}

/// Output of one meta-analysis call.
#[derive(Debug, Clone)]
pub struct MetaAnalysisReport {
    pub summary: PosteriorSummary,
    pub diagnostics: Diagnostics,
    /// Proposal acceptance rates, when the sampler reports them.
    pub acceptance_rates: Option<AcceptanceRates>,
}
