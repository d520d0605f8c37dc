#![forbid(unsafe_code)]

//! # `random_effects_meta`
//!
//! Bayesian random-effects meta-analysis of per-database effect estimates.
//!
//! Each database contributes a likelihood for its log effect size: a normal
//! approximation, a skew-normal or custom parametric approximation, a grid of
//! log-likelihood values, or its raw stratified survival records. The shape is
//! detected from the input columns, rows are cleaned, and an MCMC sampler
//! draws the pooled effect `mu` and heterogeneity `tau`.
//!
//! ```no_run
//! use random_effects_meta::{EstimateTable, MetaAnalysisConfig, compute_bayesian_meta_analysis};
//!
//! let table = EstimateTable::from_columns(&[
//!     ("logRr", &[0.10, 0.05, 0.12]),
//!     ("seLogRr", &[0.08, 0.10, 0.09]),
//! ]);
//! let report = compute_bayesian_meta_analysis(&table.into(), &MetaAnalysisConfig::default())?;
//! println!("{:?}", report.summary.mu());
//! # Ok::<(), random_effects_meta::MetaAnalysisError>(())
//! ```

pub mod inference;
pub mod input;
pub mod models;
pub mod preprocess;

pub use inference::{ChainConfig, InferenceError, ProposalStats};
pub use input::{EstimateTable, InputError, MetaAnalysisInput, PatientLevelData};
pub use preprocess::clean_columns;

pub use models::meta::{
    AcceptanceRates, DataModel, DiagnosticEntry, DiagnosticLevel, DiagnosticStage, Diagnostics,
    LikelihoodType, MetaAnalysisConfig, MetaAnalysisError, MetaAnalysisReport, PosteriorEstimate,
    PosteriorSampler, PosteriorSummary, PosteriorTrace, Prior, ProposalTuning, RandomWalkSampler,
    RemovalReason, SamplerError, SamplerOutput, build_prior, compute_bayesian_meta_analysis,
    compute_bayesian_meta_analysis_with_sampler, detect_likelihood_type, render_summary_table,
};
