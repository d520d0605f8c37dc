//! Bayesian random-effects meta-analysis.
//!
//! Per-database likelihood approximations are detected from the input shape,
//! cleaned, handed to a [`PosteriorSampler`] for the model
//!
//! ```text
//! theta_i ~ Normal(mu, tau),  mu ~ Normal(0, mu_prior_sd),  tau ~ HalfNormal(0, tau_prior_sd)
//! ```
//!
//! and summarised as a pooled effect `mu` with its heterogeneity `tau`.

pub mod adapters;
pub mod detect;
pub mod diagnostics;
pub mod likelihood;
pub mod orchestrator;
pub mod posterior;
pub mod priors;
pub mod sampler;
pub mod types;

pub use adapters::{
    DataSet, GridEstimates, NormalEstimate, ParametricEstimate, build_data_model, prepare_data_set,
};
pub use detect::{detect_likelihood_type, parse_support_points};
pub use diagnostics::{
    DiagnosticEntry, DiagnosticLevel, DiagnosticStage, Diagnostics, RemovalReason,
};
pub use likelihood::{CoxPartialLikelihood, GridLikelihood, SiteLikelihood};
pub use orchestrator::{
    compute_bayesian_meta_analysis, compute_bayesian_meta_analysis_with_sampler, run_sampler,
    trace_from_output,
};
pub use posterior::{
    PosteriorEstimate, PosteriorSummary, PosteriorTrace, hdi, median, render_summary_table,
    summarize_trace,
};
pub use priors::{HalfNormalPrior, Prior, build_prior};
pub use sampler::{
    AcceptanceRates, DataModel, PosteriorSampler, ProposalTuning, RandomWalkSampler,
    SamplerError, SamplerOutput,
};
pub use types::{LikelihoodType, MetaAnalysisConfig, MetaAnalysisError, MetaAnalysisReport};
