//! Sampler boundary and the bundled random-walk engine.
//!
//! The orchestration layer only talks to [`PosteriorSampler`]: it hands over a
//! finished [`DataModel`], a [`Prior`], and a [`ChainConfig`], and gets back
//! named parameter traces addressable by 1-based index. Indices 1 and 2 are
//! reserved by the engine; index 3 is `mu`, 4 is `tau`, and the per-database
//! effects follow in feed order.
//!
//! [`RandomWalkSampler`] is a Metropolis-within-Gibbs engine for
//!
//! ```text
//! theta_i ~ Normal(mu, tau),  mu ~ Normal(0, mu_prior_sd),  tau ~ HalfNormal(0, tau_prior_sd)
//! ```
//!
//! with random-walk updates for each `theta_i`, a conjugate draw for `mu`,
//! and a random walk on `log(tau)`. Proposal scales adapt during burn-in.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use thiserror::Error;

use crate::inference::{ChainConfig, InferenceError, ProposalStats};
use crate::input::PatientLevelData;

use super::likelihood::{CoxPartialLikelihood, GridLikelihood, SiteLikelihood};
use super::priors::{Prior, log_normal_kernel};
use super::types::LikelihoodType;

/// Names of the two reserved leading traces emitted by [`RandomWalkSampler`].
pub const RESERVED_TRACE_NAMES: [&str; 2] = ["iteration", "logPosterior"];

const MAX_START_ABS: f64 = 10.0;

/// Errors raised while building a data model or running a chain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    #[error("data model must be finished before sampling")]
    UnfinishedModel,
    #[error("data model is finished and cannot accept more data")]
    FinishedModel,
    #[error("data model has no likelihood contributions")]
    EmptyModel,
    #[error("{found} data cannot be added to a {expected} data model")]
    ModelTypeMismatch {
        expected: LikelihoodType,
        found: LikelihoodType,
    },
    #[error("{likelihood_type} likelihood rows take {expected} parameters, found {found}")]
    InvalidLikelihoodRow {
        likelihood_type: LikelihoodType,
        expected: usize,
        found: usize,
    },
    #[error("grid row has {values} values for {points} support points")]
    GridLengthMismatch { points: usize, values: usize },
    #[error("patient-level arrays must have equal lengths")]
    PatientLevelLengthMismatch,
    #[error("log posterior is not finite at the starting state")]
    NonFiniteStart,
    #[error(transparent)]
    InvalidChain(#[from] InferenceError),
    #[error("sampler failed: {0}")]
    Failed(String),
}

/// Likelihood contributions fed to a sampler, one per database, in feed order.
#[derive(Debug, Clone)]
pub struct DataModel {
    likelihood_type: LikelihoodType,
    sites: Vec<SiteLikelihood>,
    finished: bool,
}

impl DataModel {
    #[must_use]
    pub const fn new(likelihood_type: LikelihoodType) -> Self {
        Self {
            likelihood_type,
            sites: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub const fn likelihood_type(&self) -> LikelihoodType {
        self.likelihood_type
    }

    #[must_use]
    pub fn sites(&self) -> &[SiteLikelihood] {
        &self.sites
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Add one parametric or grid likelihood row.
    ///
    /// - normal: `params = [mean, se]`, no auxiliary values
    /// - skew normal / custom: `params = [mu, sigma, alpha | gamma]`
    /// - grid: `params` are the row's log-likelihood values and `auxiliary`
    ///   the shared support points
    ///
    /// # Errors
    ///
    /// Returns `SamplerError` if the model is finished, is patient-level, or
    /// the row has the wrong shape.
    pub fn add_likelihood_row(&mut self, params: &[f64], auxiliary: &[f64]) -> Result<(), SamplerError> {
        if self.finished {
            return Err(SamplerError::FinishedModel);
        }
        let likelihood_type = self.likelihood_type;
        let expect = |expected: usize| {
            if params.len() == expected {
                Ok(())
            } else {
                Err(SamplerError::InvalidLikelihoodRow {
                    likelihood_type,
                    expected,
                    found: params.len(),
                })
            }
        };
        let site = match likelihood_type {
            LikelihoodType::Normal => {
                expect(2)?;
                SiteLikelihood::Normal {
                    mean: params[0],
                    se: params[1],
                }
            }
            LikelihoodType::SkewNormal => {
                expect(3)?;
                SiteLikelihood::SkewNormal {
                    mu: params[0],
                    sigma: params[1],
                    alpha: params[2],
                }
            }
            LikelihoodType::CustomParametric => {
                expect(3)?;
                SiteLikelihood::CustomParametric {
                    mu: params[0],
                    sigma: params[1],
                    gamma: params[2],
                }
            }
            LikelihoodType::Grid => {
                if params.len() != auxiliary.len() {
                    return Err(SamplerError::GridLengthMismatch {
                        points: auxiliary.len(),
                        values: params.len(),
                    });
                }
                SiteLikelihood::Grid(GridLikelihood::new(auxiliary, params))
            }
            LikelihoodType::PatientLevel => {
                return Err(SamplerError::InvalidLikelihoodRow {
                    likelihood_type,
                    expected: 0,
                    found: params.len(),
                });
            }
        };
        self.sites.push(site);
        Ok(())
    }

    /// Add the stratified survival records of one database.
    ///
    /// # Errors
    ///
    /// Returns `SamplerError` if the model is finished, is not patient-level,
    /// or the arrays differ in length.
    pub fn add_patient_level_data(
        &mut self,
        stratum_id: &[i64],
        y: &[u8],
        time: &[f64],
        x: &[f64],
    ) -> Result<(), SamplerError> {
        if self.finished {
            return Err(SamplerError::FinishedModel);
        }
        if self.likelihood_type != LikelihoodType::PatientLevel {
            return Err(SamplerError::ModelTypeMismatch {
                expected: self.likelihood_type,
                found: LikelihoodType::PatientLevel,
            });
        }
        let rows = y.len();
        if stratum_id.len() != rows || time.len() != rows || x.len() != rows {
            return Err(SamplerError::PatientLevelLengthMismatch);
        }
        let data = PatientLevelData::new(stratum_id.to_vec(), y.to_vec(), time.to_vec(), x.to_vec());
        self.sites
            .push(SiteLikelihood::PatientLevel(CoxPartialLikelihood::new(&data)));
        Ok(())
    }

    /// Close the model to further data.
    ///
    /// # Errors
    ///
    /// Returns `SamplerError::EmptyModel` if nothing was added.
    pub fn finish(&mut self) -> Result<(), SamplerError> {
        if self.sites.is_empty() {
            return Err(SamplerError::EmptyModel);
        }
        self.finished = true;
        Ok(())
    }
}

/// Named parameter traces returned by a sampler.
#[derive(Debug, Clone, Default)]
pub struct SamplerOutput {
    names: Vec<String>,
    traces: Vec<Vec<f64>>,
    acceptance_rates: Option<AcceptanceRates>,
}

impl SamplerOutput {
    /// Pair names with traces.
    ///
    /// Every trace is kept. Traces without a name are called
    /// `parameter[i]` (1-based); names without a trace are ignored.
    #[must_use]
    pub fn new(names: Vec<String>, traces: Vec<Vec<f64>>) -> Self {
        let mut names = names;
        names.truncate(traces.len());
        let named = names.len();
        names.extend((named + 1..=traces.len()).map(|index| format!("parameter[{index}]")));
        Self {
            names,
            traces,
            acceptance_rates: None,
        }
    }

    #[must_use]
    pub const fn with_acceptance_rates(mut self, rates: AcceptanceRates) -> Self {
        self.acceptance_rates = Some(rates);
        self
    }

    #[must_use]
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// Trace at 1-based `index`.
    #[must_use]
    pub fn trace(&self, index: usize) -> Option<&[f64]> {
        index
            .checked_sub(1)
            .and_then(|position| self.traces.get(position))
            .map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    #[must_use]
    pub const fn acceptance_rates(&self) -> Option<AcceptanceRates> {
        self.acceptance_rates
    }
}

/// Block-wise acceptance rates over the whole chain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcceptanceRates {
    /// Pooled over all per-database effects.
    pub theta: f64,
    pub tau: f64,
}

/// An MCMC engine for the random-effects model.
pub trait PosteriorSampler {
    /// Run one chain and return the retained draws as named traces.
    ///
    /// # Errors
    ///
    /// Returns `SamplerError` if the engine cannot produce draws.
    fn run_chain(
        &mut self,
        model: &DataModel,
        prior: &Prior,
        chain: &ChainConfig,
    ) -> Result<SamplerOutput, SamplerError>;
}

/// Proposal-scale and adaptation controls for [`RandomWalkSampler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProposalTuning {
    /// Minimum allowed proposal scale.
    pub min_draw_scale: f64,
    /// Initial random-walk scale for effects without a natural scale.
    pub theta_draw_scale: f64,
    /// Initial random-walk scale for `log(tau)`.
    pub log_tau_draw_scale: f64,
    /// Adapt every `adaptation_interval` iterations during burn-in.
    pub adaptation_interval: usize,
    /// Lower acceptance-rate target for adaptation.
    pub acceptance_target_low: f64,
    /// Upper acceptance-rate target for adaptation.
    pub acceptance_target_high: f64,
    /// Multiplicative scale decrease when acceptance is below target.
    pub scale_decrease_factor: f64,
    /// Multiplicative scale increase when acceptance is above target.
    pub scale_increase_factor: f64,
}

impl Default for ProposalTuning {
    fn default() -> Self {
        Self {
            min_draw_scale: 1.0e-4,
            theta_draw_scale: 0.1,
            log_tau_draw_scale: 0.5,
            adaptation_interval: 100,
            acceptance_target_low: 0.25,
            acceptance_target_high: 0.5,
            scale_decrease_factor: 0.8,
            scale_increase_factor: 1.25,
        }
    }
}

impl ProposalTuning {
    /// Whether proposal tuning settings are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.min_draw_scale > 0.0
            && self.theta_draw_scale > 0.0
            && self.log_tau_draw_scale > 0.0
            && self.adaptation_interval > 0
            && self.acceptance_target_low >= 0.0
            && self.acceptance_target_high <= 1.0
            && self.acceptance_target_low < self.acceptance_target_high
            && self.scale_decrease_factor > 0.0
            && self.scale_decrease_factor < 1.0
            && self.scale_increase_factor > 1.0
    }
}

/// Metropolis-within-Gibbs sampler for the random-effects model.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWalkSampler {
    pub tuning: ProposalTuning,
}

impl RandomWalkSampler {
    #[must_use]
    pub const fn new(tuning: ProposalTuning) -> Self {
        Self { tuning }
    }
}

impl PosteriorSampler for RandomWalkSampler {
    fn run_chain(
        &mut self,
        model: &DataModel,
        prior: &Prior,
        chain: &ChainConfig,
    ) -> Result<SamplerOutput, SamplerError> {
        chain.validate()?;
        if !model.is_finished() {
            return Err(SamplerError::UnfinishedModel);
        }
        if model.sites().is_empty() {
            return Err(SamplerError::EmptyModel);
        }
        let context = SamplerContext {
            sites: model.sites(),
            prior: *prior,
            tuning: self.tuning,
        };
        let mut rng = StdRng::seed_from_u64(chain.seed);
        let mut state = context.initial_state();
        if !context.log_posterior(&state).is_finite() {
            return Err(SamplerError::NonFiniteStart);
        }
        Ok(run_random_walk_chain(&context, &mut rng, &mut state, *chain))
    }
}

struct SamplerContext<'a> {
    sites: &'a [SiteLikelihood],
    prior: Prior,
    tuning: ProposalTuning,
}

#[derive(Debug, Clone)]
struct ChainState {
    mu: f64,
    tau: f64,
    theta: Vec<f64>,
    site_log_likelihood: Vec<f64>,
}

#[derive(Debug, Clone)]
struct ProposalScales {
    theta: Vec<f64>,
    log_tau: f64,
}

#[derive(Debug, Clone, Default)]
struct BlockCounts {
    theta: Vec<ProposalStats>,
    tau: ProposalStats,
}

impl SamplerContext<'_> {
    fn initial_state(&self) -> ChainState {
        let theta: Vec<f64> = self
            .sites
            .iter()
            .map(|site| site.starting_point().clamp(-MAX_START_ABS, MAX_START_ABS))
            .collect();
        let site_log_likelihood = self
            .sites
            .iter()
            .zip(&theta)
            .map(|(site, value)| site.log_likelihood(*value))
            .collect();
        let mu = theta.iter().sum::<f64>() / usize_to_f64(theta.len());
        ChainState {
            mu,
            tau: 0.5 * self.prior.tau_prior.scale,
            theta,
            site_log_likelihood,
        }
    }

    fn initial_scales(&self) -> ProposalScales {
        let theta = self
            .sites
            .iter()
            .map(|site| match site {
                SiteLikelihood::Normal { se, .. } => *se,
                SiteLikelihood::SkewNormal { sigma, .. }
                | SiteLikelihood::CustomParametric { sigma, .. } => *sigma,
                SiteLikelihood::Grid(_) | SiteLikelihood::PatientLevel(_) => {
                    self.tuning.theta_draw_scale
                }
            })
            .map(|scale| scale.max(self.tuning.min_draw_scale))
            .collect();
        ProposalScales {
            theta,
            log_tau: self.tuning.log_tau_draw_scale,
        }
    }

    fn random_effects_log_density(&self, theta: &[f64], mu: f64, tau: f64) -> f64 {
        theta
            .iter()
            .map(|value| log_normal_kernel(*value, mu, tau))
            .sum()
    }

    fn log_posterior(&self, state: &ChainState) -> f64 {
        state.site_log_likelihood.iter().sum::<f64>()
            + self.random_effects_log_density(&state.theta, state.mu, state.tau)
            + self.prior.log_mu_density(state.mu)
            + self.prior.log_tau_density(state.tau)
    }
}

fn run_random_walk_chain(
    context: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    chain: ChainConfig,
) -> SamplerOutput {
    let site_count = context.sites.len();
    let retained = chain.retained_draws();
    let mut scales = context.initial_scales();
    let mut window = BlockCounts {
        theta: vec![ProposalStats::default(); site_count],
        tau: ProposalStats::default(),
    };
    let mut totals = BlockCounts {
        theta: vec![ProposalStats::default(); site_count],
        tau: ProposalStats::default(),
    };
    let mut traces: Vec<Vec<f64>> = (0..site_count + 4)
        .map(|_| Vec::with_capacity(retained))
        .collect();

    for iter in 0..chain.chain_length {
        for site in 0..site_count {
            let accepted = update_theta(context, rng, state, site, scales.theta[site]);
            window.theta[site].record(accepted);
            totals.theta[site].record(accepted);
        }
        update_mu(context, rng, state);
        let accepted = update_tau(context, rng, state, scales.log_tau);
        window.tau.record(accepted);
        totals.tau.record(accepted);

        if iter < chain.burn_in && (iter + 1).is_multiple_of(context.tuning.adaptation_interval) {
            adapt_proposal_scales(&mut scales, &window, context.tuning);
            window = BlockCounts {
                theta: vec![ProposalStats::default(); site_count],
                tau: ProposalStats::default(),
            };
        }

        if chain.retains(iter) {
            traces[0].push(usize_to_f64(iter + 1));
            traces[1].push(context.log_posterior(state));
            traces[2].push(state.mu);
            traces[3].push(state.tau);
            for (site, value) in state.theta.iter().enumerate() {
                traces[4 + site].push(*value);
            }
        }
    }

    let mut names: Vec<String> = RESERVED_TRACE_NAMES
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    names.push("mu".to_string());
    names.push("tau".to_string());
    names.extend((1..=site_count).map(|site| format!("theta[{site}]")));

    let theta_total = totals.theta.iter().fold(ProposalStats::default(), |acc, stats| {
        ProposalStats {
            proposed: acc.proposed + stats.proposed,
            accepted: acc.accepted + stats.accepted,
        }
    });
    SamplerOutput::new(names, traces).with_acceptance_rates(AcceptanceRates {
        theta: theta_total.acceptance_rate(),
        tau: totals.tau.acceptance_rate(),
    })
}

fn update_theta(
    context: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    site: usize,
    scale: f64,
) -> bool {
    let current = state.theta[site];
    let proposed = scale.mul_add(sample_standard_normal(rng), current);
    let proposed_log_likelihood = context.sites[site].log_likelihood(proposed);
    if !proposed_log_likelihood.is_finite() {
        return false;
    }
    let log_acceptance = proposed_log_likelihood - state.site_log_likelihood[site]
        + log_normal_kernel(proposed, state.mu, state.tau)
        - log_normal_kernel(current, state.mu, state.tau);
    let accepted = should_accept(log_acceptance, rng);
    if accepted {
        state.theta[site] = proposed;
        state.site_log_likelihood[site] = proposed_log_likelihood;
    }
    accepted
}

/// Conjugate normal draw of `mu` given the effects and `tau`.
fn update_mu(context: &SamplerContext<'_>, rng: &mut StdRng, state: &mut ChainState) {
    let tau_sq = state.tau * state.tau;
    let prior_precision = 1.0 / (context.prior.mu_prior_sd * context.prior.mu_prior_sd);
    let precision = usize_to_f64(state.theta.len()) / tau_sq + prior_precision;
    let mean = state.theta.iter().sum::<f64>() / tau_sq / precision;
    state.mu = sample_standard_normal(rng).mul_add(precision.sqrt().recip(), mean);
}

fn update_tau(
    context: &SamplerContext<'_>,
    rng: &mut StdRng,
    state: &mut ChainState,
    scale: f64,
) -> bool {
    let current = state.tau;
    let proposed = scale.mul_add(sample_standard_normal(rng), current.ln()).exp();
    if !(proposed > 0.0 && proposed.is_finite()) {
        return false;
    }
    let current_total = context.random_effects_log_density(&state.theta, state.mu, current)
        + context.prior.log_tau_density(current)
        + current.ln();
    let proposed_total = context.random_effects_log_density(&state.theta, state.mu, proposed)
        + context.prior.log_tau_density(proposed)
        + proposed.ln();
    let accepted = should_accept(proposed_total - current_total, rng);
    if accepted {
        state.tau = proposed;
    }
    accepted
}

fn adapt_proposal_scales(scales: &mut ProposalScales, window: &BlockCounts, tuning: ProposalTuning) {
    for (scale, stats) in scales.theta.iter_mut().zip(&window.theta) {
        *scale = adapt_scalar_scale(*scale, stats.acceptance_rate(), tuning);
    }
    scales.log_tau = adapt_scalar_scale(scales.log_tau, window.tau.acceptance_rate(), tuning);
}

fn adapt_scalar_scale(scale: f64, acceptance: f64, tuning: ProposalTuning) -> f64 {
    (scale * adaptation_factor(acceptance, tuning)).max(tuning.min_draw_scale)
}

fn adaptation_factor(acceptance: f64, tuning: ProposalTuning) -> f64 {
    if acceptance < tuning.acceptance_target_low {
        tuning.scale_decrease_factor
    } else if acceptance > tuning.acceptance_target_high {
        tuning.scale_increase_factor
    } else {
        1.0
    }
}

fn should_accept(log_acceptance: f64, rng: &mut StdRng) -> bool {
    log_acceptance >= 0.0 || rng.random::<f64>().ln() < log_acceptance
}

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
