//! Analysis entrypoints and the mapping from raw sampler traces to the
//! posterior trace.

use faer::Mat;

use crate::inference::ChainConfig;
use crate::input::MetaAnalysisInput;

use super::adapters::{build_data_model, prepare_data_set};
use super::detect::detect_likelihood_type;
use super::diagnostics::{DiagnosticStage, Diagnostics};
use super::posterior::{PosteriorSummary, PosteriorTrace, summarize_trace};
use super::priors::{Prior, build_prior};
use super::sampler::{
    AcceptanceRates, DataModel, PosteriorSampler, RandomWalkSampler, SamplerOutput,
};
use super::types::{MetaAnalysisConfig, MetaAnalysisError, MetaAnalysisReport};

/// 1-based index of the first non-reserved sampler trace (`mu`).
pub const FIRST_PARAMETER_INDEX: usize = 3;

const EXPECTED_LEADING_NAMES: [&str; 2] = ["mu", "tau"];

/// Run a Bayesian random-effects meta-analysis with the bundled sampler.
///
/// # Errors
///
/// Returns `MetaAnalysisError` for invalid configuration, malformed input
/// structure, or sampler failure. Rows removed during cleaning are reported
/// in the returned diagnostics instead.
pub fn compute_bayesian_meta_analysis(
    input: &MetaAnalysisInput,
    config: &MetaAnalysisConfig,
) -> Result<MetaAnalysisReport, MetaAnalysisError> {
    let mut sampler = RandomWalkSampler::new(config.tuning);
    compute_bayesian_meta_analysis_with_sampler(input, config, &mut sampler)
}

/// Run a Bayesian random-effects meta-analysis with a caller-supplied sampler.
///
/// The sampler is not invoked when cleaning leaves no databases; the summary
/// is then marked missing and carries the detected likelihood type.
///
/// # Errors
///
/// Returns `MetaAnalysisError` for invalid configuration, malformed input
/// structure, or sampler failure.
pub fn compute_bayesian_meta_analysis_with_sampler<S: PosteriorSampler + ?Sized>(
    input: &MetaAnalysisInput,
    config: &MetaAnalysisConfig,
    sampler: &mut S,
) -> Result<MetaAnalysisReport, MetaAnalysisError> {
    config.validate()?;
    let mut diagnostics = Diagnostics::new();

    let likelihood_type = detect_likelihood_type(input)?;
    diagnostics.info(
        DiagnosticStage::Detection,
        format!(
            "detected {likelihood_type} likelihood for {} databases",
            input.database_count()
        ),
    );

    let data_set = prepare_data_set(input, likelihood_type, &mut diagnostics)?;
    if data_set.is_empty() {
        diagnostics.warn(
            DiagnosticStage::Summary,
            format!("no {likelihood_type} estimates left to synthesise; returning missing summary"),
        );
        return Ok(MetaAnalysisReport {
            summary: PosteriorSummary::missing(likelihood_type),
            diagnostics,
            acceptance_rates: None,
        });
    }

    let model = build_data_model(&data_set)?;
    let prior = build_prior(config.prior_sd)?;
    let (trace, acceptance_rates) =
        run_sampler(sampler, &model, &prior, &config.chain, &mut diagnostics)?;
    let estimate = summarize_trace(&trace, config.chain.alpha);

    Ok(MetaAnalysisReport {
        summary: PosteriorSummary {
            likelihood_type,
            estimate: Some(estimate),
            trace: Some(trace),
        },
        diagnostics,
        acceptance_rates,
    })
}

/// Invoke the sampler and shift its traces into a posterior trace.
///
/// Raw trace `i` (1-based, `i >= 3`) becomes trace column `i - 3` (0-based),
/// so `mu` lands in column 0 and `tau` in column 1.
///
/// # Errors
///
/// Returns `MetaAnalysisError` if the chain configuration is invalid, the
/// sampler fails, or its output is too short or ragged.
pub fn run_sampler<S: PosteriorSampler + ?Sized>(
    sampler: &mut S,
    model: &DataModel,
    prior: &Prior,
    chain: &ChainConfig,
    diagnostics: &mut Diagnostics,
) -> Result<(PosteriorTrace, Option<AcceptanceRates>), MetaAnalysisError> {
    chain.validate()?;
    let output = sampler.run_chain(model, prior, chain)?;
    let trace = trace_from_output(&output, diagnostics)?;
    Ok((trace, output.acceptance_rates()))
}

/// Copy raw traces `[3, N]` into posterior trace columns `[0, N - 3]`.
///
/// # Errors
///
/// Returns `MetaAnalysisError` if fewer than four traces are present, the
/// traces differ in length, or no draws were retained.
pub fn trace_from_output(
    output: &SamplerOutput,
    diagnostics: &mut Diagnostics,
) -> Result<PosteriorTrace, MetaAnalysisError> {
    let total = output.len();
    let minimum = FIRST_PARAMETER_INDEX + 1;
    if total < minimum {
        return Err(MetaAnalysisError::MalformedTrace {
            found: total,
            minimum,
        });
    }

    let columns = (FIRST_PARAMETER_INDEX..=total)
        .map(|index| {
            output
                .trace(index)
                .ok_or(MetaAnalysisError::MalformedTrace {
                    found: total,
                    minimum,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let draws = columns.first().map_or(0, |column| column.len());
    if draws == 0 {
        return Err(MetaAnalysisError::EmptyTrace);
    }
    for (offset, column) in columns.iter().enumerate() {
        if column.len() != draws {
            return Err(MetaAnalysisError::InconsistentTraceLength {
                index: FIRST_PARAMETER_INDEX + offset,
                found: column.len(),
                expected: draws,
            });
        }
    }

    let raw_names = output.parameter_names();
    for (offset, expected) in EXPECTED_LEADING_NAMES.iter().enumerate() {
        let index = FIRST_PARAMETER_INDEX + offset;
        if let Some(found) = raw_names.get(index - 1)
            && found != expected
        {
            diagnostics.warn(
                DiagnosticStage::Sampling,
                format!(
                    "sampler trace {index} is named `{found}`, expected `{expected}`; using position"
                ),
            );
        }
    }

    let names = raw_names[FIRST_PARAMETER_INDEX - 1..].to_vec();
    let matrix = Mat::from_fn(draws, columns.len(), |row, col| columns[col][row]);
    PosteriorTrace::new(names, matrix)
}
