//! Posterior traces and their summaries.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use faer::Mat;
use num_traits::ToPrimitive;

use super::types::{LikelihoodType, MetaAnalysisError};

/// Retained draws: column 0 is `mu`, column 1 is `tau`, later columns are
/// per-database effects kept for diagnostics.
#[derive(Debug, Clone)]
pub struct PosteriorTrace {
    names: Vec<String>,
    draws: Mat<f64>,
}

impl PosteriorTrace {
    /// # Errors
    ///
    /// Returns `MetaAnalysisError::MalformedTrace` if there are fewer than two
    /// columns or the names do not match the columns.
    pub fn new(names: Vec<String>, draws: Mat<f64>) -> Result<Self, MetaAnalysisError> {
        if draws.ncols() < 2 || names.len() != draws.ncols() {
            return Err(MetaAnalysisError::MalformedTrace {
                found: draws.ncols(),
                minimum: 2,
            });
        }
        Ok(Self { names, draws })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub const fn draws(&self) -> &Mat<f64> {
        &self.draws
    }

    /// Number of retained draws.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.draws.nrows()
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.draws.ncols()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Vec<f64> {
        (0..self.draws.nrows())
            .map(|row| self.draws[(row, index)])
            .collect()
    }

    #[must_use]
    pub fn mu_draws(&self) -> Vec<f64> {
        self.column(0)
    }

    #[must_use]
    pub fn tau_draws(&self) -> Vec<f64> {
        self.column(1)
    }
}

/// Point estimates and credible intervals for `mu` and `tau`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorEstimate {
    pub mu: f64,
    pub mu95_lb: f64,
    pub mu95_ub: f64,
    pub mu_se: f64,
    pub tau: f64,
    pub tau95_lb: f64,
    pub tau95_ub: f64,
}

/// Result of one meta-analysis.
///
/// `estimate` and `trace` are `None` when cleaning left no databases.
#[derive(Debug, Clone)]
pub struct PosteriorSummary {
    pub likelihood_type: LikelihoodType,
    pub estimate: Option<PosteriorEstimate>,
    pub trace: Option<PosteriorTrace>,
}

impl PosteriorSummary {
    #[must_use]
    pub const fn missing(likelihood_type: LikelihoodType) -> Self {
        Self {
            likelihood_type,
            estimate: None,
            trace: None,
        }
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.estimate.is_none()
    }

    #[must_use]
    pub fn mu(&self) -> Option<f64> {
        self.estimate.map(|estimate| estimate.mu)
    }

    #[must_use]
    pub fn tau(&self) -> Option<f64> {
        self.estimate.map(|estimate| estimate.tau)
    }
}

/// Summarise the `mu` and `tau` columns of a trace.
///
/// `mu` is the mean with a root-mean-square deviation as its standard error;
/// `tau` is the median. Both intervals are highest-density intervals holding
/// `1 - alpha` of the draws.
#[must_use]
pub fn summarize_trace(trace: &PosteriorTrace, alpha: f64) -> PosteriorEstimate {
    let mass = 1.0 - alpha;
    let mu_draws = trace.mu_draws();
    let tau_draws = trace.tau_draws();
    let (mu, mu_se) = mean_and_rms_deviation(&mu_draws);
    let (mu95_lb, mu95_ub) = hdi(&mu_draws, mass);
    let (tau95_lb, tau95_ub) = hdi(&tau_draws, mass);
    PosteriorEstimate {
        mu,
        mu95_lb,
        mu95_ub,
        mu_se,
        tau: median(&tau_draws),
        tau95_lb,
        tau95_ub,
    }
}

/// Mean and root-mean-square deviation about the mean (divisor `n`).
#[must_use]
pub fn mean_and_rms_deviation(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Narrowest interval `[sorted[i], sorted[i + gap]]` with
/// `gap = round(n * mass)` clamped to `[1, n - 1]`.
///
/// `n * mass` is rounded to the nearest integer, following the empirical HDI
/// of the `HDInterval` R package rather than `floor`; exact halves round up.
/// A fractional part of at least one half therefore widens the window by one
/// draw compared with `floor`. With 10,000 draws and `mass = 0.95` both rules
/// agree.
///
/// Ties in width resolve to the lowest interval.
#[must_use]
pub fn hdi(values: &[f64], mass: f64) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    match n {
        0 => return (f64::NAN, f64::NAN),
        1 => return (sorted[0], sorted[0]),
        _ => {}
    }
    let kept = (usize_to_f64(n) * mass.clamp(0.0, 1.0))
        .round()
        .to_usize()
        .unwrap_or(1)
        .clamp(1, n - 1);

    let mut best = 0;
    let mut best_width = f64::INFINITY;
    for start in 0..n - kept {
        let width = sorted[start + kept] - sorted[start];
        if width < best_width {
            best_width = width;
            best = start;
        }
    }
    (sorted[best], sorted[best + kept])
}

/// Median with linear interpolation between the two middle draws.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 0.5)
}

#[must_use]
fn percentile(sorted_values: &[f64], probability: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }

    let clamped = probability.clamp(0.0, 1.0);
    let last = sorted_values.len() - 1;
    let position = clamped * usize_to_f64(last);
    let lower = position.floor().to_usize().unwrap_or(0);
    let upper = position.ceil().to_usize().unwrap_or(last);

    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - usize_to_f64(lower);
        (1.0 - weight).mul_add(sorted_values[lower], weight * sorted_values[upper])
    }
}

/// Render the summary as a table with one row per parameter.
#[must_use]
pub fn render_summary_table(summary: &PosteriorSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["parameter", "estimate", "lower", "upper", "se"]
                .iter()
                .map(|h| Cell::new(*h))
                .collect::<Vec<_>>(),
        );

    let rows: [(&str, Option<[f64; 3]>, Option<f64>); 2] = match summary.estimate {
        Some(estimate) => [
            (
                "mu",
                Some([estimate.mu, estimate.mu95_lb, estimate.mu95_ub]),
                Some(estimate.mu_se),
            ),
            (
                "tau",
                Some([estimate.tau, estimate.tau95_lb, estimate.tau95_ub]),
                None,
            ),
        ],
        None => [("mu", None, None), ("tau", None, None)],
    };
    for (name, values, se) in rows {
        let mut cells = vec![Cell::new(name)];
        match values {
            Some(values) => cells.extend(values.iter().map(|value| Cell::new(format!("{value:.4}")))),
            None => cells.extend((0..3).map(|_| Cell::new("NA"))),
        }
        cells.push(Cell::new(se.map_or_else(|| "NA".to_string(), |value| format!("{value:.4}"))));
        table.add_row(cells);
    }

    format!("{} likelihood\n{table}", summary.likelihood_type)
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{RngExt, SeedableRng};

    use super::*;

    fn trace_from(mu: &[f64], tau: &[f64]) -> PosteriorTrace {
        let draws = Mat::from_fn(mu.len(), 3, |row, col| match col {
            0 => mu[row],
            1 => tau[row],
            _ => -99.0,
        });
        PosteriorTrace::new(
            vec!["mu".into(), "tau".into(), "theta[1]".into()],
            draws,
        )
        .expect("three columns")
    }

    #[test]
    fn trace_requires_mu_and_tau_columns() {
        let err = PosteriorTrace::new(vec!["mu".into()], Mat::from_fn(3, 1, |_i, _j| 0.0))
            .expect_err("one column should fail");
        assert!(matches!(
            err,
            MetaAnalysisError::MalformedTrace {
                found: 1,
                minimum: 2
            }
        ));
    }

    #[test]
    fn rms_deviation_uses_draw_count_divisor() {
        let (mean, rms) = mean_and_rms_deviation(&[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(mean, 2.5);
        assert_relative_eq!(rms, 1.25f64.sqrt(), epsilon = 1.0e-12);
    }

    #[test]
    fn median_interpolates_even_counts() {
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn hdi_picks_narrowest_window() {
        let values = [0.0, 0.1, 0.2, 0.3, 5.0, 10.0];
        // round(6 * 0.5) = 3, so windows span four draws.
        let (lower, upper) = hdi(&values, 0.5);
        assert_relative_eq!(lower, 0.0);
        assert_relative_eq!(upper, 0.3);
    }

    #[test]
    fn hdi_rounds_fractional_window_up() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 10.0];
        // 6 * 0.75 = 4.5 rounds to 5, so only the full range qualifies.
        assert_eq!(hdi(&values, 0.75), (0.0, 10.0));
        // 6 * 0.7 = 4.2 rounds to 4.
        assert_eq!(hdi(&values, 0.7), (0.0, 4.0));
    }

    #[test]
    fn hdi_of_single_draw_is_degenerate() {
        assert_eq!(hdi(&[0.4], 0.95), (0.4, 0.4));
        let (lower, upper) = hdi(&[], 0.95);
        assert!(lower.is_nan() && upper.is_nan());
    }

    #[test]
    fn hdi_is_narrower_than_equal_tailed_for_skewed_draws() {
        let mut rng = StdRng::seed_from_u64(9);
        let draws: Vec<f64> = (0..5_000)
            .map(|_| -(1.0 - rng.random::<f64>()).ln())
            .collect();
        let (lower, upper) = hdi(&draws, 0.95);
        let mut sorted = draws.clone();
        sorted.sort_by(f64::total_cmp);
        let equal_tailed = percentile(&sorted, 0.975) - percentile(&sorted, 0.025);
        assert!(upper - lower < equal_tailed);
        assert!(lower < 0.01);
    }

    #[test]
    fn summary_ignores_auxiliary_columns() {
        let mu = [0.1, 0.2, 0.3, 0.4, 0.5];
        let tau = [0.05, 0.1, 0.2, 0.15, 0.3];
        let estimate = summarize_trace(&trace_from(&mu, &tau), 0.05);
        assert_relative_eq!(estimate.mu, 0.3, epsilon = 1.0e-12);
        assert_relative_eq!(estimate.mu_se, 0.02f64.sqrt(), epsilon = 1.0e-12);
        assert_relative_eq!(estimate.tau, 0.15);
        assert!(estimate.mu95_lb <= estimate.mu && estimate.mu <= estimate.mu95_ub);
        assert!(estimate.tau95_lb <= estimate.tau && estimate.tau <= estimate.tau95_ub);
    }

    #[test]
    fn render_marks_missing_values() {
        let rendered = render_summary_table(&PosteriorSummary::missing(LikelihoodType::Normal));
        assert!(rendered.starts_with("normal likelihood"));
        assert!(rendered.contains("NA"));
        assert!(rendered.contains("tau"));
    }

    #[test]
    fn render_shows_estimates() {
        let estimate = summarize_trace(&trace_from(&[0.1, 0.2, 0.3], &[0.1, 0.2, 0.3]), 0.05);
        let summary = PosteriorSummary {
            likelihood_type: LikelihoodType::Grid,
            estimate: Some(estimate),
            trace: None,
        };
        let rendered = render_summary_table(&summary);
        assert!(rendered.contains("0.2000"));
        assert!(summary.mu().is_some());
    }
}
