//! Per-database log-likelihoods of the database-specific effect `theta`.
//!
//! Additive constants are dropped; only differences in `theta` matter to the
//! sampler.

use std::cmp::Ordering;

use statrs::function::erf::erfc;

use crate::input::PatientLevelData;

/// Log-density of the standard normal, without the normalising constant.
#[must_use]
pub fn log_standard_normal_kernel(value: f64) -> f64 {
    -0.5 * value * value
}

/// Log-CDF of the standard normal, floored at the smallest positive double.
#[must_use]
pub fn log_standard_normal_cdf(value: f64) -> f64 {
    let cdf = 0.5 * erfc(-value / std::f64::consts::SQRT_2);
    cdf.max(f64::MIN_POSITIVE).ln()
}

/// Normal approximation with mean `mean` and standard error `se`.
#[must_use]
pub fn normal_log_likelihood(theta: f64, mean: f64, se: f64) -> f64 {
    log_standard_normal_kernel((theta - mean) / se)
}

/// Skew-normal approximation with location `mu`, scale `sigma`, and shape `alpha`.
#[must_use]
pub fn skew_normal_log_likelihood(theta: f64, mu: f64, sigma: f64, alpha: f64) -> f64 {
    let z = (theta - mu) / sigma;
    log_standard_normal_kernel(z) + log_standard_normal_cdf(alpha * z)
}

/// Custom parametric approximation: a quadratic in `theta - mu` whose
/// curvature is tilted by `exp(gamma (theta - mu))`.
#[must_use]
pub fn custom_log_likelihood(theta: f64, mu: f64, sigma: f64, gamma: f64) -> f64 {
    let centered = theta - mu;
    if centered == 0.0 {
        return 0.0;
    }
    -(centered * centered) / (2.0 * sigma * sigma) * (gamma * centered).exp()
}

/// Log-likelihood values tabulated over sorted support points.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLikelihood {
    points: Vec<f64>,
    values: Vec<f64>,
}

impl GridLikelihood {
    /// Pair support points with values and sort by support point.
    ///
    /// Pairs whose value is not finite are dropped so interpolation stays finite.
    #[must_use]
    pub fn new(points: &[f64], values: &[f64]) -> Self {
        let mut pairs: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .zip(values.iter().copied())
            .filter(|(_, value)| value.is_finite())
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (points, values) = pairs.into_iter().unzip();
        Self { points, values }
    }

    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Linear interpolation inside the grid, linear extrapolation from the
    /// outermost segment outside it.
    #[must_use]
    pub fn log_likelihood(&self, theta: f64) -> f64 {
        match self.points.len() {
            0 => 0.0,
            1 => self.values[0],
            n => {
                let upper = self
                    .points
                    .partition_point(|point| *point < theta)
                    .clamp(1, n - 1);
                let lower = upper - 1;
                let span = self.points[upper] - self.points[lower];
                if span <= 0.0 {
                    return self.values[lower];
                }
                let weight = (theta - self.points[lower]) / span;
                weight.mul_add(self.values[upper] - self.values[lower], self.values[lower])
            }
        }
    }
}

/// Stratified Cox partial likelihood (Breslow ties) for one database.
#[derive(Debug, Clone, PartialEq)]
pub struct CoxPartialLikelihood {
    strata: Vec<Vec<TimeGroup>>,
}

/// Records sharing one time point within a stratum.
#[derive(Debug, Clone, PartialEq)]
struct TimeGroup {
    covariates: Vec<f64>,
    event_covariates: Vec<f64>,
}

impl CoxPartialLikelihood {
    /// Group records by stratum, then by time in descending order.
    #[must_use]
    pub fn new(data: &PatientLevelData) -> Self {
        let mut order: Vec<usize> = (0..data.len()).collect();
        order.sort_by(|&a, &b| {
            data.stratum_id[a]
                .cmp(&data.stratum_id[b])
                .then_with(|| data.time[b].partial_cmp(&data.time[a]).unwrap_or(Ordering::Equal))
        });

        let mut strata: Vec<Vec<TimeGroup>> = Vec::new();
        let mut previous: Option<(i64, f64)> = None;
        for row in order {
            let key = (data.stratum_id[row], data.time[row]);
            match previous {
                Some((stratum, _)) if stratum != key.0 => strata.push(Vec::new()),
                None => strata.push(Vec::new()),
                _ => {}
            }
            let Some(groups) = strata.last_mut() else {
                continue;
            };
            let same_time = previous.is_some_and(|prev| prev == key);
            if !same_time || groups.is_empty() {
                groups.push(TimeGroup {
                    covariates: Vec::new(),
                    event_covariates: Vec::new(),
                });
            }
            if let Some(group) = groups.last_mut() {
                group.covariates.push(data.x[row]);
                if data.y[row] == 1 {
                    group.event_covariates.push(data.x[row]);
                }
            }
            previous = Some(key);
        }

        Self { strata }
    }

    #[must_use]
    pub fn stratum_count(&self) -> usize {
        self.strata.len()
    }

    /// Partial log-likelihood at log hazard ratio `theta`.
    #[must_use]
    pub fn log_likelihood(&self, theta: f64) -> f64 {
        let mut total = 0.0;
        for groups in &self.strata {
            let mut risk_sum = 0.0;
            for group in groups {
                risk_sum += group
                    .covariates
                    .iter()
                    .map(|x| (theta * x).exp())
                    .sum::<f64>();
                if group.event_covariates.is_empty() {
                    continue;
                }
                let log_risk = risk_sum.ln();
                for x in &group.event_covariates {
                    total += theta.mul_add(*x, -log_risk);
                }
            }
        }
        total
    }
}

/// Likelihood contribution of one database.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteLikelihood {
    Normal { mean: f64, se: f64 },
    SkewNormal { mu: f64, sigma: f64, alpha: f64 },
    CustomParametric { mu: f64, sigma: f64, gamma: f64 },
    Grid(GridLikelihood),
    PatientLevel(CoxPartialLikelihood),
}

impl SiteLikelihood {
    #[must_use]
    pub fn log_likelihood(&self, theta: f64) -> f64 {
        match self {
            Self::Normal { mean, se } => normal_log_likelihood(theta, *mean, *se),
            Self::SkewNormal { mu, sigma, alpha } => {
                skew_normal_log_likelihood(theta, *mu, *sigma, *alpha)
            }
            Self::CustomParametric { mu, sigma, gamma } => {
                custom_log_likelihood(theta, *mu, *sigma, *gamma)
            }
            Self::Grid(grid) => grid.log_likelihood(theta),
            Self::PatientLevel(cox) => cox.log_likelihood(theta),
        }
    }

    /// Rough location of the likelihood maximum, used to start the chain.
    #[must_use]
    pub fn starting_point(&self) -> f64 {
        match self {
            Self::Normal { mean, .. } => *mean,
            Self::SkewNormal { mu, .. } | Self::CustomParametric { mu, .. } => *mu,
            Self::Grid(grid) => grid
                .points()
                .iter()
                .zip(grid.values())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map_or(0.0, |(point, _)| *point),
            Self::PatientLevel(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn normal_likelihood_peaks_at_mean() {
        let at_mean = normal_log_likelihood(0.2, 0.2, 0.1);
        assert_relative_eq!(at_mean, 0.0);
        assert_relative_eq!(normal_log_likelihood(0.3, 0.2, 0.1), -0.5, epsilon = 1.0e-12);
    }

    #[test]
    fn skew_normal_reduces_to_normal_at_zero_alpha() {
        let skew = skew_normal_log_likelihood(0.7, 0.2, 0.4, 0.0);
        let normal = normal_log_likelihood(0.7, 0.2, 0.4) + 0.5f64.ln();
        assert_relative_eq!(skew, normal, epsilon = 1.0e-12);
    }

    #[test]
    fn skew_normal_tail_stays_finite() {
        let ll = skew_normal_log_likelihood(-5.0, 0.0, 0.1, 50.0);
        assert!(ll.is_finite());
    }

    #[test]
    fn custom_likelihood_is_tilted_quadratic() {
        assert_relative_eq!(custom_log_likelihood(1.0, 1.0, 0.5, 2.0), 0.0);
        let symmetric_left = custom_log_likelihood(0.5, 1.0, 0.5, 0.0);
        let symmetric_right = custom_log_likelihood(1.5, 1.0, 0.5, 0.0);
        assert_relative_eq!(symmetric_left, symmetric_right, epsilon = 1.0e-12);
        assert!(custom_log_likelihood(1.5, 1.0, 0.5, 1.0) < symmetric_right);
    }

    #[test]
    fn grid_interpolates_and_extrapolates_linearly() {
        let grid = GridLikelihood::new(&[1.0, -1.0, 0.0], &[-2.0, -2.0, 0.0]);
        assert_eq!(grid.points(), &[-1.0, 0.0, 1.0]);
        assert_relative_eq!(grid.log_likelihood(0.0), 0.0);
        assert_relative_eq!(grid.log_likelihood(0.5), -1.0);
        assert_relative_eq!(grid.log_likelihood(-0.25), -0.5);
        assert_relative_eq!(grid.log_likelihood(2.0), -4.0);
        assert_relative_eq!(grid.log_likelihood(-3.0), -6.0);
    }

    #[test]
    fn grid_drops_non_finite_values() {
        let grid = GridLikelihood::new(&[0.0, 1.0, 2.0], &[0.0, f64::NEG_INFINITY, -1.0]);
        assert_eq!(grid.points(), &[0.0, 2.0]);
        assert_relative_eq!(grid.log_likelihood(1.0), -0.5);
    }

    #[test]
    fn cox_matches_hand_computed_value() {
        // One stratum: times 3 (event, x=1), 2 (censored, x=0), 1 (event, x=0).
        let data = PatientLevelData::new(
            vec![1, 1, 1],
            vec![1, 0, 1],
            vec![3.0, 2.0, 1.0],
            vec![1.0, 0.0, 0.0],
        );
        let cox = CoxPartialLikelihood::new(&data);
        let theta = 0.4_f64;
        // Event at t=3: risk set {x=1}; event at t=1: risk set {all}.
        let expected = (theta - theta.exp().ln()) + (0.0 - (theta.exp() + 2.0).ln());
        assert_relative_eq!(cox.log_likelihood(theta), expected, epsilon = 1.0e-12);
    }

    #[test]
    fn cox_separates_strata_and_handles_ties() {
        let data = PatientLevelData::new(
            vec![2, 1, 2, 1],
            vec![1, 1, 1, 0],
            vec![1.0, 1.0, 1.0, 1.0],
            vec![1.0, 0.0, 0.0, 1.0],
        );
        let cox = CoxPartialLikelihood::new(&data);
        assert_eq!(cox.stratum_count(), 2);
        let theta = -0.3_f64;
        let risk = theta.exp() + 1.0;
        // Stratum 1: one event with x=0; stratum 2: two tied events with x=1 and x=0.
        let expected = -risk.ln() + (theta - risk.ln()) - risk.ln();
        assert_relative_eq!(cox.log_likelihood(theta), expected, epsilon = 1.0e-12);
    }

    #[test]
    fn starting_point_uses_grid_maximum() {
        let site = SiteLikelihood::Grid(GridLikelihood::new(&[-1.0, 0.5, 1.0], &[-3.0, -0.1, -2.0]));
        assert_relative_eq!(site.starting_point(), 0.5);
    }
}
