//! Prior specifications and log-density helpers for the random-effects model.

use super::types::MetaAnalysisError;

/// Half-normal prior with a location and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfNormalPrior {
    pub location: f64,
    pub scale: f64,
}

impl HalfNormalPrior {
    /// # Errors
    ///
    /// Returns `MetaAnalysisError::InvalidPrior` if `scale` is not positive and finite.
    pub fn new(location: f64, scale: f64) -> Result<Self, MetaAnalysisError> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(MetaAnalysisError::InvalidPrior {
                name: "tau prior sd",
                value: scale,
            });
        }
        Ok(Self { location, scale })
    }

    /// Log-density up to an additive constant; `-inf` below the location.
    #[must_use]
    pub fn log_density(self, value: f64) -> f64 {
        if value < self.location {
            return f64::NEG_INFINITY;
        }
        let z = (value - self.location) / self.scale;
        -0.5 * z * z
    }
}

/// Priors on the population mean and heterogeneity scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    /// Standard deviation of the Normal(0, sd) prior on `mu`.
    pub mu_prior_sd: f64,
    pub tau_prior: HalfNormalPrior,
}

impl Prior {
    #[must_use]
    pub fn log_mu_density(self, mu: f64) -> f64 {
        let z = mu / self.mu_prior_sd;
        -0.5 * z * z
    }

    #[must_use]
    pub fn log_tau_density(self, tau: f64) -> f64 {
        self.tau_prior.log_density(tau)
    }
}

/// Build priors from `[mu prior sd, tau prior sd]`.
///
/// # Errors
///
/// Returns `MetaAnalysisError::InvalidPrior` if either scale is not positive and finite.
pub fn build_prior(prior_sd: [f64; 2]) -> Result<Prior, MetaAnalysisError> {
    let [mu_prior_sd, tau_prior_sd] = prior_sd;
    if !(mu_prior_sd > 0.0 && mu_prior_sd.is_finite()) {
        return Err(MetaAnalysisError::InvalidPrior {
            name: "mu prior sd",
            value: mu_prior_sd,
        });
    }
    Ok(Prior {
        mu_prior_sd,
        tau_prior: HalfNormalPrior::new(0.0, tau_prior_sd)?,
    })
}

/// Log-density of `Normal(mean, sd)` up to the `ln(2 pi) / 2` constant.
#[must_use]
pub fn log_normal_kernel(value: f64, mean: f64, sd: f64) -> f64 {
    if sd <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let z = (value - mean) / sd;
    -0.5 * z * z - sd.ln()
}
