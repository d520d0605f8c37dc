//! Reusable inference and MCMC utility types.

use thiserror::Error;

/// Errors for MCMC chain configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum InferenceError {
    #[error("chain length must be positive")]
    InvalidChainLength,
    #[error("burn-in ({burn_in}) must be smaller than chain length ({chain_length})")]
    InvalidBurnIn { burn_in: usize, chain_length: usize },
    #[error("sub-sample frequency must be positive")]
    InvalidSubSampleFrequency,
    #[error("alpha ({0}) must lie strictly between 0 and 1")]
    InvalidAlpha(f64),
}

/// MCMC schedule and credible-interval level for one meta-analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainConfig {
    /// Total number of sampler iterations, burn-in included.
    pub chain_length: usize,
    /// Iterations discarded before draws are retained.
    pub burn_in: usize,
    /// Keep every `sub_sample_frequency`-th draw after burn-in.
    pub sub_sample_frequency: usize,
    /// Credible intervals cover `1 - alpha` of the posterior mass.
    pub alpha: f64,
    /// RNG seed for reproducible chains.
    pub seed: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_length: 1_100_000,
            burn_in: 100_000,
            sub_sample_frequency: 100,
            alpha: 0.05,
            seed: 42,
        }
    }
}

impl ChainConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub fn validate(self) -> Result<(), InferenceError> {
        if self.chain_length == 0 {
            return Err(InferenceError::InvalidChainLength);
        }
        if self.burn_in >= self.chain_length {
            return Err(InferenceError::InvalidBurnIn {
                burn_in: self.burn_in,
                chain_length: self.chain_length,
            });
        }
        if self.sub_sample_frequency == 0 {
            return Err(InferenceError::InvalidSubSampleFrequency);
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(InferenceError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }

    /// Number of retained draws implied by this configuration.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        (self.chain_length - self.burn_in).div_ceil(self.sub_sample_frequency)
    }

    /// Whether iteration `iter` (0-based) produces a retained draw.
    #[must_use]
    pub const fn retains(self, iter: usize) -> bool {
        iter >= self.burn_in && (iter - self.burn_in).is_multiple_of(self.sub_sample_frequency)
    }

    /// Probability mass covered by credible intervals.
    #[must_use]
    pub fn credible_mass(self) -> f64 {
        1.0 - self.alpha
    }
}

/// Proposal counters for a single Metropolis-Hastings block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
