//! # Models
//!
//! Evidence-synthesis models. Currently a Bayesian random-effects
//! meta-analysis over several per-database likelihood approximations.

pub mod meta;
