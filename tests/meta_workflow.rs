use faer::Mat;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use random_effects_meta::{
    ChainConfig, EstimateTable, LikelihoodType, MetaAnalysisConfig, MetaAnalysisInput,
    PatientLevelData, compute_bayesian_meta_analysis, render_summary_table,
};

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}

fn short_config(seed: u64) -> MetaAnalysisConfig {
    MetaAnalysisConfig {
        chain: ChainConfig {
            chain_length: 22_000,
            burn_in: 2_000,
            sub_sample_frequency: 10,
            alpha: 0.05,
            seed,
        },
        ..MetaAnalysisConfig::default()
    }
}

fn grid_table(centers: &[(f64, f64)]) -> EstimateTable {
    let points: Vec<f64> = (0..=80).map(|step| -2.0 + 0.05 * idx_to_f64(step)).collect();
    let labels = points.iter().map(|point| format!("{point:.2}")).collect();
    let values = Mat::from_fn(centers.len(), points.len(), |row, col| {
        let (center, se) = centers[row];
        let z = (points[col] - center) / se;
        -0.5 * z * z
    });
    EstimateTable::new(labels, values)
}

fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    (-2.0_f64 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Exponential survival with hazard ratio `exp(log_hr)` for exposed subjects
/// and administrative censoring at `censor_at`.
fn simulate_database(rng: &mut StdRng, subjects: usize, strata: i64, log_hr: f64) -> PatientLevelData {
    let censor_at = 2.0;
    let mut data = PatientLevelData::default();
    for subject in 0..subjects {
        let exposed = if subject % 2 == 0 { 1.0 } else { 0.0 };
        let rate = (log_hr * exposed).exp();
        let event_time = -(1.0 - rng.random::<f64>()).ln() / rate;
        let stratum = i64::try_from(subject).unwrap_or(0) % strata;
        data.stratum_id.push(stratum);
        data.x.push(exposed);
        if event_time < censor_at {
            data.y.push(1);
            data.time.push(event_time);
        } else {
            data.y.push(0);
            data.time.push(censor_at);
        }
    }
    data
}

#[test]
fn homogeneous_normal_estimates_pool_to_their_average() {
    let table = EstimateTable::from_columns(&[
        ("logRr", &[0.1, -0.05, 0.2]),
        ("seLogRr", &[0.1, 0.1, 0.1]),
    ]);
    let report = compute_bayesian_meta_analysis(&table.into(), &short_config(123))
        .expect("analysis should succeed");

    let summary = &report.summary;
    assert_eq!(summary.likelihood_type, LikelihoodType::Normal);
    let estimate = summary.estimate.expect("estimate present");
    let average = (0.1 - 0.05 + 0.2) / 3.0;
    assert!((estimate.mu - average).abs() < 0.1, "mu {}", estimate.mu);
    assert!(estimate.tau < 0.35, "tau {}", estimate.tau);
    assert!(estimate.mu95_lb <= estimate.mu && estimate.mu <= estimate.mu95_ub);
    assert!(estimate.tau95_lb <= estimate.tau && estimate.tau <= estimate.tau95_ub);
    assert!(estimate.tau95_lb >= 0.0);
    assert!(estimate.mu_se > 0.0);

    let trace = summary.trace.as_ref().expect("trace present");
    assert_eq!(trace.nrows(), 2_000);
    assert_eq!(trace.ncols(), 5);
    assert_eq!(trace.names()[..2], ["mu".to_string(), "tau".to_string()]);

    let rates = report.acceptance_rates.expect("bundled sampler reports rates");
    assert!(rates.theta > 0.05 && rates.tau > 0.05);
    assert!(report.diagnostics.warnings().next().is_none());
}

#[test]
fn infinite_standard_error_row_is_dropped_before_pooling() {
    let table = EstimateTable::from_columns(&[
        ("logRr", &[0.3, 5.0, 0.25]),
        ("seLogRr", &[0.1, f64::INFINITY, 0.1]),
    ]);
    let report = compute_bayesian_meta_analysis(&table.into(), &short_config(5))
        .expect("analysis should succeed");

    let removals: Vec<_> = report.diagnostics.removals_for("seLogRr").collect();
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].removed_rows, 1);
    let trace = report.summary.trace.as_ref().expect("trace present");
    assert_eq!(trace.ncols(), 4);
    let mu = report.summary.mu().expect("mu present");
    assert!((mu - 0.275).abs() < 0.15, "mu {mu}");
}

#[test]
fn all_missing_standard_errors_yield_missing_summary() {
    let table = EstimateTable::from_columns(&[
        ("logRr", &[0.1, 0.2]),
        ("seLogRr", &[f64::NAN, f64::NAN]),
    ]);
    let report = compute_bayesian_meta_analysis(&table.into(), &MetaAnalysisConfig::default())
        .expect("empty data is not an error");

    assert!(report.summary.is_missing());
    assert_eq!(report.summary.likelihood_type.label(), "normal");
    assert!(report.acceptance_rates.is_none());
    assert!(
        report
            .diagnostics
            .warnings()
            .any(|entry| entry.message.contains("returning missing summary"))
    );
    let rendered = render_summary_table(&report.summary);
    assert!(rendered.contains("NA"));
}

#[test]
fn grid_likelihoods_recover_shared_effect() {
    let table = grid_table(&[(0.3, 0.15), (0.35, 0.2)]);
    let report = compute_bayesian_meta_analysis(&table.into(), &short_config(17))
        .expect("grid analysis should succeed");

    assert_eq!(report.summary.likelihood_type, LikelihoodType::Grid);
    let mu = report.summary.mu().expect("mu present");
    assert!((mu - 0.32).abs() < 0.2, "mu {mu}");
}

#[test]
fn skew_normal_and_custom_inputs_run_end_to_end() {
    let skew = EstimateTable::from_columns(&[
        ("mu", &[0.2, 0.15, 0.25]),
        ("sigma", &[0.1, 0.12, 0.1]),
        ("alpha", &[0.0, 0.0, 0.0]),
    ]);
    let report = compute_bayesian_meta_analysis(&skew.into(), &short_config(21))
        .expect("skew-normal analysis should succeed");
    assert_eq!(report.summary.likelihood_type, LikelihoodType::SkewNormal);
    let mu = report.summary.mu().expect("mu present");
    assert!((mu - 0.2).abs() < 0.15, "skew normal mu {mu}");

    let custom = EstimateTable::from_columns(&[
        ("mu", &[0.2, 0.15, 0.25]),
        ("sigma", &[0.1, 0.12, 0.1]),
        ("gamma", &[0.0, 0.0, 0.0]),
    ]);
    let report = compute_bayesian_meta_analysis(&custom.into(), &short_config(22))
        .expect("custom analysis should succeed");
    assert_eq!(report.summary.likelihood_type, LikelihoodType::CustomParametric);
    let mu = report.summary.mu().expect("mu present");
    assert!((mu - 0.2).abs() < 0.15, "custom mu {mu}");
}

#[test]
fn patient_level_databases_are_pooled() {
    let mut rng = StdRng::seed_from_u64(2024);
    let true_log_hr = 0.7;
    let databases: Vec<PatientLevelData> = (0..2)
        .map(|_| simulate_database(&mut rng, 300, 3, true_log_hr))
        .collect();
    let config = MetaAnalysisConfig {
        chain: ChainConfig {
            chain_length: 6_000,
            burn_in: 1_000,
            sub_sample_frequency: 5,
            alpha: 0.05,
            seed: 8,
        },
        ..MetaAnalysisConfig::default()
    };
    let input = MetaAnalysisInput::from(databases);
    let report = compute_bayesian_meta_analysis(&input, &config)
        .expect("patient-level analysis should succeed");

    assert_eq!(report.summary.likelihood_type, LikelihoodType::PatientLevel);
    let mu = report.summary.mu().expect("mu present");
    assert!((mu - true_log_hr).abs() < 0.4, "mu {mu}");
    let rendered = render_summary_table(&report.summary);
    assert!(rendered.starts_with("pooled likelihood"));
}

#[test]
fn longer_chains_stabilise_interval_widths() {
    let mut rng = StdRng::seed_from_u64(77);
    let log_rr: Vec<f64> = (0..6)
        .map(|_| 0.05f64.mul_add(sample_standard_normal(&mut rng), 0.2))
        .collect();
    let se = vec![0.08; 6];
    let table = EstimateTable::from_columns(&[("logRr", log_rr.as_slice()), ("seLogRr", se.as_slice())]);
    let input = MetaAnalysisInput::from(table);

    let width = |chain_length: usize, seed: u64| {
        let config = MetaAnalysisConfig {
            chain: ChainConfig {
                chain_length,
                burn_in: 2_000,
                sub_sample_frequency: 10,
                alpha: 0.05,
                seed,
            },
            ..MetaAnalysisConfig::default()
        };
        let estimate = compute_bayesian_meta_analysis(&input, &config)
            .expect("analysis should succeed")
            .summary
            .estimate
            .expect("estimate present");
        estimate.mu95_ub - estimate.mu95_lb
    };
    let spread = |chain_length: usize| {
        let widths: Vec<f64> = (1..=6).map(|seed| width(chain_length, seed)).collect();
        assert!(widths.iter().all(|value| value.is_finite() && *value > 0.0));
        let max = widths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = widths.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    };

    // 100 retained draws per seed against 4,000.
    let short = spread(3_000);
    let long = spread(42_000);
    assert!(long < short, "short-chain spread {short}, long-chain spread {long}");
}
