use random_effects_meta::{
    ChainConfig, EstimateTable, MetaAnalysisConfig, compute_bayesian_meta_analysis,
    render_summary_table,
};

fn main() {
    let table = EstimateTable::from_columns(&[
        ("logRr", &[0.10, -0.05, 0.20, 0.08]),
        ("seLogRr", &[0.10, 0.10, 0.10, f64::INFINITY]),
    ]);
    let config = MetaAnalysisConfig {
        chain: ChainConfig {
            chain_length: 110_000,
            burn_in: 10_000,
            sub_sample_frequency: 10,
            ..ChainConfig::default()
        },
        ..MetaAnalysisConfig::default()
    };

    let report = compute_bayesian_meta_analysis(&table.into(), &config).expect("analysis");
    println!("{}", render_summary_table(&report.summary));
    for entry in report.diagnostics.entries() {
        println!("[{}] {}", entry.stage, entry.message);
    }
    if let Some(rates) = report.acceptance_rates {
        println!("acceptance: theta {:.2}, tau {:.2}", rates.theta, rates.tau);
    }
}
