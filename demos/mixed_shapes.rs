use faer::Mat;
use random_effects_meta::{
    ChainConfig, EstimateTable, MetaAnalysisConfig, MetaAnalysisInput, PatientLevelData,
    compute_bayesian_meta_analysis, render_summary_table,
};

fn main() {
    let config = MetaAnalysisConfig {
        chain: ChainConfig {
            chain_length: 55_000,
            burn_in: 5_000,
            sub_sample_frequency: 10,
            ..ChainConfig::default()
        },
        ..MetaAnalysisConfig::default()
    };

    let skew = EstimateTable::from_columns(&[
        ("mu", &[0.21, 0.12, 0.30]),
        ("sigma", &[0.11, 0.09, 0.15]),
        ("alpha", &[1.5, -0.4, 2.0]),
    ]);
    let custom = EstimateTable::from_columns(&[
        ("mu", &[0.21, 0.12, 0.30]),
        ("sigma", &[0.11, 0.09, 0.15]),
        ("gamma", &[0.4, -0.2, 0.6]),
    ]);

    let points: Vec<f64> = (0..=40).map(|step| -1.0 + 0.05 * idx_to_f64(step)).collect();
    let labels = points.iter().map(|point| format!("{point:.2}")).collect();
    let centers = [(0.2, 0.12), (0.1, 0.08)];
    let grid = EstimateTable::new(
        labels,
        Mat::from_fn(centers.len(), points.len(), |row, col| {
            let (center, se) = centers[row];
            let z = (points[col] - center) / se;
            -0.5 * z * z
        }),
    );

    let patients: Vec<PatientLevelData> = (0..2)
        .map(|database| {
            let n = 60;
            PatientLevelData::new(
                (0..n).map(|row| i64::from(row % 2 == 0)).collect(),
                (0..n).map(|row| u8::from(row % 3 != 0)).collect(),
                (0..n)
                    .map(|row| 1.0 + idx_to_f64((row * 7 + database) % 13))
                    .collect(),
                (0..n).map(|row| if row % 4 < 2 { 1.0 } else { 0.0 }).collect(),
            )
        })
        .collect();

    let inputs: [MetaAnalysisInput; 4] =
        [skew.into(), custom.into(), grid.into(), patients.into()];
    for input in &inputs {
        match compute_bayesian_meta_analysis(input, &config) {
            Ok(report) => println!("{}", render_summary_table(&report.summary)),
            Err(err) => println!("analysis failed: {err}"),
        }
    }
}

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}
