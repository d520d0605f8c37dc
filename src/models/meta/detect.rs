//! Structural classification of meta-analysis inputs.

use crate::input::MetaAnalysisInput;

use super::types::{LikelihoodType, MetaAnalysisError};

/// Classify an input into exactly one likelihood representation.
///
/// Precedence, first match wins:
/// 1. a `logRr` column: [`LikelihoodType::Normal`]
/// 2. a `gamma` column: [`LikelihoodType::CustomParametric`]
/// 3. an `alpha` column: [`LikelihoodType::SkewNormal`]
/// 4. a patient-level collection: [`LikelihoodType::PatientLevel`]
/// 5. anything else: [`LikelihoodType::Grid`], whose labels must all be numeric
///
/// # Errors
///
/// Returns `MetaAnalysisError::MalformedGrid` if the input falls through to
/// the grid case and any column label does not parse as a number.
pub fn detect_likelihood_type(input: &MetaAnalysisInput) -> Result<LikelihoodType, MetaAnalysisError> {
    let table = match input {
        MetaAnalysisInput::PatientLevel(_) => return Ok(LikelihoodType::PatientLevel),
        MetaAnalysisInput::Table(table) => table,
    };
    if table.has_column("logRr") {
        return Ok(LikelihoodType::Normal);
    }
    if table.has_column("gamma") {
        return Ok(LikelihoodType::CustomParametric);
    }
    if table.has_column("alpha") {
        return Ok(LikelihoodType::SkewNormal);
    }
    parse_support_points(&table.labels)?;
    Ok(LikelihoodType::Grid)
}

/// Parse grid column labels into support points, preserving label order.
///
/// # Errors
///
/// Returns `MetaAnalysisError::MalformedGrid` naming the first label that is
/// not a finite number.
pub fn parse_support_points(labels: &[String]) -> Result<Vec<f64>, MetaAnalysisError> {
    labels
        .iter()
        .enumerate()
        .map(|(column, label)| {
            label
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|point| point.is_finite())
                .ok_or_else(|| MetaAnalysisError::MalformedGrid {
                    label: label.clone(),
                    column,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use faer::Mat;

    use super::*;
    use crate::input::{EstimateTable, PatientLevelData};

    fn table_with(labels: &[&str]) -> MetaAnalysisInput {
        let labels: Vec<String> = labels.iter().map(|label| (*label).to_string()).collect();
        let values = Mat::from_fn(2, labels.len(), |_i, _j| 0.5);
        MetaAnalysisInput::Table(EstimateTable::new(labels, values))
    }

    #[test]
    fn detects_each_tabular_shape() {
        let cases = [
            (&["logRr", "seLogRr"][..], LikelihoodType::Normal),
            (&["mu", "sigma", "gamma"][..], LikelihoodType::CustomParametric),
            (&["mu", "sigma", "alpha"][..], LikelihoodType::SkewNormal),
            (&["-1", "0", "1"][..], LikelihoodType::Grid),
        ];
        for (labels, expected) in cases {
            let detected = detect_likelihood_type(&table_with(labels)).expect("shape is valid");
            assert_eq!(detected, expected);
        }
    }

    #[test]
    fn first_matching_clause_wins() {
        let detected = detect_likelihood_type(&table_with(&["alpha", "gamma", "logRr", "seLogRr"]))
            .expect("shape is valid");
        assert_eq!(detected, LikelihoodType::Normal);
        let detected =
            detect_likelihood_type(&table_with(&["mu", "sigma", "alpha", "gamma"])).expect("valid");
        assert_eq!(detected, LikelihoodType::CustomParametric);
    }

    #[test]
    fn detects_patient_level_collections() {
        let input = MetaAnalysisInput::PatientLevel(vec![PatientLevelData::default()]);
        assert_eq!(
            detect_likelihood_type(&input).expect("patient level is valid"),
            LikelihoodType::PatientLevel
        );
    }

    #[test]
    fn non_numeric_grid_label_is_fatal() {
        let err = detect_likelihood_type(&table_with(&["-1", "0", "abc"]))
            .expect_err("non-numeric label should fail");
        assert!(matches!(
            err,
            MetaAnalysisError::MalformedGrid { ref label, column: 2 } if label == "abc"
        ));
    }

    #[test]
    fn support_points_keep_label_order() {
        let labels = vec!["0.5".to_string(), " -2 ".to_string(), "1e-1".to_string()];
        let points = parse_support_points(&labels).expect("labels are numeric");
        assert_eq!(points, vec![0.5, -2.0, 0.1]);
    }

    #[test]
    fn non_finite_labels_are_rejected() {
        let labels = vec!["0".to_string(), "inf".to_string()];
        assert!(parse_support_points(&labels).is_err());
    }
}
