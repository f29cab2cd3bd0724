use std::collections::BTreeSet;

use log::{debug, info};
use serde::Serialize;
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};

use crate::error::{PipelineError, Result};
use crate::features::{FeatureMatrix, Samples};

type Model = LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Logistic regression over the encoded stroke features, default smartcore
/// parameters (no penalty, L-BFGS).
pub struct StrokeClassifier {
    model: Model,
    features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
    pub feature: String,
    pub weight: f64,
}

impl StrokeClassifier {
    pub fn fit(samples: &Samples) -> Result<Self> {
        if samples.is_empty() {
            return Err(PipelineError::EmptyInput {
                what: "training set",
            });
        }
        let classes: BTreeSet<i32> = samples.y().iter().copied().collect();
        if classes.len() < 2 {
            return Err(PipelineError::SingleClass {
                class: samples.y()[0],
            });
        }

        info!(
            "fitting logistic regression on {} rows x {} features",
            samples.len(),
            samples.x().ncols()
        );
        let x = samples.x().to_dense();
        let y = samples.y().to_vec();
        let model = LogisticRegression::fit(&x, &y, LogisticRegressionParameters::default())?;

        Ok(Self {
            model,
            features: samples.x().columns().to_vec(),
        })
    }

    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<i32>> {
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let predictions = self.model.predict(&x.to_dense())?;
        debug!("predicted {} rows", predictions.len());
        Ok(predictions)
    }

    /// Weight per feature, in feature order.
    pub fn coefficients(&self) -> Vec<(String, f64)> {
        let coef = self.model.coefficients();
        let (rows, cols) = coef.shape();
        if rows * cols != self.features.len() {
            return Vec::new();
        }
        self.features
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let w = if rows == 1 { *coef.get((0, j)) } else { *coef.get((j, 0)) };
                (name.clone(), w)
            })
            .collect()
    }

    pub fn intercept(&self) -> f64 {
        *self.model.intercept().get((0, 0))
    }

    /// The `n` features with the largest absolute weight.
    pub fn top_drivers(&self, n: usize) -> Vec<Driver> {
        let mut coefs = self.coefficients();
        coefs.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        coefs
            .into_iter()
            .take(n)
            .map(|(feature, weight)| Driver { feature, weight })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mostly_separable() -> Samples {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let t = f64::from(i) / 10.0;
            rows.push(vec![-1.0 - t, (t * 7.0).sin()]);
            labels.push(0);
            rows.push(vec![1.0 + t, (t * 5.0).cos()]);
            labels.push(1);
        }
        // a little overlap keeps the optimum finite
        rows.push(vec![0.8, 0.0]);
        labels.push(0);
        rows.push(vec![-0.8, 0.0]);
        labels.push(1);
        let x = FeatureMatrix::new(vec!["signal".into(), "noise".into()], rows).unwrap();
        Samples::new(x, labels).unwrap()
    }

    #[test]
    fn learns_a_mostly_separable_problem() {
        let samples = mostly_separable();
        let clf = StrokeClassifier::fit(&samples).unwrap();
        let predictions = clf.predict(samples.x()).unwrap();
        let correct = predictions
            .iter()
            .zip(samples.y())
            .filter(|(p, t)| p == t)
            .count();
        assert!(correct >= samples.len() - 4, "only {correct} correct");

        let drivers = clf.top_drivers(1);
        assert_eq!(drivers[0].feature, "signal");
        assert!(drivers[0].weight > 0.0);
        assert_eq!(clf.coefficients().len(), 2);
    }

    #[test]
    fn single_class_is_rejected() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0], vec![2.0]]).unwrap();
        let samples = Samples::new(x, vec![0, 0]).unwrap();
        assert!(matches!(
            StrokeClassifier::fit(&samples),
            Err(PipelineError::SingleClass { class: 0 })
        ));
    }

    #[test]
    fn empty_prediction_input() {
        let clf = StrokeClassifier::fit(&mostly_separable()).unwrap();
        let empty = FeatureMatrix::new(vec!["signal".into(), "noise".into()], Vec::new()).unwrap();
        assert!(clf.predict(&empty).unwrap().is_empty());
    }
}
