//! Feature construction: scaling, age banding, the age/glucose interaction
//! and one-hot encoding of the nominal columns.

use std::collections::BTreeSet;

use log::{debug, info};
use polars::prelude::*;
use serde::Serialize;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{PipelineError, Result};
use crate::records::{Dataset, NOMINAL_COLUMNS, NUMERIC_COLUMNS};

pub const AGE_GROUP_COLUMN: &str = "age_group";
pub const INTERACTION_COLUMN: &str = "age_glucose";

/// Named numeric columns over row-major values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let expected = columns.len();
        if let Some((row, found)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != expected)
        {
            return Err(PipelineError::RaggedRow {
                row,
                expected,
                found,
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Row-major dense matrix for smartcore estimators.
    pub fn to_dense(&self) -> DenseMatrix<f64> {
        let flat: Vec<f64> = self.rows.iter().flatten().copied().collect();
        DenseMatrix::new(self.nrows(), self.ncols(), flat, false)
    }

    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let series: Vec<Series> = self
            .columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values: Vec<f64> = self.rows.iter().map(|r| r[j]).collect();
                Series::new(name, values)
            })
            .collect();
        DataFrame::new(series)
    }
}

/// Feature rows paired with their labels. Construction fails unless both
/// sides have the same number of rows, and every operation keeps them
/// aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    x: FeatureMatrix,
    y: Vec<i32>,
}

impl Samples {
    pub fn new(x: FeatureMatrix, y: Vec<i32>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(PipelineError::LengthMismatch {
                left: x.nrows(),
                right: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &FeatureMatrix {
        &self.x
    }

    pub fn y(&self) -> &[i32] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select_rows(indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Append extra rows after the existing ones.
    pub fn extend(&self, rows: Vec<Vec<f64>>, labels: Vec<i32>) -> Result<Self> {
        let mut all_rows = self.x.rows.clone();
        all_rows.extend(rows);
        let mut all_labels = self.y.clone();
        all_labels.extend(labels);
        Samples::new(FeatureMatrix::new(self.x.columns.clone(), all_rows)?, all_labels)
    }

    pub fn class_count(&self, class: i32) -> usize {
        self.y.iter().filter(|&&c| c == class).count()
    }
}

/// Ordinal age band over raw age in years. Intervals are half-open, so an
/// age exactly on an edge belongs to the older band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AgeBand {
    Child,
    Adult,
    Senior,
}

impl AgeBand {
    pub const EDGES: [f64; 4] = [0.0, 18.0, 60.0, 120.0];

    /// `None` for NaN and for anything outside `[0, 120)`.
    pub fn classify(age: f64) -> Option<Self> {
        let [lo, child, adult, hi] = Self::EDGES;
        match age {
            a if (lo..child).contains(&a) => Some(AgeBand::Child),
            a if (child..adult).contains(&a) => Some(AgeBand::Adult),
            a if (adult..hi).contains(&a) => Some(AgeBand::Senior),
            _ => None,
        }
    }

    pub fn ordinal(self) -> f64 {
        match self {
            AgeBand::Child => 0.0,
            AgeBand::Adult => 1.0,
            AgeBand::Senior => 2.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBand::Child => "child",
            AgeBand::Adult => "adult",
            AgeBand::Senior => "senior",
        }
    }
}

pub fn age_bands(ages: &[f64]) -> Result<Vec<AgeBand>> {
    ages.iter()
        .enumerate()
        .map(|(row, &age)| AgeBand::classify(age).ok_or(PipelineError::AgeOutOfRange { row, age }))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleParams {
    pub mean: f64,
    pub scale: f64,
}

impl ScaleParams {
    /// Mean and population standard deviation of a complete column; a
    /// constant column keeps scale 1.
    pub fn fit(column: &str, values: &Series) -> Result<Self> {
        let values = values.cast(&DataType::Float64)?;
        let values = values.f64()?;
        let (Some(mean), Some(std)) = (values.mean(), values.std(0)) else {
            return Err(PipelineError::EmptyColumn {
                column: column.to_owned(),
            });
        };
        let scale = if std > f64::EPSILON { std } else { 1.0 };
        Ok(Self { mean, scale })
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// z-score scaler fitted per column.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Standardizer {
    params: Vec<(String, ScaleParams)>,
}

impl Standardizer {
    pub fn fit(dataset: &Dataset, columns: &[&str]) -> Result<Self> {
        let mut params = Vec::with_capacity(columns.len());
        for &column in columns {
            let p = ScaleParams::fit(column, complete_series(dataset, column)?)?;
            debug!("scaler {column}: mean={:.4} scale={:.4}", p.mean, p.scale);
            params.push((column.to_owned(), p));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &[(String, ScaleParams)] {
        &self.params
    }

    pub fn transform(&self, dataset: &Dataset, column: &str) -> Result<Vec<f64>> {
        let (_, p) = self
            .params
            .iter()
            .find(|(name, _)| name == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_owned(),
            })?;
        complete_series(dataset, column)?;
        Ok(dataset
            .numeric_column(column)?
            .into_iter()
            .flatten()
            .map(|v| p.apply(v))
            .collect())
    }
}

fn complete_series<'a>(dataset: &'a Dataset, column: &str) -> Result<&'a Series> {
    let series = dataset.column(column)?;
    let count = series.null_count();
    if count > 0 {
        return Err(PipelineError::MissingValues {
            column: column.to_owned(),
            count,
        });
    }
    Ok(series)
}

/// Drop-first one-hot encoder. Categories are sorted, so the reference
/// category is the alphabetically first one and the layout is stable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OneHotEncoder {
    categories: Vec<(String, Vec<String>)>,
}

impl OneHotEncoder {
    pub fn fit(dataset: &Dataset, columns: &[&str]) -> Result<Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for &column in columns {
            let seen: BTreeSet<String> = dataset.categorical_column(column)?.into_iter().collect();
            categories.push((column.to_owned(), seen.into_iter().collect()));
        }
        Ok(Self { categories })
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(column, cats)| cats.iter().skip(1).map(move |c| format!("{column}_{c}")))
            .collect()
    }

    /// Indicator rows. A category unseen at fit time encodes as the
    /// reference (all zeros).
    pub fn transform(&self, dataset: &Dataset) -> Result<Vec<Vec<f64>>> {
        let width = self.feature_names().len();
        let mut rows = vec![Vec::with_capacity(width); dataset.len()];
        for (column, cats) in &self.categories {
            let values = dataset.categorical_column(column)?;
            for (row, value) in rows.iter_mut().zip(values) {
                row.extend(cats.iter().skip(1).map(|c| if *c == value { 1.0 } else { 0.0 }));
            }
        }
        Ok(rows)
    }
}

/// Output of the feature stage plus the fitted transforms for reporting.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub samples: Samples,
    pub standardizer: Standardizer,
    pub encoder: OneHotEncoder,
    pub band_counts: Vec<(AgeBand, usize)>,
}

pub fn build_features(dataset: &Dataset) -> Result<Encoded> {
    info!("building features for {} rows", dataset.len());

    complete_series(dataset, "age")?;
    let raw_age: Vec<f64> = dataset.numeric_column("age")?.into_iter().flatten().collect();
    let bands = age_bands(&raw_age)?;
    let mut band_counts: Vec<(AgeBand, usize)> = Vec::new();
    for band in [AgeBand::Child, AgeBand::Adult, AgeBand::Senior] {
        let n = bands.iter().filter(|&&b| b == band).count();
        debug!("age band {}: {n} rows", band.label());
        band_counts.push((band, n));
    }

    let standardizer = Standardizer::fit(dataset, &NUMERIC_COLUMNS)?;
    let age = standardizer.transform(dataset, "age")?;
    let glucose = standardizer.transform(dataset, "avg_glucose_level")?;
    let bmi = standardizer.transform(dataset, "bmi")?;

    let encoder = OneHotEncoder::fit(dataset, &NOMINAL_COLUMNS)?;
    let indicators = encoder.transform(dataset)?;

    let mut columns: Vec<String> = [
        "age",
        "hypertension",
        "heart_disease",
        "avg_glucose_level",
        "bmi",
        AGE_GROUP_COLUMN,
        INTERACTION_COLUMN,
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect();
    columns.extend(encoder.feature_names());

    let hypertension = dataset.flag_column("hypertension")?;
    let heart_disease = dataset.flag_column("heart_disease")?;

    let rows = indicators
        .into_iter()
        .enumerate()
        .map(|(i, dummies)| {
            let mut row = vec![
                age[i],
                f64::from(hypertension[i]),
                f64::from(heart_disease[i]),
                glucose[i],
                bmi[i],
                bands[i].ordinal(),
                age[i] * glucose[i],
            ];
            row.extend(dummies);
            row
        })
        .collect();

    let x = FeatureMatrix::new(columns, rows)?;
    info!("encoded {} rows x {} features", x.nrows(), x.ncols());
    let samples = Samples::new(x, dataset.labels()?)?;

    Ok(Encoded {
        samples,
        standardizer,
        encoder,
        band_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::{dataset, record};
    use approx::assert_abs_diff_eq;

    fn sample() -> Dataset {
        dataset(
            (0..40)
                .map(|i| {
                    let bmi = Some(18.0 + f64::from(i % 9));
                    record(i, 2.0 + f64::from(i) * 2.0, bmi, (i % 6 == 0) as i32)
                })
                .collect(),
        )
    }

    #[test]
    fn band_edges_are_half_open() {
        assert_eq!(AgeBand::classify(0.0), Some(AgeBand::Child));
        assert_eq!(AgeBand::classify(17.99), Some(AgeBand::Child));
        assert_eq!(AgeBand::classify(18.0), Some(AgeBand::Adult));
        assert_eq!(AgeBand::classify(60.0), Some(AgeBand::Senior));
        assert_eq!(AgeBand::classify(119.9), Some(AgeBand::Senior));
        assert_eq!(AgeBand::classify(120.0), None);
        assert_eq!(AgeBand::classify(-1.0), None);
        assert_eq!(AgeBand::classify(f64::NAN), None);
    }

    #[test]
    fn out_of_range_age_names_the_row() {
        let err = age_bands(&[30.0, 150.0]).unwrap_err();
        assert!(matches!(err, PipelineError::AgeOutOfRange { row: 1, .. }));
    }

    #[test]
    fn standardized_columns_have_zero_mean_unit_std() {
        let ds = sample();
        let scaler = Standardizer::fit(&ds, &NUMERIC_COLUMNS).unwrap();
        for column in NUMERIC_COLUMNS {
            let z = Series::new(column, scaler.transform(&ds, column).unwrap());
            let z = z.f64().unwrap();
            assert_abs_diff_eq!(z.mean().unwrap(), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(z.std(0).unwrap(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn constant_column_scales_to_zero() {
        let p = ScaleParams::fit("x", &Series::new("x", &[3.0, 3.0, 3.0])).unwrap();
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.apply(3.0), 0.0);
    }

    #[test]
    fn scaler_rejects_missing_values() {
        let ds = dataset(vec![record(1, 30.0, None, 0)]);
        assert!(matches!(
            Standardizer::fit(&ds, &["bmi"]),
            Err(PipelineError::MissingValues { count: 1, .. })
        ));
    }

    #[test]
    fn one_hot_drops_alphabetically_first_category() {
        let ds = sample();
        let enc = OneHotEncoder::fit(&ds, &["gender", "work_type"]).unwrap();
        assert_eq!(
            enc.feature_names(),
            vec![
                "gender_Male",
                "work_type_Private",
                "work_type_Self-employed",
                "work_type_children"
            ]
        );
        let rows = enc.transform(&ds).unwrap();
        // id 0: Male, Private
        assert_eq!(rows[0], vec![1.0, 1.0, 0.0, 0.0]);
        // id 2: Male, Govt_job (reference)
        assert_eq!(rows[2], vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn encoded_matrix_is_numeric_and_keeps_row_count() {
        let ds = sample();
        let encoded = build_features(&ds).unwrap();
        let x = encoded.samples.x();
        assert_eq!(x.nrows(), ds.len());
        assert_eq!(encoded.samples.y().len(), ds.len());
        assert!(x.rows().iter().flatten().all(|v| v.is_finite()));
        assert!(!x.columns().iter().any(|c| NOMINAL_COLUMNS.contains(&c.as_str())));
        assert_eq!(x.to_frame().unwrap().height(), ds.len());
    }

    #[test]
    fn interaction_is_product_of_scaled_columns() {
        let encoded = build_features(&sample()).unwrap();
        let x = encoded.samples.x();
        let age = x.column("age").unwrap();
        let glucose = x.column("avg_glucose_level").unwrap();
        let inter = x.column(INTERACTION_COLUMN).unwrap();
        for i in 0..x.nrows() {
            assert_abs_diff_eq!(inter[i], age[i] * glucose[i], epsilon = 1e-12);
        }
        let groups = x.column(AGE_GROUP_COLUMN).unwrap();
        assert_eq!(groups[0], 0.0);
        assert_eq!(groups[39], 2.0);
        let total: usize = encoded.band_counts.iter().map(|(_, n)| n).sum();
        assert_eq!(total, x.nrows());
        // ages 2..=16 are children
        assert_eq!(encoded.band_counts[0], (AgeBand::Child, 8));
    }

    #[test]
    fn samples_reject_mismatched_labels() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0], vec![2.0]]).unwrap();
        assert!(matches!(
            Samples::new(x, vec![0]),
            Err(PipelineError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let columns = vec!["a".into(), "b".into()];
        let err = FeatureMatrix::new(columns, vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::RaggedRow { row: 1, expected: 2, found: 1 }));
    }
}
