use log::{debug, info};
use polars::prelude::*;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::records::Dataset;

/// Column imputed with its mean.
pub const IMPUTED_COLUMN: &str = "bmi";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imputation {
    pub column: String,
    pub filled: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub missing_before: Vec<MissingCount>,
    pub imputation: Option<Imputation>,
    pub duplicates_removed: usize,
    pub rows: usize,
}

pub fn missing_counts(dataset: &Dataset) -> Vec<MissingCount> {
    dataset
        .frame()
        .get_columns()
        .iter()
        .map(|s| MissingCount {
            column: s.name().to_owned(),
            missing: s.null_count(),
        })
        .collect()
}

/// Fill missing `bmi` with the mean of the observed values.
pub fn impute_mean(dataset: &Dataset) -> Result<(Dataset, Option<Imputation>)> {
    let bmi = dataset.column(IMPUTED_COLUMN)?;
    let filled = bmi.null_count();
    if filled == 0 {
        return Ok((dataset.clone(), None));
    }

    let value = bmi.mean().ok_or_else(|| PipelineError::EmptyColumn {
        column: IMPUTED_COLUMN.to_owned(),
    })?;
    debug!("imputing {filled} {IMPUTED_COLUMN} values with {value:.4}");

    let mut frame = dataset.frame().clone();
    frame.with_column(bmi.fill_null(FillNullStrategy::Mean)?)?;

    Ok((
        Dataset::from_frame(frame)?,
        Some(Imputation {
            column: IMPUTED_COLUMN.to_owned(),
            filled,
            value,
        }),
    ))
}

/// Drop rows that exactly repeat an earlier row, keeping the first.
pub fn drop_duplicates(dataset: &Dataset) -> Result<(Dataset, usize)> {
    let frame = dataset
        .frame()
        .unique_stable(None, UniqueKeepStrategy::First, None)?;
    let removed = dataset.len() - frame.height();
    Ok((Dataset::from_frame(frame)?, removed))
}

pub fn clean(dataset: &Dataset) -> Result<(Dataset, CleanReport)> {
    let missing_before = missing_counts(dataset);
    for m in missing_before.iter().filter(|m| m.missing > 0) {
        info!("column {} has {} missing values", m.column, m.missing);
    }

    let (imputed, imputation) = impute_mean(dataset)?;
    let (deduped, duplicates_removed) = drop_duplicates(&imputed)?;
    info!(
        "cleaning done: {} rows, {} duplicates removed",
        deduped.len(),
        duplicates_removed
    );

    let report = CleanReport {
        missing_before,
        imputation,
        duplicates_removed,
        rows: deduped.len(),
    };
    Ok((deduped, report))
}
