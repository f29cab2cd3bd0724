//! Descriptive statistics and text plots. Nothing here changes the data.

use log::debug;
use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::records::{Dataset, FLAG_COLUMNS, NOMINAL_COLUMNS, NUMERIC_COLUMNS};

const BAR: char = '#';
const LABEL_COLUMN: &str = "describe";

#[derive(Debug, Clone)]
pub struct ExploreOptions {
    pub bins: usize,
    pub width: usize,
    pub plots: bool,
    pub head: usize,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            bins: 10,
            width: 40,
            plots: true,
            head: 5,
        }
    }
}

/// One numeric column of the describe table. NaN marks an undefined
/// statistic (e.g. std of a single value).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub null_count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnCounts {
    pub column: String,
    pub counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub rows: usize,
    pub summaries: Vec<ColumnSummary>,
    pub counts: Vec<ColumnCounts>,
    #[serde(skip)]
    pub head: DataFrame,
    #[serde(skip)]
    pub table: DataFrame,
    #[serde(skip)]
    pub plots: Vec<String>,
}

fn observed(dataset: &Dataset, column: &str) -> Result<Vec<f64>> {
    Ok(dataset.numeric_column(column)?.into_iter().flatten().collect())
}

/// pandas-like describe table over the numeric columns: one row per
/// statistic, sample std, linear quantiles.
pub fn describe(dataset: &Dataset) -> Result<DataFrame> {
    let table = dataset.frame().select(NUMERIC_COLUMNS)?.describe(None)?;
    Ok(table)
}

/// Read the per-column statistics back out of a describe table.
pub fn summaries(table: &DataFrame) -> Result<Vec<ColumnSummary>> {
    let labels: Vec<String> = table
        .column(LABEL_COLUMN)?
        .utf8()?
        .into_iter()
        .map(|l| l.unwrap_or_default().to_owned())
        .collect();

    let mut out = Vec::with_capacity(NUMERIC_COLUMNS.len());
    for column in NUMERIC_COLUMNS {
        let values = table.column(column)?.f64()?;
        let stat = |name: &str| {
            labels
                .iter()
                .position(|l| l == name)
                .and_then(|i| values.get(i))
                .unwrap_or(f64::NAN)
        };
        out.push(ColumnSummary {
            column: column.to_owned(),
            count: stat("count") as usize,
            null_count: stat("null_count") as usize,
            mean: stat("mean"),
            std: stat("std"),
            min: stat("min"),
            q25: stat("25%"),
            median: stat("50%"),
            q75: stat("75%"),
            max: stat("max"),
        });
    }
    Ok(out)
}

/// Category frequencies sorted by category.
pub fn value_counts(dataset: &Dataset, column: &str) -> Result<Vec<(String, usize)>> {
    let table = dataset
        .column(column)?
        .value_counts(false, false)?
        .sort([column], false)?;
    let values = table.column(column)?.cast(&DataType::Utf8)?;
    let counts = table.column("counts")?.cast(&DataType::UInt64)?;
    let pairs = values
        .utf8()?
        .into_iter()
        .zip(counts.u64()?.into_iter())
        .map(|(v, c)| (v.unwrap_or_default().to_owned(), c.unwrap_or_default() as usize))
        .collect();
    Ok(pairs)
}

/// Equal-width histogram drawn with text bars.
pub fn render_histogram(name: &str, values: &[f64], bins: usize, width: usize) -> String {
    let mut out = format!("{name}\n");
    let Some(&first) = values.first() else {
        out.push_str("  (no data)\n");
        return out;
    };
    let (lo, hi) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let bins = bins.max(1);
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / span) * bins as f64) as usize;
        counts[idx.min(bins - 1)] += 1;
    }

    let peak = counts.iter().copied().max().unwrap_or(0).max(1);
    for (i, &c) in counts.iter().enumerate() {
        let start = lo + span * i as f64 / bins as f64;
        let end = lo + span * (i + 1) as f64 / bins as f64;
        let bar = BAR.to_string().repeat(c * width / peak);
        out.push_str(&format!("  [{start:>9.2}, {end:>9.2}) {bar:<width$} {c}\n"));
    }
    out
}

/// Horizontal count plot, one bar per category.
pub fn render_counts(name: &str, counts: &[(String, usize)], width: usize) -> String {
    let mut out = format!("{name}\n");
    let label_width = counts.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let peak = counts.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1);
    for (label, c) in counts {
        let bar = BAR.to_string().repeat(c * width / peak);
        out.push_str(&format!("  {label:<label_width$} {bar:<width$} {c}\n"));
    }
    out
}

pub fn explore(dataset: &Dataset, options: &ExploreOptions) -> Result<Exploration> {
    let table = describe(dataset)?;
    let summaries = summaries(&table)?;
    let head = dataset.frame().head(Some(options.head));

    let mut counts = Vec::new();
    for column in NOMINAL_COLUMNS.iter().chain(FLAG_COLUMNS.iter()) {
        counts.push(ColumnCounts {
            column: (*column).to_owned(),
            counts: value_counts(dataset, column)?,
        });
    }

    let mut plots = Vec::new();
    if options.plots {
        for column in NUMERIC_COLUMNS {
            let values = observed(dataset, column)?;
            plots.push(render_histogram(column, &values, options.bins, options.width));
        }
        for c in &counts {
            plots.push(render_counts(&c.column, &c.counts, options.width));
        }
    }
    debug!("explored {} rows, {} plots", dataset.len(), plots.len());

    Ok(Exploration {
        rows: dataset.len(),
        summaries,
        counts,
        head,
        table,
        plots,
    })
}
