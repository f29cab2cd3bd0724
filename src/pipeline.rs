//! Stage orchestration: load -> clean -> explore -> encode -> split/train/
//! evaluate -> rebalance/retrain/evaluate.

use std::fmt;

use log::info;
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::clean::{self, CleanReport};
use crate::config::{PipelineConfig, RunSettings};
use crate::error::Result;
use crate::explore::{self, Exploration};
use crate::features::{self, AgeBand, ScaleParams};
use crate::io;
use crate::rebalance::{self, StageResult};
use crate::records::Dataset;
use crate::split;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub settings: RunSettings,
    pub loaded_rows: usize,
    pub cleaning: CleanReport,
    pub exploration: Exploration,
    pub features: Vec<String>,
    pub scaling: Vec<(String, ScaleParams)>,
    pub age_bands: Vec<(AgeBand, usize)>,
    pub baseline: StageResult,
    pub rebalanced: StageResult,
    #[serde(skip)]
    pub encoded_head: DataFrame,
}

pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    let dataset = io::read_csv(&config.input)?;
    run_on_dataset(&dataset, config)
}

pub fn run_on_dataset(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineReport> {
    let settings = config.run;

    let (cleaned, cleaning) = clean::clean(dataset)?;
    let exploration = explore::explore(&cleaned, &config.explore)?;
    let encoded = features::build_features(&cleaned)?;
    let samples = &encoded.samples;

    info!("baseline: training without rebalancing");
    let split = split::train_test_split(samples, settings.test_size, settings.seed)?;
    let baseline = rebalance::fit_and_score(&split.train, &split.test)?;
    info!(
        "baseline accuracy {:.4}, positive f1 {:.4}",
        baseline.evaluation.accuracy, baseline.evaluation.positive_f1
    );

    let rebalanced = rebalance::rebalance_and_evaluate(samples, &settings)?;
    info!(
        "rebalanced accuracy {:.4}, positive f1 {:.4}",
        rebalanced.evaluation.accuracy, rebalanced.evaluation.positive_f1
    );

    Ok(PipelineReport {
        settings,
        loaded_rows: dataset.len(),
        cleaning,
        exploration,
        features: samples.x().columns().to_vec(),
        scaling: encoded.standardizer.params().to_vec(),
        age_bands: encoded.band_counts.clone(),
        baseline,
        rebalanced,
        encoded_head: samples.x().to_frame()?.head(Some(config.explore.head)),
    })
}

fn write_stage(f: &mut fmt::Formatter<'_>, title: &str, stage: &StageResult) -> fmt::Result {
    writeln!(
        f,
        "== {title} ({} train rows, {} positive; {} test rows)",
        stage.train_rows, stage.train_positive, stage.test_rows
    )?;
    writeln!(f, "{}", stage.evaluation)?;
    writeln!(f, "accuracy: {:.4}", stage.evaluation.accuracy)?;
    writeln!(f, "positive-class f1: {:.4}", stage.evaluation.positive_f1)?;
    writeln!(f, "intercept: {:.4}", stage.intercept)?;
    for d in &stage.top_drivers {
        let direction = if d.weight > 0.0 { "raises" } else { "lowers" };
        writeln!(
            f,
            "  {} {direction} stroke odds (weight {:.4})",
            d.feature, d.weight
        )?;
    }
    Ok(())
}

/// Human-readable report, the way the notebook printed it.
impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== loaded {} rows", self.loaded_rows)?;

        writeln!(f, "== missing values per column")?;
        for m in &self.cleaning.missing_before {
            writeln!(f, "  {:<18} {}", m.column, m.missing)?;
        }
        if let Some(imp) = &self.cleaning.imputation {
            writeln!(
                f,
                "filled {} missing {} values with mean {:.4}",
                imp.filled, imp.column, imp.value
            )?;
        }
        writeln!(
            f,
            "removed {} duplicate rows, {} rows remain",
            self.cleaning.duplicates_removed, self.cleaning.rows
        )?;

        let ex = &self.exploration;
        writeln!(f, "\n== head\n{}", ex.head)?;
        writeln!(f, "\n== describe\n{}", ex.table)?;
        for plot in &ex.plots {
            writeln!(f, "\n{plot}")?;
        }

        writeln!(f, "== age bands")?;
        for (band, n) in &self.age_bands {
            writeln!(f, "  {:<8} {n}", band.label())?;
        }
        writeln!(
            f,
            "\n== encoded features ({})\n{}",
            self.features.len(),
            self.encoded_head
        )?;

        writeln!(f)?;
        write_stage(f, "logistic regression", &self.baseline)?;
        writeln!(f)?;
        let title = format!("logistic regression after SMOTE, {}", self.settings.resample);
        write_stage(f, &title, &self.rebalanced)
    }
}

pub fn render_text(report: &PipelineReport) -> String {
    report.to_string()
}

pub fn render_json(report: &PipelineReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
