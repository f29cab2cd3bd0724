use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use serde::Serialize;

use crate::explore::ExploreOptions;
use crate::rebalance::ResampleOrder;

pub const DEFAULT_INPUT: &str = "data/healthcare-dataset-stroke-data.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load, clean, explore and model the healthcare stroke dataset.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input CSV path
    #[arg(default_value = DEFAULT_INPUT)]
    pub input: PathBuf,
    /// Seed for the train/test shuffle and SMOTE
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Fraction of rows held out for testing
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,
    /// Neighbours considered when synthesising minority rows
    #[arg(long, default_value_t = 5)]
    pub k_neighbors: usize,
    /// Whether oversampling happens before or after the train/test split
    #[arg(long, value_enum, default_value_t = ResampleOrder::BeforeSplit)]
    pub resample: ResampleOrder,
    /// Histogram bins
    #[arg(long, default_value_t = 10)]
    pub bins: usize,
    /// Skip the text plots
    #[arg(long)]
    pub no_plots: bool,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Settings shared by the split, train and rebalance stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSettings {
    pub test_size: f64,
    pub seed: u64,
    pub k_neighbors: usize,
    pub resample: ResampleOrder,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            k_neighbors: 5,
            resample: ResampleOrder::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub run: RunSettings,
    pub explore: ExploreOptions,
    pub format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            run: RunSettings::default(),
            explore: ExploreOptions::default(),
            format: OutputFormat::default(),
        }
    }
}

impl From<&Args> for PipelineConfig {
    fn from(args: &Args) -> Self {
        Self {
            input: args.input.clone(),
            run: RunSettings {
                test_size: args.test_size,
                seed: args.seed,
                k_neighbors: args.k_neighbors,
                resample: args.resample,
            },
            explore: ExploreOptions {
                bins: args.bins,
                plots: !args.no_plots,
                ..ExploreOptions::default()
            },
            format: args.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_notebook_run() {
        let args = Args::parse_from(["stroke-pipeline"]);
        let config = PipelineConfig::from(&args);
        assert_eq!(config.input, PathBuf::from(DEFAULT_INPUT));
        assert_eq!(config.run, RunSettings::default());
        assert!(config.explore.plots);
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(args.log_level(), LevelFilter::Info);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "stroke-pipeline",
            "stroke.csv",
            "--seed",
            "7",
            "--test-size",
            "0.3",
            "--resample",
            "after-split",
            "--no-plots",
            "--format",
            "json",
            "-vv",
        ]);
        let config = PipelineConfig::from(&args);
        assert_eq!(config.input, PathBuf::from("stroke.csv"));
        assert_eq!(config.run.seed, 7);
        assert_eq!(config.run.test_size, 0.3);
        assert_eq!(config.run.resample, ResampleOrder::AfterSplit);
        assert!(!config.explore.plots);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(args.log_level(), LevelFilter::Trace);
    }
}
