use polars::prelude::PolarsError;
use smartcore::error::Failed;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model error: {0}")]
    Model(#[from] Failed),
    #[error("input is missing required column {column:?}")]
    MissingColumn { column: String },
    #[error("column {column:?} still has {count} missing values")]
    MissingValues { column: String, count: usize },
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("column {column:?} has no observed values")]
    EmptyColumn { column: String },
    #[error("age {age} at row {row} falls outside every age band")]
    AgeOutOfRange { row: usize, age: f64 },
    #[error("invalid train/test split: {reason}")]
    InvalidSplit { reason: String },
    #[error("length mismatch: {left} features rows vs {right} labels")]
    LengthMismatch { left: usize, right: usize },
    #[error("{what} is empty")]
    EmptyInput { what: &'static str },
    #[error("labels contain a single class ({class}); need at least two")]
    SingleClass { class: i32 },
}
