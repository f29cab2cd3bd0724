//! Stroke-prediction workflow over the healthcare stroke dataset: load,
//! clean, explore, encode, then train and score a logistic regression
//! before and after SMOTE rebalancing.

pub mod clean;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod explore;
pub mod features;
pub mod io;
pub mod monitor;
pub mod pipeline;
pub mod rebalance;
pub mod records;
pub mod split;
pub mod train;

pub use error::{PipelineError, Result};
pub use records::{Dataset, StrokeRecord};
