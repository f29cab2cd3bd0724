use polars::prelude::*;
use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, Result};

/// Column holding the outcome label.
pub const TARGET_COLUMN: &str = "stroke";

/// Continuous columns, in file order.
pub const NUMERIC_COLUMNS: [&str; 3] = ["age", "avg_glucose_level", "bmi"];

/// Nominal text columns that get one-hot encoded.
pub const NOMINAL_COLUMNS: [&str; 5] = [
    "gender",
    "ever_married",
    "work_type",
    "Residence_type",
    "smoking_status",
];

/// 0/1 columns, including the target.
pub const FLAG_COLUMNS: [&str; 3] = ["hypertension", "heart_disease", "stroke"];

/// Every column the pipeline reads. `id` is optional and not listed.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "avg_glucose_level",
    "bmi",
    "smoking_status",
    "stroke",
];

const MISSING_MARKERS: [&str; 4] = ["", "N/A", "NA", "NaN"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrokeRecord {
    #[serde(default)]
    pub id: Option<u32>,
    pub gender: String,
    #[serde(deserialize_with = "finite")]
    pub age: f64,
    pub hypertension: i32,
    pub heart_disease: i32,
    pub ever_married: String,
    pub work_type: String,
    #[serde(rename = "Residence_type")]
    pub residence_type: String,
    #[serde(deserialize_with = "finite")]
    pub avg_glucose_level: f64,
    #[serde(deserialize_with = "missing_as_none")]
    pub bmi: Option<f64>,
    pub smoking_status: String,
    pub stroke: i32,
}

/// Missing markers, and anything that parses to NaN or an infinity, read
/// as `None`.
fn missing_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return Ok(None);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(serde::de::Error::custom)?;
    Ok(Some(value).filter(|v| v.is_finite()))
}

fn finite<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!("non-finite value {value}")))
    }
}

/// The stroke table as a polars frame. Stages never mutate a `Dataset`;
/// they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn from_records(records: &[StrokeRecord]) -> Result<Self> {
        let text = |f: fn(&StrokeRecord) -> &str| records.iter().map(f).collect::<Vec<_>>();
        let float = |f: fn(&StrokeRecord) -> f64| records.iter().map(f).collect::<Vec<_>>();
        let flag = |f: fn(&StrokeRecord) -> i32| records.iter().map(f).collect::<Vec<_>>();

        let frame = DataFrame::new(vec![
            Series::new("id", records.iter().map(|r| r.id).collect::<Vec<_>>()),
            Series::new("gender", text(|r| r.gender.as_str())),
            Series::new("age", float(|r| r.age)),
            Series::new("hypertension", flag(|r| r.hypertension)),
            Series::new("heart_disease", flag(|r| r.heart_disease)),
            Series::new("ever_married", text(|r| r.ever_married.as_str())),
            Series::new("work_type", text(|r| r.work_type.as_str())),
            Series::new("Residence_type", text(|r| r.residence_type.as_str())),
            Series::new("avg_glucose_level", float(|r| r.avg_glucose_level)),
            Series::new("bmi", records.iter().map(|r| r.bmi).collect::<Vec<_>>()),
            Series::new("smoking_status", text(|r| r.smoking_status.as_str())),
            Series::new("stroke", flag(|r| r.stroke)),
        ])?;
        Ok(Self { frame })
    }

    /// Wrap a frame that carries every required column.
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        for column in REQUIRED_COLUMNS {
            if frame.column(column).is_err() {
                return Err(missing(column));
            }
        }
        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column(&self, name: &str) -> Result<&Series> {
        self.frame.column(name).map_err(|_| missing(name))
    }

    /// Values of a continuous column; `None` marks a missing entry.
    pub fn numeric_column(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let values = self.column(column)?.cast(&DataType::Float64)?;
        let values = values.f64()?.into_iter().collect();
        Ok(values)
    }

    /// Values of a nominal or flag column rendered as text.
    pub fn categorical_column(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?.cast(&DataType::Utf8)?;
        let values = values
            .utf8()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_owned())
            .collect();
        Ok(values)
    }

    pub fn flag_column(&self, column: &str) -> Result<Vec<i32>> {
        let values = self.column(column)?.cast(&DataType::Int32)?;
        let values = values.i32()?.into_iter().map(Option::unwrap_or_default).collect();
        Ok(values)
    }

    pub fn labels(&self) -> Result<Vec<i32>> {
        self.flag_column(TARGET_COLUMN)
    }
}

fn missing(column: &str) -> PipelineError {
    PipelineError::MissingColumn {
        column: column.to_owned(),
    }
}
