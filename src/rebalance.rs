//! SMOTE oversampling and the retrain-after-rebalancing stage.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;

use clap::ValueEnum;
use log::{info, warn};
use rand::prelude::*;
use serde::Serialize;

use crate::config::RunSettings;
use crate::error::{PipelineError, Result};
use crate::evaluate::{evaluate, Evaluation, POSITIVE_CLASS};
use crate::features::Samples;
use crate::split::train_test_split;
use crate::train::{Driver, StrokeClassifier};

/// When synthetic rows are generated relative to the train/test split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleOrder {
    /// Oversample every row, then split. Synthetic points built from rows
    /// that land in the test set can leak into training.
    #[default]
    BeforeSplit,
    /// Split first and oversample only the training rows.
    AfterSplit,
}

impl fmt::Display for ResampleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResampleOrder::BeforeSplit => f.write_str("before-split"),
            ResampleOrder::AfterSplit => f.write_str("after-split"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Synthetic Minority Over-sampling Technique. Every class below the
/// majority count is topped up to parity.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Smote {
    pub fn new(seed: u64) -> Self {
        Self { k_neighbors: 5, seed }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Indices of the `k` nearest rows in `pool`, excluding `skip`.
    fn neighbors(pool: &[&[f64]], skip: usize, k: usize) -> Vec<usize> {
        let point = pool[skip];
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        for (i, other) in pool.iter().enumerate() {
            if i == skip {
                continue;
            }
            let d = Self::distance(point, other);
            if heap.len() < k {
                heap.push(DistIdx(d, i));
            } else if let Some(&DistIdx(max, _)) = heap.peek() {
                if d < max {
                    heap.pop();
                    heap.push(DistIdx(d, i));
                }
            }
        }
        let mut found: Vec<_> = heap.into_vec();
        found.sort();
        found.into_iter().map(|DistIdx(_, i)| i).collect()
    }

    /// Original rows first, synthetic rows appended.
    pub fn fit_resample(&self, samples: &Samples) -> Result<Samples> {
        let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (i, &label) in samples.y().iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        if by_class.len() < 2 {
            return Err(PipelineError::SingleClass {
                class: samples.y().first().copied().unwrap_or_default(),
            });
        }
        let majority = by_class.values().map(Vec::len).max().unwrap_or(0);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let rows = samples.x().rows();
        let mut synthetic_rows = Vec::new();
        let mut synthetic_labels = Vec::new();

        for (&class, members) in &by_class {
            let needed = majority - members.len();
            if needed == 0 {
                continue;
            }
            let pool: Vec<&[f64]> = members.iter().map(|&i| rows[i].as_slice()).collect();
            let k = self.k_neighbors.min(pool.len().saturating_sub(1));
            if k == 0 {
                warn!("class {class} has a single sample; duplicating it");
            }
            info!("class {class}: generating {needed} synthetic rows (k = {k})");

            let neighbor_lists: Vec<Vec<usize>> = (0..pool.len())
                .map(|i| Self::neighbors(&pool, i, k))
                .collect();

            for _ in 0..needed {
                let idx = rng.gen_range(0..pool.len());
                let sample = pool[idx];
                let row = match neighbor_lists[idx].choose(&mut rng) {
                    Some(&n) => {
                        let gap: f64 = rng.gen();
                        sample
                            .iter()
                            .zip(pool[n])
                            .map(|(&p, &q)| p + gap * (q - p))
                            .collect()
                    }
                    None => sample.to_vec(),
                };
                synthetic_rows.push(row);
                synthetic_labels.push(class);
            }
        }

        samples.extend(synthetic_rows, synthetic_labels)
    }
}

/// One train/evaluate round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_positive: usize,
    pub evaluation: Evaluation,
    pub intercept: f64,
    pub top_drivers: Vec<Driver>,
}

pub fn fit_and_score(train: &Samples, test: &Samples) -> Result<StageResult> {
    let model = StrokeClassifier::fit(train)?;
    let predictions = model.predict(test.x())?;
    let evaluation = evaluate(test.y(), &predictions)?;
    Ok(StageResult {
        train_rows: train.len(),
        test_rows: test.len(),
        train_positive: train.class_count(POSITIVE_CLASS),
        evaluation,
        intercept: model.intercept(),
        top_drivers: model.top_drivers(3),
    })
}

/// Oversample, split, retrain and re-score, in the configured order.
pub fn rebalance_and_evaluate(samples: &Samples, settings: &RunSettings) -> Result<StageResult> {
    let smote = Smote::new(settings.seed).with_k_neighbors(settings.k_neighbors);
    info!("rebalancing with SMOTE ({})", settings.resample);
    match settings.resample {
        ResampleOrder::BeforeSplit => {
            warn!(
                "oversampling before the split: synthetic rows may leak test information \
                 into training"
            );
            let balanced = smote.fit_resample(samples)?;
            let split = train_test_split(&balanced, settings.test_size, settings.seed)?;
            fit_and_score(&split.train, &split.test)
        }
        ResampleOrder::AfterSplit => {
            let split = train_test_split(samples, settings.test_size, settings.seed)?;
            let balanced = smote.fit_resample(&split.train)?;
            fit_and_score(&balanced, &split.test)
        }
    }
}
