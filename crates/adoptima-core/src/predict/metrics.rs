//! Goodness-of-fit metrics and holdout evaluation

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::Dataset;

use super::{ModelKind, Predictor, TrainedModel, TrainingSet};

/// Fraction of months held out for testing
pub const TEST_FRACTION: f64 = 0.2;

/// Coefficient of determination
///
/// With constant targets the score is 1 for a perfect fit and 0 otherwise.
pub fn r2_score(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let Some(mean) = actual.mean() else {
        return 0.0;
    };
    let residual = &actual - &predicted;
    let centred = actual.mapv(|y| y - mean);
    let ss_res = residual.dot(&residual);
    let ss_tot = centred.dot(&centred);

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn rmse(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let residual = &actual - &predicted;
    residual.mapv(|e| e * e).mean().map_or(0.0, f64::sqrt)
}

pub fn mae(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let residual = &actual - &predicted;
    residual.mapv(f64::abs).mean().unwrap_or(0.0)
}

/// Model output for every row of a set
pub(crate) fn fitted_values(model: &dyn Predictor, set: &TrainingSet) -> Array1<f64> {
    set.rows
        .iter()
        .map(|r| model.predict_row(r.as_slice()))
        .collect()
}

/// Fit quality on one slice of data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl Metrics {
    pub fn compute(model: &dyn Predictor, set: &TrainingSet) -> Self {
        let actual = set.target_vector();
        let predicted = fitted_values(model, set);
        Self {
            r2: r2_score(actual.view(), predicted.view()),
            rmse: rmse(actual.view(), predicted.view()),
            mae: mae(actual.view(), predicted.view()),
        }
    }
}

/// Train/test metrics from a chronological holdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub train: Metrics,
    pub test: Metrics,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Fit on the earliest months and score on the latest ones
///
/// No shuffling: the test months always follow the training months.
pub fn evaluate(kind: ModelKind, dataset: &Dataset, config: &AppConfig) -> Result<ModelReport> {
    let set = TrainingSet::from_dataset(dataset);
    let (train, test) = set.split_chronological(TEST_FRACTION);
    let model = TrainedModel::train(kind, &train, config)?;

    let report = ModelReport {
        kind,
        train: Metrics::compute(&model, &train),
        test: Metrics::compute(&model, &test),
        train_rows: train.len(),
        test_rows: test.len(),
    };

    info!(
        model = kind.as_str(),
        train_r2 = report.train.r2,
        test_r2 = report.test.r2,
        "Holdout evaluation complete"
    );
    Ok(report)
}
