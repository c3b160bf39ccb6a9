//! Revenue prediction models
//!
//! Two regressors share one capability interface, [`Predictor`]:
//!
//! - **Linear** - ordinary least squares on standardised features; exposes an
//!   analytic revenue gradient so the optimizer can climb it directly
//! - **Forest** - bagged regression trees; no gradient, searched by sampling
//!
//! [`TrainedModel`] wraps either one so sessions and model files don't need to
//! know which variant they hold.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use adoptima_core::predict::{ModelKind, TrainedModel, TrainingSet};
//!
//! let set = TrainingSet::from_dataset(&dataset);
//! let model = TrainedModel::train(ModelKind::Linear, &set, &config)?;
//! let prediction = model.predict(&allocation, &context)?;
//! ```

pub mod forest;
pub mod linear;
pub mod metrics;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::features::{prepare, row_for_allocation, FeatureRow, FeatureSchema};
use crate::models::{roi, Allocation, Channel, Dataset, Prediction, PredictionContext};

pub use forest::ForestModel;
pub use linear::LinearModel;
pub use metrics::{evaluate, Metrics, ModelReport};

/// Available regressors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    Forest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Forest => "forest",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Linear => "Linear Regression",
            Self::Forest => "Random Forest",
        }
    }

    pub fn all() -> &'static [ModelKind] {
        &[Self::Linear, Self::Forest]
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" | "ols" => Ok(Self::Linear),
            "forest" | "random_forest" | "ensemble" => Ok(Self::Forest),
            _ => Err(format!("Unknown model: {}. Available: linear, forest", s)),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Facts about how a model was trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub kind: ModelKind,
    /// Feature order used in training; inference must match it exactly
    pub feature_names: Vec<String>,
    pub channels: Vec<Channel>,
    /// Training-set R²
    pub r2: f64,
    pub training_rows: usize,
    /// SHA-256 of the dataset snapshot, when known
    #[serde(default)]
    pub dataset_fingerprint: Option<String>,
}

/// Importance of one input feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Uniform interface over the regressors
pub trait Predictor {
    fn kind(&self) -> ModelKind;

    fn metadata(&self) -> &ModelMetadata;

    /// Raw model output for a feature row in training order
    fn predict_row(&self, row: &[f64]) -> f64;

    /// Importances sorted descending, normalised to sum to 1
    fn feature_importance(&self) -> Vec<FeatureImportance>;

    /// d(revenue)/d(spend) per channel, for models with a closed form
    fn revenue_gradient(
        &self,
        _allocation: &Allocation,
        _context: &PredictionContext,
    ) -> Option<Allocation> {
        None
    }

    fn schema(&self) -> FeatureSchema {
        FeatureSchema::for_channels(&self.metadata().channels)
    }

    /// Predicted revenue and ROI for an allocation under a context
    fn predict(&self, allocation: &Allocation, context: &PredictionContext) -> Result<Prediction> {
        let schema = self.schema();
        schema.ensure_matches(&self.metadata().feature_names)?;

        if let Some(channel) = allocation
            .keys()
            .find(|c| !schema.channels().contains(c))
        {
            return Err(Error::InvalidData(format!(
                "Model was not trained on channel {}",
                channel
            )));
        }

        let row = row_for_allocation(&schema, allocation, context);
        let revenue = self.predict_row(row.as_slice()).max(0.0);
        let spend: f64 = allocation.values().sum();

        Ok(Prediction {
            revenue,
            roi: roi(revenue, spend),
        })
    }
}

/// Feature rows plus revenue targets
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub schema: FeatureSchema,
    pub rows: Vec<FeatureRow>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn new(schema: FeatureSchema, rows: Vec<FeatureRow>, targets: Vec<f64>) -> Self {
        Self {
            schema,
            rows,
            targets,
        }
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            schema: FeatureSchema::for_dataset(dataset),
            rows: prepare(dataset),
            targets: dataset.revenues(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as an `n x width` matrix in schema order
    pub fn design_matrix(&self) -> Result<Array2<f64>> {
        let flat: Vec<f64> = self
            .rows
            .iter()
            .flat_map(|r| r.values.iter().copied())
            .collect();
        Array2::from_shape_vec((self.rows.len(), self.schema.len()), flat)
            .map_err(|e| Error::InvalidData(format!("Ragged feature rows: {}", e)))
    }

    pub fn target_vector(&self) -> Array1<f64> {
        Array1::from_vec(self.targets.clone())
    }

    /// Check shape and size before fitting
    ///
    /// A fit needs more rows than features, otherwise the solution is not
    /// determined by the data.
    pub fn validate(&self) -> Result<()> {
        if self.rows.len() != self.targets.len() {
            return Err(Error::InvalidData(format!(
                "{} feature rows but {} targets",
                self.rows.len(),
                self.targets.len()
            )));
        }

        let width = self.schema.len();
        if let Some(i) = self.rows.iter().position(|r| r.len() != width) {
            return Err(Error::InvalidData(format!(
                "Row {} has {} features, expected {}",
                i,
                self.rows[i].len(),
                width
            )));
        }

        let all_finite = self
            .rows
            .iter()
            .flat_map(|r| r.values.iter())
            .chain(self.targets.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidData("Non-finite value in training data".into()));
        }

        let required = width + 1;
        if self.rows.len() < required {
            return Err(Error::InsufficientData {
                rows: self.rows.len(),
                required,
            });
        }

        Ok(())
    }

    /// Chronological holdout: the last `test_fraction` of rows become the test set
    pub fn split_chronological(&self, test_fraction: f64) -> (TrainingSet, TrainingSet) {
        let n = self.rows.len();
        let test = ((n as f64 * test_fraction).round() as usize).clamp(1, n.max(1));
        let cut = n.saturating_sub(test);

        let train = TrainingSet::new(
            self.schema.clone(),
            self.rows[..cut].to_vec(),
            self.targets[..cut].to_vec(),
        );
        let holdout = TrainingSet::new(
            self.schema.clone(),
            self.rows[cut..].to_vec(),
            self.targets[cut..].to_vec(),
        );
        (train, holdout)
    }
}

/// Either regressor, serializable to a model file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl TrainedModel {
    /// Fit a model of the given kind
    pub fn train(kind: ModelKind, set: &TrainingSet, config: &AppConfig) -> Result<Self> {
        let model = match kind {
            ModelKind::Linear => Self::Linear(LinearModel::train(set, &config.linear)?),
            ModelKind::Forest => Self::Forest(ForestModel::train(set, &config.forest)?),
        };

        info!(
            model = kind.as_str(),
            rows = set.len(),
            r2 = model.metadata().r2,
            "Model trained"
        );
        Ok(model)
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        let fingerprint = Some(fingerprint.into());
        match &mut self {
            Self::Linear(m) => m.metadata.dataset_fingerprint = fingerprint,
            Self::Forest(m) => m.metadata.dataset_fingerprint = fingerprint,
        }
        self
    }

    fn inner(&self) -> &dyn Predictor {
        match self {
            Self::Linear(m) => m as &dyn Predictor,
            Self::Forest(m) => m as &dyn Predictor,
        }
    }

    /// Write the model as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a model file, checking its feature layout
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        model.schema().ensure_matches(&model.metadata().feature_names)?;
        Ok(model)
    }
}

impl Predictor for TrainedModel {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn metadata(&self) -> &ModelMetadata {
        self.inner().metadata()
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.inner().predict_row(row)
    }

    fn feature_importance(&self) -> Vec<FeatureImportance> {
        self.inner().feature_importance()
    }

    fn revenue_gradient(
        &self,
        allocation: &Allocation,
        context: &PredictionContext,
    ) -> Option<Allocation> {
        self.inner().revenue_gradient(allocation, context)
    }
}

/// Sort descending and scale to sum to 1
pub(crate) fn normalized_importance(names: &[String], raw: &[f64]) -> Vec<FeatureImportance> {
    let total: f64 = raw.iter().sum();
    let mut importance: Vec<FeatureImportance> = names
        .iter()
        .zip(raw)
        .map(|(name, value)| FeatureImportance {
            feature: name.clone(),
            importance: if total > 0.0 { value / total } else { 0.0 },
        })
        .collect();
    importance.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    importance
}

/// Importance grouped by the channel each feature belongs to
pub fn channel_effectiveness(model: &dyn Predictor) -> BTreeMap<Channel, f64> {
    let schema = model.schema();
    let mut by_channel: BTreeMap<Channel, f64> =
        schema.channels().iter().map(|c| (*c, 0.0)).collect();

    for item in model.feature_importance() {
        let channel = schema
            .names()
            .iter()
            .position(|n| *n == item.feature)
            .and_then(|i| schema.channel_of(i));
        if let Some(channel) = channel {
            *by_channel.entry(channel).or_insert(0.0) += item.importance;
        }
    }

    by_channel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::models::MonthlyRecord;

    fn dataset() -> Dataset {
        generate(24, 42).unwrap()
    }

    #[test]
    fn test_model_kind_from_str() {
        assert_eq!("linear".parse::<ModelKind>().unwrap(), ModelKind::Linear);
        assert_eq!("Random_Forest".parse::<ModelKind>().unwrap(), ModelKind::Forest);
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_training_set_from_dataset() {
        let set = TrainingSet::from_dataset(&dataset());
        assert_eq!(set.len(), 24);
        assert_eq!(set.targets.len(), 24);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_design_matrix_shape() {
        let set = TrainingSet::from_dataset(&dataset());
        let x = set.design_matrix().unwrap();
        assert_eq!(x.dim(), (24, set.schema.len()));
        assert_eq!(x.row(3).to_vec(), set.rows[3].values);
        assert_eq!(set.target_vector().len(), 24);

        let mut ragged = set.clone();
        ragged.rows[5].values.pop();
        assert!(matches!(ragged.design_matrix(), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_insufficient_data_both_models() {
        let short = generate(10, 42).unwrap();
        let set = TrainingSet::from_dataset(&short);
        let config = AppConfig::default();

        for kind in ModelKind::all() {
            let result = TrainedModel::train(*kind, &set, &config);
            match result {
                Err(Error::InsufficientData { rows, required }) => {
                    assert_eq!(rows, 10);
                    assert_eq!(required, 17);
                }
                other => panic!("expected InsufficientData, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_mismatched_targets_rejected() {
        let mut set = TrainingSet::from_dataset(&dataset());
        set.targets.pop();
        assert!(matches!(set.validate(), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_split_chronological() {
        let set = TrainingSet::from_dataset(&dataset());
        let (train, test) = set.split_chronological(0.2);
        assert_eq!(train.len(), 19);
        assert_eq!(test.len(), 5);
        assert_eq!(test.targets[4], set.targets[23]);
    }

    #[test]
    fn test_predict_rejects_unknown_channel() {
        let data = dataset();
        let records: Vec<MonthlyRecord> = data
            .records()
            .iter()
            .cloned()
            .map(|mut r| {
                r.channel_spend.remove(&Channel::Promotions);
                r
            })
            .collect();
        let without_promotions = Dataset::new(records).unwrap();
        let set = TrainingSet::from_dataset(&without_promotions);
        let model = TrainedModel::train(ModelKind::Linear, &set, &AppConfig::default()).unwrap();

        let allocation: Allocation = [(Channel::Promotions, 1000.0)].into_iter().collect();
        let result = model.predict(&allocation, &PredictionContext::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_predict_rejects_tampered_feature_order() {
        let set = TrainingSet::from_dataset(&dataset());
        let mut model =
            TrainedModel::train(ModelKind::Linear, &set, &AppConfig::default()).unwrap();
        if let TrainedModel::Linear(m) = &mut model {
            m.metadata.feature_names.swap(0, 1);
        }

        let allocation: Allocation = [(Channel::Email, 1000.0)].into_iter().collect();
        let result = model.predict(&allocation, &PredictionContext::default());
        assert!(matches!(result, Err(Error::FeatureMismatch(_))));
    }

    #[test]
    fn test_save_and_load() {
        let set = TrainingSet::from_dataset(&dataset());
        let config = AppConfig::default();
        let dir = tempfile::tempdir().unwrap();

        for kind in ModelKind::all() {
            let model = TrainedModel::train(*kind, &set, &config)
                .unwrap()
                .with_fingerprint("abc123");
            let path = dir.path().join(format!("{}.json", kind));
            model.save(&path).unwrap();

            let loaded = TrainedModel::load(&path).unwrap();
            assert_eq!(loaded.kind(), *kind);
            assert_eq!(loaded.metadata(), model.metadata());
            assert_eq!(
                loaded.metadata().dataset_fingerprint.as_deref(),
                Some("abc123")
            );

            let row = set.rows[3].as_slice();
            assert!((loaded.predict_row(row) - model.predict_row(row)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_channel_effectiveness_sums_channel_features() {
        let set = TrainingSet::from_dataset(&dataset());
        let model =
            TrainedModel::train(ModelKind::Forest, &set, &AppConfig::default()).unwrap();
        let effectiveness = channel_effectiveness(&model);

        assert_eq!(effectiveness.len(), 4);
        let total: f64 = effectiveness.values().sum();
        assert!(total > 0.0 && total <= 1.0 + 1e-9);
    }
}
