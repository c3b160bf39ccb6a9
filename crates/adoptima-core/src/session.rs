//! Working session over one dataset
//!
//! A [`Session`] owns the dataset, the configuration and any models trained
//! from them. Models are fitted on first use and cached per kind, so a CLI
//! command or test that asks for the same model twice pays for training once.
//! The current allocation defaults to the latest month's spend.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::Result;
use crate::insights::{summarize, SummaryStats};
use crate::models::{Allocation, Dataset, Prediction, PredictionContext};
use crate::optimize::{optimize, Constraints, OptimizationOutcome};
use crate::predict::{evaluate, ModelKind, ModelReport, Predictor, TrainedModel, TrainingSet};
use crate::scenario::{compare_scenarios, ScenarioOutcome};
use crate::snapshot::fingerprint;

pub struct Session {
    dataset: Dataset,
    config: AppConfig,
    fingerprint: String,
    current: Allocation,
    models: HashMap<ModelKind, TrainedModel>,
}

impl Session {
    pub fn start(dataset: Dataset, config: AppConfig) -> Result<Self> {
        let fingerprint = fingerprint(&dataset)?;
        let current = dataset.latest().channel_spend.clone();
        info!(
            months = dataset.len(),
            channels = dataset.channels().len(),
            "Session started"
        );
        Ok(Self {
            dataset,
            config,
            fingerprint,
            current,
            models: HashMap::new(),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// SHA-256 of the dataset snapshot
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn current_allocation(&self) -> &Allocation {
        &self.current
    }

    pub fn set_current_allocation(&mut self, allocation: Allocation) {
        self.current = allocation;
    }

    /// Trained model of the given kind, fitting it on first request
    pub fn model(&mut self, kind: ModelKind) -> Result<&TrainedModel> {
        if !self.models.contains_key(&kind) {
            let set = TrainingSet::from_dataset(&self.dataset);
            let model = TrainedModel::train(kind, &set, &self.config)?
                .with_fingerprint(self.fingerprint.clone());
            self.models.insert(kind, model);
        } else {
            debug!(model = kind.as_str(), "Using cached model");
        }
        // Inserted above when missing
        Ok(&self.models[&kind])
    }

    /// Use an already trained model (e.g. loaded from disk) for its kind
    pub fn insert_model(&mut self, model: TrainedModel) {
        self.models.insert(model.kind(), model);
    }

    pub fn summary(&self) -> SummaryStats {
        summarize(&self.dataset)
    }

    pub fn evaluate(&self, kind: ModelKind) -> Result<ModelReport> {
        evaluate(kind, &self.dataset, &self.config)
    }

    pub fn predict(
        &mut self,
        kind: ModelKind,
        allocation: &Allocation,
        context: &PredictionContext,
    ) -> Result<Prediction> {
        self.model(kind)?.predict(allocation, context)
    }

    /// Constraints seeded with the current allocation and configured settings
    pub fn constraints(&self, context: PredictionContext) -> Constraints {
        Constraints::default()
            .with_context(context)
            .with_current(self.current.clone())
            .with_settings(self.config.optimizer.clone())
    }

    pub fn optimize(
        &mut self,
        kind: ModelKind,
        total_budget: f64,
        constraints: &Constraints,
    ) -> Result<OptimizationOutcome> {
        let channels = self.dataset.channels().to_vec();
        let model = self.model(kind)?;
        optimize(model, total_budget, &channels, constraints)
    }

    pub fn compare_scenarios(
        &mut self,
        kind: ModelKind,
        total_budget: f64,
        constraints: &Constraints,
    ) -> Result<Vec<ScenarioOutcome>> {
        let channels = self.dataset.channels().to_vec();
        let model = self.model(kind)?;
        compare_scenarios(model, total_budget, &channels, constraints)
    }

    /// End the session, handing back the dataset
    pub fn finish(self) -> Dataset {
        info!(models = self.models.len(), "Session finished");
        self.dataset
    }
}
