//! AdOptima Core Library
//!
//! Marketing budget modelling for the AdOptima tool:
//! - Synthetic monthly campaign data with seasonality and diminishing returns
//! - Feature preparation (lags, squares, season and competitor signals)
//! - Revenue models (least squares and a bagged tree ensemble)
//! - Budget optimization under per-channel bounds
//! - Market scenarios, summaries and recommendations
//! - CSV snapshots and JSON model files

pub mod config;
pub mod error;
pub mod features;
pub mod generator;
pub mod insights;
pub mod models;
pub mod optimize;
pub mod predict;
pub mod scenario;
pub mod session;
pub mod snapshot;

pub use config::{AppConfig, ForestConfig, GeneratorConfig, LinearConfig, OptimizerSettings};
pub use error::{Error, Result};
pub use features::{prepare, FeatureRow, FeatureSchema};
pub use generator::{generate, generate_with};
pub use insights::{recommendations, summarize, Recommendation, SummaryStats};
pub use models::{
    Allocation, AllocationPlan, Channel, Dataset, MonthlyRecord, Prediction, PredictionContext,
    Season,
};
pub use optimize::{
    optimize, Constraints, OptimizationOutcome, OptimizationWarning, SearchMethod,
};
pub use predict::{
    channel_effectiveness, evaluate, ModelKind, ModelMetadata, ModelReport, Predictor,
    TrainedModel, TrainingSet,
};
pub use scenario::{compare_scenarios, Scenario, ScenarioOutcome};
pub use session::Session;
pub use snapshot::{fingerprint, load_csv, read_csv, save_csv, write_csv};
