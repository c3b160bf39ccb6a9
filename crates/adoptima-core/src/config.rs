//! Configuration for data generation, model training and optimization
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/adoptima/config/adoptima.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Every key is optional; missing keys keep their built-in default.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Channel;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/adoptima.toml");

/// Generation parameters for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Mean monthly spend before seasonal adjustment
    pub base: f64,
    /// Std-dev of the base spend draw
    pub base_std: f64,
    /// Std-dev of the post-season variation
    pub jitter_std: f64,
    /// Minimum monthly spend
    pub floor: f64,
    /// Revenue per dollar at the reference spend
    pub roi: f64,
    /// Spend level the ROI is quoted at
    pub reference: f64,
    /// Spend multiplier in holiday months
    pub holiday_multiplier: f64,
    /// Spend multiplier in back-to-school months
    pub back_to_school_multiplier: f64,
    /// ROI multiplier in holiday months
    pub holiday_roi_boost: f64,
}

impl ChannelParams {
    fn defaults_for(channel: Channel) -> Self {
        match channel {
            Channel::SocialMedia => Self {
                base: 15_000.0,
                base_std: 3_000.0,
                jitter_std: 2_000.0,
                floor: 5_000.0,
                roi: 2.4,
                reference: 15_000.0,
                holiday_multiplier: 1.4,
                back_to_school_multiplier: 1.2,
                holiday_roi_boost: 1.5,
            },
            Channel::SearchAds => Self {
                base: 25_000.0,
                base_std: 5_000.0,
                jitter_std: 3_000.0,
                floor: 10_000.0,
                roi: 3.0,
                reference: 25_000.0,
                holiday_multiplier: 1.2,
                back_to_school_multiplier: 1.3,
                holiday_roi_boost: 1.0,
            },
            Channel::Email => Self {
                base: 8_000.0,
                base_std: 2_000.0,
                jitter_std: 1_000.0,
                floor: 3_000.0,
                roi: 4.0,
                reference: 8_000.0,
                holiday_multiplier: 1.0,
                back_to_school_multiplier: 1.0,
                holiday_roi_boost: 1.0,
            },
            Channel::Promotions => Self {
                base: 12_000.0,
                base_std: 3_000.0,
                jitter_std: 2_000.0,
                floor: 5_000.0,
                roi: 2.5,
                reference: 12_000.0,
                holiday_multiplier: 1.6,
                back_to_school_multiplier: 1.1,
                holiday_roi_boost: 1.0,
            },
        }
    }
}

/// Synthetic data generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub start_year: i32,
    /// Calendar month of the first record (1-12)
    pub start_month: u32,
    /// Std-dev of the multiplicative revenue noise
    pub noise_std: f64,
    /// Noise is clamped to +/- this fraction
    pub noise_bound: f64,
    pub competitor_mean: f64,
    pub competitor_std: f64,
    pub channels: BTreeMap<Channel, ChannelParams>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_year: 2022,
            start_month: 1,
            noise_std: 0.1,
            noise_bound: 0.25,
            competitor_mean: 50.0,
            competitor_std: 15.0,
            channels: Channel::all()
                .iter()
                .map(|c| (*c, ChannelParams::defaults_for(*c)))
                .collect(),
        }
    }
}

/// Ordinary least squares settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConfig {
    /// Ridge term added to the normal equations diagonal
    pub ridge: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { ridge: 1e-8 }
    }
}

/// Bagged tree ensemble settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (all when None)
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            max_depth: 6,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

/// Budget search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Gradient ascent iteration cap
    pub max_iterations: usize,
    /// Initial gradient step as a fraction of the budget
    pub step_fraction: f64,
    /// Gradient ascent stops once the step (in dollars) falls below this
    pub tolerance: f64,
    /// Random search candidates
    pub samples: usize,
    pub seed: u64,
    /// Revenue difference treated as a tie
    pub epsilon: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            step_fraction: 0.05,
            tolerance: 1e-3,
            samples: 2_000,
            seed: 42,
            epsilon: 1e-6,
        }
    }
}

/// Default dataset parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub months: usize,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            months: 24,
            seed: 42,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub generator: GeneratorConfig,
    pub linear: LinearConfig,
    pub forest: ForestConfig,
    pub optimizer: OptimizerSettings,
}

impl AppConfig {
    /// Load configuration (explicit path, then override location, then embedded)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read config {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    tracing::debug!(path = %default_path.display(), "Using config override");
                    fs::read_to_string(&default_path)
                        .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        parse_config(&content)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("adoptima").join("config").join("adoptima.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    data: Option<RawData>,
    generator: Option<RawGenerator>,
    linear: Option<RawLinear>,
    forest: Option<RawForest>,
    optimizer: Option<RawOptimizer>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    months: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawGenerator {
    start_year: Option<i32>,
    start_month: Option<u32>,
    noise_std: Option<f64>,
    noise_bound: Option<f64>,
    competitor_mean: Option<f64>,
    competitor_std: Option<f64>,
    channels: Option<HashMap<String, RawChannel>>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    base: Option<f64>,
    base_std: Option<f64>,
    jitter_std: Option<f64>,
    floor: Option<f64>,
    roi: Option<f64>,
    reference: Option<f64>,
    holiday_multiplier: Option<f64>,
    back_to_school_multiplier: Option<f64>,
    holiday_roi_boost: Option<f64>,
    /// Set to false to leave the channel out of generated data
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawLinear {
    ridge: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawForest {
    trees: Option<usize>,
    max_depth: Option<usize>,
    min_samples_split: Option<usize>,
    min_samples_leaf: Option<usize>,
    max_features: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOptimizer {
    max_iterations: Option<usize>,
    step_fraction: Option<f64>,
    tolerance: Option<f64>,
    samples: Option<usize>,
    seed: Option<u64>,
    epsilon: Option<f64>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AppConfig::default();

    if let Some(data) = raw.data {
        if let Some(months) = data.months {
            config.data.months = months;
        }
        if let Some(seed) = data.seed {
            config.data.seed = seed;
        }
    }

    if let Some(gen) = raw.generator {
        let g = &mut config.generator;
        if let Some(v) = gen.start_year {
            g.start_year = v;
        }
        if let Some(v) = gen.start_month {
            g.start_month = v;
        }
        if let Some(v) = gen.noise_std {
            g.noise_std = v;
        }
        if let Some(v) = gen.noise_bound {
            g.noise_bound = v;
        }
        if let Some(v) = gen.competitor_mean {
            g.competitor_mean = v;
        }
        if let Some(v) = gen.competitor_std {
            g.competitor_std = v;
        }

        for (name, raw_channel) in gen.channels.unwrap_or_default() {
            let channel: Channel = match name.parse() {
                Ok(c) => c,
                Err(_) => {
                    tracing::warn!(channel = %name, "Skipping unknown channel in config");
                    continue;
                }
            };

            if raw_channel.enabled == Some(false) {
                g.channels.remove(&channel);
                continue;
            }

            let params = g
                .channels
                .entry(channel)
                .or_insert_with(|| ChannelParams::defaults_for(channel));
            if let Some(v) = raw_channel.base {
                params.base = v;
            }
            if let Some(v) = raw_channel.base_std {
                params.base_std = v;
            }
            if let Some(v) = raw_channel.jitter_std {
                params.jitter_std = v;
            }
            if let Some(v) = raw_channel.floor {
                params.floor = v;
            }
            if let Some(v) = raw_channel.roi {
                params.roi = v;
            }
            if let Some(v) = raw_channel.reference {
                params.reference = v;
            }
            if let Some(v) = raw_channel.holiday_multiplier {
                params.holiday_multiplier = v;
            }
            if let Some(v) = raw_channel.back_to_school_multiplier {
                params.back_to_school_multiplier = v;
            }
            if let Some(v) = raw_channel.holiday_roi_boost {
                params.holiday_roi_boost = v;
            }
        }
    }

    if let Some(linear) = raw.linear {
        if let Some(ridge) = linear.ridge {
            if !(ridge >= 0.0 && ridge.is_finite()) {
                return Err(Error::Config(format!("linear.ridge must be >= 0, got {}", ridge)));
            }
            config.linear.ridge = ridge;
        }
    }

    if let Some(forest) = raw.forest {
        let f = &mut config.forest;
        if let Some(v) = forest.trees {
            f.trees = v;
        }
        if let Some(v) = forest.max_depth {
            f.max_depth = v;
        }
        if let Some(v) = forest.min_samples_split {
            f.min_samples_split = v;
        }
        if let Some(v) = forest.min_samples_leaf {
            f.min_samples_leaf = v;
        }
        if forest.max_features.is_some() {
            f.max_features = forest.max_features;
        }
        if let Some(v) = forest.seed {
            f.seed = v;
        }
        if f.trees == 0 {
            return Err(Error::Config("forest.trees must be at least 1".into()));
        }
    }

    if let Some(opt) = raw.optimizer {
        let o = &mut config.optimizer;
        if let Some(v) = opt.max_iterations {
            o.max_iterations = v;
        }
        if let Some(v) = opt.step_fraction {
            o.step_fraction = v;
        }
        if let Some(v) = opt.tolerance {
            o.tolerance = v;
        }
        if let Some(v) = opt.samples {
            o.samples = v;
        }
        if let Some(v) = opt.seed {
            o.seed = v;
        }
        if let Some(v) = opt.epsilon {
            o.epsilon = v;
        }
        if !(o.step_fraction > 0.0) || !(o.tolerance > 0.0) || o.epsilon < 0.0 {
            return Err(Error::Config(
                "optimizer.step_fraction and tolerance must be > 0, epsilon >= 0".into(),
            ));
        }
    }

    Ok(config)
}
