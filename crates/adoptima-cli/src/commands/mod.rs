//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `data` - Dataset commands (generate, summary)
//! - `model` - Model commands (train, predict)
//! - `plan` - Budget commands (optimize, scenarios)
//!
//! Shared helpers for loading config and data and parsing allocations live here.

pub mod data;
pub mod model;
pub mod plan;

// Re-export command functions for main.rs
pub use data::*;
pub use model::*;
pub use plan::*;

use std::path::Path;

use adoptima_core::models::{Allocation, Channel, Dataset};
use adoptima_core::predict::ModelKind;
use adoptima_core::scenario::Scenario;
use adoptima_core::{generate_with, load_csv, AppConfig};
use anyhow::{bail, Context, Result};
use tracing::debug;

/// Load configuration from an explicit path, the user config, or built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(path).context("Failed to load configuration")
}

/// Read the dataset CSV, or generate the configured default dataset
pub fn load_dataset(config: &AppConfig, data: Option<&Path>) -> Result<Dataset> {
    match data {
        Some(path) => load_csv(path)
            .with_context(|| format!("Failed to read dataset from {}", path.display())),
        None => {
            debug!(
                months = config.data.months,
                seed = config.data.seed,
                "No dataset given, generating one"
            );
            generate_with(&config.generator, config.data.months, config.data.seed)
                .context("Failed to generate dataset")
        }
    }
}

pub fn parse_model(s: &str) -> Result<ModelKind> {
    s.parse().map_err(anyhow::Error::msg)
}

pub fn parse_scenario(s: &str) -> Result<Scenario> {
    s.parse().map_err(anyhow::Error::msg)
}

/// Parse `channel=amount` pairs separated by commas
///
/// Channel names accept the short forms (`social`, `search`, `promo`).
pub fn parse_allocation(s: &str) -> Result<Allocation> {
    let mut allocation = Allocation::new();

    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("Expected channel=amount, got: {}", pair);
        };
        let channel: Channel = name.parse().map_err(anyhow::Error::msg)?;
        let amount: f64 = value
            .trim()
            .replace(['$', '_'], "")
            .parse()
            .with_context(|| format!("Invalid amount for {}: {}", channel, value))?;
        if !amount.is_finite() || amount < 0.0 {
            bail!("Amount for {} must be a non-negative number", channel);
        }
        if allocation.insert(channel, amount).is_some() {
            bail!("Channel listed twice: {}", channel);
        }
    }

    if allocation.is_empty() {
        bail!("No channels given");
    }
    Ok(allocation)
}

/// Format a dollar amount with thousands separators, e.g. `$12,345`
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}
