//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AdOptima - Find the marketing budget split that earns the most
#[derive(Parser)]
#[command(name = "adoptima")]
#[command(about = "Marketing budget modelling and optimization", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the user config, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a synthetic campaign dataset
    Generate {
        /// Number of months (defaults to the configured value)
        #[arg(short, long)]
        months: Option<usize>,

        /// Random seed (defaults to the configured value)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write the dataset to this CSV file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show headline statistics for a dataset
    Summary {
        /// Dataset CSV (generated from config if not specified)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Train a revenue model and report its fit
    Train {
        /// Dataset CSV (generated from config if not specified)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Model type: linear, forest
        #[arg(short, long, default_value = "linear")]
        model: String,

        /// Save the trained model as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Predict revenue for an allocation
    Predict {
        /// Spend per channel, e.g. social=15000,search=25000,email=8000,promotions=12000
        #[arg(short, long)]
        allocation: String,

        /// Dataset CSV (generated from config if not specified)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Model type: linear, forest
        #[arg(short, long, default_value = "linear")]
        model: String,

        /// Scenario: normal, holiday, back_to_school, high_competition
        #[arg(short, long, default_value = "normal")]
        scenario: String,
    },

    /// Find the best split of a budget
    Optimize {
        /// Total budget to allocate
        #[arg(short, long)]
        budget: f64,

        /// Dataset CSV (generated from config if not specified)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Model type: linear, forest
        #[arg(short, long, default_value = "linear")]
        model: String,

        /// Scenario: normal, holiday, back_to_school, high_competition
        #[arg(short, long, default_value = "normal")]
        scenario: String,

        /// Current allocation to compare against (defaults to the latest month)
        #[arg(long)]
        current: Option<String>,

        /// Minimum spend per channel, e.g. email=5000
        #[arg(long)]
        min: Option<String>,

        /// Maximum spend per channel, e.g. search=40000
        #[arg(long)]
        max: Option<String>,

        /// Use a saved model instead of training one
        #[arg(long)]
        load_model: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Optimize the same budget under every market scenario
    Scenarios {
        /// Total budget to allocate
        #[arg(short, long)]
        budget: f64,

        /// Dataset CSV (generated from config if not specified)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Model type: linear, forest
        #[arg(short, long, default_value = "linear")]
        model: String,
    },
}
