//! AdOptima CLI - Marketing budget optimizer
//!
//! Usage:
//!   adoptima generate --months 24 --output data.csv   Generate a dataset
//!   adoptima train --data data.csv --model forest      Train and evaluate a model
//!   adoptima optimize --budget 100000                  Find the best budget split
//!   adoptima scenarios --budget 100000                 Compare market scenarios

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            months,
            seed,
            output,
        } => commands::cmd_generate(&config, months, seed, output.as_deref()),
        Commands::Summary { data } => commands::cmd_summary(&config, data.as_deref()),
        Commands::Train { data, model, save } => {
            commands::cmd_train(&config, data.as_deref(), &model, save.as_deref())
        }
        Commands::Predict {
            allocation,
            data,
            model,
            scenario,
        } => commands::cmd_predict(&config, data.as_deref(), &model, &scenario, &allocation),
        Commands::Optimize {
            budget,
            data,
            model,
            scenario,
            current,
            min,
            max,
            load_model,
            json,
        } => commands::cmd_optimize(
            &config,
            &commands::OptimizeArgs {
                budget,
                data: data.as_deref(),
                model: &model,
                scenario: &scenario,
                current: current.as_deref(),
                min: min.as_deref(),
                max: max.as_deref(),
                load_model: load_model.as_deref(),
                json,
            },
        ),
        Commands::Scenarios {
            budget,
            data,
            model,
        } => commands::cmd_scenarios(&config, data.as_deref(), &model, budget),
    }
}
