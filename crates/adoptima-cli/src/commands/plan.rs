//! Budget command implementations (optimize, scenarios)

use std::path::Path;

use adoptima_core::predict::{Predictor, TrainedModel};
use adoptima_core::{recommendations, AppConfig, OptimizationOutcome, Session};
use anyhow::{bail, Context, Result};
use tracing::warn;

use super::{format_money, load_dataset, parse_allocation, parse_model, parse_scenario};

/// Arguments of `adoptima optimize`
pub struct OptimizeArgs<'a> {
    pub budget: f64,
    pub data: Option<&'a Path>,
    pub model: &'a str,
    pub scenario: &'a str,
    pub current: Option<&'a str>,
    pub min: Option<&'a str>,
    pub max: Option<&'a str>,
    pub load_model: Option<&'a Path>,
    pub json: bool,
}

/// Load a saved model into the session, warning when it was trained on other data
fn use_saved_model(session: &mut Session, path: &Path, expected: &str) -> Result<()> {
    let model = TrainedModel::load(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))?;

    if model.kind().as_str() != expected {
        bail!(
            "{} holds a {} model, but --model {} was requested",
            path.display(),
            model.kind(),
            expected
        );
    }
    match model.metadata().dataset_fingerprint.as_deref() {
        Some(fp) if fp != session.fingerprint() => {
            warn!(path = %path.display(), "Model was trained on a different dataset");
            println!("⚠️  {} was trained on a different dataset", path.display());
        }
        None => {
            warn!(path = %path.display(), "Model has no dataset fingerprint");
        }
        _ => {}
    }

    session.insert_model(model);
    Ok(())
}

fn print_outcome(title: &str, outcome: &OptimizationOutcome) {
    println!();
    println!("🎯 {}", title);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "     {:<14} {:>14} {:>14} {:>9}",
        "Channel", "Current", "Optimized", "Change"
    );
    for (channel, optimized) in outcome.plan.iter() {
        let current = outcome.baseline.get(channel);
        let change = if current > 0.0 {
            format!("{:+.1}%", (optimized - current) / current * 100.0)
        } else {
            "new".to_string()
        };
        println!(
            "     {:<14} {:>14} {:>14} {:>9}",
            channel.display_name(),
            format_money(current),
            format_money(optimized),
            change
        );
    }
    println!();
    println!(
        "   Revenue: {} → {} ({})",
        format_money(outcome.baseline_prediction.revenue),
        format_money(outcome.predicted.revenue),
        format_money(outcome.revenue_improvement)
    );
    println!(
        "   ROI:     {:.3} → {:.3} ({:+.3})",
        outcome.baseline_prediction.roi, outcome.predicted.roi, outcome.roi_improvement
    );
    println!(
        "   Search:  {} ({} steps)",
        outcome.method, outcome.iterations
    );

    for warning in &outcome.warnings {
        println!("⚠️  {}", warning);
    }
}

pub fn cmd_optimize(config: &AppConfig, args: &OptimizeArgs<'_>) -> Result<()> {
    let kind = parse_model(args.model)?;
    let scenario = parse_scenario(args.scenario)?;

    let dataset = load_dataset(config, args.data)?;
    let mut session = Session::start(dataset, config.clone())?;
    if let Some(path) = args.load_model {
        use_saved_model(&mut session, path, kind.as_str())?;
    }
    if let Some(current) = args.current {
        session.set_current_allocation(parse_allocation(current).context("Invalid --current")?);
    }

    let mut constraints = session.constraints(scenario.context());
    if let Some(min) = args.min {
        constraints.min = parse_allocation(min).context("Invalid --min")?;
    }
    if let Some(max) = args.max {
        constraints.max = parse_allocation(max).context("Invalid --max")?;
    }

    let outcome = session
        .optimize(kind, args.budget, &constraints)
        .context("Optimization failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(
        &format!(
            "Optimized {} budget ({}, {})",
            format_money(args.budget),
            kind.display_name(),
            scenario.display_name()
        ),
        &outcome,
    );

    println!();
    println!("💡 Recommendations:");
    for note in recommendations(&outcome) {
        println!("   • {}", note);
    }
    println!();

    Ok(())
}

pub fn cmd_scenarios(
    config: &AppConfig,
    data: Option<&Path>,
    model: &str,
    budget: f64,
) -> Result<()> {
    let kind = parse_model(model)?;
    let dataset = load_dataset(config, data)?;
    let mut session = Session::start(dataset, config.clone())?;

    let constraints = session.constraints(Default::default());
    let results = session
        .compare_scenarios(kind, budget, &constraints)
        .context("Scenario comparison failed")?;

    println!();
    println!(
        "🌍 Scenario comparison for {} ({})",
        format_money(budget),
        kind.display_name()
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!("     {:<18} {:>14} {:>8}", "Scenario", "Revenue", "ROI");
    for result in &results {
        println!(
            "     {:<18} {:>14} {:>8.3}",
            result.scenario.display_name(),
            format_money(result.outcome.predicted.revenue),
            result.outcome.predicted.roi
        );
    }

    for result in &results {
        print_outcome(result.scenario.display_name(), &result.outcome);
    }
    println!();

    Ok(())
}
