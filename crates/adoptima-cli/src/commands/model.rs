//! Model command implementations (train, predict)

use std::path::Path;

use adoptima_core::predict::{channel_effectiveness, Predictor};
use adoptima_core::{AppConfig, Session};
use anyhow::{Context, Result};

use super::{format_money, load_dataset, parse_allocation, parse_model, parse_scenario};

/// Features listed in the importance table
const TOP_FEATURES: usize = 8;

pub fn cmd_train(
    config: &AppConfig,
    data: Option<&Path>,
    model: &str,
    save: Option<&Path>,
) -> Result<()> {
    let kind = parse_model(model)?;
    let dataset = load_dataset(config, data)?;
    let mut session = Session::start(dataset, config.clone())?;

    println!("🧠 Training {} on {} months...", kind.display_name(), session.dataset().len());

    let report = session
        .evaluate(kind)
        .context("Holdout evaluation failed")?;
    let trained = session.model(kind).context("Training failed")?;

    println!();
    println!("   Holdout ({} train / {} test months):", report.train_rows, report.test_rows);
    println!(
        "     Train  R² {:>7.3}   RMSE {:>12}   MAE {:>12}",
        report.train.r2,
        format_money(report.train.rmse),
        format_money(report.train.mae)
    );
    println!(
        "     Test   R² {:>7.3}   RMSE {:>12}   MAE {:>12}",
        report.test.r2,
        format_money(report.test.rmse),
        format_money(report.test.mae)
    );
    println!("   Full-data R²: {:.3}", trained.metadata().r2);

    println!();
    println!("   Top features:");
    for item in trained.feature_importance().iter().take(TOP_FEATURES) {
        println!("     {:<28} {:>6.1}%", item.feature, item.importance * 100.0);
    }

    println!();
    println!("   Channel effectiveness:");
    for (channel, score) in channel_effectiveness(trained) {
        println!("     {:<14} {:>6.1}%", channel.display_name(), score * 100.0);
    }

    if let Some(path) = save {
        trained
            .save(path)
            .with_context(|| format!("Failed to save model to {}", path.display()))?;
        println!();
        println!("💾 Model saved to {}", path.display());
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    config: &AppConfig,
    data: Option<&Path>,
    model: &str,
    scenario: &str,
    allocation: &str,
) -> Result<()> {
    let kind = parse_model(model)?;
    let scenario = parse_scenario(scenario)?;
    let allocation = parse_allocation(allocation)?;

    let dataset = load_dataset(config, data)?;
    let mut session = Session::start(dataset, config.clone())?;
    let prediction = session
        .predict(kind, &allocation, &scenario.context())
        .context("Prediction failed")?;

    let total: f64 = allocation.values().sum();
    println!();
    println!("🔮 {} prediction ({})", kind.display_name(), scenario.display_name());
    for (channel, spend) in &allocation {
        println!("     {:<14} {:>14}", channel.display_name(), format_money(*spend));
    }
    println!("   Total spend:       {}", format_money(total));
    println!("   Predicted revenue: {}", format_money(prediction.revenue));
    println!("   Predicted ROI:     {:.3}", prediction.roi);
    println!();

    Ok(())
}
