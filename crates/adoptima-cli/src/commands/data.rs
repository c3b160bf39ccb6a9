//! Dataset command implementations (generate, summary)

use std::path::Path;

use adoptima_core::{generate_with, save_csv, summarize, write_csv, AppConfig};
use anyhow::{Context, Result};

use super::{format_money, load_dataset};

pub fn cmd_generate(
    config: &AppConfig,
    months: Option<usize>,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let months = months.unwrap_or(config.data.months);
    let seed = seed.unwrap_or(config.data.seed);
    let dataset =
        generate_with(&config.generator, months, seed).context("Failed to generate dataset")?;

    match output {
        Some(path) => {
            save_csv(&dataset, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✅ Generated {} months (seed {}) → {}",
                dataset.len(),
                seed,
                path.display()
            );
        }
        None => {
            write_csv(&dataset, std::io::stdout().lock()).context("Failed to write CSV")?;
        }
    }

    Ok(())
}

pub fn cmd_summary(config: &AppConfig, data: Option<&Path>) -> Result<()> {
    let dataset = load_dataset(config, data)?;
    let stats = summarize(&dataset);

    println!();
    println!("📊 Campaign Summary");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Period:          {} to {} ({} months)",
        dataset.records()[0].month_label(),
        dataset.latest().month_label(),
        stats.months
    );
    println!("   Total spend:     {}", format_money(stats.total_spend));
    println!("   Total revenue:   {}", format_money(stats.total_revenue));
    println!("   Average ROI:     {:.2}", stats.average_roi);
    println!(
        "   Monthly average: {} spend, {} revenue",
        format_money(stats.average_monthly_spend),
        format_money(stats.average_monthly_revenue)
    );
    println!();
    println!("   Spend by channel:");
    for (channel, spend) in &stats.spend_by_channel {
        println!(
            "     {:<14} {:>14}  {:>5.1}%",
            channel.display_name(),
            format_money(*spend),
            stats.channel_share(*channel) * 100.0
        );
    }
    println!();
    println!(
        "   Best month:      {} ({}, ROI {:.2})",
        stats.best_month.month,
        format_money(stats.best_month.revenue),
        stats.best_month.roi
    );
    println!(
        "   Worst month:     {} ({}, ROI {:.2})",
        stats.worst_month.month,
        format_money(stats.worst_month.revenue),
        stats.worst_month.roi
    );
    println!();

    Ok(())
}
