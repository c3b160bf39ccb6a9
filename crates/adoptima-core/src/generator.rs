//! Synthetic marketing dataset generator
//!
//! Produces a monthly time series of per-channel spend and the revenue it
//! drives. Patterns simulated:
//! - Seasonal budgets (social and promotions ramp up over the holidays)
//! - Social media converts better in holiday months
//! - Diminishing returns: revenue grows with the square root of spend
//! - Competitor activity erodes revenue above its long-run mean
//! - Bounded multiplicative noise
//!
//! Output is a pure function of the configuration and seed.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::config::{ChannelParams, GeneratorConfig};
use crate::error::{Error, Result};
use crate::models::{roi, Allocation, Channel, Dataset, MonthlyRecord, Season};

/// Upper bound on generated months (50 years)
pub const MAX_MONTHS: usize = 600;

/// Generate a dataset with the default generator configuration
pub fn generate(num_months: usize, seed: u64) -> Result<Dataset> {
    generate_with(&GeneratorConfig::default(), num_months, seed)
}

/// Generate a dataset with an explicit configuration
pub fn generate_with(config: &GeneratorConfig, num_months: usize, seed: u64) -> Result<Dataset> {
    validate(config, num_months)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let competitor = normal(config.competitor_mean, config.competitor_std)?;
    let noise = normal(0.0, config.noise_std)?;

    let mut records = Vec::with_capacity(num_months);

    for i in 0..num_months {
        let period = month_start(config.start_year, config.start_month, i)?;
        let season = Season::for_month(chrono::Datelike::month(&period));

        let mut channel_spend = Allocation::new();
        for (channel, params) in &config.channels {
            let base = params.base + normal(0.0, params.base_std)?.sample(&mut rng);
            let seasonal = base * spend_multiplier(params, season);
            let jitter = normal(0.0, params.jitter_std)?.sample(&mut rng);
            let spend = (seasonal + jitter).max(params.floor).max(0.0);
            channel_spend.insert(*channel, round_to(spend, 2));
        }

        let competitor_activity = round_to(competitor.sample(&mut rng).clamp(0.0, 100.0), 1);

        let gross: f64 = config
            .channels
            .iter()
            .map(|(channel, params)| {
                revenue_contribution(params, season, channel_spend[channel])
            })
            .sum();
        let competitor_impact = 1.0 - (competitor_activity - config.competitor_mean) / 200.0;
        let noise_factor =
            1.0 + noise.sample(&mut rng).clamp(-config.noise_bound, config.noise_bound);

        let revenue = round_to((gross * competitor_impact * noise_factor).max(0.0), 2);
        let total_spend: f64 = channel_spend.values().sum();

        records.push(MonthlyRecord {
            month_index: i as u32,
            period,
            channel_spend,
            revenue,
            roi: round_to(roi(revenue, total_spend), 4),
            competitor_activity,
            season,
        });
    }

    debug!(months = num_months, seed, "Generated synthetic dataset");
    Dataset::new(records)
}

/// Revenue a channel drives at a given spend
///
/// `k * sqrt(spend)` where `k` makes revenue/spend equal the channel ROI at
/// the reference spend. Zero spend yields zero revenue.
pub fn revenue_contribution(params: &ChannelParams, season: Season, spend: f64) -> f64 {
    if spend <= 0.0 {
        return 0.0;
    }
    let roi = if season == Season::Holiday {
        params.roi * params.holiday_roi_boost
    } else {
        params.roi
    };
    let k = roi * params.reference.sqrt();
    k * spend.sqrt()
}

fn spend_multiplier(params: &ChannelParams, season: Season) -> f64 {
    match season {
        Season::Holiday => params.holiday_multiplier,
        Season::BackToSchool => params.back_to_school_multiplier,
        Season::Normal => 1.0,
    }
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std)
        .map_err(|e| Error::DataGeneration(format!("Invalid distribution ({}, {}): {}", mean, std, e)))
}

/// First day of the month `offset` months after the start month
fn month_start(start_year: i32, start_month: u32, offset: usize) -> Result<NaiveDate> {
    let months = (start_month as i64 - 1) + offset as i64;
    let year = start_year as i64 + months.div_euclid(12);
    let month = months.rem_euclid(12) as u32 + 1;
    i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month, 1))
        .ok_or_else(|| Error::DataGeneration(format!("Month {} out of calendar range", offset)))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn validate(config: &GeneratorConfig, num_months: usize) -> Result<()> {
    if num_months == 0 {
        return Err(Error::DataGeneration("num_months must be at least 1".into()));
    }
    if num_months > MAX_MONTHS {
        return Err(Error::DataGeneration(format!(
            "num_months must be at most {}, got {}",
            MAX_MONTHS, num_months
        )));
    }
    if !(1..=12).contains(&config.start_month) {
        return Err(Error::DataGeneration(format!(
            "start_month must be 1-12, got {}",
            config.start_month
        )));
    }
    if config.channels.is_empty() {
        return Err(Error::DataGeneration("No channels configured".into()));
    }

    let globals = [
        ("noise_std", config.noise_std),
        ("noise_bound", config.noise_bound),
        ("competitor_std", config.competitor_std),
    ];
    for (name, value) in globals {
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::DataGeneration(format!(
                "{} must be a non-negative number, got {}",
                name, value
            )));
        }
    }

    for (channel, p) in &config.channels {
        check_channel(*channel, p)?;
    }

    Ok(())
}

fn check_channel(channel: Channel, p: &ChannelParams) -> Result<()> {
    let fields = [
        ("base", p.base),
        ("base_std", p.base_std),
        ("jitter_std", p.jitter_std),
        ("floor", p.floor),
        ("roi", p.roi),
        ("reference", p.reference),
        ("holiday_multiplier", p.holiday_multiplier),
        ("back_to_school_multiplier", p.back_to_school_multiplier),
        ("holiday_roi_boost", p.holiday_roi_boost),
    ];
    for (name, value) in fields {
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::DataGeneration(format!(
                "{}.{} must be a non-negative number, got {}",
                channel, name, value
            )));
        }
    }
    Ok(())
}
