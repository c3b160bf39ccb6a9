//! Plain-language recommendations from an optimization outcome

use serde::{Deserialize, Serialize};

use crate::models::Channel;
use crate::optimize::OptimizationOutcome;

/// Relative change (percent of the baseline spend) worth mentioning
pub const SIGNIFICANT_CHANGE_PCT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    RevenueBoost { amount: f64, percent: f64 },
    AlreadyOptimized { amount: f64 },
    RoiImprovement { amount: f64, percent: f64 },
    RoiSteady { amount: f64 },
    /// `percent` is None when the channel had no baseline spend
    IncreaseChannel {
        channel: Channel,
        amount: f64,
        percent: Option<f64>,
    },
    DecreaseChannel {
        channel: Channel,
        amount: f64,
        percent: f64,
    },
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RevenueBoost { amount, percent } => write!(
                f,
                "Revenue boost: the optimized allocation could increase revenue by ${:.0} ({:.1}%)",
                amount, percent
            ),
            Self::AlreadyOptimized { amount } => write!(
                f,
                "The current allocation is already well-optimized. Minimal change expected: ${:.0}",
                amount
            ),
            Self::RoiImprovement { amount, percent } => write!(
                f,
                "ROI improvement: expected ROI increase of {:.3} ({:.1}%)",
                amount, percent
            ),
            Self::RoiSteady { amount } => {
                write!(f, "ROI is already near its best. Change: {:.3}", amount)
            }
            Self::IncreaseChannel {
                channel,
                amount,
                percent: Some(percent),
            } => write!(
                f,
                "{}: increase by {:.1}% (${:.0})",
                channel.display_name(),
                percent,
                amount
            ),
            Self::IncreaseChannel {
                channel,
                amount,
                percent: None,
            } => write!(f, "{}: start spending ${:.0}", channel.display_name(), amount),
            Self::DecreaseChannel {
                channel,
                amount,
                percent,
            } => write!(
                f,
                "{}: decrease by {:.1}% (${:.0})",
                channel.display_name(),
                percent,
                amount
            ),
        }
    }
}

fn percent_of(change: f64, base: f64) -> f64 {
    if base != 0.0 {
        change / base * 100.0
    } else {
        0.0
    }
}

/// Headline revenue and ROI notes, then per-channel moves above the threshold
pub fn recommendations(outcome: &OptimizationOutcome) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let revenue_change = outcome.revenue_improvement;
    if revenue_change > 0.0 && outcome.improved {
        out.push(Recommendation::RevenueBoost {
            amount: revenue_change,
            percent: percent_of(revenue_change, outcome.baseline_prediction.revenue),
        });
    } else {
        out.push(Recommendation::AlreadyOptimized {
            amount: revenue_change,
        });
    }

    let roi_change = outcome.roi_improvement;
    if roi_change > 0.0 && outcome.improved {
        out.push(Recommendation::RoiImprovement {
            amount: roi_change,
            percent: percent_of(roi_change, outcome.baseline_prediction.roi),
        });
    } else {
        out.push(Recommendation::RoiSteady { amount: roi_change });
    }

    for (channel, current) in outcome.baseline.iter() {
        let optimized = outcome.plan.get(channel);
        let change = optimized - current;

        if current == 0.0 {
            if optimized > 0.0 {
                out.push(Recommendation::IncreaseChannel {
                    channel,
                    amount: change,
                    percent: None,
                });
            }
            continue;
        }

        let percent = change / current * 100.0;
        if percent.abs() <= SIGNIFICANT_CHANGE_PCT {
            continue;
        }
        if change > 0.0 {
            out.push(Recommendation::IncreaseChannel {
                channel,
                amount: change,
                percent: Some(percent),
            });
        } else {
            out.push(Recommendation::DecreaseChannel {
                channel,
                amount: -change,
                percent: -percent,
            });
        }
    }

    out
}
