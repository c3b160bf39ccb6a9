//! Dataset summary statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Channel, Dataset, MonthlyRecord};

/// One month picked out of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthHighlight {
    pub month: String,
    pub revenue: f64,
    pub roi: f64,
}

impl From<&MonthlyRecord> for MonthHighlight {
    fn from(record: &MonthlyRecord) -> Self {
        Self {
            month: record.month_label(),
            revenue: record.revenue,
            roi: record.roi,
        }
    }
}

/// Headline numbers for a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub months: usize,
    pub total_spend: f64,
    pub total_revenue: f64,
    /// Mean of the monthly ROI figures
    pub average_roi: f64,
    pub average_monthly_spend: f64,
    pub average_monthly_revenue: f64,
    pub spend_by_channel: BTreeMap<Channel, f64>,
    /// Highest-revenue month
    pub best_month: MonthHighlight,
    /// Lowest-revenue month
    pub worst_month: MonthHighlight,
}

impl SummaryStats {
    /// Share of total spend per channel (0-1)
    pub fn channel_share(&self, channel: Channel) -> f64 {
        if self.total_spend > 0.0 {
            self.spend_by_channel.get(&channel).copied().unwrap_or(0.0) / self.total_spend
        } else {
            0.0
        }
    }
}

pub fn summarize(dataset: &Dataset) -> SummaryStats {
    let records = dataset.records();
    let months = records.len();
    let n = months as f64;

    let total_spend: f64 = records.iter().map(|r| r.total_spend()).sum();
    let total_revenue: f64 = records.iter().map(|r| r.revenue).sum();
    let average_roi = records.iter().map(|r| r.roi).sum::<f64>() / n;

    let spend_by_channel = dataset
        .channels()
        .iter()
        .map(|c| (*c, records.iter().map(|r| r.spend(*c)).sum()))
        .collect();

    let by_revenue = |a: &&MonthlyRecord, b: &&MonthlyRecord| {
        a.revenue
            .partial_cmp(&b.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    // Datasets are never empty, so both always exist
    let best = records.iter().max_by(by_revenue).unwrap_or_else(|| dataset.latest());
    let worst = records.iter().min_by(by_revenue).unwrap_or_else(|| dataset.latest());

    SummaryStats {
        months,
        total_spend,
        total_revenue,
        average_roi,
        average_monthly_spend: total_spend / n,
        average_monthly_revenue: total_revenue / n,
        spend_by_channel,
        best_month: best.into(),
        worst_month: worst.into(),
    }
}
