//! Domain models for AdOptima

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Absolute tolerance for "sums to the budget" checks
pub const BUDGET_TOLERANCE: f64 = 1e-6;

/// A marketing spend category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    SocialMedia,
    SearchAds,
    Email,
    Promotions,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SocialMedia => "social_media",
            Self::SearchAds => "search_ads",
            Self::Email => "email",
            Self::Promotions => "promotions",
        }
    }

    /// Human-readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SocialMedia => "Social Media",
            Self::SearchAds => "Search Ads",
            Self::Email => "Email",
            Self::Promotions => "Promotions",
        }
    }

    /// Get all channels
    pub fn all() -> &'static [Channel] {
        &[
            Self::SocialMedia,
            Self::SearchAds,
            Self::Email,
            Self::Promotions,
        ]
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "social_media" | "social" | "socialmedia" => Ok(Self::SocialMedia),
            "search_ads" | "search" | "searchads" => Ok(Self::SearchAds),
            "email" => Ok(Self::Email),
            "promotions" | "promo" => Ok(Self::Promotions),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seasonal period a month falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    #[default]
    Normal,
    Holiday,
    BackToSchool,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Holiday => "holiday",
            Self::BackToSchool => "back_to_school",
        }
    }

    /// Season of a calendar month (1-12)
    ///
    /// Holiday: Nov-Feb. Back to school: Aug-Sep.
    pub fn for_month(month: u32) -> Self {
        match month {
            11 | 12 | 1 | 2 => Self::Holiday,
            8 | 9 => Self::BackToSchool,
            _ => Self::Normal,
        }
    }
}

impl std::str::FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "normal" | "regular" => Ok(Self::Normal),
            "holiday" | "holiday_season" => Ok(Self::Holiday),
            "back_to_school" => Ok(Self::BackToSchool),
            _ => Err(format!("Unknown season: {}", s)),
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spend per channel, not necessarily summing to any budget
pub type Allocation = BTreeMap<Channel, f64>;

/// One month of marketing activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub month_index: u32,
    /// First day of the calendar month
    pub period: NaiveDate,
    pub channel_spend: Allocation,
    pub revenue: f64,
    pub roi: f64,
    /// Competitor activity index (0-100)
    pub competitor_activity: f64,
    pub season: Season,
}

impl MonthlyRecord {
    pub fn total_spend(&self) -> f64 {
        self.channel_spend.values().sum()
    }

    pub fn spend(&self, channel: Channel) -> f64 {
        self.channel_spend.get(&channel).copied().unwrap_or(0.0)
    }

    /// "YYYY-MM" label used in CSV snapshots
    pub fn month_label(&self) -> String {
        format!("{:04}-{:02}", self.period.year(), self.period.month())
    }
}

/// Revenue divided by spend, zero when nothing was spent
pub fn roi(revenue: f64, spend: f64) -> f64 {
    if spend > 0.0 {
        revenue / spend
    } else {
        0.0
    }
}

/// Chronological sequence of monthly records sharing one channel set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<MonthlyRecord>,
    channels: Vec<Channel>,
}

impl Dataset {
    /// Validate and wrap records
    pub fn new(records: Vec<MonthlyRecord>) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| Error::InvalidData("Dataset has no records".into()))?;
        let channels: Vec<Channel> = first.channel_spend.keys().copied().collect();
        if channels.is_empty() {
            return Err(Error::InvalidData("Dataset has no channels".into()));
        }

        for (i, record) in records.iter().enumerate() {
            let record_channels: Vec<Channel> = record.channel_spend.keys().copied().collect();
            if record_channels != channels {
                return Err(Error::InvalidData(format!(
                    "Month {} has a different channel set",
                    record.month_index
                )));
            }
            if let Some((channel, spend)) = record
                .channel_spend
                .iter()
                .find(|(_, s)| !s.is_finite() || **s < 0.0)
            {
                return Err(Error::InvalidData(format!(
                    "Month {}: invalid {} spend {}",
                    record.month_index, channel, spend
                )));
            }
            if !record.revenue.is_finite() || record.revenue < 0.0 {
                return Err(Error::InvalidData(format!(
                    "Month {}: invalid revenue {}",
                    record.month_index, record.revenue
                )));
            }
            if i > 0 && record.month_index <= records[i - 1].month_index {
                return Err(Error::InvalidData(format!(
                    "Months out of order at index {}",
                    record.month_index
                )));
            }
        }

        Ok(Self { records, channels })
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.records
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> &MonthlyRecord {
        // Non-empty by construction
        &self.records[self.records.len() - 1]
    }

    pub fn revenues(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.revenue).collect()
    }
}

/// Spend assignment whose values sum to a total budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationPlan(Allocation);

impl AllocationPlan {
    /// Wrap an allocation, checking non-negativity and the budget sum
    pub fn new(allocation: Allocation, total_budget: f64) -> Result<Self> {
        if let Some((channel, spend)) = allocation
            .iter()
            .find(|(_, s)| !s.is_finite() || **s < 0.0)
        {
            return Err(Error::InvalidData(format!(
                "Negative or non-finite allocation for {}: {}",
                channel, spend
            )));
        }
        let sum: f64 = allocation.values().sum();
        if (sum - total_budget).abs() > BUDGET_TOLERANCE.max(total_budget.abs() * 1e-12) {
            return Err(Error::InvalidData(format!(
                "Allocation sums to {:.6}, expected {:.6}",
                sum, total_budget
            )));
        }
        Ok(Self(allocation))
    }

    /// All-zero plan for the given channels
    pub fn zeros(channels: &[Channel]) -> Self {
        Self(channels.iter().map(|c| (*c, 0.0)).collect())
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0.get(&channel).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }

    pub fn as_allocation(&self) -> &Allocation {
        &self.0
    }

    pub fn into_allocation(self) -> Allocation {
        self.0
    }

    /// L1 distance to another allocation over the union of channels
    pub fn distance(&self, other: &Allocation) -> f64 {
        l1_distance(&self.0, other)
    }
}

/// L1 distance between allocations, missing channels count as zero
pub fn l1_distance(a: &Allocation, b: &Allocation) -> f64 {
    let mut total = 0.0;
    for (channel, value) in a {
        total += (value - b.get(channel).copied().unwrap_or(0.0)).abs();
    }
    for (channel, value) in b {
        if !a.contains_key(channel) {
            total += value.abs();
        }
    }
    total
}

/// Market conditions a prediction is made under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    pub season: Season,
    pub competitor_activity: f64,
    /// Previous month's spend, used for lag features
    #[serde(default)]
    pub previous_spend: Option<Allocation>,
}

impl Default for PredictionContext {
    fn default() -> Self {
        Self {
            season: Season::Normal,
            competitor_activity: 50.0,
            previous_spend: None,
        }
    }
}

impl PredictionContext {
    pub fn with_previous_spend(mut self, previous: Allocation) -> Self {
        self.previous_spend = Some(previous);
        self
    }
}

/// Predicted outcome of an allocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub revenue: f64,
    pub roi: f64,
}
