//! Feature preparation
//!
//! Turns monthly records into model-ready numeric rows. The layout for a
//! channel set `C` (in `Channel` order) is:
//!
//! | block | names |
//! |-------|-------|
//! | spend | `<c>_spend` |
//! | lag   | `<c>_spend_lag1` |
//! | square | `<c>_spend_sq` |
//! | season | `season_holiday`, `season_back_to_school` |
//! | market | `competitor_activity` |
//! | interaction | `social_media_x_holiday` (only when social media is present) |
//!
//! Normal season is the implicit baseline of the one-hot block.
//!
//! Lag policy: the first record has no predecessor, so its lag-1 spend is its
//! own current spend. The same rule applies at inference time when no
//! previous spend is supplied.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Allocation, Channel, Dataset, PredictionContext, Season};

/// Ordered feature names for a channel set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    channels: Vec<Channel>,
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn for_channels(channels: &[Channel]) -> Self {
        let mut channels = channels.to_vec();
        channels.sort();
        channels.dedup();

        let mut names = Vec::with_capacity(channels.len() * 3 + 4);
        names.extend(channels.iter().map(|c| format!("{}_spend", c)));
        names.extend(channels.iter().map(|c| format!("{}_spend_lag1", c)));
        names.extend(channels.iter().map(|c| format!("{}_spend_sq", c)));
        names.push("season_holiday".to_string());
        names.push("season_back_to_school".to_string());
        names.push("competitor_activity".to_string());
        if channels.contains(&Channel::SocialMedia) {
            names.push("social_media_x_holiday".to_string());
        }

        Self { channels, names }
    }

    pub fn for_dataset(dataset: &Dataset) -> Self {
        Self::for_channels(dataset.channels())
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn position(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|c| *c == channel)
    }

    pub fn spend_index(&self, channel: Channel) -> Option<usize> {
        self.position(channel)
    }

    pub fn lag_index(&self, channel: Channel) -> Option<usize> {
        self.position(channel).map(|i| self.channels.len() + i)
    }

    pub fn square_index(&self, channel: Channel) -> Option<usize> {
        self.position(channel).map(|i| 2 * self.channels.len() + i)
    }

    pub fn holiday_index(&self) -> usize {
        3 * self.channels.len()
    }

    pub fn back_to_school_index(&self) -> usize {
        3 * self.channels.len() + 1
    }

    pub fn competitor_index(&self) -> usize {
        3 * self.channels.len() + 2
    }

    pub fn interaction_index(&self) -> Option<usize> {
        self.position(Channel::SocialMedia)
            .map(|_| 3 * self.channels.len() + 3)
    }

    /// Channel a feature belongs to, if any
    pub fn channel_of(&self, index: usize) -> Option<Channel> {
        let n = self.channels.len();
        if index < 3 * n {
            Some(self.channels[index % n])
        } else if Some(index) == self.interaction_index() {
            Some(Channel::SocialMedia)
        } else {
            None
        }
    }

    /// Reject a feature list that differs from this schema in names or order
    pub fn ensure_matches(&self, names: &[String]) -> Result<()> {
        if names == self.names.as_slice() {
            return Ok(());
        }
        let first_diff = self
            .names
            .iter()
            .zip(names)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| self.names.len().min(names.len()));
        Err(Error::FeatureMismatch(format!(
            "expected {} features, got {} (first difference at position {})",
            self.names.len(),
            names.len(),
            first_diff
        )))
    }
}

/// One model-ready row of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build one row per record, aligned with the dataset
pub fn prepare(dataset: &Dataset) -> Vec<FeatureRow> {
    let schema = FeatureSchema::for_dataset(dataset);
    let records = dataset.records();

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let lag = if i == 0 {
                &record.channel_spend
            } else {
                &records[i - 1].channel_spend
            };
            build_row(
                &schema,
                &record.channel_spend,
                lag,
                record.season,
                record.competitor_activity,
            )
        })
        .collect()
}

/// Build the inference row for an arbitrary allocation
///
/// Channels missing from `allocation` count as zero spend.
pub fn row_for_allocation(
    schema: &FeatureSchema,
    allocation: &Allocation,
    context: &PredictionContext,
) -> FeatureRow {
    let lag = context.previous_spend.as_ref().unwrap_or(allocation);
    build_row(
        schema,
        allocation,
        lag,
        context.season,
        context.competitor_activity,
    )
}

fn build_row(
    schema: &FeatureSchema,
    spend: &Allocation,
    lag: &Allocation,
    season: Season,
    competitor_activity: f64,
) -> FeatureRow {
    let spend_of = |c: &Channel| spend.get(c).copied().unwrap_or(0.0);
    let holiday = if season == Season::Holiday { 1.0 } else { 0.0 };

    let mut values = Vec::with_capacity(schema.len());
    values.extend(schema.channels().iter().map(spend_of));
    values.extend(
        schema
            .channels()
            .iter()
            .map(|c| lag.get(c).copied().unwrap_or(0.0)),
    );
    values.extend(schema.channels().iter().map(|c| spend_of(c).powi(2)));
    values.push(holiday);
    values.push(if season == Season::BackToSchool { 1.0 } else { 0.0 });
    values.push(competitor_activity);
    if schema.interaction_index().is_some() {
        values.push(spend_of(&Channel::SocialMedia) * holiday);
    }

    FeatureRow { values }
}
