//! Market scenarios
//!
//! A scenario is a named market condition (season and competitor pressure)
//! the same budget can be optimized under, so plans can be compared side by
//! side.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::{Channel, PredictionContext, Season};
use crate::optimize::{optimize, Constraints, OptimizationOutcome};
use crate::predict::Predictor;

/// Competitor activity index in an ordinary month
pub const NORMAL_COMPETITION: f64 = 50.0;
/// Competitor activity index under heavy competition
pub const HIGH_COMPETITION: f64 = 65.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    #[default]
    Normal,
    Holiday,
    BackToSchool,
    HighCompetition,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Holiday => "holiday",
            Self::BackToSchool => "back_to_school",
            Self::HighCompetition => "high_competition",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal Market",
            Self::Holiday => "Holiday Season",
            Self::BackToSchool => "Back to School",
            Self::HighCompetition => "High Competition",
        }
    }

    pub fn all() -> &'static [Scenario] {
        &[
            Self::Normal,
            Self::Holiday,
            Self::BackToSchool,
            Self::HighCompetition,
        ]
    }

    pub fn context(&self) -> PredictionContext {
        let (season, competitor_activity) = match self {
            Self::Normal => (Season::Normal, NORMAL_COMPETITION),
            Self::Holiday => (Season::Holiday, NORMAL_COMPETITION),
            Self::BackToSchool => (Season::BackToSchool, NORMAL_COMPETITION),
            Self::HighCompetition => (Season::Normal, HIGH_COMPETITION),
        };
        PredictionContext {
            season,
            competitor_activity,
            previous_spend: None,
        }
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(Self::Normal),
            "holiday" | "holidays" => Ok(Self::Holiday),
            "back_to_school" | "bts" => Ok(Self::BackToSchool),
            "high_competition" | "competition" => Ok(Self::HighCompetition),
            _ => Err(format!(
                "Unknown scenario: {}. Available: normal, holiday, back_to_school, high_competition",
                s
            )),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of a scenario comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub outcome: OptimizationOutcome,
}

/// Optimize the same budget under every scenario
///
/// The context of `constraints` is replaced per scenario; previous spend is
/// carried over so lag features stay consistent across rows.
pub fn compare_scenarios(
    model: &dyn Predictor,
    total_budget: f64,
    channels: &[Channel],
    constraints: &Constraints,
) -> Result<Vec<ScenarioOutcome>> {
    Scenario::all()
        .iter()
        .map(|scenario| {
            let mut context = scenario.context();
            context.previous_spend = constraints.context.previous_spend.clone();
            let scenario_constraints = constraints.clone().with_context(context);

            let outcome = optimize(model, total_budget, channels, &scenario_constraints)?;
            info!(
                scenario = scenario.as_str(),
                revenue = outcome.predicted.revenue,
                roi = outcome.predicted.roi,
                "Scenario optimized"
            );
            Ok(ScenarioOutcome {
                scenario: *scenario,
                outcome,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, OptimizerSettings};
    use crate::generator::generate;
    use crate::predict::{ModelKind, TrainedModel, TrainingSet};

    #[test]
    fn test_contexts() {
        assert_eq!(Scenario::Holiday.context().season, Season::Holiday);
        assert_eq!(
            Scenario::HighCompetition.context().competitor_activity,
            HIGH_COMPETITION
        );
        assert_eq!(Scenario::HighCompetition.context().season, Season::Normal);
        assert_eq!(Scenario::default().context(), PredictionContext::default());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "back-to-school".parse::<Scenario>().unwrap(),
            Scenario::BackToSchool
        );
        assert_eq!(
            "High_Competition".parse::<Scenario>().unwrap(),
            Scenario::HighCompetition
        );
        assert!("recession".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_compare_scenarios_covers_all() {
        let dataset = generate(24, 42).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        let model = TrainedModel::train(ModelKind::Linear, &set, &AppConfig::default()).unwrap();
        let constraints = Constraints::default().with_settings(OptimizerSettings {
            samples: 100,
            ..Default::default()
        });

        let results = compare_scenarios(&model, 100_000.0, Channel::all(), &constraints).unwrap();
        assert_eq!(results.len(), 4);
        for (result, scenario) in results.iter().zip(Scenario::all()) {
            assert_eq!(result.scenario, *scenario);
            assert!((result.outcome.plan.total() - 100_000.0).abs() < 1e-6);
        }
    }
}
