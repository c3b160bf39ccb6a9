//! Budget allocation search
//!
//! Finds the split of a fixed budget across channels that maximizes a
//! model's predicted revenue, subject to per-channel bounds.
//!
//! The strategy follows the model's capabilities: a model exposing an
//! analytic gradient is climbed with projected gradient ascent, anything
//! else is searched with a seeded random sample of feasible allocations.
//! Both start from a baseline (the current allocation, or an equal split)
//! and return it unchanged when nothing predicts better.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OptimizerSettings;
use crate::error::{Error, Result};
use crate::models::{l1_distance, Allocation, AllocationPlan, Channel, Prediction, PredictionContext};
use crate::predict::Predictor;

/// Bisection rounds when projecting onto the feasible set
const PROJECTION_ROUNDS: usize = 200;

/// Bounds, market context and search settings for one optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Minimum spend per channel (0 when absent)
    #[serde(default)]
    pub min: Allocation,
    /// Maximum spend per channel (unbounded when absent)
    #[serde(default)]
    pub max: Allocation,
    #[serde(default)]
    pub context: PredictionContext,
    /// Allocation currently in effect; the equal split is used when absent
    #[serde(default)]
    pub current: Option<Allocation>,
    #[serde(default)]
    pub settings: OptimizerSettings,
}

impl Constraints {
    pub fn with_min(mut self, channel: Channel, value: f64) -> Self {
        self.min.insert(channel, value);
        self
    }

    pub fn with_max(mut self, channel: Channel, value: f64) -> Self {
        self.max.insert(channel, value);
        self
    }

    pub fn with_context(mut self, context: PredictionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_current(mut self, current: Allocation) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_settings(mut self, settings: OptimizerSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// How the plan was searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Nothing to search (zero budget)
    None,
    GradientAscent,
    RandomSearch,
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::GradientAscent => "gradient ascent",
            Self::RandomSearch => "random search",
        };
        write!(f, "{}", s)
    }
}

/// Non-fatal conditions reported with an outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum OptimizationWarning {
    /// Gradient ascent hit its iteration cap before the step size converged
    ConvergenceLimitReached { iterations: usize },
}

impl std::fmt::Display for OptimizationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConvergenceLimitReached { iterations } => write!(
                f,
                "Optimization stopped after {} iterations without converging; \
                 the plan is the best found so far",
                iterations
            ),
        }
    }
}

/// Result of an optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub plan: AllocationPlan,
    pub baseline: AllocationPlan,
    pub predicted: Prediction,
    pub baseline_prediction: Prediction,
    /// Predicted revenue gain over the baseline, in dollars
    pub revenue_improvement: f64,
    /// Predicted ROI gain over the baseline
    pub roi_improvement: f64,
    /// False when the baseline was kept
    pub improved: bool,
    pub method: SearchMethod,
    pub iterations: usize,
    #[serde(default)]
    pub warnings: Vec<OptimizationWarning>,
}

/// Per-channel lower and upper bounds, aligned with a channel list
#[derive(Debug, Clone)]
struct Bounds {
    channels: Vec<Channel>,
    lo: Vec<f64>,
    hi: Vec<f64>,
}

impl Bounds {
    fn resolve(channels: &[Channel], constraints: &Constraints, budget: f64) -> Result<Self> {
        for channel in constraints.min.keys().chain(constraints.max.keys()) {
            if !channels.contains(channel) {
                return Err(Error::InvalidData(format!(
                    "Constraint given for {}, which is not being optimized",
                    channel
                )));
            }
        }

        let lo: Vec<f64> = channels
            .iter()
            .map(|c| constraints.min.get(c).copied().unwrap_or(0.0))
            .collect();
        let hi: Vec<f64> = channels
            .iter()
            .map(|c| constraints.max.get(c).copied().unwrap_or(f64::INFINITY))
            .collect();

        for ((channel, &min), &max) in channels.iter().zip(&lo).zip(&hi) {
            if !min.is_finite() || min < 0.0 {
                return Err(Error::InfeasibleConstraint(format!(
                    "Minimum for {} must be a non-negative number, got {}",
                    channel, min
                )));
            }
            if max.is_nan() || min > max {
                return Err(Error::InfeasibleConstraint(format!(
                    "Minimum for {} ({}) exceeds its maximum ({})",
                    channel, min, max
                )));
            }
        }

        let min_total: f64 = lo.iter().sum();
        if min_total > budget + tolerance(budget) {
            return Err(Error::InfeasibleConstraint(format!(
                "Channel minimums sum to {:.2}, above the budget of {:.2}",
                min_total, budget
            )));
        }
        let max_total: f64 = hi.iter().sum();
        if max_total.is_finite() && max_total < budget - tolerance(budget) {
            return Err(Error::InfeasibleConstraint(format!(
                "Channel maximums sum to {:.2}, below the budget of {:.2}",
                max_total, budget
            )));
        }

        Ok(Self {
            channels: channels.to_vec(),
            lo,
            hi,
        })
    }

    fn to_allocation(&self, values: &[f64]) -> Allocation {
        self.channels.iter().copied().zip(values.iter().copied()).collect()
    }

    fn values_of(&self, allocation: &Allocation) -> Vec<f64> {
        self.channels
            .iter()
            .map(|c| allocation.get(c).copied().unwrap_or(0.0))
            .collect()
    }

    fn is_feasible(&self, values: &[f64], budget: f64) -> bool {
        let within = values
            .iter()
            .zip(self.lo.iter().zip(&self.hi))
            .all(|(x, (lo, hi))| x.is_finite() && x >= lo && x <= hi);
        within && (values.iter().sum::<f64>() - budget).abs() <= tolerance(budget) * 1e-3
    }

    /// Closest point of `{Σx = budget, lo ≤ x ≤ hi}` to `y`
    ///
    /// Bisects the shift `τ` in `clamp(y - τ, lo, hi)`, then hands any
    /// remaining rounding residual to channels with room.
    fn project(&self, y: &[f64], budget: f64) -> Vec<f64> {
        if self.is_feasible(y, budget) {
            return y.to_vec();
        }

        let clamped = |tau: f64| -> Vec<f64> {
            y.iter()
                .zip(self.lo.iter().zip(&self.hi))
                .map(|(v, (lo, hi))| (v - tau).clamp(*lo, *hi))
                .collect()
        };

        // At tau_high every channel sits at its minimum, at tau_low the sum reaches the budget
        let mut tau_high = y
            .iter()
            .zip(&self.lo)
            .map(|(v, lo)| v - lo)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut tau_low = y.iter().cloned().fold(f64::INFINITY, f64::min) - budget;

        for _ in 0..PROJECTION_ROUNDS {
            let mid = 0.5 * (tau_low + tau_high);
            if clamped(mid).iter().sum::<f64>() > budget {
                tau_low = mid;
            } else {
                tau_high = mid;
            }
            if tau_high - tau_low <= f64::EPSILON * tau_high.abs().max(1.0) {
                break;
            }
        }

        let mut x = clamped(0.5 * (tau_low + tau_high));
        let mut residual = budget - x.iter().sum::<f64>();
        for i in 0..x.len() {
            if residual == 0.0 {
                break;
            }
            let room = if residual > 0.0 {
                (self.hi[i] - x[i]).min(residual)
            } else {
                -(x[i] - self.lo[i]).min(-residual)
            };
            x[i] += room;
            residual -= room;
        }
        x
    }
}

fn tolerance(budget: f64) -> f64 {
    crate::models::BUDGET_TOLERANCE.max(budget.abs() * 1e-12)
}

/// Scores allocations with the model under a fixed context
struct Objective<'a> {
    model: &'a dyn Predictor,
    bounds: &'a Bounds,
    context: &'a PredictionContext,
}

impl Objective<'_> {
    fn predict(&self, values: &[f64]) -> Result<Prediction> {
        self.model
            .predict(&self.bounds.to_allocation(values), self.context)
    }

    fn revenue(&self, values: &[f64]) -> Result<f64> {
        Ok(self.predict(values)?.revenue)
    }
}

/// Best allocation found, with its score and the number of steps taken
struct Search {
    values: Vec<f64>,
    revenue: f64,
    iterations: usize,
    converged: bool,
}

/// Find the revenue-maximizing split of `total_budget` over `channels`
pub fn optimize(
    model: &dyn Predictor,
    total_budget: f64,
    channels: &[Channel],
    constraints: &Constraints,
) -> Result<OptimizationOutcome> {
    if !total_budget.is_finite() || total_budget < 0.0 {
        return Err(Error::InvalidData(format!(
            "Budget must be a non-negative number, got {}",
            total_budget
        )));
    }
    let mut channels = channels.to_vec();
    channels.sort();
    channels.dedup();
    if channels.is_empty() {
        return Err(Error::InvalidData("No channels to allocate across".into()));
    }

    let bounds = Bounds::resolve(&channels, constraints, total_budget)?;
    let objective = Objective {
        model,
        bounds: &bounds,
        context: &constraints.context,
    };
    let settings = &constraints.settings;

    if total_budget == 0.0 {
        let zeros = vec![0.0; channels.len()];
        let prediction = objective.predict(&zeros)?;
        let plan = AllocationPlan::zeros(&channels);
        return Ok(OptimizationOutcome {
            plan: plan.clone(),
            baseline: plan,
            predicted: prediction,
            baseline_prediction: prediction,
            revenue_improvement: 0.0,
            roi_improvement: 0.0,
            improved: false,
            method: SearchMethod::None,
            iterations: 0,
            warnings: Vec::new(),
        });
    }

    let baseline = baseline_values(&bounds, constraints.current.as_ref(), total_budget);
    let baseline_revenue = objective.revenue(&baseline)?;

    let gradient_available = model
        .revenue_gradient(&bounds.to_allocation(&baseline), &constraints.context)
        .is_some();
    let (method, search) = if gradient_available {
        let search = gradient_ascent(
            &objective,
            &constraints.context,
            baseline.clone(),
            baseline_revenue,
            total_budget,
            settings,
        )?;
        (SearchMethod::GradientAscent, search)
    } else {
        let search = random_search(
            &objective,
            baseline.clone(),
            baseline_revenue,
            total_budget,
            settings,
        )?;
        (SearchMethod::RandomSearch, search)
    };

    let mut warnings = Vec::new();
    if !search.converged {
        let warning = OptimizationWarning::ConvergenceLimitReached {
            iterations: search.iterations,
        };
        warn!(iterations = search.iterations, "{}", warning);
        warnings.push(warning);
    }

    let improved = search.revenue > baseline_revenue + settings.epsilon;
    let chosen = if improved { search.values } else { baseline.clone() };

    let predicted = objective.predict(&chosen)?;
    let baseline_prediction = objective.predict(&baseline)?;
    let plan = AllocationPlan::new(bounds.to_allocation(&chosen), total_budget)?;
    let baseline_plan = AllocationPlan::new(bounds.to_allocation(&baseline), total_budget)?;

    info!(
        method = %method,
        budget = total_budget,
        revenue = predicted.revenue,
        baseline_revenue = baseline_prediction.revenue,
        improved,
        "Optimization complete"
    );

    Ok(OptimizationOutcome {
        plan,
        baseline: baseline_plan,
        predicted,
        baseline_prediction,
        revenue_improvement: predicted.revenue - baseline_prediction.revenue,
        roi_improvement: predicted.roi - baseline_prediction.roi,
        improved,
        method,
        iterations: search.iterations,
        warnings,
    })
}

/// Current allocation rescaled to the budget, or the equal split, made feasible
fn baseline_values(bounds: &Bounds, current: Option<&Allocation>, budget: f64) -> Vec<f64> {
    let n = bounds.channels.len();
    let equal = vec![budget / n as f64; n];

    let start = match current {
        Some(current) => {
            let values = bounds.values_of(current);
            let total: f64 = values.iter().sum();
            if total > 0.0 && values.iter().all(|v| v.is_finite() && *v >= 0.0) {
                values.iter().map(|v| v * budget / total).collect()
            } else {
                equal
            }
        }
        None => equal,
    };

    bounds.project(&start, budget)
}

/// Projected gradient ascent with step halving
///
/// The gradient is rescaled so its largest component is 1, which makes the
/// step a dollar amount. A step that fails to raise revenue is halved; the
/// search converges once the step drops below the tolerance or a move no
/// longer changes the allocation.
fn gradient_ascent(
    objective: &Objective<'_>,
    context: &PredictionContext,
    start: Vec<f64>,
    start_revenue: f64,
    budget: f64,
    settings: &OptimizerSettings,
) -> Result<Search> {
    let bounds = objective.bounds;
    let mut x = start;
    let mut revenue = start_revenue;
    let mut step = settings.step_fraction * budget;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < settings.max_iterations {
        iterations += 1;

        let Some(gradient) = objective
            .model
            .revenue_gradient(&bounds.to_allocation(&x), context)
        else {
            converged = true;
            break;
        };
        let g = bounds.values_of(&gradient);
        let scale = g.iter().map(|v| v.abs()).fold(0.0, f64::max);
        if scale == 0.0 || !scale.is_finite() {
            converged = true;
            break;
        }

        let target: Vec<f64> = x
            .iter()
            .zip(&g)
            .map(|(xi, gi)| xi + step * gi / scale)
            .collect();
        let candidate = bounds.project(&target, budget);
        let moved: f64 = candidate.iter().zip(&x).map(|(a, b)| (a - b).abs()).sum();
        if moved < settings.tolerance {
            converged = true;
            break;
        }

        let candidate_revenue = objective.revenue(&candidate)?;
        if candidate_revenue > revenue {
            debug!(iteration = iterations, step, revenue = candidate_revenue, "Accepted step");
            x = candidate;
            revenue = candidate_revenue;
        } else {
            step *= 0.5;
            if step < settings.tolerance {
                converged = true;
                break;
            }
        }
    }

    Ok(Search {
        values: x,
        revenue,
        iterations,
        converged,
    })
}

/// Seeded sampling of feasible allocations plus the single-channel corners
///
/// Candidates split the budget above the minimums with exponential weights
/// (uniform over the simplex) and are projected onto the maximums. Among
/// candidates within `epsilon` of each other the one closest to the baseline
/// wins.
fn random_search(
    objective: &Objective<'_>,
    baseline: Vec<f64>,
    baseline_revenue: f64,
    budget: f64,
    settings: &OptimizerSettings,
) -> Result<Search> {
    let bounds = objective.bounds;
    let n = bounds.channels.len();
    let free = (budget - bounds.lo.iter().sum::<f64>()).max(0.0);
    let mut rng = StdRng::seed_from_u64(settings.seed);

    let mut best_distance = 0.0;
    let mut best = Search {
        values: baseline.clone(),
        revenue: baseline_revenue,
        iterations: 0,
        converged: true,
    };

    let mut consider = |values: Vec<f64>, best: &mut Search| -> Result<()> {
        let revenue = objective.revenue(&values)?;
        let distance = l1_distance(
            &bounds.to_allocation(&values),
            &bounds.to_allocation(&baseline),
        );
        let better = revenue > best.revenue + settings.epsilon
            || ((revenue - best.revenue).abs() <= settings.epsilon && distance < best_distance);
        if better {
            best.values = values;
            best.revenue = revenue;
            best_distance = distance;
        }
        best.iterations += 1;
        Ok(())
    };

    for corner in 0..n {
        let mut values = bounds.lo.clone();
        values[corner] += free;
        consider(bounds.project(&values, budget), &mut best)?;
    }

    for _ in 0..settings.samples {
        let weights: Vec<f64> = (0..n).map(|_| rng.sample::<f64, _>(Exp1)).collect();
        let total: f64 = weights.iter().sum();
        let values: Vec<f64> = if total > 0.0 {
            bounds
                .lo
                .iter()
                .zip(&weights)
                .map(|(lo, w)| lo + free * w / total)
                .collect()
        } else {
            baseline.clone()
        };
        consider(bounds.project(&values, budget), &mut best)?;
    }

    debug!(
        candidates = best.iterations,
        revenue = best.revenue,
        "Random search finished"
    );
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::generator::generate;
    use crate::models::Season;
    use crate::features::FeatureSchema;
    use crate::predict::{FeatureImportance, ModelKind, ModelMetadata, TrainedModel, TrainingSet};

    fn model(kind: ModelKind) -> TrainedModel {
        let dataset = generate(24, 42).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        TrainedModel::train(kind, &set, &AppConfig::default()).unwrap()
    }

    fn fast_settings() -> OptimizerSettings {
        OptimizerSettings {
            samples: 200,
            ..Default::default()
        }
    }

    fn bounds(lo: &[f64], hi: &[f64]) -> Bounds {
        Bounds {
            channels: Channel::all()[..lo.len()].to_vec(),
            lo: lo.to_vec(),
            hi: hi.to_vec(),
        }
    }

    #[test]
    fn test_project_keeps_feasible_point() {
        let b = bounds(&[0.0; 4], &[f64::INFINITY; 4]);
        let y = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(b.project(&y, 100.0), y);
    }

    #[test]
    fn test_project_respects_bounds_and_budget() {
        let b = bounds(&[5.0, 0.0, 0.0], &[f64::INFINITY, 10.0, 50.0]);
        let x = b.project(&[-20.0, 80.0, 300.0], 60.0);
        assert!((x.iter().sum::<f64>() - 60.0).abs() < 1e-9);
        assert!(x[0] >= 5.0);
        assert!(x[1] <= 10.0 + 1e-12);
        assert!(x[2] <= 50.0 + 1e-12);
    }

    #[test]
    fn test_project_shifts_uniformly() {
        let b = bounds(&[0.0; 2], &[f64::INFINITY; 2]);
        let x = b.project(&[70.0, 50.0], 100.0);
        assert!((x[0] - 60.0).abs() < 1e-6);
        assert!((x[1] - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_budget_rejected() {
        let m = model(ModelKind::Linear);
        let result = optimize(&m, -1.0, Channel::all(), &Constraints::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
        let result = optimize(&m, f64::NAN, Channel::all(), &Constraints::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_empty_channels_rejected() {
        let m = model(ModelKind::Linear);
        let result = optimize(&m, 1000.0, &[], &Constraints::default());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_infeasible_bounds() {
        let m = model(ModelKind::Linear);

        let too_high = Constraints::default()
            .with_min(Channel::Email, 60_000.0)
            .with_min(Channel::SearchAds, 50_000.0);
        assert!(matches!(
            optimize(&m, 100_000.0, Channel::all(), &too_high),
            Err(Error::InfeasibleConstraint(_))
        ));

        let crossed = Constraints::default()
            .with_min(Channel::Email, 10.0)
            .with_max(Channel::Email, 5.0);
        assert!(matches!(
            optimize(&m, 100.0, Channel::all(), &crossed),
            Err(Error::InfeasibleConstraint(_))
        ));

        let capped = Channel::all()
            .iter()
            .fold(Constraints::default(), |c, ch| c.with_max(*ch, 1_000.0));
        assert!(matches!(
            optimize(&m, 100_000.0, Channel::all(), &capped),
            Err(Error::InfeasibleConstraint(_))
        ));

        let negative = Constraints::default().with_min(Channel::Email, -1.0);
        assert!(matches!(
            optimize(&m, 100.0, Channel::all(), &negative),
            Err(Error::InfeasibleConstraint(_))
        ));
    }

    #[test]
    fn test_zero_budget() {
        for kind in ModelKind::all() {
            let m = model(*kind);
            let outcome = optimize(&m, 0.0, Channel::all(), &Constraints::default()).unwrap();
            assert!(outcome.plan.iter().all(|(_, v)| v == 0.0));
            assert_eq!(outcome.plan.channels().count(), 4);
            assert!(!outcome.improved);
            assert_eq!(outcome.method, SearchMethod::None);
        }
    }

    #[test]
    fn test_linear_uses_gradient_and_respects_bounds() {
        let m = model(ModelKind::Linear);
        let constraints = Constraints::default()
            .with_min(Channel::Email, 5_000.0)
            .with_max(Channel::SearchAds, 40_000.0)
            .with_settings(fast_settings());
        let outcome = optimize(&m, 100_000.0, Channel::all(), &constraints).unwrap();

        assert_eq!(outcome.method, SearchMethod::GradientAscent);
        assert!((outcome.plan.total() - 100_000.0).abs() < 1e-6);
        assert!(outcome.plan.get(Channel::Email) >= 5_000.0 - 1e-9);
        assert!(outcome.plan.get(Channel::SearchAds) <= 40_000.0 + 1e-9);
        assert!(outcome.predicted.revenue >= outcome.baseline_prediction.revenue);
    }

    #[test]
    fn test_forest_uses_random_search() {
        let m = model(ModelKind::Forest);
        let constraints = Constraints::default()
            .with_context(PredictionContext {
                season: Season::Holiday,
                ..Default::default()
            })
            .with_settings(fast_settings());
        let outcome = optimize(&m, 80_000.0, Channel::all(), &constraints).unwrap();

        assert_eq!(outcome.method, SearchMethod::RandomSearch);
        assert_eq!(outcome.iterations, 204);
        assert!((outcome.plan.total() - 80_000.0).abs() < 1e-6);
        assert!(outcome.plan.iter().all(|(_, v)| v >= 0.0));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_idempotent() {
        for kind in ModelKind::all() {
            let m = model(*kind);
            let constraints = Constraints::default().with_settings(fast_settings());
            let a = optimize(&m, 50_000.0, Channel::all(), &constraints).unwrap();
            let b = optimize(&m, 50_000.0, Channel::all(), &constraints).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_current_allocation_scaled_to_budget() {
        let m = model(ModelKind::Forest);
        let current: Allocation = Channel::all().iter().map(|c| (*c, 10_000.0)).collect();
        let constraints = Constraints::default()
            .with_current(current)
            .with_settings(OptimizerSettings {
                samples: 0,
                ..Default::default()
            });
        let outcome = optimize(&m, 60_000.0, Channel::all(), &constraints).unwrap();
        for channel in Channel::all() {
            assert!((outcome.baseline.get(*channel) - 15_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_iteration_cap_warns() {
        let m = model(ModelKind::Linear);
        let constraints = Constraints::default().with_settings(OptimizerSettings {
            max_iterations: 1,
            tolerance: 1e-12,
            ..Default::default()
        });
        let outcome = optimize(&m, 100_000.0, Channel::all(), &constraints).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(
            outcome.warnings,
            vec![OptimizationWarning::ConvergenceLimitReached { iterations: 1 }]
        );
    }

    /// Constant revenue plus `pull` dollars per dollar spent on email
    struct NearlyFlat {
        metadata: ModelMetadata,
        email: usize,
        pull: f64,
    }

    impl NearlyFlat {
        fn new(pull: f64) -> Self {
            let schema = FeatureSchema::for_channels(Channel::all());
            Self {
                metadata: ModelMetadata {
                    kind: ModelKind::Forest,
                    feature_names: schema.names().to_vec(),
                    channels: Channel::all().to_vec(),
                    r2: 0.0,
                    training_rows: 0,
                    dataset_fingerprint: None,
                },
                email: schema.spend_index(Channel::Email).unwrap(),
                pull,
            }
        }
    }

    impl Predictor for NearlyFlat {
        fn kind(&self) -> ModelKind {
            ModelKind::Forest
        }

        fn metadata(&self) -> &ModelMetadata {
            &self.metadata
        }

        fn predict_row(&self, row: &[f64]) -> f64 {
            1_000.0 + self.pull * row[self.email]
        }

        fn feature_importance(&self) -> Vec<FeatureImportance> {
            Vec::new()
        }
    }

    #[test]
    fn test_flat_model_keeps_baseline() {
        let m = NearlyFlat::new(0.0);
        let constraints = Constraints::default().with_settings(fast_settings());
        let outcome = optimize(&m, 100_000.0, Channel::all(), &constraints).unwrap();

        assert_eq!(outcome.method, SearchMethod::RandomSearch);
        assert_eq!(outcome.plan, outcome.baseline);
        assert!(!outcome.improved);
        assert_eq!(outcome.revenue_improvement, 0.0);
        for channel in Channel::all() {
            assert!((outcome.plan.get(*channel) - 25_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gain_within_epsilon_prefers_closest_plan() {
        // Moving everything to email gains 7.5e-8, below the 1e-6 epsilon
        let m = NearlyFlat::new(1e-12);
        let constraints = Constraints::default().with_settings(fast_settings());
        let outcome = optimize(&m, 100_000.0, Channel::all(), &constraints).unwrap();
        assert_eq!(outcome.plan, outcome.baseline);
        assert!(!outcome.improved);

        // A gain of 7.5e-5 clears epsilon and the email corner wins
        let m = NearlyFlat::new(1e-9);
        let outcome = optimize(&m, 100_000.0, Channel::all(), &constraints).unwrap();
        assert!(outcome.improved);
        assert!(outcome.plan.get(Channel::Email) >= 99_000.0);
        assert!(outcome.revenue_improvement > 0.0);
    }

    #[test]
    fn test_best_baseline_is_returned_unchanged() {
        // Rescaling a lone email dollar puts the whole budget on email,
        // which no other corner or ascent step beats
        let m = model(ModelKind::Linear);
        let current: Allocation = [(Channel::Email, 1.0)].into_iter().collect();
        let constraints = Constraints::default().with_current(current);
        let outcome = optimize(&m, 50_000.0, Channel::all(), &constraints).unwrap();

        assert_eq!(outcome.method, SearchMethod::GradientAscent);
        assert!((outcome.baseline.get(Channel::Email) - 50_000.0).abs() < 1e-6);
        assert_eq!(outcome.plan, outcome.baseline);
        assert!(!outcome.improved);
        assert_eq!(outcome.revenue_improvement, 0.0);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_ascent_stops_at_revenue_floor() {
        let mut m = model(ModelKind::Linear);
        if let TrainedModel::Linear(linear) = &mut m {
            linear.intercept -= 1e12;
        }
        let outcome = optimize(&m, 100_000.0, Channel::all(), &Constraints::default()).unwrap();

        assert_eq!(outcome.method, SearchMethod::GradientAscent);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.plan, outcome.baseline);
        assert_eq!(outcome.predicted.revenue, 0.0);
    }

    #[test]
    fn test_constraint_on_unlisted_channel() {
        let m = model(ModelKind::Linear);
        let constraints = Constraints::default().with_min(Channel::Promotions, 10.0);
        let result = optimize(&m, 100.0, &[Channel::Email], &constraints);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }
}
