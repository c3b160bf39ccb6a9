//! Ordinary least squares regression
//!
//! Features are standardised before fitting so the ridge term and the
//! importance scores are scale-free; the fitted weights are then mapped back
//! to raw feature units so prediction and the gradient work on dollars.
//! Constant columns (e.g. a season absent from the data) get a zero weight.

use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LinearConfig;
use crate::error::{Error, Result};
use crate::features::row_for_allocation;
use crate::models::{Allocation, Channel, PredictionContext, Season};

use super::metrics::r2_score;
use super::{normalized_importance, FeatureImportance, ModelKind, ModelMetadata, Predictor, TrainingSet};

/// Columns with a smaller std-dev are treated as constant
const MIN_STD: f64 = 1e-12;

/// Fitted linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub metadata: ModelMetadata,
    /// Intercept in raw units
    pub intercept: f64,
    /// Weights in raw feature units, in schema order
    pub coefficients: Vec<f64>,
    /// Weights on standardised features (importance)
    pub standardized_coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn train(set: &TrainingSet, config: &LinearConfig) -> Result<Self> {
        set.validate()?;

        let n = set.len();
        let width = set.schema.len();
        let n_f = n as f64;

        let x = set.design_matrix()?;
        let y = set.target_vector();
        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InvalidData("No rows to fit".into()))?;
        let stds = x.std_axis(Axis(0), 0.0);
        let y_mean = y.mean().unwrap_or(0.0);

        let active: Vec<usize> = (0..width).filter(|j| stds[*j] > MIN_STD).collect();
        let k = active.len();

        // Standardised design restricted to non-constant columns
        let mut z = x.select(Axis(1), &active);
        z -= &means.select(Axis(0), &active);
        z /= &stds.select(Axis(0), &active);

        let centred = &y - y_mean;
        let mut gram = z.t().dot(&z);
        gram.diag_mut().mapv_inplace(|d| d + config.ridge * n_f);
        let rhs = z.t().dot(&centred);

        let weights = solve(gram, rhs)?;

        let mut standardized = Array1::<f64>::zeros(width);
        let mut raw = Array1::<f64>::zeros(width);
        for (w, &j) in weights.iter().zip(&active) {
            standardized[j] = *w;
            raw[j] = w / stds[j];
        }
        let intercept = y_mean - raw.dot(&means);
        let fitted = x.dot(&raw) + intercept;
        let r2 = r2_score(y.view(), fitted.view());

        let model = Self {
            metadata: ModelMetadata {
                kind: ModelKind::Linear,
                feature_names: set.schema.names().to_vec(),
                channels: set.schema.channels().to_vec(),
                r2,
                training_rows: n,
                dataset_fingerprint: None,
            },
            intercept,
            coefficients: raw.to_vec(),
            standardized_coefficients: standardized.to_vec(),
        };

        debug!(
            active = k,
            dropped = width - k,
            r2 = model.metadata.r2,
            "Fitted linear model"
        );
        Ok(model)
    }

    /// Raw-unit weight of a feature, zero when absent
    fn weight(&self, index: Option<usize>) -> f64 {
        index
            .and_then(|i| self.coefficients.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Predictor for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }

    fn feature_importance(&self) -> Vec<FeatureImportance> {
        let magnitudes: Vec<f64> = self
            .standardized_coefficients
            .iter()
            .map(|w| w.abs())
            .collect();
        normalized_importance(&self.metadata.feature_names, &magnitudes)
    }

    fn revenue_gradient(
        &self,
        allocation: &Allocation,
        context: &PredictionContext,
    ) -> Option<Allocation> {
        let schema = self.schema();
        // Revenue is floored at zero, so nothing moves it below the floor
        let row = row_for_allocation(&schema, allocation, context);
        if self.predict_row(row.as_slice()) <= 0.0 {
            return Some(schema.channels().iter().map(|&c| (c, 0.0)).collect());
        }

        // Without a previous month the lag feature tracks the allocation itself
        let lag_follows_spend = context.previous_spend.is_none();
        let holiday = context.season == Season::Holiday;

        let gradient = schema
            .channels()
            .iter()
            .map(|&channel| {
                let spend = allocation.get(&channel).copied().unwrap_or(0.0);
                let mut slope = self.weight(schema.spend_index(channel))
                    + 2.0 * self.weight(schema.square_index(channel)) * spend;
                if lag_follows_spend {
                    slope += self.weight(schema.lag_index(channel));
                }
                if holiday && channel == Channel::SocialMedia {
                    slope += self.weight(schema.interaction_index());
                }
                (channel, slope)
            })
            .collect();

        Some(gradient)
    }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    let scale = a.diag().iter().fold(0.0_f64, |m, d| m.max(d.abs())).max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| {
                a[[i, col]]
                    .abs()
                    .partial_cmp(&a[[j, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if a[[pivot, col]].abs() <= 1e-10 * scale {
            return Err(Error::InvalidData(
                "Singular design matrix: features are linearly dependent".into(),
            ));
        }
        if pivot != col {
            let upper = a.row(col).to_owned();
            let lower = a.row(pivot).to_owned();
            a.row_mut(col).assign(&lower);
            a.row_mut(pivot).assign(&upper);
            b.swap(col, pivot);
        }

        let pivot_row = a.row(col).to_owned();
        for row in col + 1..n {
            let factor = a[[row, col]] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureRow, FeatureSchema};
    use crate::generator::generate;

    /// Rows where revenue is an exact linear function of the features
    fn exact_set() -> TrainingSet {
        let schema = FeatureSchema::for_channels(&[Channel::Email]);
        // email_spend, lag, sq, holiday, bts, competitor
        let rows: Vec<FeatureRow> = (0..12)
            .map(|i| {
                let spend = 100.0 + 10.0 * i as f64;
                let lag = 90.0 + 7.0 * ((i * 5) % 11) as f64;
                FeatureRow {
                    values: vec![
                        spend,
                        lag,
                        spend * spend,
                        if i % 4 == 0 { 1.0 } else { 0.0 },
                        if i % 3 == 1 { 1.0 } else { 0.0 },
                        40.0 + ((i * 7) % 13) as f64,
                    ],
                }
            })
            .collect();
        let targets = rows
            .iter()
            .map(|r| {
                let v = &r.values;
                500.0 + 3.0 * v[0] + 0.5 * v[1] - 0.001 * v[2] + 200.0 * v[3] - 4.0 * v[5]
            })
            .collect();
        TrainingSet::new(schema, rows, targets)
    }

    #[test]
    fn test_recovers_exact_coefficients() {
        let set = exact_set();
        let model = LinearModel::train(&set, &LinearConfig { ridge: 0.0 }).unwrap();

        assert!((model.intercept - 500.0).abs() < 1e-3);
        assert!((model.coefficients[0] - 3.0).abs() < 1e-5);
        assert!((model.coefficients[1] - 0.5).abs() < 1e-6);
        assert!((model.coefficients[2] + 0.001).abs() < 1e-8);
        assert!((model.coefficients[3] - 200.0).abs() < 1e-4);
        assert!(model.coefficients[4].abs() < 1e-4);
        assert!((model.metadata.r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let mut set = exact_set();
        for row in &mut set.rows {
            row.values[4] = 0.0;
        }
        let model = LinearModel::train(&set, &LinearConfig::default()).unwrap();
        assert_eq!(model.coefficients[4], 0.0);
        assert_eq!(model.standardized_coefficients[4], 0.0);
    }

    #[test]
    fn test_duplicate_column_is_singular_without_ridge() {
        let mut set = exact_set();
        for row in &mut set.rows {
            row.values[1] = row.values[0] * 2.0;
        }
        let result = LinearModel::train(&set, &LinearConfig { ridge: 0.0 });
        assert!(matches!(result, Err(Error::InvalidData(_))));

        // A ridge term makes the same design solvable
        assert!(LinearModel::train(&set, &LinearConfig { ridge: 1e-6 }).is_ok());
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let dataset = generate(24, 7).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        let model = LinearModel::train(&set, &LinearConfig::default()).unwrap();

        let allocation: Allocation = Channel::all().iter().map(|c| (*c, 20_000.0)).collect();
        let context = PredictionContext {
            season: Season::Holiday,
            ..Default::default()
        };
        let gradient = model.revenue_gradient(&allocation, &context).unwrap();

        let schema = model.schema();
        let h = 1.0;
        for channel in Channel::all() {
            let mut up = allocation.clone();
            *up.get_mut(channel).unwrap() += h;
            let mut down = allocation.clone();
            *down.get_mut(channel).unwrap() -= h;

            let f = |a: &Allocation| {
                let row = crate::features::row_for_allocation(&schema, a, &context);
                model.predict_row(row.as_slice())
            };
            let numeric = (f(&up) - f(&down)) / (2.0 * h);
            let analytic = gradient[channel];
            assert!(
                (numeric - analytic).abs() <= 1e-4 * analytic.abs().max(1.0),
                "{}: numeric {} vs analytic {}",
                channel,
                numeric,
                analytic
            );
        }
    }

    #[test]
    fn test_gradient_is_flat_below_revenue_floor() {
        let dataset = generate(24, 7).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        let mut model = LinearModel::train(&set, &LinearConfig::default()).unwrap();
        model.intercept -= 1e12;

        let allocation: Allocation = Channel::all().iter().map(|c| (*c, 20_000.0)).collect();
        let context = PredictionContext::default();
        let gradient = model.revenue_gradient(&allocation, &context).unwrap();

        assert_eq!(gradient.len(), 4);
        assert!(gradient.values().all(|g| *g == 0.0));
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero on the leading diagonal forces a row swap
        let a = ndarray::array![[0.0, 2.0], [3.0, 1.0]];
        let b = ndarray::array![4.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_importance_normalised() {
        let model = LinearModel::train(&exact_set(), &LinearConfig::default()).unwrap();
        let importance = model.feature_importance();
        let total: f64 = importance.iter().map(|i| i.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(importance
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));
    }
}
