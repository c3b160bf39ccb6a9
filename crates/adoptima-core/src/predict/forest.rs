//! Bagged regression trees
//!
//! Each tree is a CART regressor grown on a bootstrap sample, splitting on
//! the threshold that most reduces the summed squared error. Trees live in a
//! flat node arena so the whole forest serializes as plain data.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ForestConfig;
use crate::error::Result;
use crate::features::FeatureRow;

use super::metrics::{fitted_values, r2_score};
use super::{normalized_importance, FeatureImportance, ModelKind, ModelMetadata, Predictor, TrainingSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    index = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Best split found for one node
struct Candidate {
    feature: usize,
    threshold: f64,
    /// Position in the sorted sample where the right child starts
    cut: usize,
    sse: f64,
}

/// Grows one tree; borrows the training data for its lifetime
struct TreeBuilder<'a> {
    rows: &'a [FeatureRow],
    targets: &'a [f64],
    config: &'a ForestConfig,
    width: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn new(set: &'a TrainingSet, config: &'a ForestConfig) -> Self {
        let width = set.schema.len();
        Self {
            rows: &set.rows,
            targets: &set.targets,
            config,
            width,
            nodes: Vec::new(),
            importances: vec![0.0; width],
        }
    }

    /// Grow a node over `members`, returning its arena index
    fn grow(&mut self, members: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let node = self.nodes.len();
        let (mean, sse) = self.mean_and_sse(members);
        self.nodes.push(Node::Leaf { value: mean });

        let splittable = depth < self.config.max_depth
            && members.len() >= self.config.min_samples_split.max(2)
            && sse > 0.0;
        if !splittable {
            return node;
        }

        let Some(best) = self.best_split(members, rng) else {
            return node;
        };
        let gain = sse - best.sse;
        if gain <= 0.0 {
            return node;
        }
        self.importances[best.feature] += gain;

        let feature = best.feature;
        members.sort_by(|a, b| {
            self.rows[*a].values[feature]
                .partial_cmp(&self.rows[*b].values[feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let (left_members, right_members) = members.split_at_mut(best.cut);
        let left = self.grow(left_members, depth + 1, rng);
        let right = self.grow(right_members, depth + 1, rng);

        self.nodes[node] = Node::Split {
            feature,
            threshold: best.threshold,
            left,
            right,
        };
        node
    }

    fn mean_and_sse(&self, members: &[usize]) -> (f64, f64) {
        let n = members.len() as f64;
        let mean = members.iter().map(|&i| self.targets[i]).sum::<f64>() / n;
        let sse = members
            .iter()
            .map(|&i| (self.targets[i] - mean).powi(2))
            .sum();
        (mean, sse)
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.config.max_features {
            Some(m) if m > 0 && m < self.width => index::sample(rng, self.width, m).into_vec(),
            _ => (0..self.width).collect(),
        }
    }

    /// Lowest-SSE threshold across candidate features
    fn best_split(&self, members: &[usize], rng: &mut StdRng) -> Option<Candidate> {
        let n = members.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        if n < 2 * min_leaf {
            return None;
        }

        let mut best: Option<Candidate> = None;
        let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in self.candidate_features(rng) {
            sorted.clear();
            sorted.extend(
                members
                    .iter()
                    .map(|&i| (self.rows[i].values[feature], self.targets[i])),
            );
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let total_sum: f64 = sorted.iter().map(|(_, y)| y).sum();
            let total_sq: f64 = sorted.iter().map(|(_, y)| y * y).sum();
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for cut in 1..n {
                let y = sorted[cut - 1].1;
                left_sum += y;
                left_sq += y * y;

                if cut < min_leaf || n - cut < min_leaf {
                    continue;
                }
                if sorted[cut - 1].0 == sorted[cut].0 {
                    continue;
                }

                let n_left = cut as f64;
                let n_right = (n - cut) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(Candidate {
                        feature,
                        threshold: (sorted[cut - 1].0 + sorted[cut].0) / 2.0,
                        cut,
                        sse: sse.max(0.0),
                    });
                }
            }
        }

        best
    }
}

/// Fitted tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub metadata: ModelMetadata,
    trees: Vec<RegressionTree>,
    /// Summed squared-error decrease per feature, in schema order
    importances: Vec<f64>,
}

impl ForestModel {
    pub fn train(set: &TrainingSet, config: &ForestConfig) -> Result<Self> {
        set.validate()?;

        let n = set.len();
        let width = set.schema.len();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.trees);
        let mut importances = vec![0.0; width];

        for _ in 0..config.trees.max(1) {
            let mut bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut builder = TreeBuilder::new(set, config);
            builder.grow(&mut bootstrap, 0, &mut rng);

            for (total, gain) in importances.iter_mut().zip(&builder.importances) {
                *total += gain;
            }
            trees.push(RegressionTree {
                nodes: builder.nodes,
            });
        }

        let mut model = Self {
            metadata: ModelMetadata {
                kind: ModelKind::Forest,
                feature_names: set.schema.names().to_vec(),
                channels: set.schema.channels().to_vec(),
                r2: 0.0,
                training_rows: n,
                dataset_fingerprint: None,
            },
            trees,
            importances,
        };

        let fitted = fitted_values(&model, set);
        model.metadata.r2 = r2_score(set.target_vector().view(), fitted.view());

        debug!(
            trees = model.trees.len(),
            nodes = model.trees.iter().map(|t| t.nodes.len()).sum::<usize>(),
            r2 = model.metadata.r2,
            "Grew forest"
        );
        Ok(model)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for ForestModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Forest
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    fn feature_importance(&self) -> Vec<FeatureImportance> {
        normalized_importance(&self.metadata.feature_names, &self.importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::generator::generate;
    use crate::models::Channel;

    /// Revenue jumps from 0 to 10 once email spend reaches 10
    fn step_set() -> TrainingSet {
        let schema = FeatureSchema::for_channels(&[Channel::Email]);
        let rows: Vec<FeatureRow> = (0..20)
            .map(|i| FeatureRow {
                values: vec![i as f64, 1.0, 1.0, 0.0, 0.0, 50.0],
            })
            .collect();
        let targets = (0..20).map(|i| if i >= 10 { 10.0 } else { 0.0 }).collect();
        TrainingSet::new(schema, rows, targets)
    }

    fn step_config() -> ForestConfig {
        ForestConfig {
            trees: 25,
            min_samples_leaf: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_learns_step() {
        let model = ForestModel::train(&step_set(), &step_config()).unwrap();
        assert_eq!(model.tree_count(), 25);
        assert!(model.predict_row(&[19.0, 1.0, 1.0, 0.0, 0.0, 50.0]) > 9.999);
        assert!(model.predict_row(&[0.0, 1.0, 1.0, 0.0, 0.0, 50.0]) < 1e-3);
        assert!(model.metadata.r2 > 0.99);
    }

    #[test]
    fn test_importance_on_informative_feature() {
        let model = ForestModel::train(&step_set(), &step_config()).unwrap();
        let importance = model.feature_importance();
        assert_eq!(importance[0].feature, "email_spend");
        assert!((importance[0].importance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let dataset = generate(24, 42).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        let config = ForestConfig {
            trees: 20,
            max_features: Some(5),
            ..Default::default()
        };

        let a = ForestModel::train(&set, &config).unwrap();
        let b = ForestModel::train(&set, &config).unwrap();
        for row in &set.rows {
            assert_eq!(a.predict_row(row.as_slice()), b.predict_row(row.as_slice()));
        }
    }

    #[test]
    fn test_predictions_within_target_range() {
        let dataset = generate(24, 42).unwrap();
        let set = TrainingSet::from_dataset(&dataset);
        let model = ForestModel::train(&set, &ForestConfig::default()).unwrap();

        let lo = set.targets.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = set.targets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let extreme = vec![1e9; set.schema.len()];
        let p = model.predict_row(&extreme);
        assert!(p >= lo - 1e-6 && p <= hi + 1e-6);
        assert!(model.metadata.r2 > 0.5);
    }
}
