use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the regression capability
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature matrix has {rows} rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("expected {expected} features per row, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("model has not been fitted")]
    NotFitted,

    #[error("split on feature {feature} but rows have {width} features")]
    FeatureOutOfRange { feature: usize, width: usize },

    #[error("scaler expects {scaler} features but the forest expects {forest}")]
    ScalerMismatch { scaler: usize, forest: usize },
}

/// Supervised regression contract consumed by the pricing engine
pub trait Regressor {
    /// Train in place on a feature matrix and matching targets
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    /// One prediction per row
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// Hyper-parameters of a random forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Unlimited when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return Ok(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).ok_or(ModelError::FeatureOutOfRange {
                        feature: *feature,
                        width: row.len(),
                    })?;
                    node = if value <= threshold { left } else { right };
                }
            }
        }
    }

    /// Check every split index and leaf value of the subtree
    fn validate(&self, width: usize) -> Result<(), ModelError> {
        match self {
            Node::Leaf { value } if value.is_finite() => Ok(()),
            Node::Leaf { .. } => Err(ModelError::NonFinite("leaf values")),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= width {
                    return Err(ModelError::FeatureOutOfRange {
                        feature: *feature,
                        width,
                    });
                }
                if !threshold.is_finite() {
                    return Err(ModelError::NonFinite("split thresholds"));
                }
                left.validate(width)?;
                right.validate(width)
            }
        }
    }
}

/// CART regression tree grown by variance reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree over the given sample indices
    fn grow(x: &[Vec<f64>], y: &[f64], indices: &mut [usize], params: &ForestParams) -> Self {
        Self {
            root: Self::grow_node(x, y, indices, 0, params),
        }
    }

    fn grow_node(
        x: &[Vec<f64>],
        y: &[f64],
        indices: &mut [usize],
        depth: usize,
        params: &ForestParams,
    ) -> Node {
        let n = indices.len() as f64;
        let sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let sum_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let mean = sum / n;
        let parent_sse = sum_sq - sum * sum / n;

        let depth_exhausted = params.max_depth.is_some_and(|max| depth >= max);
        if indices.len() < params.min_samples_split.max(2) || depth_exhausted || parent_sse <= 1e-9 {
            return Node::Leaf { value: mean };
        }

        let best = match Self::best_split(x, y, indices) {
            Some(best) if best.sse < parent_sse - 1e-9 => best,
            _ => return Node::Leaf { value: mean },
        };

        // Partition in place: left samples first
        let mut boundary = 0;
        for i in 0..indices.len() {
            if x[indices[i]][best.feature] <= best.threshold {
                indices.swap(i, boundary);
                boundary += 1;
            }
        }
        let (left, right) = indices.split_at_mut(boundary);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(Self::grow_node(x, y, left, depth + 1, params)),
            right: Box::new(Self::grow_node(x, y, right, depth + 1, params)),
        }
    }

    fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<Candidate> {
        let width = x[indices[0]].len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let n = indices.len();

        let mut best: Option<Candidate> = None;
        let mut order = indices.to_vec();

        for feature in 0..width {
            order.sort_by(|&a, &b| {
                x[a][feature]
                    .partial_cmp(&x[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for split in 1..n {
                let moved = order[split - 1];
                left_sum += y[moved];
                left_sq += y[moved] * y[moved];

                let lower = x[moved][feature];
                let upper = x[order[split]][feature];
                if upper <= lower {
                    continue;
                }

                let left_n = split as f64;
                let right_n = (n - split) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(Candidate {
                        feature,
                        threshold: lower + (upper - lower) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        self.root.predict(row)
    }
}

/// Ensemble of bagged regression trees whose predictions are averaged
///
/// Deterministic for a given `ForestParams::seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check that a deserialized forest can predict without going out of bounds
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.root.validate(self.n_features))
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let n_features = validate_training_set(x, y)?;
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n = x.len();

        let trees = (0..self.params.n_trees.max(1))
            .map(|_| {
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(x, y, &mut sample, &self.params)
            })
            .collect();

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }

        x.iter()
            .map(|row| {
                check_row(row, self.n_features)?;
                let total = self
                    .trees
                    .iter()
                    .map(|tree| tree.predict_row(row))
                    .sum::<Result<f64, ModelError>>()?;
                Ok(total / self.trees.len() as f64)
            })
            .collect()
    }
}

/// Per-column standardization (zero mean, unit variance)
///
/// Constant columns keep a scale of 1 so they pass through centered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self, ModelError> {
        let width = x.first().ok_or(ModelError::EmptyTrainingSet)?.len();
        for row in x {
            check_row(row, width)?;
        }

        let n = x.len() as f64;
        let mean: Vec<f64> = (0..width)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let scale = (0..width)
            .map(|j| {
                let variance = x.iter().map(|row| (row[j] - mean[j]).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_row(row, self.mean.len())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Check that a deserialized scaler is usable: one finite mean and one
    /// finite, non-zero scale per column
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.scale.len() != self.mean.len() {
            return Err(ModelError::WidthMismatch {
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ModelError::NonFinite("scaler means"));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ModelError::NonFinite("scaler scales"));
        }
        Ok(())
    }
}

fn validate_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.len(),
            targets: y.len(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("targets"));
    }

    let width = x[0].len();
    for row in x {
        check_row(row, width)?;
    }
    Ok(width)
}

fn check_row(row: &[f64], width: usize) -> Result<(), ModelError> {
    if row.len() != width {
        return Err(ModelError::WidthMismatch {
            expected: width,
            actual: row.len(),
        });
    }
    if row.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("features"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = x.iter().map(|row| 10.0 * row[0] + 5.0).collect();
        (x, y)
    }

    #[test]
    fn test_single_tree_fits_step_function() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 100.0 } else { 200.0 }).collect();
        let mut indices: Vec<usize> = (0..10).collect();

        let tree = RegressionTree::grow(&x, &y, &mut indices, &ForestParams::default());

        assert_eq!(tree.predict_row(&[2.0]), Ok(100.0));
        assert_eq!(tree.predict_row(&[7.0]), Ok(200.0));
        assert_eq!(tree.predict_row(&[4.5]), Ok(100.0));
    }

    #[test]
    fn test_max_depth_zero_is_mean() {
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let y = vec![1.0, 2.0, 3.0, 6.0];
        let mut indices: Vec<usize> = (0..4).collect();
        let params = ForestParams {
            max_depth: Some(0),
            ..ForestParams::default()
        };

        let tree = RegressionTree::grow(&x, &y, &mut indices, &params);
        assert_eq!(tree.predict_row(&[0.0]), Ok(3.0));
    }

    #[test]
    fn test_forest_tracks_trend() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(ForestParams::default());
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&[vec![5.0, 2.0], vec![35.0, 2.0]]).unwrap();
        assert!(predictions[0] < predictions[1]);
        assert!((predictions[0] - 55.0).abs() < 40.0, "got {}", predictions[0]);
        assert!((predictions[1] - 355.0).abs() < 40.0, "got {}", predictions[1]);
    }

    #[test]
    fn test_forest_is_deterministic_per_seed() {
        let (x, y) = linear_data();
        let params = ForestParams {
            n_trees: 20,
            ..ForestParams::default()
        };

        let mut a = RandomForest::new(params);
        let mut b = RandomForest::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 20);
    }

    #[test]
    fn test_constant_targets() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, 1.0]).collect();
        let y = vec![750.0; 6];
        let mut forest = RandomForest::new(ForestParams::default());
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.predict(&[vec![100.0, 0.0]]).unwrap(), vec![750.0]);
    }

    #[test]
    fn test_fit_errors() {
        let mut forest = RandomForest::new(ForestParams::default());

        assert_eq!(forest.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
        assert_eq!(
            forest.fit(&[vec![1.0]], &[1.0, 2.0]),
            Err(ModelError::LengthMismatch { rows: 1, targets: 2 })
        );
        assert_eq!(
            forest.fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(ModelError::WidthMismatch { expected: 1, actual: 2 })
        );
        assert_eq!(
            forest.fit(&[vec![1.0]], &[f64::NAN]),
            Err(ModelError::NonFinite("targets"))
        );
    }

    #[test]
    fn test_predict_errors() {
        let forest = RandomForest::new(ForestParams::default());
        assert_eq!(forest.predict(&[vec![1.0]]), Err(ModelError::NotFitted));

        let (x, y) = linear_data();
        let mut forest = RandomForest::new(ForestParams {
            n_trees: 3,
            ..ForestParams::default()
        });
        forest.fit(&x, &y).unwrap();
        assert_eq!(
            forest.predict(&[vec![1.0]]),
            Err(ModelError::WidthMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_out_of_range_split_is_an_error() {
        let json = r#"{
            "params": {"n_trees": 1, "max_depth": null, "min_samples_split": 2, "seed": 42},
            "n_features": 2,
            "trees": [{"root": {"kind": "split", "feature": 9, "threshold": 0.5,
                "left": {"kind": "leaf", "value": 1.0},
                "right": {"kind": "leaf", "value": 2.0}}}]
        }"#;
        let forest: RandomForest = serde_json::from_str(json).unwrap();

        assert_eq!(
            forest.validate(),
            Err(ModelError::FeatureOutOfRange { feature: 9, width: 2 })
        );
        assert_eq!(
            forest.predict(&[vec![1.0, 1.0]]),
            Err(ModelError::FeatureOutOfRange { feature: 9, width: 2 })
        );
    }

    #[test]
    fn test_fitted_forest_validates() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(ForestParams {
            n_trees: 3,
            ..ForestParams::default()
        });
        assert_eq!(forest.validate(), Err(ModelError::NotFitted));

        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.validate(), Ok(()));
        assert_eq!(forest.n_features(), 2);
    }

    #[test]
    fn test_scaler_validate() {
        let scaler = StandardScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(scaler.validate(), Ok(()));
        assert_eq!(scaler.width(), 2);

        let zero_scale: StandardScaler =
            serde_json::from_str(r#"{"mean": [1.0], "scale": [0.0]}"#).unwrap();
        assert_eq!(zero_scale.validate(), Err(ModelError::NonFinite("scaler scales")));

        let ragged: StandardScaler =
            serde_json::from_str(r#"{"mean": [1.0, 2.0], "scale": [1.0]}"#).unwrap();
        assert!(ragged.validate().is_err());
    }

    #[test]
    fn test_standard_scaler() {
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&x).unwrap();

        assert_eq!(scaler.transform_row(&[1.0, 5.0]).unwrap(), vec![-1.0, 0.0]);
        assert_eq!(scaler.transform_row(&[3.0, 7.0]).unwrap(), vec![1.0, 2.0]);
        assert!(scaler.transform_row(&[1.0]).is_err());
    }

    #[test]
    fn test_forest_serde() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(ForestParams {
            n_trees: 2,
            max_depth: Some(3),
            ..ForestParams::default()
        });
        forest.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        let before = forest.predict(&[vec![12.0, 0.0]]).unwrap()[0];
        let after = restored.predict(&[vec![12.0, 0.0]]).unwrap()[0];
        assert!((before - after).abs() < 1e-6);
    }
}
