use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid model artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Model expects {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
    #[error("Tree {tree} references feature {feature}, model has {n_features}")]
    FeatureOutOfRange {
        tree: usize,
        feature: usize,
        n_features: usize,
    },
    #[error("Tree ensemble has no trees")]
    EmptyEnsemble,
    #[error("Model produced a non-finite prediction")]
    NonFinite,
}

/// Anything that turns an aligned feature row into a scalar.
pub trait Regressor: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict(&self, row: ArrayView1<'_, f64>) -> Result<f64, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Random forest style.
    #[default]
    Mean,
    /// Gradient boosting style, added to `base_score`.
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        value: f64,
    },
}

impl TreeNode {
    fn evaluate(&self, row: &ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        &**left
                    } else {
                        &**right
                    };
                }
            }
        }
    }

    fn max_feature(&self) -> Option<usize> {
        match self {
            TreeNode::Leaf { .. } => None,
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => [Some(*feature), left.max_feature(), right.max_feature()]
                .into_iter()
                .flatten()
                .max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionModel {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    TreeEnsemble {
        n_features: usize,
        #[serde(default)]
        aggregation: Aggregation,
        #[serde(default)]
        base_score: f64,
        trees: Vec<TreeNode>,
    },
}

impl RegressionModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let model: RegressionModel = serde_json::from_str(&raw)?;
        model.validate()?;
        log::info!(
            "Loaded {} model with {} features from {}",
            model.kind(),
            model.n_features(),
            path.display()
        );
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RegressionModel::Linear { .. } => "linear",
            RegressionModel::TreeEnsemble { .. } => "tree_ensemble",
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if let RegressionModel::TreeEnsemble {
            n_features, trees, ..
        } = self
        {
            if trees.is_empty() {
                return Err(ModelError::EmptyEnsemble);
            }
            for (i, tree) in trees.iter().enumerate() {
                if let Some(feature) = tree.max_feature() {
                    if feature >= *n_features {
                        return Err(ModelError::FeatureOutOfRange {
                            tree: i,
                            feature,
                            n_features: *n_features,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Regressor for RegressionModel {
    fn n_features(&self) -> usize {
        match self {
            RegressionModel::Linear { coefficients, .. } => coefficients.len(),
            RegressionModel::TreeEnsemble { n_features, .. } => *n_features,
        }
    }

    fn predict(&self, row: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        if row.len() != self.n_features() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features(),
                actual: row.len(),
            });
        }

        let prediction = match self {
            RegressionModel::Linear {
                intercept,
                coefficients,
            } => ArrayView1::from(coefficients.as_slice()).dot(&row) + intercept,
            RegressionModel::TreeEnsemble {
                aggregation,
                base_score,
                trees,
                ..
            } => {
                let total: f64 = trees.iter().map(|t| t.evaluate(&row)).sum();
                match aggregation {
                    Aggregation::Mean => base_score + total / trees.len() as f64,
                    Aggregation::Sum => base_score + total,
                }
            }
        };

        if !prediction.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> TreeNode {
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(TreeNode::Leaf { value: left }),
            right: Box::new(TreeNode::Leaf { value: right }),
        }
    }

    #[test]
    fn linear_model_is_dot_plus_intercept() {
        let model = RegressionModel::Linear {
            intercept: 1.5,
            coefficients: vec![0.5, 2.0, 0.0],
        };
        let row = array![2.0, 1.0, 100.0];
        assert_eq!(model.predict(row.view()).unwrap(), 1.5 + 1.0 + 2.0);
    }

    #[test]
    fn tree_splits_go_left_on_equal() {
        let model = RegressionModel::TreeEnsemble {
            n_features: 2,
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            trees: vec![stump(0, 10.0, 1.0, 5.0)],
        };
        assert_eq!(model.predict(array![10.0, 0.0].view()).unwrap(), 1.0);
        assert_eq!(model.predict(array![10.5, 0.0].view()).unwrap(), 5.0);
    }

    #[test]
    fn ensembles_average_or_sum() {
        let trees = vec![stump(0, 0.5, 2.0, 4.0), stump(1, 0.5, 6.0, 8.0)];
        let row = array![1.0, 0.0];

        let forest = RegressionModel::TreeEnsemble {
            n_features: 2,
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            trees: trees.clone(),
        };
        assert_eq!(forest.predict(row.view()).unwrap(), 5.0);

        let boosted = RegressionModel::TreeEnsemble {
            n_features: 2,
            aggregation: Aggregation::Sum,
            base_score: 0.5,
            trees,
        };
        assert_eq!(boosted.predict(row.view()).unwrap(), 10.5);
    }

    #[test]
    fn wrong_row_width_is_an_error() {
        let model = RegressionModel::Linear {
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
        };
        let err = model.predict(array![1.0].view()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn validate_catches_out_of_range_features() {
        let model = RegressionModel::TreeEnsemble {
            n_features: 1,
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            trees: vec![stump(3, 0.0, 0.0, 1.0)],
        };
        assert!(matches!(
            model.validate().unwrap_err(),
            ModelError::FeatureOutOfRange { feature: 3, .. }
        ));
    }

    #[test]
    fn artifact_json_round_trips_through_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{
                "type": "tree_ensemble",
                "n_features": 2,
                "trees": [
                    {"node": "split", "feature": 1, "threshold": 0.5,
                     "left": {"node": "leaf", "value": 3.0},
                     "right": {"node": "leaf", "value": 7.0}}
                ]
            }"#,
        )
        .unwrap();
        let model = RegressionModel::load(file.path()).unwrap();
        assert_eq!(model.kind(), "tree_ensemble");
        assert_eq!(model.predict(array![0.0, 1.0].view()).unwrap(), 7.0);
    }
}
