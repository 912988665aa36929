//! Candidate model families and the estimators they build

use serde::{Deserialize, Serialize};
use std::fmt;

use super::adaboost::AdaBoostClassifier;
use super::catboost::{CatBoostClassifier, CatBoostConfig};
use super::decision_tree::{Criterion, DecisionTree};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
use super::linear_models::LogisticRegression;
use super::models::Classifier;
use super::params::{ParamGrid, ParamSet, ParamValue};
use super::random_forest::{MaxFeatures, RandomForest};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{Result, SeverityError};
use ndarray::{Array1, Array2};

/// Classifier family of a search candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    DecisionTree,
    GradientBoosting,
    LogisticRegression,
    XGBoost,
    CatBoost,
    AdaBoost,
    KNeighbors,
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFamily::RandomForest => "RandomForestClassifier",
            ModelFamily::DecisionTree => "DecisionTreeClassifier",
            ModelFamily::GradientBoosting => "GradientBoostingClassifier",
            ModelFamily::LogisticRegression => "LogisticRegression",
            ModelFamily::XGBoost => "XGBClassifier",
            ModelFamily::CatBoost => "CatBoostClassifier",
            ModelFamily::AdaBoost => "AdaBoostClassifier",
            ModelFamily::KNeighbors => "KNeighborsClassifier",
        };
        write!(f, "{}", name)
    }
}

impl ModelFamily {
    /// Hyperparameters accepted by [`ModelFamily::instantiate`]
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::RandomForest => &["max_depth", "max_features", "min_samples_leaf", "n_estimators"],
            ModelFamily::DecisionTree => &["criterion", "max_depth", "min_samples_leaf", "min_samples_split"],
            ModelFamily::GradientBoosting => &["learning_rate", "max_depth", "n_estimators", "subsample"],
            ModelFamily::LogisticRegression => &["alpha", "learning_rate", "max_iter"],
            ModelFamily::XGBoost => &[
                "colsample_bytree",
                "gamma",
                "learning_rate",
                "max_depth",
                "min_child_weight",
                "n_estimators",
                "reg_alpha",
                "reg_lambda",
                "subsample",
            ],
            ModelFamily::CatBoost => &["depth", "iterations", "l2_leaf_reg", "learning_rate", "subsample"],
            ModelFamily::AdaBoost => &["learning_rate", "n_estimators"],
            ModelFamily::KNeighbors => &["n_neighbors", "p", "weights"],
        }
    }

    /// Build an unfitted estimator from a parameter assignment.
    ///
    /// Unknown names and wrongly typed values are rejected; omitted
    /// parameters keep the family defaults. `seed` drives every stochastic
    /// family.
    pub fn instantiate(&self, params: &ParamSet, seed: Option<u64>) -> Result<Estimator> {
        let allowed = self.param_names();
        if let Some((name, value)) = params.iter().find(|(k, _)| !allowed.iter().any(|a| *a == k.as_str())) {
            return Err(invalid(name, value, &format!("not a parameter of {}", self)));
        }
        let p = Params(params);

        let estimator = match self {
            ModelFamily::RandomForest => {
                let mut rf = RandomForest::new(p.count("n_estimators")?.unwrap_or(100));
                if let Some(depth) = p.count("max_depth")? {
                    rf = rf.with_max_depth(depth);
                }
                if let Some(leaf) = p.count("min_samples_leaf")? {
                    rf = rf.with_min_samples_leaf(leaf);
                }
                if let Some(mf) = p.choice("max_features", &["sqrt", "log2", "all"])? {
                    rf = rf.with_max_features(match mf {
                        "log2" => MaxFeatures::Log2,
                        "all" => MaxFeatures::All,
                        _ => MaxFeatures::Sqrt,
                    });
                }
                if let Some(seed) = seed {
                    rf = rf.with_random_state(seed);
                }
                Estimator::RandomForest(rf)
            }
            ModelFamily::DecisionTree => {
                let mut tree = DecisionTree::new_classifier();
                if let Some(name) = p.choice("criterion", &["gini", "entropy"])? {
                    let criterion = Criterion::from_name(name).unwrap_or(Criterion::Gini);
                    tree = tree.with_criterion(criterion);
                }
                if let Some(depth) = p.count("max_depth")? {
                    tree = tree.with_max_depth(depth);
                }
                if let Some(n) = p.count("min_samples_split")? {
                    tree = tree.with_min_samples_split(n.max(2));
                }
                if let Some(n) = p.count("min_samples_leaf")? {
                    tree = tree.with_min_samples_leaf(n);
                }
                if let Some(seed) = seed {
                    tree = tree.with_random_state(seed);
                }
                Estimator::DecisionTree(tree)
            }
            ModelFamily::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                Estimator::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: p.count("n_estimators")?.unwrap_or(defaults.n_estimators),
                    learning_rate: p.positive("learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth: p.count("max_depth")?.unwrap_or(defaults.max_depth),
                    subsample: p.fraction("subsample")?.unwrap_or(defaults.subsample),
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new();
                if let Some(alpha) = p.non_negative("alpha")? {
                    model = model.with_alpha(alpha);
                }
                if let Some(lr) = p.positive("learning_rate")? {
                    model = model.with_learning_rate(lr);
                }
                if let Some(iters) = p.count("max_iter")? {
                    model = model.with_max_iter(iters);
                }
                Estimator::LogisticRegression(model)
            }
            ModelFamily::XGBoost => {
                let defaults = XGBoostConfig::default();
                Estimator::XGBoost(XGBoostClassifier::new(XGBoostConfig {
                    n_estimators: p.count("n_estimators")?.unwrap_or(defaults.n_estimators),
                    learning_rate: p.positive("learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth: p.count("max_depth")?.unwrap_or(defaults.max_depth),
                    min_child_weight: p.non_negative("min_child_weight")?.unwrap_or(defaults.min_child_weight),
                    reg_lambda: p.non_negative("reg_lambda")?.unwrap_or(defaults.reg_lambda),
                    reg_alpha: p.non_negative("reg_alpha")?.unwrap_or(defaults.reg_alpha),
                    gamma: p.non_negative("gamma")?.unwrap_or(defaults.gamma),
                    subsample: p.fraction("subsample")?.unwrap_or(defaults.subsample),
                    colsample_bytree: p.fraction("colsample_bytree")?.unwrap_or(defaults.colsample_bytree),
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelFamily::CatBoost => {
                let defaults = CatBoostConfig::default();
                Estimator::CatBoost(CatBoostClassifier::new(CatBoostConfig {
                    iterations: p.count("iterations")?.unwrap_or(defaults.iterations),
                    learning_rate: p.positive("learning_rate")?.unwrap_or(defaults.learning_rate),
                    depth: p.count("depth")?.unwrap_or(defaults.depth),
                    reg_lambda: p.non_negative("l2_leaf_reg")?.unwrap_or(defaults.reg_lambda),
                    subsample: p.fraction("subsample")?.unwrap_or(defaults.subsample),
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelFamily::AdaBoost => Estimator::AdaBoost(AdaBoostClassifier::new(
                p.count("n_estimators")?.unwrap_or(50),
                p.positive("learning_rate")?.unwrap_or(1.0),
            )),
            ModelFamily::KNeighbors => {
                let weights = match p.choice("weights", &["uniform", "distance"])? {
                    Some("distance") => WeightScheme::Distance,
                    _ => WeightScheme::Uniform,
                };
                let metric = match p.positive("p")? {
                    None => DistanceMetric::Euclidean,
                    Some(v) if v == 1.0 => DistanceMetric::Manhattan,
                    Some(v) if v == 2.0 => DistanceMetric::Euclidean,
                    Some(v) => DistanceMetric::Minkowski(v),
                };
                Estimator::KNeighbors(KNNClassifier::new(KNNConfig {
                    n_neighbors: p.count("n_neighbors")?.unwrap_or(5),
                    metric,
                    weights,
                }))
            }
        };
        Ok(estimator)
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> SeverityError {
    SeverityError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Typed reads from a parameter set
struct Params<'a>(&'a ParamSet);

impl Params<'_> {
    /// Positive integer
    fn count(&self, name: &str) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => match value.as_int() {
                Some(v) if v > 0 => Ok(Some(v as usize)),
                Some(_) => Err(invalid(name, value, "must be a positive integer")),
                None => Err(invalid(name, value, "expected an integer")),
            },
        }
    }

    fn float(&self, name: &str) -> Result<Option<(f64, &ParamValue)>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => match value.as_float() {
                Some(v) if v.is_finite() => Ok(Some((v, value))),
                _ => Err(invalid(name, value, "expected a number")),
            },
        }
    }

    fn positive(&self, name: &str) -> Result<Option<f64>> {
        match self.float(name)? {
            Some((v, _)) if v > 0.0 => Ok(Some(v)),
            Some((_, value)) => Err(invalid(name, value, "must be positive")),
            None => Ok(None),
        }
    }

    fn non_negative(&self, name: &str) -> Result<Option<f64>> {
        match self.float(name)? {
            Some((v, _)) if v >= 0.0 => Ok(Some(v)),
            Some((_, value)) => Err(invalid(name, value, "must be non-negative")),
            None => Ok(None),
        }
    }

    /// Value in (0, 1]
    fn fraction(&self, name: &str) -> Result<Option<f64>> {
        match self.float(name)? {
            Some((v, _)) if v > 0.0 && v <= 1.0 => Ok(Some(v)),
            Some((_, value)) => Err(invalid(name, value, "must be in (0, 1]")),
            None => Ok(None),
        }
    }

    fn choice(&self, name: &str, options: &[&'static str]) -> Result<Option<&'static str>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => {
                let s = value
                    .as_string()
                    .ok_or_else(|| invalid(name, value, "expected a string"))?;
                options
                    .iter()
                    .find(|o| **o == s)
                    .copied()
                    .map(Some)
                    .ok_or_else(|| invalid(name, value, &format!("expected one of {}", options.join(", "))))
            }
        }
    }
}

/// A fitted or unfitted estimator of any candidate family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
    XGBoost(XGBoostClassifier),
    CatBoost(CatBoostClassifier),
    AdaBoost(AdaBoostClassifier),
    KNeighbors(KNNClassifier),
}

impl Estimator {
    pub fn family(&self) -> ModelFamily {
        match self {
            Estimator::RandomForest(_) => ModelFamily::RandomForest,
            Estimator::DecisionTree(_) => ModelFamily::DecisionTree,
            Estimator::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Estimator::LogisticRegression(_) => ModelFamily::LogisticRegression,
            Estimator::XGBoost(_) => ModelFamily::XGBoost,
            Estimator::CatBoost(_) => ModelFamily::CatBoost,
            Estimator::AdaBoost(_) => ModelFamily::AdaBoost,
            Estimator::KNeighbors(_) => ModelFamily::KNeighbors,
        }
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            Estimator::RandomForest(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::XGBoost(m) => m,
            Estimator::CatBoost(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::KNeighbors(m) => m,
        }
    }

    fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Estimator::RandomForest(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::XGBoost(m) => m,
            Estimator::CatBoost(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::KNeighbors(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_classifier_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_classifier().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.as_classifier().predict_proba(x)
    }

    fn classes(&self) -> &[f64] {
        self.as_classifier().classes()
    }
}

/// A named family plus its hyperparameter grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub name: String,
    pub family: ModelFamily,
    pub grid: ParamGrid,
}

impl ModelCandidate {
    pub fn new(name: impl Into<String>, family: ModelFamily, grid: ParamGrid) -> Self {
        Self {
            name: name.into(),
            family,
            grid,
        }
    }
}

/// The eight candidates searched by default, in selection order
pub fn default_roster() -> Vec<ModelCandidate> {
    let rates = [0.01, 0.05, 0.1];
    let sizes = [50i64, 100, 200];
    vec![
        ModelCandidate::new(
            "Random Forest",
            ModelFamily::RandomForest,
            ParamGrid::new().with("n_estimators", sizes).with("max_depth", [5i64, 10, 20]),
        ),
        ModelCandidate::new(
            "Decision Tree",
            ModelFamily::DecisionTree,
            ParamGrid::new().with("criterion", ["gini", "entropy"]).with("max_depth", [5i64, 10, 20]),
        ),
        ModelCandidate::new(
            "Gradient Boosting",
            ModelFamily::GradientBoosting,
            ParamGrid::new().with("learning_rate", rates).with("n_estimators", sizes),
        ),
        ModelCandidate::new("Logistic Regression", ModelFamily::LogisticRegression, ParamGrid::new()),
        ModelCandidate::new(
            "XGBClassifier",
            ModelFamily::XGBoost,
            ParamGrid::new().with("learning_rate", rates).with("n_estimators", sizes),
        ),
        ModelCandidate::new(
            "CatBoostClassifier",
            ModelFamily::CatBoost,
            ParamGrid::new()
                .with("depth", [6i64, 8, 10])
                .with("learning_rate", rates)
                .with("iterations", [50i64, 100]),
        ),
        ModelCandidate::new(
            "AdaBoostClassifier",
            ModelFamily::AdaBoost,
            ParamGrid::new().with("learning_rate", rates).with("n_estimators", sizes),
        ),
        ModelCandidate::new(
            "KNeighborsClassifier",
            ModelFamily::KNeighbors,
            ParamGrid::new().with("n_neighbors", [3i64, 5, 7]),
        ),
    ]
}
