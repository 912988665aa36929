//! Model training module
//!
//! Provides the candidate classifier families and the search that picks
//! the best of them:
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost-style and CatBoost-style boosting
//! - Multinomial logistic regression
//! - K-Nearest Neighbors
//! - AdaBoost (SAMME)
//! - Stratified cross-validated grid search and held-out selection

mod engine;
mod histogram;
mod models;
pub mod adaboost;
pub mod candidate;
pub mod catboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
pub mod params;
pub mod random_forest;
pub mod search;
pub mod xgboost;

pub use adaboost::AdaBoostClassifier;
pub use candidate::{default_roster, Estimator, ModelCandidate, ModelFamily};
pub use catboost::{CatBoostClassifier, CatBoostConfig};
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{CandidateScore, ModelArtifact, ModelTrainer, TrainingReport};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::LogisticRegression;
pub use metrics::{accuracy, ClassificationReport};
pub use models::Classifier;
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use random_forest::{MaxFeatures, RandomForest};
pub use search::{ComboResult, GridSearchCV, SearchResult};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
