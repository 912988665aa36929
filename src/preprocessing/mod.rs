//! Data preprocessing module
//!
//! Provides the column-wise preprocessing used for accident records:
//! - Missing value imputation (median, most frequent)
//! - Standard scaling with optional centering
//! - One-hot encoding that ignores unseen categories
//! - A fitted [`Preprocessor`] combining the numerical and categorical blocks

mod imputer;
mod scaler;
mod encoder;
mod pipeline;

pub use imputer::{Imputer, ImputeStrategy};
pub use scaler::StandardScaler;
pub use encoder::OneHotEncoder;
pub use pipeline::{Preprocessor, PreprocessorBuilder};
