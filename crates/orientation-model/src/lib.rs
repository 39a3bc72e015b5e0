#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/orientation-bac/orientation/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod encoder;
pub mod error;
pub mod forest;
pub mod importance;
pub mod metrics;
pub mod pipeline;
pub mod split;

pub use encoder::{CategoricalColumn, EncoderState, ImputerEncoder, NumericColumn};
pub use error::{ModelError, Result};
pub use forest::{DecisionTree, ForestConfig, MaxFeatures, Node, RandomForest};
pub use importance::FeatureImportance;
pub use metrics::{ClassMetrics, ClassificationReport};
pub use pipeline::{FittedPipeline, TrainingConfig};
pub use split::stratified_split;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
