#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/orientation-bac/orientation/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod intake;
pub mod service;
pub mod trainer;

// Re-export main types from sub-crates
pub use orientation_data as data;
pub use orientation_model as model;

pub use config::{DEFAULT_FALLBACK_SECTOR, ServiceConfig};
pub use error::{ConfigError, PredictionError, TrainError};
pub use intake::StudentIntake;
pub use service::{ArtifactKind, OrientationService};
pub use trainer::{TrainingOrchestrator, TrainingState};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
