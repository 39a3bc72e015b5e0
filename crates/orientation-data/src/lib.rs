#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/orientation-bac/orientation/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod clean;
pub mod dataset;
pub mod error;
pub mod record;
pub mod schema;
pub mod store;

pub use clean::clean;
pub use dataset::TrainingDataset;
pub use error::{DataError, Result};
pub use record::{FeatureValue, LabeledStudent, Sector, StudentRecord, records_to_frame};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, TARGET_COLUMN, UNKNOWN_SECTOR};
pub use store::{SqliteStudentStore, StudentStore};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
