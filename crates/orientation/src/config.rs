//! Service configuration.

use crate::error::ConfigError;
use orientation_data::UNKNOWN_SECTOR;
use orientation_model::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Default training dataset location
pub const DEFAULT_DATASET_PATH: &str = "data/augmented_data.csv";

/// Default label answered when no prediction can be made
pub const DEFAULT_FALLBACK_SECTOR: &str = "Indetermine";

/// Orientation service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Training CSV (default: data/augmented_data.csv)
    pub dataset_path: PathBuf,

    /// JSON model artifact; loaded before falling back to training (default: None)
    pub artifact_path: Option<PathBuf>,

    /// Write the artifact after every successful training (default: false)
    pub persist_artifact: bool,

    /// Label returned whenever a prediction fails (default: "Indetermine").
    ///
    /// Must differ from [`UNKNOWN_SECTOR`], the class of rows trained without a
    /// target, so a fallback answer is never mistaken for a model prediction.
    pub fallback_sector: String,

    /// Training parameters
    pub training: TrainingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            artifact_path: None,
            persist_artifact: false,
            fallback_sector: DEFAULT_FALLBACK_SECTOR.to_string(),
            training: TrainingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `ORIENTATION_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ORIENTATION_DATASET` | `dataset_path` |
    /// | `ORIENTATION_ARTIFACT` | `artifact_path` |
    /// | `ORIENTATION_PERSIST_ARTIFACT` | `persist_artifact` |
    /// | `ORIENTATION_FALLBACK_SECTOR` | `fallback_sector` |
    /// | `ORIENTATION_TEST_FRACTION` | `training.test_fraction` |
    /// | `ORIENTATION_N_TREES` | `training.forest.n_trees` |
    /// | `ORIENTATION_MAX_DEPTH` | `training.forest.max_depth` |
    /// | `ORIENTATION_SEED` | `training.forest.seed` |
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] if a value does not parse, or any
    /// [`ServiceConfig::validate`] error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ORIENTATION_DATASET") {
            config.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("ORIENTATION_ARTIFACT") {
            config.artifact_path = Some(PathBuf::from(path));
        }
        if let Some(value) = parse_var(&lookup, "ORIENTATION_PERSIST_ARTIFACT")? {
            config.persist_artifact = value;
        }
        if let Some(label) = lookup("ORIENTATION_FALLBACK_SECTOR") {
            config.fallback_sector = label;
        }
        if let Some(value) = parse_var(&lookup, "ORIENTATION_TEST_FRACTION")? {
            config.training.test_fraction = value;
        }
        if let Some(value) = parse_var(&lookup, "ORIENTATION_N_TREES")? {
            config.training.forest.n_trees = value;
        }
        if let Some(value) = parse_var(&lookup, "ORIENTATION_MAX_DEPTH")? {
            config.training.forest.max_depth = Some(value);
        }
        if let Some(value) = parse_var(&lookup, "ORIENTATION_SEED")? {
            config.training.forest.seed = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for an empty fallback label or one equal to
    /// [`UNKNOWN_SECTOR`], or [`ConfigError::Training`] for out-of-range training
    /// parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_sector.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback_sector must not be empty".to_string(),
            ));
        }
        if self.fallback_sector.trim() == UNKNOWN_SECTOR {
            return Err(ConfigError::Invalid(format!(
                "fallback_sector must differ from the missing-target class {}",
                UNKNOWN_SECTOR
            )));
        }
        if self.persist_artifact && self.artifact_path.is_none() {
            return Err(ConfigError::Invalid(
                "persist_artifact requires artifact_path".to_string(),
            ));
        }
        self.training.validate()?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.fallback_sector, DEFAULT_FALLBACK_SECTOR);
        assert_ne!(config.fallback_sector, UNKNOWN_SECTOR);
        assert!(config.artifact_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("ORIENTATION_DATASET", "/srv/students.csv"),
            ("ORIENTATION_ARTIFACT", "/srv/model.json"),
            ("ORIENTATION_PERSIST_ARTIFACT", "true"),
            ("ORIENTATION_N_TREES", "20"),
            ("ORIENTATION_SEED", "7"),
            ("ORIENTATION_MAX_DEPTH", "12"),
        ]))
        .unwrap();

        assert_eq!(config.dataset_path, PathBuf::from("/srv/students.csv"));
        assert_eq!(config.artifact_path, Some(PathBuf::from("/srv/model.json")));
        assert!(config.persist_artifact);
        assert_eq!(config.training.forest.n_trees, 20);
        assert_eq!(config.training.forest.seed, 7);
        assert_eq!(config.training.forest.max_depth, Some(12));
    }

    #[test]
    fn test_unparseable_env() {
        let err = ServiceConfig::from_lookup(lookup(&[("ORIENTATION_N_TREES", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key, .. } if key == "ORIENTATION_N_TREES"));
    }

    #[test]
    fn test_validation() {
        let config = ServiceConfig {
            fallback_sector: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ServiceConfig {
            fallback_sector: UNKNOWN_SECTOR.to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ServiceConfig {
            persist_artifact: true,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let err = ServiceConfig::from_lookup(lookup(&[("ORIENTATION_TEST_FRACTION", "1.2")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Training(_)));
    }
}
