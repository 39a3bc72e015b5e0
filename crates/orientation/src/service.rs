//! Inference façade.
//!
//! [`OrientationService`] owns the published model and never lets a prediction
//! fail: every error is logged by kind and answered with the fallback sector.
//!
//! The first prediction publishes a model synchronously, in this order:
//! 1. the persisted artifact, when configured and readable;
//! 2. a model trained from the configured dataset;
//! 3. a constant stand-in that always answers the fallback sector.

use crate::config::ServiceConfig;
use crate::error::{ConfigError, PredictionError, TrainError};
use crate::trainer::{TrainingOrchestrator, TrainingState};
use log::{debug, error, info, warn};
use orientation_data::{FeatureSchema, FeatureValue, Sector, StudentRecord};
use orientation_model::{FeatureImportance, FittedPipeline};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// What is currently answering predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Nothing published yet
    None,
    /// A fitted pipeline
    Fitted,
    /// The constant fallback stand-in
    Constant,
}

#[derive(Debug, Clone)]
enum Published {
    Fitted(Arc<FittedPipeline>),
    Constant,
}

/// Sector prediction service.
///
/// `Send + Sync`; share it behind an `Arc`. Predictions clone the published
/// `Arc` under a short read lock and run without locks. Training is serialized.
#[derive(Debug)]
pub struct OrientationService {
    config: ServiceConfig,
    schema: FeatureSchema,
    fallback: Sector,
    published: RwLock<Option<Published>>,
    trainer: Mutex<TrainingOrchestrator>,
}

impl OrientationService {
    /// Create a service over the canonical schema. Nothing is loaded yet.
    ///
    /// # Errors
    /// Returns the [`ServiceConfig::validate`] error for an unusable configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let schema = FeatureSchema::canonical();
        let trainer = TrainingOrchestrator::new(schema.clone(), config.training.clone());
        Ok(Self {
            fallback: Sector::new(config.fallback_sector.clone()),
            schema,
            config,
            published: RwLock::new(None),
            trainer: Mutex::new(trainer),
        })
    }

    /// Create a service that answers with an already fitted pipeline.
    pub fn with_pipeline(
        config: ServiceConfig,
        pipeline: Arc<FittedPipeline>,
    ) -> Result<Self, ConfigError> {
        let service = Self::new(config)?;
        service.publish(Published::Fitted(pipeline));
        Ok(service)
    }

    /// Predict the sector of a student. Never fails.
    ///
    /// Missing fields are treated as missing values; unseen categories are
    /// allowed. Any failure answers the fallback sector.
    pub fn predict_orientation(&self, record: &StudentRecord) -> Sector {
        self.absorb(self.try_predict(record))
    }

    /// Predict from a loosely typed `(feature, value)` mapping. Never fails.
    ///
    /// A key outside the schema answers the fallback sector.
    pub fn predict_values<I, K, V>(&self, values: I) -> Sector
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Option<FeatureValue>>,
    {
        let result = StudentRecord::from_values(values)
            .map_err(PredictionError::from)
            .and_then(|record| self.try_predict(&record));
        self.absorb(result)
    }

    /// Predict, reporting why no model label could be produced.
    ///
    /// # Errors
    /// [`PredictionError::NoArtifact`] when only the constant stand-in is
    /// published; otherwise the classified model failure.
    pub fn try_predict(&self, record: &StudentRecord) -> Result<Sector, PredictionError> {
        match self.ensure_published() {
            Published::Fitted(pipeline) => {
                let label = pipeline.predict_one(record, &self.schema)?;
                debug!("Predicted {}", label);
                Ok(Sector::from(label))
            }
            Published::Constant => Err(PredictionError::NoArtifact),
        }
    }

    /// Importance per schema feature of the published model.
    ///
    /// Empty when no fitted model is published; never triggers training.
    pub fn get_feature_importance(&self) -> FeatureImportance {
        match self.current() {
            Some(Published::Fitted(pipeline)) => pipeline.feature_importance(),
            _ => FeatureImportance::default(),
        }
    }

    /// Retrain from the configured dataset and swap the model in.
    ///
    /// On failure the previously published model keeps answering.
    pub fn retrain(&self) -> Result<(), TrainError> {
        let mut trainer = self.lock_trainer();
        let pipeline = trainer.train(&self.config.dataset_path)?;
        self.persist(&pipeline);
        self.publish(Published::Fitted(pipeline));
        info!("Retrained model published");
        Ok(())
    }

    /// Publish a model now instead of on the first prediction.
    pub fn warm_up(&self) -> ArtifactKind {
        self.ensure_published();
        self.artifact_kind()
    }

    /// Whether a fitted model is published.
    pub fn is_ready(&self) -> bool {
        matches!(self.current(), Some(Published::Fitted(_)))
    }

    /// What is currently answering predictions.
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self.current() {
            None => ArtifactKind::None,
            Some(Published::Fitted(_)) => ArtifactKind::Fitted,
            Some(Published::Constant) => ArtifactKind::Constant,
        }
    }

    /// The published fitted pipeline, if any.
    pub fn pipeline(&self) -> Option<Arc<FittedPipeline>> {
        match self.current() {
            Some(Published::Fitted(pipeline)) => Some(pipeline),
            _ => None,
        }
    }

    /// State of the training orchestrator.
    pub fn training_state(&self) -> TrainingState {
        self.lock_trainer().state()
    }

    /// Label answered on failure.
    pub const fn fallback(&self) -> &Sector {
        &self.fallback
    }

    /// Feature schema used for inputs.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Service configuration.
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn absorb(&self, result: Result<Sector, PredictionError>) -> Sector {
        result.unwrap_or_else(|err| {
            match &err {
                PredictionError::NoArtifact => {
                    warn!("Prediction unavailable ({}): {}", err.kind(), err)
                }
                _ => error!("Prediction failed ({}): {}", err.kind(), err),
            }
            self.fallback.clone()
        })
    }

    fn current(&self) -> Option<Published> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, published: Published) {
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(published);
    }

    fn lock_trainer(&self) -> MutexGuard<'_, TrainingOrchestrator> {
        self.trainer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_published(&self) -> Published {
        if let Some(published) = self.current() {
            return published;
        }

        let mut trainer = self.lock_trainer();
        // another caller may have published while we waited
        if let Some(published) = self.current() {
            return published;
        }

        let published = self
            .load_artifact()
            .or_else(|| self.train_initial(&mut trainer))
            .map_or_else(
                || {
                    warn!(
                        "No model available; answering {} until a retrain succeeds",
                        self.fallback
                    );
                    Published::Constant
                },
                Published::Fitted,
            );
        self.publish(published.clone());
        published
    }

    fn load_artifact(&self) -> Option<Arc<FittedPipeline>> {
        let path = self.config.artifact_path.as_ref()?;
        if !path.is_file() {
            info!("No model artifact at {}", path.display());
            return None;
        }
        match FittedPipeline::load(path, &self.schema) {
            Ok(pipeline) => Some(Arc::new(pipeline)),
            Err(err) => {
                warn!("Ignoring model artifact {}: {}", path.display(), err);
                None
            }
        }
    }

    fn train_initial(&self, trainer: &mut TrainingOrchestrator) -> Option<Arc<FittedPipeline>> {
        match trainer.train(&self.config.dataset_path) {
            Ok(pipeline) => {
                self.persist(&pipeline);
                Some(pipeline)
            }
            Err(err) => {
                warn!("Initial training failed ({}): {}", err.kind(), err);
                None
            }
        }
    }

    fn persist(&self, pipeline: &FittedPipeline) {
        if !self.config.persist_artifact {
            return;
        }
        if let Some(path) = &self.config.artifact_path
            && let Err(err) = pipeline.save(path)
        {
            warn!("Could not persist model artifact {}: {}", path.display(), err);
        }
    }
}
