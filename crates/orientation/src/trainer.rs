//! Training orchestration.
//!
//! One training run walks `Untrained → Loading → Cleaning → Fitting → Trained`.
//! Any failure moves the orchestrator to `Failed` and is returned to the caller;
//! a later call may start over.

use crate::error::TrainError;
use log::{error, info};
use orientation_data::dataset::read_csv;
use orientation_data::{FeatureSchema, TrainingDataset};
use orientation_model::{FittedPipeline, TrainingConfig};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Where the orchestrator is in a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingState {
    /// Nothing trained yet
    Untrained,
    /// Reading the dataset
    Loading,
    /// Typing columns and filling missing targets
    Cleaning,
    /// Fitting encoder and forest
    Fitting,
    /// Last run succeeded
    Trained,
    /// Last run failed
    Failed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Untrained => "untrained",
            Self::Loading => "loading",
            Self::Cleaning => "cleaning",
            Self::Fitting => "fitting",
            Self::Trained => "trained",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Runs training and remembers the last successful pipeline.
#[derive(Debug)]
pub struct TrainingOrchestrator {
    schema: FeatureSchema,
    config: TrainingConfig,
    state: TrainingState,
    last: Option<Arc<FittedPipeline>>,
}

impl TrainingOrchestrator {
    /// Create an orchestrator in the `Untrained` state.
    pub const fn new(schema: FeatureSchema, config: TrainingConfig) -> Self {
        Self {
            schema,
            config,
            state: TrainingState::Untrained,
            last: None,
        }
    }

    /// Current state
    pub const fn state(&self) -> TrainingState {
        self.state
    }

    /// Pipeline produced by the last successful run
    pub fn last_trained(&self) -> Option<Arc<FittedPipeline>> {
        self.last.clone()
    }

    /// Training parameters
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train from a CSV dataset.
    ///
    /// # Errors
    /// [`TrainError::Data`] if the file is unreadable or malformed, a column is
    /// missing or no target is present; [`TrainError::Model`] if fitting fails.
    pub fn train<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<FittedPipeline>, TrainError> {
        let path = path.as_ref();
        self.transition(TrainingState::Loading);
        info!("Reading dataset {}", path.display());

        match read_csv(path) {
            Ok(raw) => self.fit_frame(raw),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Train from an in-memory raw table (every schema column plus the target).
    pub fn train_frame(&mut self, raw: DataFrame) -> Result<Arc<FittedPipeline>, TrainError> {
        self.transition(TrainingState::Loading);
        self.fit_frame(raw)
    }

    fn fit_frame(&mut self, raw: DataFrame) -> Result<Arc<FittedPipeline>, TrainError> {
        self.transition(TrainingState::Cleaning);
        let dataset = match TrainingDataset::from_frame(raw, &self.schema) {
            Ok(dataset) => dataset,
            Err(err) => return Err(self.fail(err)),
        };
        info!(
            "Dataset ready: {} rows, {} with a missing target",
            dataset.len(),
            dataset.missing_targets()
        );

        self.transition(TrainingState::Fitting);
        let fitted = dataset
            .features()
            .map_err(TrainError::from)
            .and_then(|features| {
                let labels = dataset.labels()?;
                Ok(FittedPipeline::fit(
                    &features,
                    &labels,
                    &self.schema,
                    &self.config,
                )?)
            });

        match fitted {
            Ok(pipeline) => {
                let pipeline = Arc::new(pipeline);
                self.last = Some(Arc::clone(&pipeline));
                self.transition(TrainingState::Trained);
                Ok(pipeline)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn transition(&mut self, next: TrainingState) {
        info!("Training state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail<E: Into<TrainError>>(&mut self, err: E) -> TrainError {
        let err = err.into();
        error!("Training failed while {} ({}): {}", self.state, err.kind(), err);
        self.transition(TrainingState::Failed);
        err
    }
}
