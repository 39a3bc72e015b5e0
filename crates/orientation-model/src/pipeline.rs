//! Fitted encoder + forest, evaluated and ready for inference.

use crate::encoder::EncoderState;
use crate::error::{ModelError, Result};
use crate::forest::{ForestConfig, RandomForest};
use crate::importance::FeatureImportance;
use crate::metrics::ClassificationReport;
use crate::split::stratified_split;
use chrono::{DateTime, Utc};
use log::{debug, info};
use orientation_data::{FeatureSchema, StudentRecord, records_to_frame};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Share of each class held out for evaluation (default: 0.3)
    pub test_fraction: f64,

    /// Random forest parameters
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(ModelError::InvalidConfig(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        self.forest.validate()
    }
}

/// Everything needed to turn a student table into sector labels.
///
/// Read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    encoder: EncoderState,
    forest: RandomForest,
    classes: Vec<String>,
    config: TrainingConfig,
    report: Option<ClassificationReport>,
    n_train: usize,
    trained_at: DateTime<Utc>,
}

impl FittedPipeline {
    /// Fit encoder and forest on a stratified training partition and evaluate
    /// on the rest.
    ///
    /// # Arguments
    /// * `features` - Cleaned feature table (every schema column)
    /// * `labels` - Sector label of each row
    /// * `schema` - Feature schema
    /// * `config` - Training parameters
    ///
    /// # Errors
    /// Invalid configuration, empty or misaligned input, or a schema column
    /// missing from `features`.
    pub fn fit(
        features: &DataFrame,
        labels: &[String],
        schema: &FeatureSchema,
        config: &TrainingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if features.height() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if labels.len() != features.height() {
            return Err(ModelError::DimensionMismatch {
                expected: features.height(),
                actual: labels.len(),
            });
        }

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let y: Vec<usize> = labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let (train_idx, test_idx) =
            stratified_split(&y, config.test_fraction, config.forest.seed)?;
        info!(
            "Split {} rows into {} train / {} evaluation over {} classes",
            y.len(),
            train_idx.len(),
            test_idx.len(),
            classes.len()
        );

        let train_df = take_rows(features, &train_idx)?;
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();

        let encoder = EncoderState::fit(&train_df, schema)?;
        let x_train = encoder.transform(&train_df)?;
        debug!("Encoded training matrix: {:?}", x_train.dim());

        let mut forest = RandomForest::new(config.forest.clone())?;
        forest.fit(x_train.view(), &y_train, classes.len())?;

        let report = if test_idx.is_empty() {
            info!("No evaluation rows; skipping the classification report");
            None
        } else {
            let test_df = take_rows(features, &test_idx)?;
            let x_test = encoder.transform(&test_df)?;
            let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
            let y_pred = forest.predict(&x_test)?;
            let report = ClassificationReport::new(&y_test, &y_pred, &classes)?;
            info!(
                "Evaluation accuracy {:.3} on {} rows\n{}",
                report.accuracy, report.support, report
            );
            Some(report)
        };

        Ok(Self {
            encoder,
            forest,
            classes,
            config: config.clone(),
            report,
            n_train: train_idx.len(),
            trained_at: Utc::now(),
        })
    }

    /// Predict a label for every row of a table with the schema columns.
    pub fn predict(&self, df: &DataFrame) -> Result<Vec<String>> {
        let x = self.encoder.transform(df)?;
        let predictions = self.forest.predict(&x)?;
        predictions
            .into_iter()
            .map(|class| {
                self.classes
                    .get(class)
                    .cloned()
                    .ok_or(ModelError::DimensionMismatch {
                        expected: self.classes.len(),
                        actual: class + 1,
                    })
            })
            .collect()
    }

    /// Predict the label of a single record.
    pub fn predict_one(&self, record: &StudentRecord, schema: &FeatureSchema) -> Result<String> {
        let df = records_to_frame(std::slice::from_ref(record), schema)?;
        self.predict(&df)?
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyTrainingSet)
    }

    /// Importance per schema feature, one-hot blocks summed.
    pub fn feature_importance(&self) -> FeatureImportance {
        FeatureImportance::from_encoded(
            &self.encoder.feature_names(),
            &self.encoder.source_features(),
            &self.forest.feature_importances(),
        )
    }

    /// Sector labels the model can produce, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Fitted encoder.
    pub const fn encoder(&self) -> &EncoderState {
        &self.encoder
    }

    /// Fitted forest.
    pub const fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Parameters used for training.
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Report on the held-out partition, if there was one.
    pub const fn report(&self) -> Option<&ClassificationReport> {
        self.report.as_ref()
    }

    /// Number of rows the forest was fitted on.
    pub const fn n_train(&self) -> usize {
        self.n_train
    }

    /// Training timestamp.
    pub const fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Serialize to a JSON artifact.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read a JSON artifact and check it against `schema`.
    ///
    /// # Errors
    /// [`ModelError::Serialization`] for a malformed blob,
    /// [`ModelError::SchemaMismatch`] if it was fitted on other features.
    pub fn from_json(json: &str, schema: &FeatureSchema) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(json)?;
        pipeline.encoder.check_schema(schema)?;
        if !pipeline.forest.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        if pipeline.forest.n_features() != pipeline.encoder.width() {
            return Err(ModelError::DimensionMismatch {
                expected: pipeline.encoder.width(),
                actual: pipeline.forest.n_features(),
            });
        }
        Ok(pipeline)
    }

    /// Write the JSON artifact to `path`, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!("Saved model artifact to {}", path.display());
        Ok(())
    }

    /// Load a JSON artifact from `path`.
    pub fn load<P: AsRef<Path>>(path: P, schema: &FeatureSchema) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let pipeline = Self::from_json(&json, schema)?;
        info!(
            "Loaded model artifact from {} (trained {})",
            path.display(),
            pipeline.trained_at.to_rfc3339()
        );
        Ok(pipeline)
    }
}

fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orientation_data::FeatureSpec;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            vec![
                FeatureSpec::categorical("Serie_Bac", "serie"),
                FeatureSpec::numeric("Note_Maths", "maths"),
            ],
            "Secteur_Activite",
        )
        .unwrap()
    }

    fn data() -> (DataFrame, Vec<String>) {
        let mut series = Vec::new();
        let mut maths = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            series.push("S");
            maths.push(15.0 + (i % 4) as f64);
            labels.push("Informatique".to_string());
            series.push("L");
            maths.push(6.0 + (i % 3) as f64);
            labels.push("Lettres".to_string());
        }
        let df = df!("Serie_Bac" => series, "Note_Maths" => maths).unwrap();
        (df, labels)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestConfig {
                n_trees: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_fit_evaluates_held_out_rows() {
        let (df, labels) = data();
        let pipeline = FittedPipeline::fit(&df, &labels, &schema(), &config()).unwrap();

        assert_eq!(pipeline.classes(), ["Informatique", "Lettres"]);
        assert_eq!(pipeline.n_train(), 14);
        let report = pipeline.report().unwrap();
        assert_eq!(report.support, 6);
        assert!(report.accuracy > 0.9);
    }

    #[test]
    fn test_predict() {
        let (df, labels) = data();
        let pipeline = FittedPipeline::fit(&df, &labels, &schema(), &config()).unwrap();

        let query = df!("Serie_Bac" => ["S", "L"], "Note_Maths" => [17.0, 7.0]).unwrap();
        assert_eq!(pipeline.predict(&query).unwrap(), vec!["Informatique", "Lettres"]);
    }

    #[test]
    fn test_json_round_trip_keeps_predictions() {
        let (df, labels) = data();
        let pipeline = FittedPipeline::fit(&df, &labels, &schema(), &config()).unwrap();
        let restored = FittedPipeline::from_json(&pipeline.to_json().unwrap(), &schema()).unwrap();

        assert_eq!(restored.predict(&df).unwrap(), pipeline.predict(&df).unwrap());
        assert_eq!(restored.trained_at(), pipeline.trained_at());
    }

    #[test]
    fn test_load_rejects_other_schema() {
        let (df, labels) = data();
        let pipeline = FittedPipeline::fit(&df, &labels, &schema(), &config()).unwrap();
        let json = pipeline.to_json().unwrap();

        assert!(matches!(
            FittedPipeline::from_json(&json, &FeatureSchema::canonical()),
            Err(ModelError::SchemaMismatch(_))
        ));
        assert!(matches!(
            FittedPipeline::from_json("{", &schema()),
            Err(ModelError::Serialization(_))
        ));
    }

    #[test]
    fn test_fit_errors() {
        let (df, labels) = data();
        assert!(matches!(
            FittedPipeline::fit(&df, &labels[..3], &schema(), &config()),
            Err(ModelError::DimensionMismatch { .. })
        ));

        let bad = TrainingConfig {
            test_fraction: 1.5,
            ..config()
        };
        assert!(matches!(
            FittedPipeline::fit(&df, &labels, &schema(), &bad),
            Err(ModelError::InvalidConfig(_))
        ));
    }
}
