//! Labeled training dataset.
//!
//! Loads a CSV with every schema column plus the target, cleans it, and replaces
//! missing targets with the explicit [`UNKNOWN_SECTOR`] class so the row count is
//! preserved.

use crate::clean::{clean, missing_counts};
use crate::error::{DataError, Result};
use crate::schema::{FeatureSchema, UNKNOWN_SECTOR};
use log::{debug, info};
use polars::prelude::*;
use std::path::Path;

/// Read a CSV file with a header row, keeping every column as text.
///
/// Type coercion is left to [`clean`]; empty fields become nulls.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DataError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("dataset not found: {}", path.display()),
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    Ok(df)
}

/// Cleaned table of labeled students.
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    frame: DataFrame,
    schema: FeatureSchema,
    missing_targets: usize,
}

impl TrainingDataset {
    /// Load and clean a dataset from a CSV file.
    ///
    /// # Errors
    /// Fails if the file cannot be read, a schema column or the target is absent,
    /// the file has no rows, or the target has no value at all.
    pub fn load<P: AsRef<Path>>(path: P, schema: &FeatureSchema) -> Result<Self> {
        info!("Loading dataset from {}", path.as_ref().display());
        let raw = read_csv(path)?;
        Self::from_frame(raw, schema)
    }

    /// Clean an in-memory table.
    ///
    /// # Errors
    /// Same conditions as [`TrainingDataset::load`], minus IO.
    pub fn from_frame(raw: DataFrame, schema: &FeatureSchema) -> Result<Self> {
        let target = schema.target();
        if raw.get_column_index(target).is_none() {
            return Err(DataError::MissingColumn(target.to_string()));
        }
        if raw.height() == 0 {
            return Err(DataError::EmptyDataset("no rows".to_string()));
        }

        let cleaned = clean(raw, schema)?;

        let labels = cleaned.column(target)?.cast(&DataType::String)?;
        let missing_targets = labels.null_count();
        if missing_targets == cleaned.height() {
            return Err(DataError::EmptyTarget(target.to_string()));
        }

        let frame = cleaned
            .lazy()
            .with_column(
                col(target)
                    .cast(DataType::String)
                    .fill_null(lit(UNKNOWN_SECTOR)),
            )
            .collect()?;

        for (name, nulls) in missing_counts(&frame, schema) {
            if nulls > 0 {
                debug!("Missing values in {}: {}", name, nulls);
            }
        }
        info!(
            "Dataset ready: {} rows, {} features, {} missing targets mapped to {}",
            frame.height(),
            schema.len(),
            missing_targets,
            UNKNOWN_SECTOR
        );

        Ok(Self {
            frame,
            schema: schema.clone(),
            missing_targets,
        })
    }

    /// Full cleaned table, target included
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Schema the dataset was cleaned against
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Feature columns only, in schema order
    pub fn features(&self) -> Result<DataFrame> {
        Ok(self.frame.select(self.schema.names())?)
    }

    /// Target labels, one per row
    pub fn labels(&self) -> Result<Vec<String>> {
        let labels = self
            .frame
            .column(self.schema.target())?
            .str()?
            .into_iter()
            .map(|label| label.unwrap_or(UNKNOWN_SECTOR).to_string())
            .collect();
        Ok(labels)
    }

    /// Number of rows whose target was missing before cleaning
    pub const fn missing_targets(&self) -> usize {
        self.missing_targets
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether the dataset has no rows (never true once loaded)
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}
