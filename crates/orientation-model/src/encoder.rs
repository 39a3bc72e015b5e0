//! Missing-value imputation and one-hot encoding.
//!
//! The fitted [`EncoderState`] turns a cleaned student table into a dense
//! `Array2<f64>`. Categorical blocks come first, in schema order, followed by
//! the numeric columns in schema order.

use crate::error::{ModelError, Result};
use log::debug;
use ndarray::Array2;
use orientation_data::{FeatureKind, FeatureSchema};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Fitted imputation and vocabulary for one categorical feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    /// Source feature name
    pub name: String,
    /// Most frequent category at fit time, `None` if the column was empty
    pub fill: Option<String>,
    /// Sorted vocabulary
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    /// Position of `value` in the vocabulary.
    pub fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Fitted imputation for one numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    /// Source feature name
    pub name: String,
    /// Value substituted for nulls
    pub fill: f64,
}

/// Fits an [`EncoderState`] from a cleaned table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImputerEncoder;

impl ImputerEncoder {
    /// Learn fill values and vocabularies from `df`.
    ///
    /// # Errors
    /// Returns [`ModelError::SchemaMismatch`] if a schema column is absent, or
    /// [`ModelError::EmptyTrainingSet`] if `df` has no rows.
    pub fn fit(df: &DataFrame, schema: &FeatureSchema) -> Result<EncoderState> {
        EncoderState::fit(df, schema)
    }
}

/// Immutable state learned by [`ImputerEncoder::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    categorical: Vec<CategoricalColumn>,
    numeric: Vec<NumericColumn>,
}

impl EncoderState {
    /// See [`ImputerEncoder::fit`].
    pub fn fit(df: &DataFrame, schema: &FeatureSchema) -> Result<Self> {
        if df.height() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }

        let mut categorical = Vec::new();
        let mut numeric = Vec::new();

        for spec in schema.categorical() {
            let values = string_values(df, spec.name)?;
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for value in values.iter().flatten() {
                *counts.entry(value.as_str()).or_insert(0) += 1;
            }
            let fill = most_frequent(counts.iter().map(|(k, v)| (*k, *v))).map(str::to_string);
            let categories: Vec<String> = counts.keys().map(|k| k.to_string()).collect();

            debug!(
                "{}: {} categories, fill {:?}",
                spec.name,
                categories.len(),
                fill
            );
            categorical.push(CategoricalColumn {
                name: spec.name.to_string(),
                fill,
                categories,
            });
        }

        for spec in schema.numeric() {
            let values = numeric_values(df, spec.name)?;
            let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
            for value in values.iter().flatten() {
                // -0.0 and 0.0 share a bucket
                let key = if *value == 0.0 { 0.0 } else { *value };
                counts.entry(key.to_bits()).or_insert((key, 0)).1 += 1;
            }
            let mut buckets: Vec<(f64, usize)> = counts.into_values().collect();
            buckets.sort_by(|a, b| a.0.total_cmp(&b.0));
            let fill = most_frequent(buckets.into_iter()).unwrap_or(0.0);

            debug!("{}: fill {}", spec.name, fill);
            numeric.push(NumericColumn {
                name: spec.name.to_string(),
                fill,
            });
        }

        Ok(Self {
            categorical,
            numeric,
        })
    }

    /// Encode `df` with the fitted state.
    ///
    /// Nulls are imputed, unseen categories become all-zero blocks.
    ///
    /// # Errors
    /// Returns [`ModelError::SchemaMismatch`] if a fitted column is absent.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let mut out = Array2::<f64>::zeros((n_rows, self.width()));
        let mut offset = 0;

        for column in &self.categorical {
            let values = string_values(df, &column.name)?;
            for (row, value) in values.iter().enumerate() {
                let value = value.as_deref().or(column.fill.as_deref());
                let Some(value) = value else {
                    continue;
                };
                match column.position(value) {
                    Some(pos) => out[[row, offset + pos]] = 1.0,
                    None => debug!("unseen category {:?} for {}", value, column.name),
                }
            }
            offset += column.categories.len();
        }

        for column in &self.numeric {
            let values = numeric_values(df, &column.name)?;
            for (row, value) in values.into_iter().enumerate() {
                out[[row, offset]] = value.unwrap_or(column.fill);
            }
            offset += 1;
        }

        Ok(out)
    }

    /// Number of encoded columns.
    pub fn width(&self) -> usize {
        self.categorical
            .iter()
            .map(|c| c.categories.len())
            .sum::<usize>()
            + self.numeric.len()
    }

    /// Names of the encoded columns, `Feature=category` for one-hot columns.
    pub fn encoded_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.categorical {
            names.extend(
                column
                    .categories
                    .iter()
                    .map(|cat| format!("{}={}", column.name, cat)),
            );
        }
        names.extend(self.numeric.iter().map(|c| c.name.clone()));
        names
    }

    /// Source feature of every encoded column, aligned with [`Self::encoded_names`].
    pub fn source_features(&self) -> Vec<&str> {
        let mut sources = Vec::with_capacity(self.width());
        for column in &self.categorical {
            sources.extend(std::iter::repeat_n(
                column.name.as_str(),
                column.categories.len(),
            ));
        }
        sources.extend(self.numeric.iter().map(|c| c.name.as_str()));
        sources
    }

    /// Source features in encoded order, each listed once.
    pub fn feature_names(&self) -> Vec<&str> {
        self.categorical
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.numeric.iter().map(|c| c.name.as_str()))
            .collect()
    }

    /// Fitted categorical columns.
    pub fn categorical(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Fitted numeric columns.
    pub fn numeric(&self) -> &[NumericColumn] {
        &self.numeric
    }

    /// Check that the fitted columns match `schema`.
    ///
    /// # Errors
    /// Returns [`ModelError::SchemaMismatch`] naming the first disagreement.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        let expected: Vec<(&str, FeatureKind)> = schema
            .categorical()
            .chain(schema.numeric())
            .map(|spec| (spec.name, spec.kind))
            .collect();
        let actual: Vec<(&str, FeatureKind)> = self
            .categorical
            .iter()
            .map(|c| (c.name.as_str(), FeatureKind::Categorical))
            .chain(
                self.numeric
                    .iter()
                    .map(|c| (c.name.as_str(), FeatureKind::Numeric)),
            )
            .collect();

        if expected != actual {
            return Err(ModelError::SchemaMismatch(format!(
                "encoder fitted on {} features, schema has {}",
                actual.len(),
                expected.len()
            )));
        }
        Ok(())
    }
}

/// Highest count wins; on a tie the first item seen is kept.
fn most_frequent<T>(items: impl Iterator<Item = (T, usize)>) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for (item, count) in items {
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ModelError::SchemaMismatch(format!("missing column {}", name)))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?.cast(&DataType::String)?;
    let values = column
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect();
    Ok(values)
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?.cast(&DataType::Float64)?;
    let values = column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orientation_data::FeatureSpec;

    fn small_schema() -> FeatureSchema {
        FeatureSchema::new(
            vec![
                FeatureSpec::categorical("Serie_Bac", "serie"),
                FeatureSpec::numeric("Note_Maths", "maths"),
                FeatureSpec::categorical("Sexe", "sexe"),
            ],
            "Secteur_Activite",
        )
        .unwrap()
    }

    fn training_frame() -> DataFrame {
        df!(
            "Serie_Bac" => [Some("S"), Some("L"), Some("S"), None],
            "Note_Maths" => [Some(16.0), Some(12.0), None, Some(12.0)],
            "Sexe" => [Some("F"), Some("M"), Some("M"), Some("F")]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_learns_modes_and_vocabulary() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();

        let serie = &state.categorical()[0];
        assert_eq!(serie.categories, vec!["L", "S"]);
        assert_eq!(serie.fill.as_deref(), Some("S"));

        // F and M tie, lexicographic order decides
        assert_eq!(state.categorical()[1].fill.as_deref(), Some("F"));
        assert_relative_eq!(state.numeric()[0].fill, 12.0);
    }

    #[test]
    fn test_layout_categorical_then_numeric() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();
        assert_eq!(
            state.encoded_names(),
            vec!["Serie_Bac=L", "Serie_Bac=S", "Sexe=F", "Sexe=M", "Note_Maths"]
        );
        assert_eq!(
            state.source_features(),
            vec!["Serie_Bac", "Serie_Bac", "Sexe", "Sexe", "Note_Maths"]
        );
        assert_eq!(state.feature_names(), vec!["Serie_Bac", "Sexe", "Note_Maths"]);
        assert_eq!(state.width(), 5);
    }

    #[test]
    fn test_transform_imputes_missing() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();
        let x = state.transform(&training_frame()).unwrap();

        assert_eq!(x.dim(), (4, 5));
        assert_eq!(x.row(0).to_vec(), vec![0.0, 1.0, 1.0, 0.0, 16.0]);
        // null maths takes the mode
        assert_relative_eq!(x[[2, 4]], 12.0);
        // null serie takes the mode S
        assert_eq!(x.row(3).to_vec(), vec![0.0, 1.0, 1.0, 0.0, 12.0]);
    }

    #[test]
    fn test_unseen_category_is_zero_block() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();
        let unseen = df!(
            "Serie_Bac" => ["ES"],
            "Note_Maths" => [10.0],
            "Sexe" => ["M"]
        )
        .unwrap();

        let x = state.transform(&unseen).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0, 10.0]);
    }

    #[test]
    fn test_all_missing_columns() {
        let frame = df!(
            "Serie_Bac" => [None::<&str>, None],
            "Note_Maths" => [None::<f64>, None],
            "Sexe" => ["F", "F"]
        )
        .unwrap();
        let state = ImputerEncoder::fit(&frame, &small_schema()).unwrap();

        assert!(state.categorical()[0].categories.is_empty());
        assert!(state.categorical()[0].fill.is_none());
        assert_relative_eq!(state.numeric()[0].fill, 0.0);

        let x = state.transform(&frame).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x.row(1).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();
        let partial = df!("Serie_Bac" => ["S"], "Sexe" => ["F"]).unwrap();

        assert!(matches!(
            state.transform(&partial),
            Err(ModelError::SchemaMismatch(_))
        ));
        assert!(matches!(
            ImputerEncoder::fit(&partial, &small_schema()),
            Err(ModelError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_check_schema() {
        let state = ImputerEncoder::fit(&training_frame(), &small_schema()).unwrap();
        assert!(state.check_schema(&small_schema()).is_ok());
        assert!(matches!(
            state.check_schema(&FeatureSchema::canonical()),
            Err(ModelError::SchemaMismatch(_))
        ));
    }
}
