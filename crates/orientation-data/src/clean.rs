//! Data cleaning.
//!
//! Coerces a raw table into the types the feature schema expects. Numeric columns
//! are cast to `Float64` with unparseable values turned into nulls; categorical
//! columns are cast to `String`. Rows are never dropped.

use crate::error::{DataError, Result};
use crate::schema::{FeatureKind, FeatureSchema};
use polars::prelude::*;

/// Check that every schema feature is a column of `df`.
///
/// # Errors
/// Returns [`DataError::MissingColumn`] naming the first absent feature.
pub fn ensure_columns(df: &DataFrame, schema: &FeatureSchema) -> Result<()> {
    match schema
        .names()
        .into_iter()
        .find(|name| df.get_column_index(name).is_none())
    {
        Some(name) => Err(DataError::MissingColumn(name.to_string())),
        None => Ok(()),
    }
}

/// Coerce schema columns to their expected types.
///
/// Width and row count are preserved; columns outside the schema pass through
/// untouched.
///
/// # Errors
/// Returns [`DataError::MissingColumn`] if a schema feature is absent.
pub fn clean(raw: DataFrame, schema: &FeatureSchema) -> Result<DataFrame> {
    ensure_columns(&raw, schema)?;

    // Non-strict casts: invalid numbers become null instead of failing.
    // Text is trimmed first so padded cells parse like record fields do.
    let casts: Vec<Expr> = schema
        .features()
        .iter()
        .map(|spec| match spec.kind {
            FeatureKind::Numeric if is_text(&raw, spec.name) => col(spec.name)
                .str()
                .strip_chars(lit(NULL))
                .cast(DataType::Float64),
            FeatureKind::Numeric => col(spec.name).cast(DataType::Float64),
            FeatureKind::Categorical => col(spec.name).cast(DataType::String),
        })
        .collect();

    let cleaned = raw.lazy().with_columns(casts).collect()?;
    Ok(cleaned)
}

fn is_text(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .is_ok_and(|column| column.dtype() == &DataType::String)
}

/// Null count of each schema feature, in schema order.
pub fn missing_counts(df: &DataFrame, schema: &FeatureSchema) -> Vec<(&'static str, usize)> {
    schema
        .names()
        .into_iter()
        .map(|name| {
            let nulls = df.column(name).map(|c| c.null_count()).unwrap_or(df.height());
            (name, nulls)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeatureSpec;

    fn small_schema() -> FeatureSchema {
        FeatureSchema::new(
            vec![
                FeatureSpec::numeric("Note_Maths", ""),
                FeatureSpec::categorical("Serie_Bac", ""),
            ],
            "Secteur_Activite",
        )
        .unwrap()
    }

    fn raw_frame() -> DataFrame {
        df! {
            "Note_Maths" => [Some("12.5"), Some("abc"), None, Some("18")],
            "Serie_Bac" => [Some("S"), None, Some("L"), Some("ES")],
            "Extra" => [1i32, 2, 3, 4],
        }
        .unwrap()
    }

    #[test]
    fn test_numeric_coercion_turns_invalid_into_null() {
        let cleaned = clean(raw_frame(), &small_schema()).unwrap();
        let maths: Vec<Option<f64>> = cleaned
            .column("Note_Maths")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(maths, vec![Some(12.5), None, None, Some(18.0)]);
    }

    #[test]
    fn test_padded_numbers_are_trimmed() {
        let raw = df! {
            "Note_Maths" => [" 12", "12 ", "\t7.5 ", " "],
            "Serie_Bac" => ["S", "S", "L", "L"],
        }
        .unwrap();
        let cleaned = clean(raw, &small_schema()).unwrap();
        let maths: Vec<Option<f64>> = cleaned
            .column("Note_Maths")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(maths, vec![Some(12.0), Some(12.0), Some(7.5), None]);
    }

    #[test]
    fn test_typed_numbers_pass_through() {
        let raw = df! {
            "Note_Maths" => [Some(12i64), None],
            "Serie_Bac" => ["S", "L"],
        }
        .unwrap();
        let cleaned = clean(raw, &small_schema()).unwrap();
        assert_eq!(cleaned.column("Note_Maths").unwrap().null_count(), 1);
        assert_eq!(cleaned.column("Note_Maths").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_shape_is_preserved() {
        let raw = raw_frame();
        let (rows, cols) = raw.shape();
        let cleaned = clean(raw, &small_schema()).unwrap();
        assert_eq!(cleaned.shape(), (rows, cols));
        assert_eq!(cleaned.column("Serie_Bac").unwrap().dtype(), &DataType::String);
        assert_eq!(cleaned.column("Extra").unwrap().dtype(), &DataType::Int32);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let raw = df! { "Note_Maths" => ["1"] }.unwrap();
        let err = clean(raw, &small_schema()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(name) if name == "Serie_Bac"));
    }

    #[test]
    fn test_missing_counts() {
        let cleaned = clean(raw_frame(), &small_schema()).unwrap();
        let counts = missing_counts(&cleaned, &small_schema());
        assert_eq!(counts, vec![("Note_Maths", 2), ("Serie_Bac", 1)]);
    }
}
