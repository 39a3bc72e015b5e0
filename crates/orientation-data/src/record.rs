//! Student records.
//!
//! [`StudentRecord`] is the statically typed intake record: one optional field per
//! schema feature, serialized under the original column names. Labeling a record
//! consumes it and produces a [`LabeledStudent`] carrying the predicted [`Sector`].

use crate::error::{DataError, Result};
use crate::schema::{FeatureKind, FeatureSchema, TARGET_COLUMN, UNKNOWN_SECTOR};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar feature value as received from a loosely typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Conversion between a typed record field and a [`FeatureValue`].
///
/// Numeric fields parse text and drop non-finite numbers; categorical fields render
/// numbers as text and treat blank strings as missing.
trait RecordField: Sized {
    fn to_feature(&self) -> Option<FeatureValue>;
    fn from_feature(value: Option<FeatureValue>) -> Self;
}

impl RecordField for Option<f64> {
    fn to_feature(&self) -> Option<FeatureValue> {
        self.map(FeatureValue::Number)
    }

    fn from_feature(value: Option<FeatureValue>) -> Self {
        match value? {
            FeatureValue::Number(n) => Some(n),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|n| n.is_finite())
    }
}

impl RecordField for Option<String> {
    fn to_feature(&self) -> Option<FeatureValue> {
        self.clone().map(FeatureValue::Text)
    }

    fn from_feature(value: Option<FeatureValue>) -> Self {
        match value? {
            FeatureValue::Number(n) => Some(n.to_string()),
            FeatureValue::Text(s) if s.trim().is_empty() => None,
            FeatureValue::Text(s) => Some(s),
        }
    }
}

/// Deserialize a record field through [`FeatureValue`], so JSON input coerces
/// the same way as [`StudentRecord::from_values`].
fn deserialize_field<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: RecordField,
{
    let value = Option::<FeatureValue>::deserialize(deserializer)?;
    Ok(T::from_feature(value))
}

macro_rules! student_record {
    ($($field:ident: $ty:ty => $name:literal),* $(,)?) => {
        /// Features of one student, mirroring the canonical feature schema.
        ///
        /// Absent fields are missing values; imputation decides what they become.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct StudentRecord {
            $(
                #[doc = concat!("`", $name, "`")]
                #[serde(rename = $name, default, deserialize_with = "deserialize_field")]
                pub $field: $ty,
            )*
        }

        impl StudentRecord {
            /// Value of a feature by schema name; `None` when missing or not a record field.
            pub fn value(&self, name: &str) -> Option<FeatureValue> {
                match name {
                    $($name => self.$field.to_feature(),)*
                    _ => None,
                }
            }

            /// Set a feature by schema name.
            ///
            /// # Errors
            /// Returns [`DataError::UnknownFeature`] for a name that is not a record field.
            pub fn set(&mut self, name: &str, value: Option<FeatureValue>) -> Result<()> {
                match name {
                    $($name => self.$field = RecordField::from_feature(value),)*
                    _ => return Err(DataError::UnknownFeature(name.to_string())),
                }
                Ok(())
            }

            /// Names of every record field
            pub const FIELD_NAMES: &'static [&'static str] = &[$($name),*];
        }
    };
}

student_record! {
    sexe: Option<String> => "Sexe",
    age_bac: Option<f64> => "Age_Bac",
    serie_bac: Option<String> => "Serie_Bac",
    matieres_preferees: Option<String> => "Matieres_Preferees",
    note_maths: Option<f64> => "Note_Maths",
    note_francais_ecrit: Option<f64> => "Note_Francais_Ecrit",
    note_francais_oral: Option<f64> => "Note_Francais_Oral",
    note_anglais_ecrit: Option<f64> => "Note_Anglais_Ecrit",
    note_anglais_oral: Option<f64> => "Note_Anglais_Oral",
    note_philo: Option<f64> => "Note_Philo",
    note_physique_chimie: Option<f64> => "Note_Physique_Chimie",
    note_svt: Option<f64> => "Note_SVT",
    note_histoire_geo: Option<f64> => "Note_Histoire_Geo",
    note_eps: Option<f64> => "Note_EPS",
    note_espagnol_ecrit: Option<f64> => "Note_Espagnol_Ecrit",
    note_espagnol_oral: Option<f64> => "Note_Espagnol_Oral",
    points_bac: Option<f64> => "Points_BAC",
    personnalite: Option<String> => "Personnalite",
    religion: Option<String> => "Religion",
    competences_techniques: Option<String> => "Competences_Techniques",
    secteur_desire: Option<String> => "Secteur_Desire",
    etablissement: Option<String> => "Etablissement",
    lieu_habitation_bac: Option<String> => "Lieu_Habitation_Bac",
    note_facultative_1: Option<f64> => "Note_Facultative_1",
    note_facultative_2: Option<f64> => "Note_Facultative_2",
    secteur_activite_famille: Option<String> => "Secteur_Activite_Famille",
    justification_choix: Option<String> => "Justification_Choix",
    descriptions: Option<String> => "Descriptions",
}

impl StudentRecord {
    /// Build a record from `(feature name, value)` pairs.
    ///
    /// Keys absent from the input stay missing. Numeric features given unparseable
    /// text become missing.
    ///
    /// # Errors
    /// Returns [`DataError::UnknownFeature`] for any key outside the schema.
    pub fn from_values<I, K, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Option<FeatureValue>>,
    {
        let mut record = Self::default();
        for (key, value) in values {
            record.set(key.as_ref(), value.into())?;
        }
        Ok(record)
    }

    /// Features of `schema` that have no value in this record
    pub fn missing_features(&self, schema: &FeatureSchema) -> Vec<&'static str> {
        schema
            .names()
            .into_iter()
            .filter(|name| self.value(name).is_none())
            .collect()
    }

    /// Check value ranges accepted at intake.
    ///
    /// `Age_Bac` must be a whole number within 15..=25, every grade within 0..=20
    /// and `Points_BAC` non-negative. Missing values are not range errors.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidValue`] for the first out-of-range feature.
    pub fn validate(&self) -> Result<()> {
        if let Some(age) = self.age_bac
            && age.fract() != 0.0
        {
            return Err(DataError::InvalidValue {
                feature: "Age_Bac".to_string(),
                reason: format!("{} is not a whole number of years", age),
            });
        }
        if let Some(age) = self.age_bac
            && !(15.0..=25.0).contains(&age)
        {
            return Err(DataError::InvalidValue {
                feature: "Age_Bac".to_string(),
                reason: format!("{} is outside 15..=25", age),
            });
        }

        for name in Self::FIELD_NAMES.iter().filter(|n| n.starts_with("Note_")) {
            if let Some(FeatureValue::Number(grade)) = self.value(name)
                && !(0.0..=20.0).contains(&grade)
            {
                return Err(DataError::InvalidValue {
                    feature: (*name).to_string(),
                    reason: format!("{} is outside 0..=20", grade),
                });
            }
        }

        if let Some(points) = self.points_bac
            && points < 0.0
        {
            return Err(DataError::InvalidValue {
                feature: "Points_BAC".to_string(),
                reason: format!("{} is negative", points),
            });
        }

        Ok(())
    }

    /// Attach the predicted sector, producing an unsaved labeled student.
    pub const fn label(self, sector: Sector) -> LabeledStudent {
        LabeledStudent {
            id: None,
            record: self,
            sector,
        }
    }
}

/// Build a table with one row per record and one column per schema feature.
///
/// Every schema column is present; missing values are nulls. Numeric columns are
/// `Float64`, categorical columns `String`.
pub fn records_to_frame(records: &[StudentRecord], schema: &FeatureSchema) -> Result<DataFrame> {
    let columns: Vec<Column> = schema
        .features()
        .iter()
        .map(|spec| match spec.kind {
            FeatureKind::Numeric => {
                let values: Vec<Option<f64>> = records
                    .iter()
                    .map(|r| RecordField::from_feature(r.value(spec.name)))
                    .collect();
                Column::new(spec.name.into(), values)
            }
            FeatureKind::Categorical => {
                let values: Vec<Option<String>> = records
                    .iter()
                    .map(|r| RecordField::from_feature(r.value(spec.name)))
                    .collect();
                Column::new(spec.name.into(), values)
            }
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Predicted professional activity sector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sector(String);

impl Sector {
    /// Wrap a sector label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The explicit class used for missing targets
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_SECTOR)
    }

    /// Label text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the label text
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sector {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Sector {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A student record together with its predicted sector.
///
/// `id` is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledStudent {
    /// Store identifier, `None` until persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The intake record
    #[serde(flatten)]
    pub record: StudentRecord,
    /// Predicted sector
    #[serde(rename = "Secteur_Activite")]
    pub sector: Sector,
}

impl LabeledStudent {
    /// Same student with a store identifier
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Name of the column holding [`LabeledStudent::sector`]
    pub const fn sector_column() -> &'static str {
        TARGET_COLUMN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_record() -> StudentRecord {
        StudentRecord::from_values([
            ("Sexe", FeatureValue::from("Masculin")),
            ("Age_Bac", FeatureValue::from(18.0)),
            ("Serie_Bac", FeatureValue::from("S")),
            ("Note_Maths", FeatureValue::from(16.0)),
            ("Points_BAC", FeatureValue::from(280.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_field_names_match_schema() {
        let schema = FeatureSchema::canonical();
        assert_eq!(StudentRecord::FIELD_NAMES, schema.names().as_slice());
    }

    #[test]
    fn test_from_values() {
        let record = sample_record();
        assert_eq!(record.sexe.as_deref(), Some("Masculin"));
        assert_eq!(record.note_maths, Some(16.0));
        assert_eq!(record.value("Serie_Bac"), Some(FeatureValue::from("S")));
        assert!(record.religion.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = StudentRecord::from_values([("Shoe_Size", FeatureValue::from(42.0))]);
        assert!(matches!(result, Err(DataError::UnknownFeature(name)) if name == "Shoe_Size"));
    }

    #[rstest]
    #[case(FeatureValue::from("15.5"), Some(15.5))]
    #[case(FeatureValue::from(" 12 "), Some(12.0))]
    #[case(FeatureValue::from("abc"), None)]
    #[case(FeatureValue::from(f64::NAN), None)]
    fn test_numeric_coercion(#[case] input: FeatureValue, #[case] expected: Option<f64>) {
        let record = StudentRecord::from_values([("Note_Philo", input)]).unwrap();
        assert_eq!(record.note_philo, expected);
    }

    #[rstest]
    #[case(FeatureValue::from(3.0), Some("3"))]
    #[case(FeatureValue::from("   "), None)]
    #[case(FeatureValue::from("L"), Some("L"))]
    fn test_categorical_coercion(#[case] input: FeatureValue, #[case] expected: Option<&str>) {
        let record = StudentRecord::from_values([("Serie_Bac", input)]).unwrap();
        assert_eq!(record.serie_bac.as_deref(), expected);
    }

    #[test]
    fn test_missing_features() {
        let schema = FeatureSchema::canonical();
        let record = sample_record();
        let missing = record.missing_features(&schema);
        assert_eq!(missing.len(), 28 - 5);
        assert!(missing.contains(&"Religion"));
        assert!(!missing.contains(&"Note_Maths"));
    }

    #[test]
    fn test_validate_ranges() {
        assert!(sample_record().validate().is_ok());
        assert!(StudentRecord::default().validate().is_ok());

        let mut record = sample_record();
        record.note_svt = Some(21.0);
        assert!(matches!(
            record.validate(),
            Err(DataError::InvalidValue { feature, .. }) if feature == "Note_SVT"
        ));

        let mut record = sample_record();
        record.age_bac = Some(12.0);
        assert!(record.validate().is_err());

        let mut record = sample_record();
        record.points_bac = Some(-1.0);
        assert!(record.validate().is_err());
    }

    #[rstest]
    #[case(17.5, false)]
    #[case(15.0, true)]
    #[case(25.0, true)]
    #[case(25.5, false)]
    fn test_age_must_be_whole_years(#[case] age: f64, #[case] valid: bool) {
        let mut record = sample_record();
        record.age_bac = Some(age);
        match record.validate() {
            Ok(()) => assert!(valid),
            Err(DataError::InvalidValue { feature, .. }) => {
                assert!(!valid);
                assert_eq!(feature, "Age_Bac");
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_json_uses_schema_names() {
        let json = r#"{"Sexe": "Feminin", "Note_Maths": 14.5, "Serie_Bac": null}"#;
        let record: StudentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sexe.as_deref(), Some("Feminin"));
        assert_eq!(record.note_maths, Some(14.5));
        assert!(record.serie_bac.is_none());

        let bad = r#"{"Sexe": "Feminin", "Unexpected": 1}"#;
        assert!(serde_json::from_str::<StudentRecord>(bad).is_err());
    }

    #[test]
    fn test_json_coerces_like_from_values() {
        let json = r#"{"Age_Bac": "18", "Serie_Bac": 1, "Note_Maths": " 12 ", "Sexe": " ", "Note_SVT": "n/a"}"#;
        let record: StudentRecord = serde_json::from_str(json).unwrap();
        let expected = StudentRecord::from_values([
            ("Age_Bac", FeatureValue::from("18")),
            ("Serie_Bac", FeatureValue::from(1.0)),
            ("Note_Maths", FeatureValue::from(" 12 ")),
            ("Sexe", FeatureValue::from(" ")),
            ("Note_SVT", FeatureValue::from("n/a")),
        ])
        .unwrap();

        assert_eq!(record, expected);
        assert_eq!(record.age_bac, Some(18.0));
        assert_eq!(record.serie_bac.as_deref(), Some("1"));
        assert!(record.sexe.is_none());
        assert!(record.note_svt.is_none());
    }

    #[test]
    fn test_records_to_frame_has_every_column() {
        let schema = FeatureSchema::canonical();
        let df = records_to_frame(&[sample_record(), StudentRecord::default()], &schema).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 28);
        assert_eq!(df.column("Note_Maths").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Religion").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Religion").unwrap().null_count(), 2);
        assert_eq!(df.column("Sexe").unwrap().null_count(), 1);
    }

    #[test]
    fn test_label_serializes_sector() {
        let labeled = sample_record().label(Sector::from("Informatique")).with_id(7);
        let json = serde_json::to_value(&labeled).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["Secteur_Activite"], "Informatique");
        assert_eq!(json["Serie_Bac"], "S");
    }
}
