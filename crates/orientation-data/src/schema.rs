//! Feature Schema
//!
//! Canonical ordered list of the student features used by the orientation model.
//! Every other component (cleaner, encoder, record type, store) reads feature names
//! and kinds from here.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the target column holding the activity sector.
pub const TARGET_COLUMN: &str = "Secteur_Activite";

/// Explicit class assigned to rows whose target is missing.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// How a feature is represented before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Floating point value (grades, points, age)
    Numeric,
    /// Free label drawn from an open vocabulary
    Categorical,
}

/// Feature metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    /// Column name (unique identifier)
    pub name: &'static str,
    /// Numeric or categorical
    pub kind: FeatureKind,
    /// Brief description of what the feature holds
    pub description: &'static str,
}

impl FeatureSpec {
    /// Numeric feature
    pub const fn numeric(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FeatureKind::Numeric,
            description,
        }
    }

    /// Categorical feature
    pub const fn categorical(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FeatureKind::Categorical,
            description,
        }
    }

    /// Whether the feature is categorical
    pub const fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical)
    }
}

const CANONICAL_FEATURES: [FeatureSpec; 28] = [
    FeatureSpec::categorical("Sexe", "Gender of the student"),
    FeatureSpec::numeric("Age_Bac", "Age when passing the baccalaureate"),
    FeatureSpec::categorical("Serie_Bac", "Baccalaureate track"),
    FeatureSpec::categorical("Matieres_Preferees", "Preferred subjects"),
    FeatureSpec::numeric("Note_Maths", "Mathematics grade"),
    FeatureSpec::numeric("Note_Francais_Ecrit", "French written grade"),
    FeatureSpec::numeric("Note_Francais_Oral", "French oral grade"),
    FeatureSpec::numeric("Note_Anglais_Ecrit", "English written grade"),
    FeatureSpec::numeric("Note_Anglais_Oral", "English oral grade"),
    FeatureSpec::numeric("Note_Philo", "Philosophy grade"),
    FeatureSpec::numeric("Note_Physique_Chimie", "Physics and chemistry grade"),
    FeatureSpec::numeric("Note_SVT", "Life and earth sciences grade"),
    FeatureSpec::numeric("Note_Histoire_Geo", "History and geography grade"),
    FeatureSpec::numeric("Note_EPS", "Physical education grade"),
    FeatureSpec::numeric("Note_Espagnol_Ecrit", "Spanish written grade"),
    FeatureSpec::numeric("Note_Espagnol_Oral", "Spanish oral grade"),
    FeatureSpec::numeric("Points_BAC", "Total baccalaureate points"),
    FeatureSpec::categorical("Personnalite", "Personality traits"),
    FeatureSpec::categorical("Religion", "Religion"),
    FeatureSpec::categorical("Competences_Techniques", "Technical skills"),
    FeatureSpec::categorical("Secteur_Desire", "Desired activity sector"),
    FeatureSpec::categorical("Etablissement", "High school"),
    FeatureSpec::categorical("Lieu_Habitation_Bac", "Place of residence at the baccalaureate"),
    FeatureSpec::numeric("Note_Facultative_1", "First optional grade"),
    FeatureSpec::numeric("Note_Facultative_2", "Second optional grade"),
    FeatureSpec::categorical("Secteur_Activite_Famille", "Activity sector of the family"),
    FeatureSpec::categorical("Justification_Choix", "Justification of the orientation choice"),
    FeatureSpec::categorical("Descriptions", "Additional free-form description"),
];

/// Ordered feature list plus the target column.
///
/// Immutable once built; names are unique and the target is never an input feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    target: &'static str,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::canonical()
    }
}

impl FeatureSchema {
    /// The 28-feature schema used by the orientation model.
    pub fn canonical() -> Self {
        Self {
            features: CANONICAL_FEATURES.to_vec(),
            target: TARGET_COLUMN,
        }
    }

    /// Build a custom schema.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidSchema`] if the list is empty, a name is repeated,
    /// or the target is also listed as a feature.
    pub fn new(features: Vec<FeatureSpec>, target: &'static str) -> Result<Self> {
        if features.is_empty() {
            return Err(DataError::InvalidSchema("no features".to_string()));
        }
        let mut seen = HashSet::new();
        for spec in &features {
            if !seen.insert(spec.name) {
                return Err(DataError::InvalidSchema(format!(
                    "duplicate feature {}",
                    spec.name
                )));
            }
        }
        if seen.contains(target) {
            return Err(DataError::InvalidSchema(format!(
                "target {} listed as a feature",
                target
            )));
        }
        Ok(Self { features, target })
    }

    /// All features in canonical order
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Feature names in canonical order
    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name).collect()
    }

    /// Feature names followed by the target column
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = self.names();
        cols.push(self.target);
        cols
    }

    /// Name of the target column
    pub const fn target(&self) -> &'static str {
        self.target
    }

    /// Numeric features, in schema order
    pub fn numeric(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features
            .iter()
            .filter(|f| f.kind == FeatureKind::Numeric)
    }

    /// Categorical features, in schema order
    pub fn categorical(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features.iter().filter(|f| f.is_categorical())
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Position of a feature in the schema
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Number of input features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the schema has no features (never true for a valid schema)
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_counts() {
        let schema = FeatureSchema::canonical();
        assert_eq!(schema.len(), 28);
        assert_eq!(schema.numeric().count(), 16);
        assert_eq!(schema.categorical().count(), 12);
        // 28 inputs + target
        assert_eq!(schema.columns().len(), 29);
    }

    #[test]
    fn test_names_are_unique() {
        let schema = FeatureSchema::canonical();
        let names: HashSet<_> = schema.names().into_iter().collect();
        assert_eq!(names.len(), schema.len());
        assert!(!names.contains(TARGET_COLUMN));
    }

    #[test]
    fn test_lookup() {
        let schema = FeatureSchema::canonical();
        assert_eq!(schema.index_of("Sexe"), Some(0));
        assert_eq!(schema.index_of("Descriptions"), Some(27));
        assert_eq!(
            schema.get("Note_Maths").map(|f| f.kind),
            Some(FeatureKind::Numeric)
        );
        assert!(schema.get("Serie_Bac").unwrap().is_categorical());
        assert!(schema.get("Nonexistent").is_none());
    }

    #[test]
    fn test_custom_schema_rejects_duplicates() {
        let specs = vec![
            FeatureSpec::numeric("a", ""),
            FeatureSpec::numeric("a", ""),
        ];
        assert!(matches!(
            FeatureSchema::new(specs, "y"),
            Err(DataError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_custom_schema_rejects_target_as_feature() {
        let specs = vec![FeatureSpec::numeric("y", "")];
        assert!(FeatureSchema::new(specs, "y").is_err());
        assert!(FeatureSchema::new(Vec::new(), "y").is_err());
    }

    #[test]
    fn test_all_features_have_descriptions() {
        for spec in FeatureSchema::canonical().features() {
            assert!(
                !spec.description.is_empty(),
                "Feature {} has no description",
                spec.name
            );
        }
    }
}
