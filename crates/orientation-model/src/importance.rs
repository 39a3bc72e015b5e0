//! Feature importance keyed by schema feature.

use ndarray::Array1;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Feature weights sorted by descending weight.
///
/// One-hot columns are summed back to the feature they came from, so the keys
/// are schema feature names. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportance {
    entries: Vec<(String, f64)>,
}

impl FeatureImportance {
    /// Aggregate encoded-column weights into their source features.
    ///
    /// # Arguments
    /// * `features` - Every source feature; those without encoded columns weigh 0
    /// * `sources` - Source feature of each encoded column
    /// * `weights` - Weight of each encoded column
    pub fn from_encoded(features: &[&str], sources: &[&str], weights: &Array1<f64>) -> Self {
        let mut order: Vec<&str> = features.to_vec();
        let mut totals: HashMap<&str, f64> = features.iter().map(|&f| (f, 0.0)).collect();
        for (&source, &w) in sources.iter().zip(weights.iter()) {
            let entry = totals.entry(source).or_insert_with(|| {
                order.push(source);
                0.0
            });
            *entry += w;
        }

        let entries = order
            .into_iter()
            .map(|name| (name.to_string(), totals[name]))
            .collect();
        Self::from_entries(entries)
    }

    /// Build from `(feature, weight)` pairs; sorts by descending weight,
    /// name ascending on ties.
    pub fn from_entries(mut entries: Vec<(String, f64)>) -> Self {
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Weight of a feature.
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, w)| *w)
    }

    /// Entries in descending weight.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, w)| (name.as_str(), *w))
    }

    /// The `n` heaviest features.
    pub fn top(&self, n: usize) -> &[(String, f64)] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no model was available.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, weight) in &self.entries {
            map.serialize_entry(name, weight)?;
        }
        map.end()
    }
}

impl fmt::Display for FeatureImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, weight) in &self.entries {
            writeln!(f, "{:<28} {:>7.4}", name, weight)?;
        }
        Ok(())
    }
}
