//! Subject profile: who the alerts are for.
//!
//! The profile personalizes the classifier prompt. Its key set is closed:
//! updates may change the value of a known attribute but never add one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ProfileError;

/// Recognized profile attribute names, in display order.
pub const PROFILE_KEYS: [&str; 6] = [
    "name",
    "degree",
    "year",
    "university",
    "graduation_year",
    "specialization",
];

/// The person whose inbox is being monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub name: String,
    pub degree: String,
    pub year: String,
    pub university: String,
    pub graduation_year: String,
    pub specialization: String,
}

impl Default for SubjectProfile {
    fn default() -> Self {
        Self {
            name: "Akkilesh A".into(),
            degree: "BTech".into(),
            year: "4th year".into(),
            university: "VIT Chennai".into(),
            graduation_year: "2026".into(),
            specialization: "Computer Science & Engineering".into(),
        }
    }
}

/// Outcome of applying a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    /// Keys whose values were changed.
    pub applied: Vec<String>,
    /// Unknown keys, and known keys submitted with an empty value.
    pub rejected: Vec<String>,
}

impl SubjectProfile {
    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "name" => Some(&mut self.name),
            "degree" => Some(&mut self.degree),
            "year" => Some(&mut self.year),
            "university" => Some(&mut self.university),
            "graduation_year" => Some(&mut self.graduation_year),
            "specialization" => Some(&mut self.specialization),
            _ => None,
        }
    }

    /// Look up an attribute by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "name" => Some(&self.name),
            "degree" => Some(&self.degree),
            "year" => Some(&self.year),
            "university" => Some(&self.university),
            "graduation_year" => Some(&self.graduation_year),
            "specialization" => Some(&self.specialization),
            _ => None,
        }
    }

    /// Flat key/value view.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        PROFILE_KEYS
            .iter()
            .filter_map(|k| self.get(k).map(|v| (k.to_string(), v.to_string())))
            .collect()
    }

    /// Apply a partial update. Unknown keys and empty values are rejected.
    pub fn apply<'a, I>(&mut self, changes: I) -> ProfileUpdate
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut outcome = ProfileUpdate::default();
        for (key, value) in changes {
            let value = value.trim();
            match self.field_mut(key) {
                Some(slot) if !value.is_empty() => {
                    *slot = value.to_string();
                    info!(field = %key, value = %value, "Updated subject profile");
                    outcome.applied.push(key.clone());
                }
                Some(_) => {
                    warn!(field = %key, "Ignoring empty profile value");
                    outcome.rejected.push(key.clone());
                }
                None => {
                    warn!(field = %key, "Unknown profile field");
                    outcome.rejected.push(key.clone());
                }
            }
        }
        outcome
    }
}

/// Shared, mutable profile handle.
///
/// Last write wins; readers take a snapshot and use it for the whole
/// classification.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    inner: Arc<RwLock<SubjectProfile>>,
}

impl ProfileStore {
    pub fn new(profile: SubjectProfile) -> Self {
        Self {
            inner: Arc::new(RwLock::new(profile)),
        }
    }

    /// Copy of the current profile.
    pub async fn snapshot(&self) -> SubjectProfile {
        self.inner.read().await.clone()
    }

    /// Apply a partial update, failing when nothing recognized was submitted.
    pub async fn update(
        &self,
        changes: &BTreeMap<String, String>,
    ) -> Result<(SubjectProfile, ProfileUpdate), ProfileError> {
        let mut guard = self.inner.write().await;

        // Validate before mutating so a rejected request changes nothing.
        let mut probe = guard.clone();
        let outcome = probe.apply(changes);
        if outcome.applied.is_empty() {
            return Err(ProfileError::NoRecognizedFields {
                rejected: outcome.rejected,
            });
        }

        *guard = probe;
        Ok((guard.clone(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_profile_has_every_key() {
        let map = SubjectProfile::default().to_map();
        assert_eq!(map.len(), PROFILE_KEYS.len());
        assert_eq!(map["graduation_year"], "2026");
    }

    #[test]
    fn apply_known_key() {
        let mut profile = SubjectProfile::default();
        let outcome = profile.apply(&changes(&[("specialization", "AI & ML")]));
        assert_eq!(outcome.applied, vec!["specialization"]);
        assert!(outcome.rejected.is_empty());
        assert_eq!(profile.specialization, "AI & ML");
    }

    #[test]
    fn apply_rejects_unknown_key_without_inserting() {
        let mut profile = SubjectProfile::default();
        let outcome = profile.apply(&changes(&[("cgpa", "9.1")]));
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.rejected, vec!["cgpa"]);
        assert!(profile.get("cgpa").is_none());
        assert_eq!(profile.to_map().len(), PROFILE_KEYS.len());
    }

    #[test]
    fn apply_rejects_empty_value() {
        let mut profile = SubjectProfile::default();
        let outcome = profile.apply(&changes(&[("name", "   ")]));
        assert!(outcome.applied.is_empty());
        assert_eq!(profile.name, "Akkilesh A");
    }

    #[tokio::test]
    async fn store_update_mixed_keys() {
        let store = ProfileStore::default();
        let (profile, outcome) = store
            .update(&changes(&[("year", "3rd year"), ("hobby", "chess")]))
            .await
            .unwrap();
        assert_eq!(profile.year, "3rd year");
        assert_eq!(outcome.applied, vec!["year"]);
        assert_eq!(outcome.rejected, vec!["hobby"]);
        assert_eq!(store.snapshot().await.year, "3rd year");
    }

    #[tokio::test]
    async fn store_update_with_nothing_recognized_fails() {
        let store = ProfileStore::default();
        let err = store
            .update(&changes(&[("hobby", "chess"), ("name", "")]))
            .await
            .unwrap_err();
        let ProfileError::NoRecognizedFields { rejected } = err;
        assert_eq!(rejected.len(), 2);
        assert_eq!(store.snapshot().await, SubjectProfile::default());
    }
}
