//! Default catalog of side-effect types.
//!
//! The catalog is seeded once and referenced by name from dose logs. Log
//! tags that are not in the catalog are kept as free text.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<SideEffectCatalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static SideEffectCatalog {
    &DEFAULT_CATALOG
}

#[allow(clippy::too_many_arguments)]
fn seed(
    entries: &mut HashMap<String, SideEffectType>,
    name: &str,
    description: &str,
    severity: Severity,
    category: &str,
    is_common: bool,
    requires_medical_attention: bool,
    symptoms: &[&str],
) {
    entries.insert(
        name.to_lowercase(),
        SideEffectType {
            name: name.into(),
            description: Some(description.into()),
            severity,
            category: category.into(),
            is_common,
            requires_medical_attention,
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        },
    );
}

/// Builds the default side-effect catalog
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference.
pub fn build_default_catalog() -> SideEffectCatalog {
    let mut entries = HashMap::new();

    // Common, self-limiting
    seed(
        &mut entries,
        "Headache",
        "Pain or discomfort in the head",
        Severity::Mild,
        "neurological",
        true,
        false,
        &["head pain", "heaviness", "throbbing"],
    );
    seed(
        &mut entries,
        "Nausea",
        "Urge to vomit",
        Severity::Mild,
        "digestive",
        true,
        false,
        &["queasy stomach", "retching", "loss of appetite"],
    );
    seed(
        &mut entries,
        "Dizziness",
        "Disturbed sense of balance",
        Severity::Mild,
        "neurological",
        true,
        false,
        &["lightheadedness", "vertigo", "unsteadiness on standing"],
    );
    seed(
        &mut entries,
        "Drowsiness",
        "Strong sleepiness or reduced concentration",
        Severity::Mild,
        "neurological",
        true,
        false,
        &["fatigue", "poor concentration", "slowed reactions"],
    );
    seed(
        &mut entries,
        "Constipation",
        "Difficulty passing stool",
        Severity::Mild,
        "digestive",
        true,
        false,
        &["fewer bowel movements", "bloating", "abdominal pain"],
    );
    seed(
        &mut entries,
        "Diarrhea",
        "Loose or watery stool",
        Severity::Mild,
        "digestive",
        true,
        false,
        &["loose stool", "abdominal pain", "frequent bowel movements"],
    );

    // Need medical attention
    seed(
        &mut entries,
        "Skin rash",
        "Inflammation or eczema of the skin",
        Severity::Moderate,
        "skin",
        false,
        true,
        &["redness", "itching", "swelling", "blisters"],
    );
    seed(
        &mut entries,
        "Shortness of breath",
        "Breathing difficulty",
        Severity::Severe,
        "respiratory",
        false,
        true,
        &["breathlessness", "chest tightness", "wheezing"],
    );
    seed(
        &mut entries,
        "Palpitations",
        "Irregular or forceful heartbeat",
        Severity::Moderate,
        "cardiovascular",
        false,
        true,
        &["raised heart rate", "arrhythmia", "chest pain"],
    );
    seed(
        &mut entries,
        "Anaphylaxis",
        "Severe allergic reaction",
        Severity::Critical,
        "allergic",
        false,
        true,
        &[
            "generalised rash",
            "breathing difficulty",
            "low blood pressure",
            "loss of consciousness",
        ],
    );

    SideEffectCatalog { entries }
}

impl SideEffectCatalog {
    /// Case-insensitive lookup by name
    pub fn get(&self, name: &str) -> Option<&SideEffectType> {
        self.entries.get(&name.trim().to_lowercase())
    }

    /// All entries, most severe first, then by name
    pub fn list(&self) -> Vec<&SideEffectType> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn requiring_attention(&self) -> Vec<&SideEffectType> {
        self.list()
            .into_iter()
            .filter(|e| e.requires_medical_attention)
            .collect()
    }

    /// Catalog entries tagged on `log` that need medical attention
    pub fn flag_log(&self, log: &MedicationLog) -> Vec<&SideEffectType> {
        let mut flagged: Vec<_> = log
            .side_effects
            .iter()
            .filter_map(|tag| self.get(tag))
            .filter(|e| e.requires_medical_attention)
            .collect();
        flagged.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.name.cmp(&b.name)));
        flagged.dedup_by(|a, b| a.name == b.name);
        flagged
    }

    /// Validate catalog integrity
    ///
    /// Returns a list of problems found (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, entry) in &self.entries {
            if entry.name.trim().is_empty() {
                errors.push(format!("Side effect '{}' has an empty name", key));
            }
            if *key != entry.name.to_lowercase() {
                errors.push(format!(
                    "Side effect key '{}' does not match name '{}'",
                    key, entry.name
                ));
            }
            if entry.category.trim().is_empty() {
                errors.push(format!("Side effect '{}' has no category", entry.name));
            }
            if entry.severity == Severity::Critical && !entry.requires_medical_attention {
                errors.push(format!(
                    "Side effect '{}' is critical but not flagged for medical attention",
                    entry.name
                ));
            }
        }

        errors
    }
}
