//! Treatment content model and the partial patches the fix applier returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A narrative treatment under evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    /// Content identifier; one analysis session exists per identifier.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub tone: String,
    /// Any further named sections (characters, beats, themes, ...).
    #[serde(default, flatten)]
    pub sections: BTreeMap<String, String>,
}

impl Treatment {
    pub fn new(id: impl Into<String>, title: impl Into<String>, synopsis: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            synopsis: synopsis.into(),
            ..Default::default()
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    pub fn with_section(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sections.insert(name.into(), text.into());
        self
    }

    /// A treatment with neither title nor synopsis has nothing to evaluate.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.synopsis.trim().is_empty()
    }

    /// Text of a named section, if present.
    pub fn section(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "logline" => self.logline.as_deref(),
            "synopsis" => Some(&self.synopsis),
            "genre" => Some(&self.genre),
            "tone" => Some(&self.tone),
            other => self.sections.get(other).map(String::as_str),
        }
    }

    /// Merge a patch into this treatment. Fields present in the patch
    /// replace the current value; everything else is kept.
    pub fn merge(&mut self, patch: TreatmentPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(logline) = patch.logline {
            self.logline = Some(logline);
        }
        if let Some(synopsis) = patch.synopsis {
            self.synopsis = synopsis;
        }
        if let Some(genre) = patch.genre {
            self.genre = genre;
        }
        if let Some(tone) = patch.tone {
            self.tone = tone;
        }
        self.sections.extend(patch.sections);
    }
}

/// Partial treatment returned by the fix applier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, flatten)]
    pub sections: BTreeMap<String, String>,
}

impl TreatmentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.logline.is_none()
            && self.synopsis.is_none()
            && self.genre.is_none()
            && self.tone.is_none()
            && self.sections.is_empty()
    }

    /// Patch replacing a single named section.
    pub fn section(name: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut patch = Self::default();
        match name {
            "title" => patch.title = Some(text),
            "logline" => patch.logline = Some(text),
            "synopsis" => patch.synopsis = Some(text),
            "genre" => patch.genre = Some(text),
            "tone" => patch.tone = Some(text),
            other => {
                patch.sections.insert(other.to_string(), text);
            }
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_only_patched_fields() {
        let mut treatment = Treatment::new("t-1", "Night Shift", "A nurse uncovers a conspiracy.")
            .with_genre("thriller")
            .with_section("characters", "Mara, a night nurse.");

        treatment.merge(TreatmentPatch {
            synopsis: Some("A nurse uncovers a hospital-wide conspiracy.".to_string()),
            ..Default::default()
        });

        assert_eq!(treatment.title, "Night Shift");
        assert_eq!(treatment.genre, "thriller");
        assert_eq!(treatment.synopsis, "A nurse uncovers a hospital-wide conspiracy.");
        assert_eq!(treatment.section("characters"), Some("Mara, a night nurse."));
    }

    #[test]
    fn test_section_patch_targets_named_section() {
        let mut treatment = Treatment::new("t-1", "Night Shift", "Synopsis");
        treatment.merge(TreatmentPatch::section("characters", "Mara and Theo."));
        treatment.merge(TreatmentPatch::section("logline", "One nurse. One night."));

        assert_eq!(treatment.section("characters"), Some("Mara and Theo."));
        assert_eq!(treatment.logline.as_deref(), Some("One nurse. One night."));
    }

    #[test]
    fn test_unknown_fields_are_kept_as_sections() {
        let json = r#"{"id":"t-2","title":"Drift","synopsis":"s","beats":"Act one..."}"#;
        let treatment: Treatment = serde_json::from_str(json).unwrap();
        assert_eq!(treatment.section("beats"), Some("Act one..."));
    }

    #[test]
    fn test_blank_treatment() {
        assert!(Treatment::new("t-3", " ", "").is_blank());
        assert!(!Treatment::new("t-3", "Title", "").is_blank());
    }
}
