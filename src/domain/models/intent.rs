//! Audience-targeting intent and the frozen target profile derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form audience-targeting parameters supplied by the user.
///
/// Editable until the first analysis locks it into a [`TargetProfile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub primary_genre: String,
    #[serde(default)]
    pub target_demographic: String,
    #[serde(default)]
    pub tone_profile: String,
}

impl Intent {
    pub fn new(
        primary_genre: impl Into<String>,
        target_demographic: impl Into<String>,
        tone_profile: impl Into<String>,
    ) -> Self {
        Self {
            primary_genre: primary_genre.into(),
            target_demographic: target_demographic.into(),
            tone_profile: tone_profile.into(),
        }
    }

    pub fn get(&self, field: IntentField) -> &str {
        match field {
            IntentField::PrimaryGenre => &self.primary_genre,
            IntentField::TargetDemographic => &self.target_demographic,
            IntentField::ToneProfile => &self.tone_profile,
        }
    }

    pub fn set(&mut self, field: IntentField, value: impl Into<String>) {
        let value = value.into();
        match field {
            IntentField::PrimaryGenre => self.primary_genre = value,
            IntentField::TargetDemographic => self.target_demographic = value,
            IntentField::ToneProfile => self.tone_profile = value,
        }
    }
}

/// Editable intent fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentField {
    PrimaryGenre,
    TargetDemographic,
    ToneProfile,
}

impl IntentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryGenre => "primaryGenre",
            Self::TargetDemographic => "targetDemographic",
            Self::ToneProfile => "toneProfile",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "primarygenre" | "genre" => Some(Self::PrimaryGenre),
            "targetdemographic" | "demographic" | "audience" => Some(Self::TargetDemographic),
            "toneprofile" | "tone" => Some(Self::ToneProfile),
            _ => None,
        }
    }
}

/// Intent fields inferred from treatment content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_profile: Option<String>,
}

impl DetectedIntent {
    pub fn is_empty(&self) -> bool {
        self.primary_genre.is_none() && self.tone_profile.is_none()
    }
}

/// Snapshot of the intent, frozen once per session on the first analysis.
///
/// Later intent edits never mutate a profile; they reset the session and a
/// fresh profile is locked on the next analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProfile {
    pub primary_genre: String,
    pub target_demographic: String,
    pub tone_profile: String,
    pub locked_at: DateTime<Utc>,
}

impl TargetProfile {
    /// Derive a profile from an intent. Fields are trimmed and lowercased so
    /// that cosmetic edits never produce a different profile.
    pub fn from_intent(intent: &Intent) -> Self {
        Self {
            primary_genre: normalize(&intent.primary_genre),
            target_demographic: normalize(&intent.target_demographic),
            tone_profile: normalize(&intent.tone_profile),
            locked_at: Utc::now(),
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
