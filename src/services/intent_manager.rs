//! Intent and target profile management.
//!
//! Owns the audience-targeting intent of a session: detecting it from
//! treatment content while editable, locking it into a [`TargetProfile`] on
//! the first analysis, and deciding when an edit requires a session reset.

use tracing::{debug, info};

use crate::domain::models::{
    AnalysisState, CheckpointResults, DetectedIntent, IntentField, TargetProfile, Treatment,
};

/// Genre vocabulary: `(needle, canonical value)`. First match wins.
const GENRE_VOCABULARY: &[(&str, &str)] = &[
    ("science fiction", "sci-fi"),
    ("sci-fi", "sci-fi"),
    ("scifi", "sci-fi"),
    ("romantic comedy", "romantic comedy"),
    ("rom-com", "romantic comedy"),
    ("thriller", "thriller"),
    ("horror", "horror"),
    ("comedy", "comedy"),
    ("drama", "drama"),
    ("action", "action"),
    ("adventure", "adventure"),
    ("fantasy", "fantasy"),
    ("romance", "romance"),
    ("mystery", "mystery"),
    ("crime", "crime"),
    ("documentary", "documentary"),
    ("animation", "animation"),
    ("animated", "animation"),
    ("western", "western"),
    ("musical", "musical"),
];

/// Tone vocabulary: `(needle, canonical value)`. First match wins.
const TONE_VOCABULARY: &[(&str, &str)] = &[
    ("dark", "dark"),
    ("gritty", "gritty"),
    ("suspense", "suspenseful"),
    ("tense", "suspenseful"),
    ("whimsical", "whimsical"),
    ("lighthearted", "lighthearted"),
    ("light-hearted", "lighthearted"),
    ("comedic", "comedic"),
    ("humorous", "comedic"),
    ("funny", "comedic"),
    ("satiric", "satirical"),
    ("uplifting", "uplifting"),
    ("hopeful", "uplifting"),
    ("inspirational", "uplifting"),
    ("melanchol", "melancholic"),
    ("bittersweet", "bittersweet"),
    ("serious", "serious"),
    ("dramatic", "dramatic"),
    ("epic", "epic"),
];

fn first_match(text: &str, vocabulary: &[(&str, &str)]) -> Option<String> {
    let haystack = text.to_lowercase();
    if haystack.trim().is_empty() {
        return None;
    }
    vocabulary
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, canonical)| (*canonical).to_string())
}

/// Infer genre and tone from the treatment's stated genre and tone.
///
/// Case-insensitive substring match against fixed vocabularies; the first
/// vocabulary entry found wins for each field.
pub fn detect_intent(treatment: &Treatment) -> DetectedIntent {
    DetectedIntent {
        primary_genre: first_match(&treatment.genre, GENRE_VOCABULARY),
        tone_profile: first_match(&treatment.tone, TONE_VOCABULARY),
    }
}

/// Apply detected intent to an unlocked session, filling only empty fields.
///
/// Returns whether anything changed. Locked sessions are never touched.
pub fn apply_detected_intent(state: &mut AnalysisState, detected: &DetectedIntent) -> bool {
    if state.has_intent_lock {
        return false;
    }

    let mut changed = false;
    let candidates = [
        (IntentField::PrimaryGenre, detected.primary_genre.as_deref()),
        (IntentField::ToneProfile, detected.tone_profile.as_deref()),
    ];
    for (field, value) in candidates {
        if let Some(value) = value {
            if state.intent.get(field).trim().is_empty() {
                debug!(field = field.as_str(), value, "applying detected intent");
                state.intent.set(field, value);
                changed = true;
            }
        }
    }
    changed
}

/// Outcome of a lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentLock {
    /// The intent was locked now; this profile is frozen for the session.
    Locked(TargetProfile),
    /// The session was already locked; the existing profile stands.
    AlreadyLocked(TargetProfile),
}

impl IntentLock {
    pub fn profile(&self) -> &TargetProfile {
        match self {
            Self::Locked(p) | Self::AlreadyLocked(p) => p,
        }
    }

    pub const fn newly_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

/// Lock the session's intent into a target profile.
///
/// Flips `has_intent_lock` at most once per session; repeated calls are inert
/// and return the profile that was frozen the first time.
pub fn lock_intent(state: &mut AnalysisState) -> IntentLock {
    if state.has_intent_lock {
        if let Some(profile) = &state.target_profile {
            return IntentLock::AlreadyLocked(profile.clone());
        }
    }

    let profile = TargetProfile::from_intent(&state.intent);
    state.target_profile = Some(profile.clone());
    state.has_intent_lock = true;
    IntentLock::Locked(profile)
}

/// Outcome of editing an intent field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentChange {
    /// The value was already current; nothing happened.
    Unchanged,
    /// The intent was unlocked and simply updated.
    Updated,
    /// The intent was locked; the session was reset and the edit applied.
    SessionReset,
}

/// Edit one intent field.
///
/// Unlocked sessions are updated in place. Editing a locked session resets
/// it (see [`reset_for_retarget`]) before applying the edit.
pub fn change_intent_field(state: &mut AnalysisState, field: IntentField, value: &str) -> IntentChange {
    if state.intent.get(field) == value {
        return IntentChange::Unchanged;
    }

    if !state.has_intent_lock {
        state.intent.set(field, value);
        return IntentChange::Updated;
    }

    info!(field = field.as_str(), "intent changed while locked, resetting session");
    reset_for_retarget(state);
    state.intent.set(field, value);
    IntentChange::SessionReset
}

/// Reset a session because its targeting changed.
///
/// Clears the analysis, iteration budget, fixes, overrides and the intent
/// lock, but keeps `previous_score` as a content-quality baseline together
/// with the content fingerprint, so the next analysis of unchanged content
/// can be anchored against it.
pub fn reset_for_retarget(state: &mut AnalysisState) {
    state.analysis = None;
    state.iteration_count = 0;
    state.is_ready_for_production = false;
    state.applied_fixes.clear();
    state.applied_fix_details.clear();
    state.pending_fixes_count = 0;
    state.server_checkpoint_results = CheckpointResults::new();
    state.checkpoint_overrides.clear();
    state.is_score_estimated = false;
    state.has_intent_lock = false;
    state.target_profile = None;
}
