pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod intent;
pub mod score;
pub mod treatment;

pub use analysis::{
    Analysis, AnalysisState, AnalysisStatePatch, AppliedFix, Insight, InsightKind, LoopPhase,
};
pub use checkpoint::{
    checkpoint_key, Axis, AxisWeights, Checkpoint, CheckpointOverride, CheckpointResults,
    MAX_CHECKPOINT_SCORE, WEIGHT_SUM_TOLERANCE,
};
pub use config::{Config, DatabaseConfig, EndpointConfig, LoggingConfig, RefinementConfig};
pub use intent::{DetectedIntent, Intent, IntentField, TargetProfile};
pub use score::{AxisScore, GreenlightScore, ScoreTier};
pub use treatment::{Treatment, TreatmentPatch};
