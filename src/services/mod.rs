pub mod aggregator;
pub mod events;
pub mod intent_manager;
pub mod reconciliation;
pub mod refinement_loop;

pub use aggregator::{aggregate, score_axis, AggregateResult};
pub use events::{EventChannel, EventChannelConfig, RefinementEvent};
pub use intent_manager::{detect_intent, IntentChange, IntentLock};
pub use reconciliation::{insert_override, reduce, ReconcileAction, ReconcileEffect};
pub use refinement_loop::{
    AnalysisOptions, AnalysisOutcome, BatchFixOutcome, FixOutcome, RefinementLoop, SkippedFix,
};
