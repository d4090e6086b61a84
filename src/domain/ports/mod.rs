pub mod analysis_store;
pub mod evaluator;
pub mod fix_applier;

pub use analysis_store::AnalysisStore;
pub use evaluator::{
    CollaboratorError, ContentBaseline, EvaluateRequest, EvaluationOutcome, Evaluator,
    PreviousAnalysisContext,
};
pub use fix_applier::{FixApplier, FixRequest};
