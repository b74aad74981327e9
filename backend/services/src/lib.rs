//! Document and teaching services built on the provider traits from `ocr-agents-core`.

pub mod assessment;
pub mod extraction;
pub mod generation;
pub mod ocr;
pub mod verification;

pub use assessment::{parse_marking_scheme, AssignmentAssessor};
pub use extraction::{DetailExtractor, SourceDocument};
pub use generation::{ContentGenerator, ContentSpec, QuestionSpec, StudyPlanSpec};
pub use ocr::{OcrOutcome, OcrPipeline};
pub use verification::{
    CategoryVerification, CategoryVerifier, ChecklistVerification, ChecklistVerifier,
};
