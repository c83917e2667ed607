pub mod classifier;
pub mod normalizer;
pub mod presenter;
pub mod taxonomy;
pub mod workflow;

pub use classifier::{ClassificationResult, ClassificationService, Classifier, GeminiClassifier};
pub use normalizer::{normalize, normalize_async};
pub use presenter::{AccentRole, DisplayConfig, format_confidence, present};
pub use taxonomy::WasteCategory;
pub use workflow::{AnalysisTicket, Completion, ErrorReport, Preview, Workflow, WorkflowState};
