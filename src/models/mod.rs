pub mod document;
pub mod job;
pub mod loaders;
pub mod options;
pub mod regulation;

pub use document::{AnalysisOutcome, AnalysisRecord, Document};
pub use job::{BatchJob, BatchResult, ItemStatus, JobProgress, JobStatus};
pub use loaders::{load_all_documents, load_toml_to_document};
pub use options::BatchAnalysisOptions;
pub use regulation::Regulation;
