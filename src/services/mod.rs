pub mod analysis_engine;
pub mod document_store;
pub mod llm_service;
pub mod notifier;

pub use analysis_engine::AnalysisEngine;
pub use document_store::{DocumentStore, InMemoryDocumentStore};
pub use llm_service::{ComplianceVerdict, LlmAnalysisEngine};
pub use notifier::{CompletionNotifier, FanoutNotifier, FileNotifier, WebhookNotifier};
