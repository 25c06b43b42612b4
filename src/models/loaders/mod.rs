pub mod toml_loader;

pub use toml_loader::{load_all_documents, load_toml_to_document};
