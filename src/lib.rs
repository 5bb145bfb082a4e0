pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod quota;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::task::InMemoryTaskRepository;
pub use generator::workflow::{GenerationOrchestrator, launch};
pub use types::request::GenerationRequest;
pub use types::result::NovelResult;
