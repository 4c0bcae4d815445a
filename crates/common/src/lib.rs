//! Truth Lens Common Library
//!
//! Shared code for the verification pipeline and its callers including:
//! - Collaborator contracts (understanding capability, content retrieval,
//!   source lookup, record store) and their HTTP/in-memory clients
//! - Error types and handling
//! - Configuration management
//! - Retry policy
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod llm;
pub mod lookup;
pub mod metrics;
pub mod retrieval;
pub mod retry;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::TextUnderstanding;
pub use lookup::SourceLookup;
pub use retrieval::{ContentRetriever, PageContent};
pub use retry::RetryPolicy;
pub use store::RecordStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
