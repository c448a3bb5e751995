pub mod error;
pub mod feedback_repository;
pub mod history_repository;
pub mod http_feedback_repository;
pub mod http_history_repository;
pub mod in_memory_feedback_repository;
pub mod in_memory_history_repository;

pub use error::{RepositoryError, RepositoryResult};
pub use feedback_repository::{FeedbackReceipt, FeedbackRepository};
pub use history_repository::{extract_entries, HistoryRepository};
pub use http_feedback_repository::HttpFeedbackRepository;
pub use http_history_repository::HttpHistoryRepository;
pub use in_memory_feedback_repository::{InMemoryFeedbackRepository, RecordedFeedback};
pub use in_memory_history_repository::InMemoryHistoryRepository;
