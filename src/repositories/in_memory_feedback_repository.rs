use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{RepositoryError, RepositoryResult};
use super::feedback_repository::{BoxFuture, FeedbackReceipt, FeedbackRepository};

/// Recorded feedback submission, for test assertions.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedFeedback {
    pub trace_id: String,
    pub rating: i32,
    pub comment: Option<String>,
}

/// In-memory feedback store with failure injection.
#[derive(Clone, Default)]
pub struct InMemoryFeedbackRepository {
    submissions: Arc<Mutex<Vec<RecordedFeedback>>>,
    fail_submit: Arc<Mutex<bool>>,
}

impl InMemoryFeedbackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_submit(&self, fail: bool) {
        *self.fail_submit.lock() = fail;
    }

    pub fn submissions(&self) -> Vec<RecordedFeedback> {
        self.submissions.lock().clone()
    }
}

impl FeedbackRepository for InMemoryFeedbackRepository {
    fn submit(
        &self,
        trace_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> BoxFuture<'static, RepositoryResult<FeedbackReceipt>> {
        let submissions = self.submissions.clone();
        let fail = *self.fail_submit.lock();
        let record = RecordedFeedback {
            trace_id: trace_id.to_string(),
            rating,
            comment: comment.map(str::to_string),
        };

        Box::pin(async move {
            if fail {
                return Err(RepositoryError::Rejected {
                    message: "injected feedback failure".to_string(),
                });
            }
            let rating = record.rating;
            submissions.lock().push(record);
            Ok(FeedbackReceipt {
                success: true,
                rating: Some(rating),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submissions_are_recorded_and_echoed() {
        let repo = InMemoryFeedbackRepository::new();
        let receipt = repo.submit("t-1", 5, Some("helpful")).await.unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.rating, Some(5));

        let recorded = repo.submissions();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].trace_id, "t-1");
        assert_eq!(recorded[0].comment.as_deref(), Some("helpful"));
    }

    #[tokio::test]
    async fn injected_failure_records_nothing() {
        let repo = InMemoryFeedbackRepository::new();
        repo.set_fail_submit(true);
        assert!(repo.submit("t-1", 2, None).await.is_err());
        assert!(repo.submissions().is_empty());
    }
}
