use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use super::error::RepositoryResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Confirmed outcome of a feedback submission.
#[derive(Clone, Debug, Deserialize)]
pub struct FeedbackReceipt {
    pub success: bool,
    /// Rating as recorded by the store, echoed back for the optimistic
    /// local update.
    #[serde(default)]
    pub rating: Option<i32>,
}

/// External store of response ratings. De-duplication of repeated
/// submissions is the store's concern, not the engine's.
pub trait FeedbackRepository: Send + Sync + 'static {
    fn submit(
        &self,
        trace_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> BoxFuture<'static, RepositoryResult<FeedbackReceipt>>;
}
