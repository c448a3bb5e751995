use serde_json::json;
use tracing::debug;

use super::error::{RepositoryError, RepositoryResult};
use super::feedback_repository::{BoxFuture, FeedbackReceipt, FeedbackRepository};
use crate::config::EngineConfig;

/// HTTP implementation of the feedback store collaborator.
pub struct HttpFeedbackRepository {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFeedbackRepository {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/feedback", config.gateway_url),
        }
    }
}

impl FeedbackRepository for HttpFeedbackRepository {
    fn submit(
        &self,
        trace_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> BoxFuture<'static, RepositoryResult<FeedbackReceipt>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let trace_id = trace_id.to_string();
        let comment = comment.map(str::to_string);

        Box::pin(async move {
            debug!(trace_id = %trace_id, rating, "Submitting feedback");
            let mut body = json!({ "traceId": trace_id, "rating": rating });
            if let Some(comment) = comment {
                body["comment"] = json!(comment);
            }

            let response = client.post(&endpoint).json(&body).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(RepositoryError::Status {
                    status: status.as_u16(),
                });
            }

            let receipt: FeedbackReceipt = response.json().await?;
            Ok(receipt)
        })
    }
}
