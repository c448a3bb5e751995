use serde_json::{json, Value};
use tracing::debug;

use super::error::{RepositoryError, RepositoryResult};
use super::history_repository::{extract_entries, BoxFuture, HistoryRepository};
use crate::config::EngineConfig;
use crate::models::HistoryEntry;

/// HTTP implementation of the history store collaborator.
pub struct HttpHistoryRepository {
    client: reqwest::Client,
    fetch_endpoint: String,
    delete_endpoint: String,
}

impl HttpHistoryRepository {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_endpoint: format!("{}/api/history", config.gateway_url),
            delete_endpoint: format!("{}/api/history/delete", config.gateway_url),
        }
    }
}

impl HistoryRepository for HttpHistoryRepository {
    fn fetch(
        &self,
        user_id: &str,
        limit: u32,
    ) -> BoxFuture<'static, RepositoryResult<Vec<HistoryEntry>>> {
        let client = self.client.clone();
        let endpoint = self.fetch_endpoint.clone();
        let user_id = user_id.to_string();

        Box::pin(async move {
            debug!(user_id = %user_id, endpoint = %endpoint, "Fetching history");
            let response = client
                .post(&endpoint)
                .json(&json!({ "userId": user_id, "limit": limit }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(RepositoryError::Status {
                    status: status.as_u16(),
                });
            }

            let payload: Value = response.json().await?;
            Ok(extract_entries(&payload))
        })
    }

    fn delete(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<()>> {
        let client = self.client.clone();
        let endpoint = self.delete_endpoint.clone();
        let user_id = user_id.to_string();
        let conversation_id = conversation_id.to_string();

        Box::pin(async move {
            debug!(conv_id = %conversation_id, "Requesting history deletion");
            let response = client
                .post(&endpoint)
                .json(&json!({ "userId": user_id, "conversationId": conversation_id }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(RepositoryError::Status {
                    status: status.as_u16(),
                });
            }

            Ok(())
        })
    }
}
