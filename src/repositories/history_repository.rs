use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::error::RepositoryResult;
use crate::models::HistoryEntry;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// External store of past conversations. Read and delete only; the engine
/// never writes history directly.
pub trait HistoryRepository: Send + Sync + 'static {
    /// Fetch conversation summaries for a user, newest first.
    fn fetch(&self, user_id: &str, limit: u32)
        -> BoxFuture<'static, RepositoryResult<Vec<HistoryEntry>>>;

    /// Delete one conversation. Resolves Ok only on confirmed deletion.
    fn delete(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<()>>;
}

/// Locate the entry list inside a fetch payload.
///
/// Store builds have shipped the list at the top level and nested under a
/// few different keys; anything unrecognized is treated as empty.
pub fn extract_entries(payload: &Value) -> Vec<HistoryEntry> {
    const LIST_FIELDS: [&str; 4] = ["conversations", "history", "items", "data"];

    let list = if payload.is_array() {
        Some(payload)
    } else {
        LIST_FIELDS
            .iter()
            .filter_map(|field| payload.get(field))
            .find(|v| v.is_array())
    };

    let Some(list) = list else {
        return Vec::new();
    };

    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
