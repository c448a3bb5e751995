use std::sync::Arc;

use parking_lot::Mutex;

use super::error::{RepositoryError, RepositoryResult};
use super::history_repository::{BoxFuture, HistoryRepository};
use crate::models::HistoryEntry;

/// In-memory history store, used by tests and development hosts. Failure
/// injection covers the panel's degraded paths.
#[derive(Clone, Default)]
pub struct InMemoryHistoryRepository {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
    fail_fetch: Arc<Mutex<bool>>,
    fail_delete: Arc<Mutex<bool>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, entries: Vec<HistoryEntry>) {
        *self.entries.lock() = entries;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock() = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        *self.fail_delete.lock() = fail;
    }

    pub fn stored(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }
}

impl HistoryRepository for InMemoryHistoryRepository {
    fn fetch(
        &self,
        _user_id: &str,
        limit: u32,
    ) -> BoxFuture<'static, RepositoryResult<Vec<HistoryEntry>>> {
        let entries = self.entries.clone();
        let fail = *self.fail_fetch.lock();

        Box::pin(async move {
            if fail {
                return Err(RepositoryError::Rejected {
                    message: "injected fetch failure".to_string(),
                });
            }
            let mut list = entries.lock().clone();
            list.sort_by_key(|e| std::cmp::Reverse(e.last_timestamp));
            list.truncate(limit as usize);
            Ok(list)
        })
    }

    fn delete(
        &self,
        _user_id: &str,
        conversation_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<()>> {
        let entries = self.entries.clone();
        let fail = *self.fail_delete.lock();
        let conversation_id = conversation_id.to_string();

        Box::pin(async move {
            if fail {
                return Err(RepositoryError::Rejected {
                    message: "injected delete failure".to_string(),
                });
            }
            entries
                .lock()
                .retain(|e| e.conversation_id != conversation_id);
            Ok(())
        })
    }
}
