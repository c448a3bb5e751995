use serde::{Deserialize, Serialize};
use tracing::debug;

/// Read-only summary of a past conversation, as fetched from the external
/// history store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(alias = "conversationId", alias = "conversation_id", alias = "id")]
    pub conversation_id: String,
    #[serde(
        alias = "promptPreview",
        alias = "prompt_preview",
        alias = "prompt",
        alias = "preview",
        default
    )]
    pub prompt_preview: String,
    #[serde(
        alias = "lastTimestamp",
        alias = "last_timestamp",
        alias = "timestamp",
        alias = "updated_at",
        default
    )]
    pub last_timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryLoadState {
    /// Nothing fetched yet.
    Initial,
    Loading,
    Loaded,
    /// Last fetch failed; the panel shows a "failed to load" indicator.
    Failed,
}

/// Local projection of the history panel: entries, load state, and a fetch
/// generation counter so a stale fetch never overwrites a newer one.
pub struct HistoryModel {
    entries: Vec<HistoryEntry>,
    load_state: HistoryLoadState,
    /// Generation of the newest fetch whose result has been applied.
    applied_generation: u64,
    /// Generation handed to the most recently started fetch.
    issued_generation: u64,
}

impl HistoryModel {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            load_state: HistoryLoadState::Initial,
            applied_generation: 0,
            issued_generation: 0,
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn load_state(&self) -> HistoryLoadState {
        self.load_state
    }

    /// Begin a fetch: returns the generation tag the result must carry.
    pub fn begin_fetch(&mut self) -> u64 {
        self.issued_generation += 1;
        self.load_state = HistoryLoadState::Loading;
        self.issued_generation
    }

    /// Apply a successful fetch result. Stale generations are discarded
    /// (last-fetch-wins).
    pub fn apply_fetch(&mut self, generation: u64, entries: Vec<HistoryEntry>) -> bool {
        if generation < self.applied_generation {
            debug!(generation, applied = self.applied_generation, "Discarding stale history fetch");
            return false;
        }
        self.applied_generation = generation;
        self.entries = entries;
        self.load_state = HistoryLoadState::Loaded;
        true
    }

    /// Record a failed fetch: the list empties and the panel shows the
    /// failure indicator. Stale failures are discarded like stale successes.
    pub fn apply_fetch_failure(&mut self, generation: u64) -> bool {
        if generation < self.applied_generation {
            return false;
        }
        self.applied_generation = generation;
        self.entries.clear();
        self.load_state = HistoryLoadState::Failed;
        true
    }

    /// Remove an entry after the server confirmed its deletion. Never called
    /// optimistically.
    pub fn remove_confirmed(&mut self, conversation_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.conversation_id != conversation_id);
        before != self.entries.len()
    }

    pub fn find(&self, conversation_id: &str) -> Option<&HistoryEntry> {
        self.entries
            .iter()
            .find(|e| e.conversation_id == conversation_id)
    }
}

impl Default for HistoryModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive substring filter over history entries.
///
/// An empty query means "no active search" and yields an empty result set,
/// which callers must treat as distinct from "no matches".
pub fn search<'a>(query: &str, entries: &'a [HistoryEntry]) -> Vec<&'a HistoryEntry> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| e.prompt_preview.to_lowercase().contains(&needle))
        .collect()
}
