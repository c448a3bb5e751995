use chrono::Utc;
use uuid::Uuid;

/// Allocate a new conversation identifier.
///
/// Ids combine the current wall-clock millis with a v4 UUID and a short
/// random suffix, so they stay roughly sortable by creation time while being
/// collision-resistant across calls in the same process. Never blocks.
pub fn new_conversation_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let token = Uuid::new_v4().simple().to_string();
    let suffix = &Uuid::new_v4().simple().to_string()[..6];
    format!("conv-{millis}-{token}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_across_many_calls() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_conversation_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ids_carry_the_expected_shape() {
        let id = new_conversation_id();
        assert!(id.starts_with("conv-"));
        // prefix + millis + 32-char token + 6-char suffix, dash separated
        assert_eq!(id.split('-').count(), 4);
    }
}
