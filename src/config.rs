use serde::Deserialize;

/// Engine configuration supplied by the host surface.
///
/// Hosts typically deserialize this from their settings file and hand it to
/// the HTTP collaborators at construction time.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the assistant gateway, without a trailing slash.
    pub gateway_url: String,
    /// Identifier of the signed-in user, attached to every request.
    pub user_id: String,
    /// Optional system prompt forwarded with each completion request.
    pub system_prompt: Option<String>,
    /// Maximum number of history entries to request per fetch.
    pub history_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            user_id: String::new(),
            system_prompt: None,
            history_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "user_id": "u-1" }"#).expect("valid config json");
        assert_eq!(config.user_id, "u-1");
        assert_eq!(config.history_limit, 50);
        assert!(config.system_prompt.is_none());
    }
}
