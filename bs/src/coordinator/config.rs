//! Coordinator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Channel buffer size for inbound requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Buffer for run-state and badge pushes; slow watchers lag past this
    #[serde(rename = "push-buffer", default = "default_push_buffer")]
    pub push_buffer: usize,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

fn default_push_buffer() -> usize {
    debug!("default_push_buffer: called");
    64
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            channel_buffer: 256,
            push_buffer: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.channel_buffer, 256);
        assert_eq!(config.push_buffer, 64);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("push-buffer: 8").unwrap();
        assert_eq!(config.channel_buffer, 256);
        assert_eq!(config.push_buffer, 8);
    }
}
