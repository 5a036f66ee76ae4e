//! Log retention configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How many entries each log collection keeps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Oldest entries beyond this are evicted; 0 keeps everything
    #[serde(rename = "max-entries-per-type", default = "default_max_entries_per_type")]
    pub max_entries_per_type: usize,
}

fn default_max_entries_per_type() -> usize {
    debug!("default_max_entries_per_type: called");
    1000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_entries_per_type: default_max_entries_per_type(),
        }
    }
}

impl RetentionConfig {
    /// Keep every entry
    pub fn unbounded() -> Self {
        Self { max_entries_per_type: 0 }
    }

    pub fn limit(&self) -> Option<usize> {
        (self.max_entries_per_type > 0).then_some(self.max_entries_per_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retention() {
        let config = RetentionConfig::default();
        assert_eq!(config.max_entries_per_type, 1000);
        assert_eq!(config.limit(), Some(1000));
    }

    #[test]
    fn test_zero_disables_eviction() {
        let config: RetentionConfig = serde_yaml::from_str("max-entries-per-type: 0").unwrap();
        assert_eq!(config.limit(), None);
        assert_eq!(RetentionConfig::unbounded().limit(), None);
    }
}
