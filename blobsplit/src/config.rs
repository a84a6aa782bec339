//! Split tuning knobs and their defaults.

use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// Default upper bound for one output segment, just under 1 GB.
pub const DEFAULT_TARGET_SIZE: u64 = 999_000_000;
/// Width of each backward probe while looking for a line break.
pub const DEFAULT_PROBE_WIDTH: u64 = 1000;
pub const DEFAULT_LINE_BREAK: u8 = b'\n';
/// Segment copies in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub target_size: u64,
    pub probe_width: u64,
    pub line_break: u8,
    pub max_concurrency: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            probe_width: DEFAULT_PROBE_WIDTH,
            line_break: DEFAULT_LINE_BREAK,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl SplitConfig {
    pub fn with_target_size(mut self, target_size: u64) -> Self {
        self.target_size = target_size;
        self
    }

    pub fn with_probe_width(mut self, probe_width: u64) -> Self {
        self.probe_width = probe_width;
        self
    }

    pub fn validate(&self) -> Result<(), SplitError> {
        let mut problems = Vec::new();
        if self.target_size == 0 {
            problems.push("target_size must be greater than zero");
        }
        if self.probe_width == 0 {
            problems.push("probe_width must be greater than zero");
        }
        if self.max_concurrency == 0 {
            problems.push("max_concurrency must be greater than zero");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SplitError::InvalidConfig(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_store_limits() {
        let cfg = SplitConfig::default();
        assert_eq!(cfg.target_size, 999_000_000);
        assert_eq!(cfg.probe_width, 1000);
        assert_eq!(cfg.line_break, b'\n');
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let cfg = SplitConfig {
            target_size: 0,
            probe_width: 0,
            ..SplitConfig::default()
        };
        match cfg.validate() {
            Err(SplitError::InvalidConfig(msg)) => {
                assert!(msg.contains("target_size"));
                assert!(msg.contains("probe_width"));
                assert!(!msg.contains("max_concurrency"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: SplitConfig = serde_json::from_str(r#"{"target_size": 4096}"#).unwrap();
        assert_eq!(cfg.target_size, 4096);
        assert_eq!(cfg.probe_width, DEFAULT_PROBE_WIDTH);
        assert_eq!(cfg.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }
}
