//! Ceremony configuration

use crate::{Error, Result, DEFAULT_PARTIES, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

fn default_parties() -> u32 {
    DEFAULT_PARTIES
}

fn default_round_timeout_ms() -> u64 {
    30_000
}

/// Parameters shared by keychain creation and the signing ceremony
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TssConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_parties")]
    pub parties: u32,
    /// Upper bound on waiting for any single counterpart share
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
}

impl Default for TssConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            parties: default_parties(),
            round_timeout_ms: default_round_timeout_ms(),
        }
    }
}

impl TssConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold != DEFAULT_THRESHOLD || self.parties != DEFAULT_PARTIES {
            return Err(Error::InvalidParameter(format!(
                "only {}-of-{} wallets are supported, got {}-of-{}",
                DEFAULT_THRESHOLD, DEFAULT_PARTIES, self.threshold, self.parties
            )));
        }
        if self.round_timeout_ms == 0 {
            return Err(Error::InvalidParameter(
                "round timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = TssConfig::from_json(r#"{"roundTimeoutMs": 500}"#).unwrap();
        assert_eq!(config.threshold, 2);
        assert_eq!(config.parties, 3);
        assert_eq!(config.round_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_unsupported_shape() {
        assert!(TssConfig::from_json(r#"{"threshold": 3}"#).is_err());
        assert!(TssConfig::from_json(r#"{"roundTimeoutMs": 0}"#).is_err());
        assert!(TssConfig::from_json("not json").is_err());
    }
}
