use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdfError};

/// Environment variable overriding [`EngineConfig::batch_size_rows`].
pub const ENV_BATCH_SIZE_ROWS: &str = "TDF_BATCH_SIZE_ROWS";

/// Engine-wide knobs shared by every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on rows per batch produced by file sources.
    pub batch_size_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size_rows: 8192,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TDF_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(ENV_BATCH_SIZE_ROWS) {
            cfg.batch_size_rows = raw.trim().parse().map_err(|e| {
                TdfError::InvalidConfig(format!("{ENV_BATCH_SIZE_ROWS}='{raw}': {e}"))
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: Self = serde_json::from_str(&raw).map_err(|e| {
            TdfError::InvalidConfig(format!(
                "config file '{}' is not valid: {e}",
                path.as_ref().display()
            ))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size_rows == 0 {
            return Err(TdfError::InvalidConfig(
                "batch_size_rows must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let path = std::env::temp_dir().join(format!(
            "tdf_cfg_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::write(&path, "{}").expect("write");
        let cfg = EngineConfig::load_json(&path).expect("load");
        assert_eq!(cfg, EngineConfig::default());

        std::fs::write(&path, r#"{"batch_size_rows": 16}"#).expect("write");
        assert_eq!(EngineConfig::load_json(&path).expect("load").batch_size_rows, 16);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cfg = EngineConfig { batch_size_rows: 0 };
        assert!(matches!(cfg.validate(), Err(TdfError::InvalidConfig(_))));
    }
}
