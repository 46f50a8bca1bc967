use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{clog_debug, Result};

/// Engine configuration.
///
/// Loaded per call by whoever embeds the engine; there is no global
/// instance. Absent files yield the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Identity stamped into the header of generated interchange files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub product: String,
    pub version: String,
    pub author: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            product: "cadence".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "cadence".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        clog_debug!("EngineConfig::load_from path={}", path.display());
        if !path.exists() {
            clog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        clog_debug!(
            "Config loaded: debug={}, product={}, version={}",
            config.debug,
            config.export.product,
            config.export.version
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        clog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.debug);
        assert_eq!(config.export.product, "cadence");
        assert!(!config.export.version.is_empty());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.export.product, "cadence");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.toml");
        let config = EngineConfig {
            debug: true,
            export: ExportConfig {
                product: "planner".to_string(),
                version: "9.9".to_string(),
                author: "ops".to_string(),
            },
        };
        config.save_to(&path).unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert!(loaded.debug);
        assert_eq!(loaded.export.product, "planner");
        assert_eq!(loaded.export.version, "9.9");
        assert_eq!(loaded.export.author, "ops");
    }
}
