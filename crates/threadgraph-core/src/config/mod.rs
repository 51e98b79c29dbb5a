//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::graph::DEFAULT_RELATION_IMPORTANCE;

/// Environment variable overriding the memory directory
pub const MEMORY_DIR_ENV: &str = "THREADGRAPH_MEMORY_DIR";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "THREADGRAPH_CONFIG_DIR";

/// Threadgraph configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub locking: LockingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Memory directory; absolute, or relative to the data root
    pub memory_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Importance floor applied by `read` when the caller gives none
    pub default_min_importance: f64,
    /// Importance given to relations produced by the save pipeline
    pub relation_importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockingConfig {
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_min_importance: 0.0,
            relation_importance: DEFAULT_RELATION_IMPORTANCE,
        }
    }
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl LockingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("threadgraph")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Root that relative memory directories resolve against
    pub fn data_root() -> anyhow::Result<PathBuf> {
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("threadgraph"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        Config::default().save()
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.graph.default_min_importance) {
            return Err(anyhow!("graph.default_min_importance must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.graph.relation_importance) {
            return Err(anyhow!("graph.relation_importance must be between 0.0 and 1.0"));
        }
        if self.locking.timeout_secs == 0 {
            return Err(anyhow!("locking.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Resolve the memory directory.
    ///
    /// The environment override wins, then the configured path. Relative
    /// paths resolve against the data root; unset means `<data root>/memory`.
    pub fn memory_dir(&self) -> anyhow::Result<PathBuf> {
        let configured = env::var_os(MEMORY_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| self.storage.memory_dir.clone());
        Self::resolve_memory_dir(configured.as_deref(), &Self::data_root()?)
    }

    /// Resolve a memory directory against `root`
    pub fn resolve_memory_dir(configured: Option<&Path>, root: &Path) -> anyhow::Result<PathBuf> {
        Ok(match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => root.join(path),
            None => root.join("memory"),
        })
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "storage.memory_dir" => Ok(self
                .storage
                .memory_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())),
            "graph.default_min_importance" => Ok(self.graph.default_min_importance.to_string()),
            "graph.relation_importance" => Ok(self.graph.relation_importance.to_string()),
            "locking.timeout_secs" => Ok(self.locking.timeout_secs.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `threadgraph config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "storage.memory_dir" => {
                self.storage.memory_dir = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "graph.default_min_importance" => {
                let v: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid default_min_importance value: {}", value))?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(anyhow!("Importance must be between 0.0 and 1.0"));
                }
                self.graph.default_min_importance = v;
            }
            "graph.relation_importance" => {
                let v: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid relation_importance value: {}", value))?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(anyhow!("Importance must be between 0.0 and 1.0"));
                }
                self.graph.relation_importance = v;
            }
            "locking.timeout_secs" => {
                let v: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if v == 0 {
                    return Err(anyhow!("Lock timeout must be greater than zero"));
                }
                self.locking.timeout_secs = v;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `threadgraph config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "storage.memory_dir",
            "graph.default_min_importance",
            "graph.relation_importance",
            "locking.timeout_secs",
        ];

        keys.into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.storage.memory_dir.is_none());
        assert_eq!(config.graph.default_min_importance, 0.0);
        assert_eq!(config.graph.relation_importance, 0.7);
        assert_eq!(config.locking.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_resolve_memory_dir() {
        let root = Path::new("/data/threadgraph");
        assert_eq!(
            Config::resolve_memory_dir(None, root).unwrap(),
            PathBuf::from("/data/threadgraph/memory")
        );
        assert_eq!(
            Config::resolve_memory_dir(Some(Path::new("shared")), root).unwrap(),
            PathBuf::from("/data/threadgraph/shared")
        );
        assert_eq!(
            Config::resolve_memory_dir(Some(Path::new("/srv/mem")), root).unwrap(),
            PathBuf::from("/srv/mem")
        );
    }

    #[test]
    fn test_set_validates_ranges() {
        let mut config = Config::default();
        assert!(config.set("graph.relation_importance", "1.5").is_err());
        assert!(config.set("locking.timeout_secs", "0").is_err());
        assert!(config.set("nope", "1").is_err());

        config.set("graph.relation_importance", "0.4").unwrap();
        assert_eq!(config.get("graph.relation_importance").unwrap(), "0.4");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("storage.memory_dir", "/tmp/mem").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[locking]\ntimeout_secs = 3\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.locking.timeout_secs, 3);
        assert_eq!(loaded.graph, GraphConfig::default());
    }

    #[test]
    fn test_list_has_every_key() {
        let keys: Vec<String> = Config::default()
            .list()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&"storage.memory_dir".to_string()));
    }
}
