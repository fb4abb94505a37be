use crate::error::{Result, TrackerError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Upper bound for a single store operation issued by the server.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STORE_FILE)
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Accept remarks on COMPLETED and CANCELLED tickets.
    #[serde(default)]
    pub allow_terminal_comments: bool,
}

// ---------------------------------------------------------------------------
// AlertConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_threshold")]
    pub eta_threshold_minutes: u32,
}

fn default_threshold() -> u32 {
    30
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            eta_threshold_minutes: default_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            store: StoreConfig::default(),
            lifecycle: LifecycleConfig::default(),
            alerts: AlertConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(TrackerError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn store_path(&self, root: &Path) -> PathBuf {
        paths::store_path(root, &self.store.path)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.store.path.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "store.path is empty".to_string(),
            });
        }

        if self.store.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "store.timeout_ms is 0: every store call would time out".to_string(),
            });
        } else if self.store.timeout_ms > 60_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "store.timeout_ms={} (>60s is unusual)",
                    self.store.timeout_ms
                ),
            });
        }

        if self.alerts.eta_threshold_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "alerts.eta_threshold_minutes is 0: no ticket will ever be reported as approaching its ETA"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("helpdesk");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "helpdesk");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.store.timeout_ms, 5_000);
        assert!(!parsed.lifecycle.allow_terminal_comments);
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "project:\n  name: helpdesk\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.alerts.eta_threshold_minutes, 30);
        assert_eq!(cfg.server.port, 3141);
        assert_eq!(cfg.store.path, PathBuf::from(".reqflow/tickets.redb"));
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, TrackerError::NotInitialized));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("helpdesk");
        cfg.lifecycle.allow_terminal_comments = true;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert!(loaded.lifecycle.allow_terminal_comments);
        assert_eq!(
            loaded.store_path(dir.path()),
            dir.path().join(".reqflow/tickets.redb")
        );
    }

    #[test]
    fn validate_default_is_clean() {
        assert!(Config::new("helpdesk").validate().is_empty());
    }

    #[test]
    fn validate_zero_timeout_is_error() {
        let mut cfg = Config::new("helpdesk");
        cfg.store.timeout_ms = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("timeout_ms")));
    }

    #[test]
    fn validate_zero_threshold_warns() {
        let mut cfg = Config::new("helpdesk");
        cfg.alerts.eta_threshold_minutes = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("eta_threshold_minutes")));
    }
}
