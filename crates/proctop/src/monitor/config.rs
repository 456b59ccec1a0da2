//! YAML configuration for proctop.
//!
//! Search order: an explicit `--config` path, then
//! `$XDG_CONFIG_HOME/proctop/config.yaml`, then
//! `~/.config/proctop/config.yaml`, then built-in defaults. Every field is
//! optional in the file.

use super::table::{SortKey, SortMode, TableOptions};
use super::terminate::TerminationPolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Row colouring thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// CPU percent drawn in the warning colour.
    pub high_cpu: f32,
    /// CPU percent drawn in the alert colour.
    pub very_high_cpu: f32,
    /// How long a newly seen pid stays highlighted.
    pub new_process_secs: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            high_cpu: 50.0,
            very_high_cpu: 80.0,
            new_process_secs: 5,
        }
    }
}

/// Significance thresholds for the trend arrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Percentage points.
    pub cpu_delta: f32,
    pub memory_delta_mb: u64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            cpu_delta: 10.0,
            memory_delta_mb: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub timeout_ms: u64,
    /// Force-kill survivors at the deadline.
    pub escalate: bool,
    pub kill_grace_ms: u64,
    pub include_children: bool,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            escalate: false,
            kill_grace_ms: 1000,
            include_children: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub retry_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub retry_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub refresh_ms: u64,
    pub input_poll_ms: u64,
    pub sort: SortKey,
    pub sort_descending: bool,
    pub normalize_cpu: bool,
    pub hide_idle_process: bool,
    pub min_width: u16,
    pub min_height: u16,
    pub highlight: HighlightConfig,
    pub trend: TrendConfig,
    pub termination: TerminationConfig,
    pub provider: ProviderConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 1000,
            input_poll_ms: 50,
            sort: SortKey::Cpu,
            sort_descending: true,
            normalize_cpu: true,
            hide_idle_process: true,
            min_width: 80,
            min_height: 20,
            highlight: HighlightConfig::default(),
            trend: TrendConfig::default(),
            termination: TerminationConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// XDG-compliant config paths to search, in order.
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_config).join("proctop/config.yaml"));
        }
        if let Ok(home) = std::env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/proctop/config.yaml"));
        }
        paths
    }

    /// Load from `explicit` if given, else the first existing XDG path,
    /// else defaults.
    ///
    /// An explicit path must exist; a broken file anywhere is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        for path in Self::config_paths() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }
        tracing::info!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse_yaml(&contents).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse a YAML document; an empty document yields defaults.
    pub fn parse_yaml(contents: &str) -> Result<Self, String> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(contents).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.refresh_ms == 0 {
            return Err("refresh_ms must be positive".into());
        }
        if self.highlight.high_cpu > self.highlight.very_high_cpu {
            return Err("highlight.high_cpu must not exceed highlight.very_high_cpu".into());
        }
        Ok(())
    }

    /// Default configuration as a commented YAML document.
    pub fn default_yaml() -> String {
        r"# proctop configuration file
# Location: ~/.config/proctop/config.yaml

# Refresh interval in milliseconds
refresh_ms: 1000
# Keyboard poll timeout per loop tick
input_poll_ms: 50

# Initial ordering: cpu | memory | pid | name
sort: cpu
sort_descending: true

# Divide CPU by the number of logical CPUs (100% = whole machine)
normalize_cpu: true
# Hide the pid 0 idle pseudo-process
hide_idle_process: true

# Below this size a 'terminal too small' notice is shown
min_width: 80
min_height: 20

highlight:
  high_cpu: 50.0
  very_high_cpu: 80.0
  new_process_secs: 5

trend:
  cpu_delta: 10.0
  memory_delta_mb: 50

termination:
  timeout_ms: 3000
  # Send SIGKILL to survivors after the timeout
  escalate: false
  kill_grace_ms: 1000
  include_children: true

provider:
  retry_attempts: 3
  retry_backoff_ms: 100
"
        .to_string()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn input_poll(&self) -> Duration {
        Duration::from_millis(self.input_poll_ms)
    }

    pub fn sort_mode(&self) -> SortMode {
        SortMode {
            key: self.sort,
            descending: self.sort_descending,
        }
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            normalize_cpu: self.normalize_cpu,
            hide_idle_process: self.hide_idle_process,
            new_process_window: Duration::from_secs(self.highlight.new_process_secs),
            cpu_trend_delta: self.trend.cpu_delta,
            memory_trend_delta: self.trend.memory_delta_mb.saturating_mul(1024 * 1024),
            retry_attempts: self.provider.retry_attempts,
            retry_backoff: Duration::from_millis(self.provider.retry_backoff_ms),
        }
    }

    pub fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            timeout: Duration::from_millis(self.termination.timeout_ms),
            escalate: self.termination.escalate,
            kill_grace: Duration::from_millis(self.termination.kill_grace_ms),
            include_children: self.termination.include_children,
            ..TerminationPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.refresh_ms, 1000);
        assert_eq!(config.sort, SortKey::Cpu);
        assert!(!config.termination.escalate);
        assert_eq!(config.min_width, 80);
        assert_eq!(config.min_height, 20);
    }

    #[test]
    fn test_default_yaml_parses_to_default() {
        let parsed = MonitorConfig::parse_yaml(&MonitorConfig::default_yaml()).unwrap();
        assert_eq!(parsed, MonitorConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let parsed = MonitorConfig::parse_yaml(
            "refresh_ms: 250\nsort: memory\ntermination:\n  escalate: true\n",
        )
        .unwrap();
        assert_eq!(parsed.refresh_ms, 250);
        assert_eq!(parsed.sort, SortKey::Memory);
        assert!(parsed.termination.escalate);
        assert_eq!(parsed.termination.timeout_ms, 3000);
        assert_eq!(parsed.highlight, HighlightConfig::default());
    }

    #[test]
    fn test_empty_and_comment_only_documents() {
        assert_eq!(
            MonitorConfig::parse_yaml("").unwrap(),
            MonitorConfig::default()
        );
        assert_eq!(
            MonitorConfig::parse_yaml("# nothing here\n").unwrap(),
            MonitorConfig::default()
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(MonitorConfig::parse_yaml("refresh_ms: fast\n").is_err());
        assert!(MonitorConfig::parse_yaml("sort: colour\n").is_err());
        assert!(MonitorConfig::parse_yaml("refresh_ms: 0\n").is_err());
        assert!(
            MonitorConfig::parse_yaml("highlight:\n  high_cpu: 90\n  very_high_cpu: 80\n")
                .is_err()
        );
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let err = MonitorConfig::load_from_file(Path::new("/nonexistent/proctop.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("proctop-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        fs::write(&path, "refresh_ms: 500\nnormalize_cpu: false\n").unwrap();

        let config = MonitorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.refresh_ms, 500);
        assert!(!config.normalize_cpu);

        fs::write(&path, "refresh_ms: [1, 2]\n").unwrap();
        let err = MonitorConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_conversions() {
        let config = MonitorConfig::parse_yaml(
            "trend:\n  memory_delta_mb: 2\nprovider:\n  retry_backoff_ms: 10\n",
        )
        .unwrap();
        let options = config.table_options();
        assert_eq!(options.memory_trend_delta, 2 * 1024 * 1024);
        assert_eq!(options.retry_backoff, Duration::from_millis(10));

        let policy = config.termination_policy();
        assert_eq!(policy.timeout, Duration::from_secs(3));
        assert!(policy.include_children);
        assert_eq!(config.sort_mode(), SortMode::natural(SortKey::Cpu));
    }

    #[test]
    fn test_config_paths_end_with_proctop() {
        for path in MonitorConfig::config_paths() {
            assert!(path.ends_with("proctop/config.yaml"));
        }
    }
}
