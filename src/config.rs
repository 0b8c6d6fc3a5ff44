use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub refresh_interval_secs: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub docker_host: Option<String>,
    pub default_view: String,
    pub backend_timeout_secs: u64,
    pub search_debounce_ms: u64,
    pub log_tail: usize,
    pub settle_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            log_level: "info".to_string(),
            log_file: None,
            docker_host: None,
            default_view: "containers".to_string(),
            backend_timeout_secs: 8,
            search_debounce_ms: 150,
            log_tail: 200,
            settle_delay_ms: 500,
        }
    }
}

impl RuntimeConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs.max(1))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigSnapshot {
    pub source: Option<String>,
    pub config: RuntimeConfig,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

impl RuntimeConfigWatcher {
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        Self {
            path: explicit.or_else(discover_config_path),
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<RuntimeConfigSnapshot> {
        let Some(path) = self.path.clone() else {
            return Ok(RuntimeConfigSnapshot {
                source: None,
                config: RuntimeConfig::default(),
            });
        };

        let config = read_config(&path)?;
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());

        Ok(RuntimeConfigSnapshot {
            source: Some(path.display().to_string()),
            config,
        })
    }

    /// Returns a fresh snapshot when the file appeared, vanished or changed since the last load.
    pub fn reload_if_changed(&mut self) -> Result<Option<RuntimeConfigSnapshot>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(RuntimeConfigSnapshot {
                source: None,
                config: RuntimeConfig::default(),
            }));
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<RuntimeConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read runtime config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(RuntimeConfig::default());
    }
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse runtime config {}", path.display()))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SKIFF_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("skiff.yaml"),
        PathBuf::from("skiff.yml"),
        PathBuf::from(".skiff.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/skiff/config.yaml"),
            PathBuf::from(&home).join(".config/skiff/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{RuntimeConfig, RuntimeConfigWatcher};
    use std::fs;
    use std::time::{Duration, SystemTime};

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: RuntimeConfig =
            serde_yaml::from_str("refresh_interval_secs: 2\ndocker_host: tcp://10.0.0.5:2375\n")
                .unwrap();
        assert_eq!(config.refresh_interval_secs, 2);
        assert_eq!(config.docker_host.as_deref(), Some("tcp://10.0.0.5:2375"));
        assert_eq!(config.backend_timeout_secs, 8);
        assert_eq!(config.search_debounce_ms, 150);
        assert_eq!(config.default_view, "containers");
    }

    #[test]
    fn durations_never_collapse_to_zero() {
        let config = RuntimeConfig {
            refresh_interval_secs: 0,
            backend_timeout_secs: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.backend_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.yaml");
        fs::write(&path, "log_tail: 50\nsearch_debounce_ms: 300\n").unwrap();

        let mut watcher = RuntimeConfigWatcher::discover(Some(path.clone()));
        let snapshot = watcher.load_current().unwrap();
        assert_eq!(snapshot.source, Some(path.display().to_string()));
        assert_eq!(snapshot.config.log_tail, 50);
        assert_eq!(snapshot.config.search_debounce_ms, 300);
    }

    #[test]
    fn reload_only_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.yaml");
        fs::write(&path, "log_tail: 50\n").unwrap();

        let mut watcher = RuntimeConfigWatcher::discover(Some(path.clone()));
        watcher.load_current().unwrap();
        assert!(watcher.reload_if_changed().unwrap().is_none());

        fs::write(&path, "log_tail: 75\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();

        let snapshot = watcher.reload_if_changed().unwrap().unwrap();
        assert_eq!(snapshot.config.log_tail, 75);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skiff.yaml");
        fs::write(&path, "log_tail: [not a number\n").unwrap();

        let mut watcher = RuntimeConfigWatcher::discover(Some(path));
        let error = watcher.load_current().unwrap_err();
        assert!(format!("{error:#}").contains("failed to parse runtime config"));
    }
}
