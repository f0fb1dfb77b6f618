//! Configuration file loader.

use std::path::PathBuf;

use crate::config::CaptureConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .adbcam.toml
        search_paths.push(PathBuf::from(".adbcam.toml"));

        // 2. User config directory: ~/.config/adbcam/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("adbcam").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(&self) -> Result<CaptureConfig, ConfigError> {
        for path in &self.search_paths {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Self::load_from_path(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(CaptureConfig::default())
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &PathBuf) -> Result<CaptureConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MicSource;
    use std::io::Write;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".adbcam.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let config = loader.load().unwrap();
        assert_eq!(config.video.card_label, "AdbCam");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_str = r#"
            [video]
            device = "/dev/video7"
            default_fps = 30

            [audio]
            source = "mic-unprocessed"
            pipe_path = "/run/user/1000/adbcam_pipe"

            [supervision]
            poll_interval_ms = 100
        "#;

        let config: CaptureConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.video.device, PathBuf::from("/dev/video7"));
        assert_eq!(config.video.default_fps, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.video.card_label, "AdbCam");
        assert_eq!(config.audio.source, MicSource::MicUnprocessed);
        assert_eq!(config.supervision.poll_interval_ms, 100);
        assert_eq!(config.supervision.grace_period_ms, 2000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[video]\ncard_label = \"PhoneCam\"").unwrap();

        let loader = ConfigLoader::with_path(file.path().to_path_buf());
        let config = loader.load().unwrap();
        assert_eq!(config.video.card_label, "PhoneCam");
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml [").unwrap();

        let loader = ConfigLoader::with_path(file.path().to_path_buf());
        assert!(matches!(
            loader.load(),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
