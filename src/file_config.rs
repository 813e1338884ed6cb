use crate::error::Result;
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size_mb: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl FileConfig {
    /// Load config from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        debug!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: FileConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Load config with fallback priority:
    /// 1. Explicit path (if provided)
    /// 2. Project directory (./shelf-upload.json or ./.shelf-upload/config.json)
    /// 3. User config directory (~/.config/shelf-upload/config.json)
    ///
    /// # Errors
    ///
    /// Returns an error only if an explicit path is provided but cannot be read
    pub fn load_with_fallback(explicit_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from_path(path);
        }

        let project_paths = [
            PathBuf::from("./shelf-upload.json"),
            PathBuf::from("./.shelf-upload/config.json"),
        ];

        for path in &project_paths {
            if path.exists() {
                match Self::load_from_path(path) {
                    Ok(config) => {
                        debug!("Loaded config from project directory: {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        debug!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "shelf-upload") {
            let user_config_path = proj_dirs.config_dir().join("config.json");
            if user_config_path.exists() {
                match Self::load_from_path(&user_config_path) {
                    Ok(config) => {
                        debug!(
                            "Loaded config from user directory: {}",
                            user_config_path.display()
                        );
                        return Ok(config);
                    }
                    Err(e) => {
                        debug!(
                            "Failed to load config from {}: {}",
                            user_config_path.display(),
                            e
                        );
                    }
                }
            }
        }

        debug!("No config file found, using defaults");
        Ok(FileConfig::default())
    }

    /// Merge with another config, preferring values from self
    #[must_use]
    pub fn merge_with(&self, other: &FileConfig) -> Self {
        FileConfig {
            api_token: self.api_token.clone().or_else(|| other.api_token.clone()),
            api_url: self.api_url.clone().or_else(|| other.api_url.clone()),
            chunk_size_mb: self.chunk_size_mb.or(other.chunk_size_mb),
            chunk_timeout_secs: self.chunk_timeout_secs.or(other.chunk_timeout_secs),
            max_retries: self.max_retries.or(other.max_retries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_with() {
        let config1 = FileConfig {
            api_token: Some("token1".to_string()),
            api_url: None,
            chunk_size_mb: Some(8),
            ..FileConfig::default()
        };

        let config2 = FileConfig {
            api_token: Some("token2".to_string()),
            api_url: Some("http://api.example.com".to_string()),
            chunk_size_mb: Some(2),
            chunk_timeout_secs: Some(60),
            max_retries: None,
        };

        let merged = config1.merge_with(&config2);

        assert_eq!(merged.api_token, Some("token1".to_string()));
        assert_eq!(merged.api_url, Some("http://api.example.com".to_string()));
        assert_eq!(merged.chunk_size_mb, Some(8));
        assert_eq!(merged.chunk_timeout_secs, Some(60));
        assert_eq!(merged.max_retries, None);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_url": "http://localhost:8000", "chunk_size_mb": 10, "max_retries": 2}"#,
        )
        .unwrap();

        let config = FileConfig::load_from_path(&path).unwrap();

        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.chunk_size_mb, Some(10));
        assert_eq!(config.max_retries, Some(2));
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let missing = PathBuf::from("/nonexistent/shelf-upload.json");
        assert!(FileConfig::load_with_fallback(Some(&missing)).is_err());
    }
}
