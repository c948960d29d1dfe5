//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument,
//! defaulting to config/dev.toml. A missing or unparsable file falls back
//! to built-in defaults with a warning.

use crate::io::camera::Facing;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Which journey store backs resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryMode {
    Static,
    Http,
}

impl RepositoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryMode::Static => "static",
            RepositoryMode::Http => "http",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Which camera to bind ("environment" points away from the operator)
    #[serde(default = "default_facing")]
    pub facing: Facing,
    /// Frame sampling cadence, aligned with the display refresh
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Scripted camera: frames before the stream has buffered anything
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    /// Scripted camera: symbol-free frames before the payload shows
    #[serde(default = "default_blank_frames")]
    pub blank_frames: u32,
    /// Scripted camera: payload the demo feed eventually presents
    #[serde(default)]
    pub script_payload: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: default_facing(),
            frame_interval_ms: default_frame_interval_ms(),
            warmup_frames: default_warmup_frames(),
            blank_frames: default_blank_frames(),
            script_payload: None,
        }
    }
}

fn default_facing() -> Facing {
    Facing::Environment
}

fn default_frame_interval_ms() -> u64 {
    33 // ~30 fps display refresh
}

fn default_warmup_frames() -> u32 {
    3
}

fn default_blank_frames() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_mode")]
    pub mode: RepositoryMode,
    /// Base URL of the journey service (http mode)
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,
    /// Transport timeout for remote lookups
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Simulated latency of static-store lookups
    #[serde(default = "default_static_lookup_delay_ms")]
    pub static_lookup_delay_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            mode: default_repository_mode(),
            http_base_url: default_http_base_url(),
            timeout_ms: default_timeout_ms(),
            static_lookup_delay_ms: default_static_lookup_delay_ms(),
        }
    }
}

fn default_repository_mode() -> RepositoryMode {
    RepositoryMode::Static
}

fn default_http_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_static_lookup_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    camera_facing: Facing,
    frame_interval_ms: u64,
    camera_warmup_frames: u32,
    camera_blank_frames: u32,
    camera_script_payload: Option<String>,
    repository_mode: RepositoryMode,
    repository_http_base_url: String,
    repository_timeout_ms: u64,
    static_lookup_delay_ms: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            camera_facing: toml_config.camera.facing,
            frame_interval_ms: toml_config.camera.frame_interval_ms,
            camera_warmup_frames: toml_config.camera.warmup_frames,
            camera_blank_frames: toml_config.camera.blank_frames,
            camera_script_payload: toml_config.camera.script_payload,
            repository_mode: toml_config.repository.mode,
            repository_http_base_url: toml_config.repository.http_base_url,
            repository_timeout_ms: toml_config.repository.timeout_ms,
            static_lookup_delay_ms: toml_config.repository.static_lookup_delay_ms,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {e:#}. Using defaults.");
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn camera_facing(&self) -> Facing {
        self.camera_facing
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    pub fn camera_warmup_frames(&self) -> u32 {
        self.camera_warmup_frames
    }

    pub fn camera_blank_frames(&self) -> u32 {
        self.camera_blank_frames
    }

    pub fn camera_script_payload(&self) -> Option<&str> {
        self.camera_script_payload.as_deref()
    }

    pub fn repository_mode(&self) -> RepositoryMode {
        self.repository_mode
    }

    pub fn repository_http_base_url(&self) -> &str {
        &self.repository_http_base_url
    }

    pub fn repository_timeout_ms(&self) -> u64 {
        self.repository_timeout_ms
    }

    pub fn static_lookup_delay_ms(&self) -> u64 {
        self.static_lookup_delay_ms
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    // Builder-style overrides, mostly for tests and simulations
    pub fn with_frame_interval_ms(mut self, interval_ms: u64) -> Self {
        self.frame_interval_ms = interval_ms;
        self
    }

    pub fn with_script_payload(mut self, payload: &str) -> Self {
        self.camera_script_payload = Some(payload.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_facing(), Facing::Environment);
        assert_eq!(config.frame_interval_ms(), 33);
        assert_eq!(config.repository_mode(), RepositoryMode::Static);
        assert_eq!(config.static_lookup_delay_ms(), 1000);
        assert!(config.camera_script_payload().is_none());
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "empty");
        assert_eq!(config.frame_interval_ms(), 33);
        assert_eq!(config.repository_timeout_ms(), 2000);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::default().with_frame_interval_ms(5).with_script_payload("PROD-001");
        assert_eq!(config.frame_interval_ms(), 5);
        assert_eq!(config.camera_script_payload(), Some("PROD-001"));
    }
}
