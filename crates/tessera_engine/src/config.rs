//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! target_fps = 30
//! fetch_initial_state = true
//! log_messages = false
//! max_frame_dt = 0.1
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// Default tick rate of a scene.
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Runtime configuration of a scene engine.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Ticks per second driven by the runner.
    pub target_fps: u32,
    /// Pull the renderer's state snapshot before the first tick.
    pub fetch_initial_state: bool,
    /// Log every CRDT message received and sent at `debug` level.
    pub log_messages: bool,
    /// Upper bound, in seconds, for the `dt` handed to systems.
    pub max_frame_dt: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            fetch_initial_state: true,
            log_messages: false,
            max_frame_dt: 0.1,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on malformed TOML, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.target_fps == 0 {
            return Err(EngineError::Config("target_fps must be positive".into()));
        }
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt > 0.0) {
            return Err(EngineError::Config(
                "max_frame_dt must be a positive number of seconds".into(),
            ));
        }
        Ok(())
    }

    /// Wall-clock length of one tick.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str("target_fps = 60\nlog_messages = true").unwrap();
        assert_eq!(config.target_fps, 60);
        assert!(config.log_messages);
        assert!(config.fetch_initial_state);
        assert_eq!(config.frame_duration(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = EngineConfig::from_toml_str("tick_rate = 60").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_zero_fps_is_rejected() {
        assert!(EngineConfig::from_toml_str("target_fps = 0").is_err());
        assert!(EngineConfig::from_toml_str("max_frame_dt = -1.0").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not/here.toml"));
    }
}
