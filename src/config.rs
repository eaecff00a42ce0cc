//! Runtime configuration.
//!
//! Defaults cover every field, so a config file only needs the keys it changes. File loading
//! is available with the `config` feature (enabled by default):
//!
//! ```toml
//! frame_interval_ms = 16
//! force_inline = false
//!
//! [tracer]
//! width = 500
//! height = 333
//! samples_per_pixel = 8
//! scene = "glass_spheres"
//! aperture = 0.1
//! ```

use crate::error::{DispatchError, Result};
use std::time::Duration;

#[cfg(feature = "config")]
use std::path::{Path, PathBuf};

/// Settings for the coordinator and its hosts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct DispatchConfig {
    /// Period of the progress timer's frame loop
    pub frame_interval_ms: u64,
    /// Skip the background worker entirely and render on the calling thread
    pub force_inline: bool,
    pub tracer: TracerConfig,
}

/// Parameters for the built-in ray tracer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct TracerConfig {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub seed: u64,
    pub scene: SceneKind,
    /// Lens diameter; 0 gives a pinhole camera with everything in focus
    pub aperture: f64,
    pub focus_distance: f64,
}

/// Which built-in scene the tracer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum SceneKind {
    /// Mirror, matte and small glass sphere
    #[default]
    ThreeSpheres,
    /// Five spheres in an arc behind a large glass sphere
    GlassSpheres,
    /// Three feature spheres among a field of small random ones
    Random,
}

impl SceneKind {
    pub const NAMES: [&'static str; 3] = ["three_spheres", "glass_spheres", "random"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "three_spheres" => Some(Self::ThreeSpheres),
            "glass_spheres" => Some(Self::GlassSpheres),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            force_inline: false,
            tracer: TracerConfig::default(),
        }
    }
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 333,
            samples_per_pixel: 8,
            max_depth: 10,
            seed: 0xda94_2042_e4dd_58b5,
            scene: SceneKind::ThreeSpheres,
            aperture: 0.0,
            focus_distance: 10.0,
        }
    }
}

impl DispatchConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Reject values the coordinator or the tracer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            return Err(DispatchError::config("frame_interval_ms must be at least 1"));
        }
        self.tracer.validate()
    }
}

impl TracerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DispatchError::config(format!(
                "image dimensions must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(DispatchError::config("samples_per_pixel must be at least 1"));
        }
        if self.max_depth == 0 {
            return Err(DispatchError::config("max_depth must be at least 1"));
        }
        if !(self.aperture.is_finite() && self.aperture >= 0.0) {
            return Err(DispatchError::config(format!(
                "aperture must be a non-negative number (got {})",
                self.aperture
            )));
        }
        if !(self.focus_distance.is_finite() && self.focus_distance > 0.0) {
            return Err(DispatchError::config(format!(
                "focus_distance must be positive (got {})",
                self.focus_distance
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "config")]
impl DispatchConfig {
    /// Default location: `<config dir>/render-dispatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("render-dispatch").join("config.toml"))
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| DispatchError::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path. The file must exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load the explicit path if given, otherwise the default path if it exists,
    /// otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("loading config from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        assert_eq!((config.tracer.width, config.tracer.height), (500, 333));
    }

    #[test]
    fn validation_rejects_zero_values() {
        let mut config = DispatchConfig::default();
        config.tracer.width = 0;
        assert!(matches!(
            config.validate(),
            Err(DispatchError::ConfigError { .. })
        ));

        let mut config = DispatchConfig::default();
        config.frame_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::default();
        config.tracer.samples_per_pixel = 0;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DispatchConfig::from_toml_str(
            "force_inline = true\n[tracer]\nsamples_per_pixel = 2\n",
        )
        .unwrap();

        assert!(config.force_inline);
        assert_eq!(config.tracer.samples_per_pixel, 2);
        assert_eq!(config.tracer.width, 500);
        assert_eq!(config.frame_interval_ms, 16);
    }

    #[test]
    fn validation_rejects_bad_lens() {
        let mut config = DispatchConfig::default();
        config.tracer.aperture = -0.5;
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::default();
        config.tracer.focus_distance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn scene_names_round_trip() {
        for name in SceneKind::NAMES {
            assert!(SceneKind::from_name(name).is_some(), "{name}");
        }
        assert_eq!(SceneKind::from_name("ten_spheres"), None);
    }

    #[cfg(feature = "config")]
    #[test]
    fn scene_is_read_from_toml() {
        let config = DispatchConfig::from_toml_str("[tracer]\nscene = \"random\"\n").unwrap();
        assert_eq!(config.tracer.scene, SceneKind::Random);
        assert_eq!(DispatchConfig::default().tracer.scene, SceneKind::ThreeSpheres);
    }

    #[cfg(feature = "config")]
    #[test]
    fn invalid_toml_is_config_error() {
        let err = DispatchConfig::from_toml_str("frame_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError { .. }));

        let err = DispatchConfig::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(matches!(err, DispatchError::ConfigError { .. }));
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_reads_explicit_file() {
        let file = tempfile::NamedTempFile::new().expect("create temp file");
        std::fs::write(file.path(), "[tracer]\nwidth = 64\nheight = 32\n").expect("write");

        let config = DispatchConfig::load(Some(file.path())).unwrap();
        assert_eq!((config.tracer.width, config.tracer.height), (64, 32));
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("nope.toml");
        assert!(DispatchConfig::load(Some(&missing)).is_err());
    }
}
