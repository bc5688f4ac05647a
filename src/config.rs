//! Configuration management for handpoint

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::hand::landmarks;
use crate::layout::TargetRegion;
use crate::mapper::{HandViewportMapper, SearchSettings};
use crate::quad::ScreenQuad;
use crate::transform::Tolerances;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8092,
        }
    }
}

/// Viewport the target quad covers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
    /// Replace the target quad with the full viewport at start-up
    pub auto_target: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            auto_target: true,
        }
    }
}

/// Saved source/target quads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub source: ScreenQuad,
    #[serde(default)]
    pub target: ScreenQuad,
}

/// Pointing ray and ray-march settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub step: f64,
    pub samples: u32,
    pub max_distance: f64,
    /// Ray starts at this landmark...
    pub origin_landmark: i32,
    /// ...and passes through this one
    pub tip_landmark: i32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let search = SearchSettings::default();
        Self {
            step: search.step,
            samples: search.samples,
            max_distance: 1000.0,
            origin_landmark: landmarks::INDEX_FINGER_DIP,
            tip_landmark: landmarks::INDEX_FINGER_TIP,
        }
    }
}

impl SearchConfig {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            step: self.step,
            samples: self.samples,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub viewport: ViewportConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub tolerances: Tolerances,

    /// Pointable regions, in paint order
    #[serde(default)]
    pub targets: Vec<TargetRegion>,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Build a mapper from the saved calibration, applying `auto_target`
    pub fn build_mapper(&self) -> HandViewportMapper {
        let target = if self.viewport.auto_target {
            ScreenQuad::from_viewport(self.viewport.width, self.viewport.height)
        } else {
            self.calibration.target
        };

        let mapper = HandViewportMapper::with_settings(
            self.calibration.source,
            target,
            self.search.settings(),
            self.tolerances,
        );
        if let Some(e) = mapper.calibration_error() {
            tracing::warn!("Saved calibration is unusable: {}", e);
        }
        mapper
    }

    /// Copy the mapper's quads back into the calibration section
    pub fn store_calibration(&mut self, mapper: &HandViewportMapper) {
        self.calibration.source = *mapper.source();
        self.calibration.target = *mapper.target();
    }
}
