//! Configuration module for the configurator service

use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub assets: AssetSettings,
    pub compositing: CompositingSettings,
    pub editor: EditorSettings,
    pub sessions: SessionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Where material textures and the product catalog come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSettings {
    /// Directory that relative texture paths are resolved against
    pub root: PathBuf,
    /// Optional JSON catalog replacing the built-in one
    pub catalog_path: Option<PathBuf>,
    /// Timeout for textures referenced by http(s) URL
    pub fetch_timeout_secs: u64,
}

/// Tunable constants of the artwork pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositingSettings {
    /// Tape width (mm) the 3D mesh is modelled at
    pub base_3d_width_mm: f64,
    pub pixels_per_mm: u32,
    pub design_module_width_mm: u32,
    pub fixed_canvas_height_mm: u32,
    /// Manual vertical compensation per width, keyed by the width as a string
    pub stretch_correction: HashMap<String, f64>,
}

impl CompositingSettings {
    /// Pixel size of the 2D design canvas
    pub fn canvas_dimensions(&self) -> (u32, u32) {
        (
            self.design_module_width_mm * self.pixels_per_mm,
            self.fixed_canvas_height_mm * self.pixels_per_mm,
        )
    }
}

/// 2D editor defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSettings {
    pub font_dir: PathBuf,
    pub default_font: String,
    pub default_color: String,
    pub font_size: f32,
    pub max_image_dimension: u32,
}

/// Session lifecycle limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_sessions: usize,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub preview_poll_timeout_secs: u64,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with CONFIGURATOR_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with the built-in defaults so partial files are enough
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (CONFIGURATOR_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("CONFIGURATOR")
                    .separator("__")
                    .try_parsing(true)
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            assets: AssetSettings {
                root: PathBuf::from("assets"),
                catalog_path: None,
                fetch_timeout_secs: 30,
            },
            compositing: CompositingSettings {
                base_3d_width_mm: 50.0,
                pixels_per_mm: 5,
                design_module_width_mm: 160,
                fixed_canvas_height_mm: 52,
                stretch_correction: HashMap::from([
                    ("38".to_string(), 0.8),
                    ("50".to_string(), 1.0),
                    ("75".to_string(), 1.25),
                ]),
            },
            editor: EditorSettings {
                font_dir: PathBuf::from("assets/fonts"),
                default_font: "Arial".to_string(),
                default_color: "#000000".to_string(),
                font_size: 60.0,
                max_image_dimension: 300,
            },
            sessions: SessionSettings {
                max_sessions: 10_000,
                idle_timeout_secs: 1800,
                sweep_interval_secs: 60,
                preview_poll_timeout_secs: 25,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_canvas_dimensions() {
        let settings = Settings::default();
        assert_eq!(settings.compositing.canvas_dimensions(), (800, 260));
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        std::env::set_var("CONFIG_PATH", "/nonexistent-config-dir");
        let settings = Settings::load().unwrap();
        assert_eq!(settings.compositing.base_3d_width_mm, 50.0);
        assert_eq!(settings.editor.max_image_dimension, 300);
        assert_eq!(settings.compositing.stretch_correction.get("38"), Some(&0.8));
    }
}
