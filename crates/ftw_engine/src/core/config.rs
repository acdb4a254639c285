//! # Application Configuration
//!
//! All configuration consumed by the bootstrap: window geometry, the capability
//! requests handed to negotiation, the identity stamped into the Vulkan
//! instance, and where the precompiled shaders live.
//!
//! Every struct is `#[serde(default)]` so a config file only needs to name the
//! values it overrides.

use serde::{Serialize, Deserialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Khronos validation layer, requested in debug builds
pub const KHRONOS_VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Swapchain device extension, always required
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// # Shader Configuration
///
/// Paths to the precompiled SPIR-V blobs for the two fixed pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the usual output directories so the app can be launched from the
    /// workspace root or from its own directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "shaders/",
            "resources/shaders/",
            "../target/shaders/",
            "./",
        ];

        let resolve = |file: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{file}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("target/shaders/{file}"))
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }

    /// Validate that shader paths are set
    pub fn validate(&self) -> Result<(), String> {
        if self.vertex_shader_path.is_empty() {
            return Err("Vertex shader path cannot be empty".to_string());
        }
        if self.fragment_shader_path.is_empty() {
            return Err("Fragment shader path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("cube.vert.spv", "cube.frag.spv")
    }
}

/// # Capability Requests
///
/// Names handed to capability negotiation. Instance and device extensions are
/// required groups; layers are advisory unless `layers_required` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Instance layers to request
    pub layers: Vec<String>,
    /// Fail startup when any requested layer is missing instead of trimming
    pub layers_required: bool,
    /// Instance extensions required on top of what the window asks for
    pub instance_extensions: Vec<String>,
    /// Device extensions required; the swapchain extension is always added
    pub device_extensions: Vec<String>,
    /// Register the debug-report sink when validation layers are accepted
    pub enable_diagnostics: bool,
    /// Re-check accepted layers against the accelerator's own layer list
    pub revalidate_device_layers: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        let layers = if cfg!(debug_assertions) {
            vec![KHRONOS_VALIDATION_LAYER.to_string()]
        } else {
            Vec::new()
        };

        Self {
            layers,
            layers_required: false,
            instance_extensions: Vec::new(),
            device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            enable_diagnostics: cfg!(debug_assertions),
            revalidate_device_layers: true,
        }
    }
}

/// # Vulkan Renderer Configuration
///
/// Identity stamp, capability requests and shader locations for the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Engine name for Vulkan instance creation
    pub engine_name: String,
    /// Capability requests
    pub capabilities: CapabilityConfig,
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            engine_name: "FTW Engine".to_string(),
            capabilities: CapabilityConfig::default(),
            shaders: ShaderConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the validation layers, advisory or required
    pub fn with_layers(mut self, layers: Vec<String>, required: bool) -> Self {
        self.capabilities.layers = layers;
        self.capabilities.layers_required = required;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }
        if self.engine_name.is_empty() {
            return Err("Engine name cannot be empty".to_string());
        }
        self.shaders.validate()
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("Vulkan FTW")
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Requested drawable width in pixels
    pub width: u32,
    /// Requested drawable height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan FTW".to_string(),
            width: 800,
            height: 640,
        }
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level for the engine (`RUST_LOG` still overrides per module)
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Parse the configured level, falling back to `Info` for unknown names
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration loaded by the application binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Window configuration
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: VulkanRendererConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window extent must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate().map_err(ConfigError::Invalid)
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ApplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.title, "Vulkan FTW");
        assert_eq!((config.window.width, config.window.height), (800, 640));
        assert!(config
            .renderer
            .capabilities
            .device_extensions
            .contains(&SWAPCHAIN_EXTENSION.to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ApplicationConfig::from_toml_str(
            r#"
            [engine]
            log_level = "debug"

            [renderer.capabilities]
            layers = []
            layers_required = true
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.level_filter(), log::LevelFilter::Debug);
        assert!(config.renderer.capabilities.layers.is_empty());
        assert!(config.renderer.capabilities.layers_required);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.renderer.application_name, "Vulkan FTW");
    }

    #[test]
    fn test_zero_extent_rejected() {
        let mut config = ApplicationConfig::default();
        config.window.height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let engine = EngineConfig::new().with_log_level("chatty");
        assert_eq!(engine.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_round_trip_through_ron_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftw.ron");

        let mut config = ApplicationConfig::default();
        config.window.title = "Spinning".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
