//! Core engine types shared by every subsystem

pub mod config;

pub use config::{
    ApplicationConfig, CapabilityConfig, EngineConfig, ShaderConfig, VulkanRendererConfig, WindowConfig,
};
