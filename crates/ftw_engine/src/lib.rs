//! # FTW Engine
//!
//! Bootstraps a Vulkan rendering context on a native window and tears it down
//! again in exactly the reverse order.
//!
//! ## Features
//!
//! - **Capability negotiation**: required and advisory layer/extension groups
//! - **Ordered startup**: instance, accelerator, device, presentation chain,
//!   depth target and a fixed graphics pipeline
//! - **Strict teardown**: every created object is recorded and released newest first
//! - **Configuration**: TOML or RON files via serde
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ftw_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::load_or_default("vulkan_ftw.toml")?;
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let bootstrap = Bootstrap::initialize(&config.renderer, &mut window)?;
//!     assert_eq!(bootstrap.stage(), LifecycleStage::Running);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{ApplicationConfig, EngineConfig, VulkanRendererConfig, WindowConfig},
        render::vulkan::{
            Bootstrap, LifecycleStage, NativeWindow, ResourceKind, VulkanError, VulkanResult, Window, WindowError,
            WindowEvent,
        },
    };
}
