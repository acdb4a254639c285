//! Vulkan rendering backend
//!
//! Bootstraps a Vulkan context on a native window: capability negotiation,
//! instance and device, presentation chain, device memory and a fixed
//! graphics pipeline. Everything is owned by [`Bootstrap`] and destroyed in
//! reverse creation order.

/// Instance, device, surface and window setup
pub mod initialization;
/// Command recording, shaders and pipeline objects
pub mod rendering;
/// Device memory, buffers, depth target and descriptors
pub mod resources;
/// Presentation chain, framebuffers and lifecycle tracking
pub mod state;

mod bootstrap;
mod error;

#[cfg(test)]
mod tests;

pub use initialization::{capabilities, debug, enumerate};

pub use bootstrap::Bootstrap;
pub use error::{ContextStage, VulkanError, VulkanResult};
pub use initialization::{NativeWindow, Window, WindowError, WindowEvent};
pub use state::{LifecycleStage, ResourceKind};
