//! Rendering
//!
//! Only the Vulkan backend exists.

pub mod vulkan;

pub use vulkan::{Bootstrap, VulkanError, VulkanResult};
