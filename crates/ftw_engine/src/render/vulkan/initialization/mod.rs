// Vulkan initialization components

pub mod capabilities;
pub mod context;
pub mod debug;
pub mod enumerate;
pub mod surface;
pub mod window;

pub use context::*;
pub use surface::*;
pub use window::*;
