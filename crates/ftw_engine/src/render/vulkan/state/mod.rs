// Presentation chain, framebuffers and bootstrap lifecycle

pub mod framebuffer;
pub mod lifecycle;
pub mod swapchain;

pub use framebuffer::*;
pub use lifecycle::*;
pub use swapchain::*;
