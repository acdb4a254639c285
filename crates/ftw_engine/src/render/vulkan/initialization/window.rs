//! Window management using GLFW
//!
//! The native window collaborator: a client-API-less GLFW window that hands
//! the bootstrap its surface and reports close/resize/refresh notifications.

use ash::vk;
use thiserror::Error;

use crate::render::vulkan::initialization::surface::NativeWindow;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialised
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// GLFW found no Vulkan loader
    #[error("Vulkan is not supported by this GLFW build or system")]
    VulkanUnsupported,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Notifications the event loop cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked to close the window
    CloseRequested,
    /// The drawable size changed
    Resized(u32, u32),
    /// The window contents need repainting
    Refresh,
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a visible window with no client API attached
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_refresh_polling(true);

        log::info!("Created window \"{}\" ({}x{})", title, width, height);
        Ok(Self { glfw, window, events })
    }

    /// Whether a close has been requested
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Block until at least one event arrives
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Drain pending notifications
    pub fn drain_events(&self) -> Vec<WindowEvent> {
        glfw::flush_messages(&self.events)
            .filter_map(|(_, event)| match event {
                glfw::WindowEvent::Close => Some(WindowEvent::CloseRequested),
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    Some(WindowEvent::Resized(width.max(0) as u32, height.max(0) as u32))
                }
                glfw::WindowEvent::Refresh => Some(WindowEvent::Refresh),
                _ => None,
            })
            .collect()
    }

    /// Get the current framebuffer size
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }
}

impl NativeWindow for Window {
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| VulkanError::SurfaceCreationFailed("window system reports no surface extensions".to_string()))
    }

    fn create_surface(&mut self, instance: vk::Instance) -> Result<vk::SurfaceKHR, String> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(format!("native window rejected: {result:?}"))
        }
    }

    fn drawable_extent(&self) -> vk::Extent2D {
        let (width, height) = self.get_framebuffer_size();
        vk::Extent2D { width, height }
    }
}
