//! Vulkan surface management
//!
//! Handles window surface creation and the per-accelerator surface queries
//! used for queue election and swapchain setup.

use ash::extensions::khr;
use ash::{vk, Entry, Instance};

use crate::render::vulkan::enumerate::query_list;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// What the bootstrap needs from the native window collaborator
pub trait NativeWindow {
    /// Instance extensions the window system needs for presentation
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>>;

    /// Create a drawable surface for this window on `instance`
    fn create_surface(&mut self, instance: vk::Instance) -> Result<vk::SurfaceKHR, String>;

    /// Current drawable size in pixels
    fn drawable_extent(&self) -> vk::Extent2D;
}

/// Vulkan surface wrapper for presentation
pub struct Surface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a new surface from a window
    pub fn new<W: NativeWindow + ?Sized>(entry: &Entry, instance: &Instance, window: &mut W) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = window
            .create_surface(instance.handle())
            .map_err(VulkanError::SurfaceCreationFailed)?;

        log::debug!("Created presentation surface");
        Ok(Self {
            surface_loader,
            surface,
        })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface loader
    pub fn loader(&self) -> &khr::Surface {
        &self.surface_loader
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(|e| VulkanError::swapchain("surface capabilities", e))
        }
    }

    /// Get surface formats for a physical device
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        let fp = self.surface_loader.fp();
        let surface = self.surface;
        query_list(|count, data| unsafe {
            (fp.get_physical_device_surface_formats_khr)(physical_device, surface, count, data)
        })
        .map_err(|e| VulkanError::swapchain("surface formats", e))
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        let fp = self.surface_loader.fp();
        let surface = self.surface;
        query_list(|count, data| unsafe {
            (fp.get_physical_device_surface_present_modes_khr)(physical_device, surface, count, data)
        })
        .map_err(|e| VulkanError::swapchain("present modes", e))
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(|e| VulkanError::SurfaceCreationFailed(format!("present support query: {e:?}")))
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
