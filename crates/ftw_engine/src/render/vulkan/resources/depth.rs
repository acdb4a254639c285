//! Depth target shared by every framebuffer

use ash::{vk, Device};

use crate::render::vulkan::rendering::commands::ScopedImmediateCommandBuffer;
use crate::render::vulkan::resources::memory::{allocate_for, BindTarget};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Fixed depth format
pub const DEPTH_FORMAT: vk::Format = vk::Format::D16_UNORM;

fn depth_error(step: &'static str) -> impl Fn(vk::Result) -> VulkanError {
    move |e| VulkanError::swapchain(step, e)
}

/// Depth image, its memory and view, with RAII cleanup
pub struct DepthTarget {
    device: Device,
    format: vk::Format,
    extent: vk::Extent2D,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
}

impl DepthTarget {
    /// Create the depth target at the chain extent.
    ///
    /// The UNDEFINED -> DEPTH_STENCIL_ATTACHMENT_OPTIMAL transition is recorded
    /// into `setup_commands`, submitted and waited on before the view is
    /// created. Anything already recorded in `setup_commands` goes with it.
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        setup_commands: &mut ScopedImmediateCommandBuffer,
    ) -> VulkanResult<Self> {
        let format = DEPTH_FORMAT;

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device
                .create_image(&image_create_info, None)
                .map_err(depth_error("depth image"))?
        };

        let memory = match allocate_for(&device, memory_properties, BindTarget::Image(image), vk::MemoryPropertyFlags::empty()) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut target = Self {
            device,
            format,
            extent,
            image,
            memory,
            image_view: vk::ImageView::null(),
        };

        setup_commands.record_layout_transition(
            image,
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::AccessFlags::empty(),
        )?;
        setup_commands
            .submit_and_wait()
            .map_err(|e| VulkanError::SwapchainCreationFailed {
                step: "depth transition",
                reason: e.to_string(),
            })?;

        let image_view_create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        target.image_view = unsafe {
            target
                .device
                .create_image_view(&image_view_create_info, None)
                .map_err(depth_error("depth view"))?
        };

        log::debug!("Created depth target {}x{} ({:?})", extent.width, extent.height, format);
        Ok(target)
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Depth format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Extent, equal to the chain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthTarget {
    fn drop(&mut self) {
        unsafe {
            if self.image_view != vk::ImageView::null() {
                self.device.destroy_image_view(self.image_view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
