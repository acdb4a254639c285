//! Framebuffer management
//!
//! One framebuffer per presentable image, each pairing the image's color view
//! with the shared depth view.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Attachment list for each framebuffer: its color view, then the shared depth view
pub fn attachment_sets(color_views: &[vk::ImageView], depth_view: vk::ImageView) -> Vec<[vk::ImageView; 2]> {
    color_views.iter().map(|&color| [color, depth_view]).collect()
}

/// Framebuffers for every presentable image, with RAII cleanup
pub struct Framebuffers {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    /// Create one framebuffer per color view
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let mut framebuffers = Self {
            device,
            framebuffers: Vec::with_capacity(color_views.len()),
        };

        for attachments in attachment_sets(color_views, depth_view) {
            let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe {
                framebuffers
                    .device
                    .create_framebuffer(&framebuffer_create_info, None)
                    .map_err(|e| VulkanError::pipeline("framebuffers", e))?
            };
            framebuffers.framebuffers.push(framebuffer);
        }

        log::debug!("Created {} framebuffer(s)", framebuffers.framebuffers.len());
        Ok(framebuffers)
    }

    /// Framebuffer handles in presentable-image order
    pub fn handles(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether there are none
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in self.framebuffers.iter().rev() {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
