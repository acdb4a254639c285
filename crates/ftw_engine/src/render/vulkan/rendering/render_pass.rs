//! Render pass management
//!
//! One subpass writing a presentable color attachment and the shared depth
//! attachment.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Color and depth attachments, both cleared on load and stored
pub fn attachment_descriptions(color_format: vk::Format, depth_format: vk::Format) -> [vk::AttachmentDescription; 2] {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let depth_attachment = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    [color_attachment, depth_attachment]
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create the single-subpass color + depth pass
    pub fn new(device: Device, color_format: vk::Format, depth_format: vk::Format) -> VulkanResult<Self> {
        let attachments = attachment_descriptions(color_format, depth_format);

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let depth_attachment_ref = vk::AttachmentReference::builder()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = [color_attachment_ref];
        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build()];

        let render_pass_create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let render_pass = unsafe {
            device
                .create_render_pass(&render_pass_create_info, None)
                .map_err(|e| VulkanError::pipeline("render pass", e))?
        };

        log::debug!("Created render pass ({:?} + {:?})", color_format, depth_format);
        Ok(Self { device, render_pass })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_attachments_clear_and_store() {
        let [color, depth] = attachment_descriptions(vk::Format::B8G8R8A8_UNORM, vk::Format::D16_UNORM);

        for attachment in [color, depth] {
            assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
            assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
            assert_eq!(attachment.samples, vk::SampleCountFlags::TYPE_1);
        }
    }

    #[test]
    fn test_attachment_formats_and_layouts() {
        let [color, depth] = attachment_descriptions(vk::Format::R8G8B8A8_SRGB, vk::Format::D16_UNORM);

        assert_eq!(color.format, vk::Format::R8G8B8A8_SRGB);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(depth.format, vk::Format::D16_UNORM);
        // Depth is already transitioned during setup
        assert_eq!(depth.initial_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(depth.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }
}
