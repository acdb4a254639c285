//! Command buffer management
//!
//! The command pool bound to the elected queue family, and the one-shot
//! command buffer used for blocking setup work such as layout transitions.

use ash::{vk, Device};

use crate::render::vulkan::{ContextStage, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(|e| VulkanError::context(ContextStage::CommandPoolCreation, e))?
        };

        log::debug!("Created command pool for queue family {}", queue_family_index);
        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info).map_err(VulkanError::Api) }
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe { self.device.free_command_buffers(self.command_pool, command_buffers) };
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Start a one-shot command buffer on `queue`
    pub fn immediate(&self, queue: vk::Queue) -> ScopedImmediateCommandBuffer {
        ScopedImmediateCommandBuffer::new(self.device.clone(), self.command_pool, queue)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every command buffer still allocated from it
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Access the transition makes visible for an image entering `layout`
pub fn destination_access_mask(layout: vk::ImageLayout) -> vk::AccessFlags {
    match layout {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::AccessFlags::SHADER_READ,
        _ => vk::AccessFlags::empty(),
    }
}

/// Barrier moving the first mip level and layer of `image` between layouts
pub fn layout_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    prior_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .src_access_mask(prior_access)
        .dst_access_mask(destination_access_mask(new_layout))
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

/// One-shot command buffer for blocking setup operations.
///
/// The buffer is allocated and begun on the first recorded command. Submitting
/// waits for the queue to go idle and frees the buffer. Dropping without
/// submitting discards the recorded work.
pub struct ScopedImmediateCommandBuffer {
    device: Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    command_buffer: Option<vk::CommandBuffer>,
}

impl ScopedImmediateCommandBuffer {
    /// Prepare a scope; nothing is allocated until something is recorded
    pub fn new(device: Device, pool: vk::CommandPool, queue: vk::Queue) -> Self {
        Self {
            device,
            pool,
            queue,
            command_buffer: None,
        }
    }

    /// Whether a command buffer has been begun and not yet submitted
    pub fn is_recording(&self) -> bool {
        self.command_buffer.is_some()
    }

    fn begin(&mut self) -> VulkanResult<vk::CommandBuffer> {
        if let Some(command_buffer) = self.command_buffer {
            return Ok(command_buffer);
        }

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::Api)?
            .into_iter()
            .next()
            .ok_or(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))?;

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        if let Err(e) = unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) } {
            unsafe { self.device.free_command_buffers(self.pool, &[command_buffer]) };
            return Err(VulkanError::Api(e));
        }

        log::debug!("Began one-shot command buffer");
        self.command_buffer = Some(command_buffer);
        Ok(command_buffer)
    }

    /// Record arbitrary commands, beginning the buffer if needed
    pub fn record<F>(&mut self, commands: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.begin()?;
        commands(&self.device, command_buffer);
        Ok(())
    }

    /// Append a top-of-pipe to top-of-pipe image layout barrier
    pub fn record_layout_transition(
        &mut self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        prior_access: vk::AccessFlags,
    ) -> VulkanResult<()> {
        let barrier = layout_barrier(image, aspect, old_layout, new_layout, prior_access);

        self.record(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })?;

        log::debug!("Recorded layout transition {:?} -> {:?}", old_layout, new_layout);
        Ok(())
    }

    /// End, submit and wait for the recorded work, then free the buffer.
    ///
    /// Does nothing when nothing was recorded.
    pub fn submit_and_wait(&mut self) -> VulkanResult<()> {
        let Some(command_buffer) = self.command_buffer.take() else {
            return Ok(());
        };

        let buffers = [command_buffer];
        let result = unsafe {
            self.device.end_command_buffer(command_buffer).and_then(|()| {
                let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers).build();
                self.device.queue_submit(self.queue, &[submit_info], vk::Fence::null())?;
                self.device.queue_wait_idle(self.queue)
            })
        };

        unsafe { self.device.free_command_buffers(self.pool, &buffers) };
        result.map_err(VulkanError::Api)?;

        log::debug!("Submitted one-shot command buffer");
        Ok(())
    }
}

impl Drop for ScopedImmediateCommandBuffer {
    fn drop(&mut self) {
        if let Some(command_buffer) = self.command_buffer.take() {
            log::warn!("Discarding unsubmitted one-shot command buffer");
            unsafe { self.device.free_command_buffers(self.pool, &[command_buffer]) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_access_follows_new_layout() {
        assert_eq!(
            destination_access_mask(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        );
        assert_eq!(
            destination_access_mask(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(
            destination_access_mask(vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::AccessFlags::TRANSFER_WRITE
        );
        assert_eq!(
            destination_access_mask(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            vk::AccessFlags::SHADER_READ
        );
    }

    #[test]
    fn test_other_layouts_get_no_access() {
        for layout in [
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ] {
            assert_eq!(destination_access_mask(layout), vk::AccessFlags::empty());
        }
    }

    #[test]
    fn test_depth_barrier_shape() {
        let barrier = layout_barrier(
            vk::Image::null(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::AccessFlags::empty(),
        );

        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::empty());
        assert!(barrier
            .dst_access_mask
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(barrier.subresource_range.level_count, 1);
        assert_eq!(barrier.subresource_range.layer_count, 1);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }
}
