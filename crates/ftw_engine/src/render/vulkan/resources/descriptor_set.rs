//! Descriptor set layouts, pools and writes

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Pool sizes needed to allocate `sets` sets of this layout
    pub fn pool_sizes(&self, sets: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            let count = binding.descriptor_count * sets;
            match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: count,
                }),
            }
        }
        sizes
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(|e| VulkanError::pipeline("descriptor set layout", e))?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixed layout used by the bootstrap pipeline: binding 0 is the vertex
/// stage uniform buffer; binding 1 is a fragment sampler slot that may stay
/// unwritten.
pub fn bootstrap_layout() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
        .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Set `index` of `sets`, or a descriptor-write failure when it was never allocated
pub fn set_at(sets: &[vk::DescriptorSet], index: usize) -> VulkanResult<vk::DescriptorSet> {
    sets.get(index).copied().ok_or_else(|| VulkanError::PipelineCreationFailed {
        step: "descriptor write",
        reason: format!("no descriptor set {index} (pool holds {})", sets.len()),
    })
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorPool {
    /// Create a pool and allocate one set per entry in `layouts`
    pub fn with_sets(
        device: Device,
        pool_sizes: &[vk::DescriptorPoolSize],
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Self> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(layouts.len() as u32)
            .pool_sizes(pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| VulkanError::pipeline("descriptor pool", e))?;

        let mut descriptor_pool = Self {
            pool,
            device,
            sets: Vec::new(),
        };

        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(layouts);

        descriptor_pool.sets = unsafe { descriptor_pool.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|e| VulkanError::pipeline("descriptor set allocation", e))?;

        Ok(descriptor_pool)
    }

    /// Point `binding` of set `index` at a whole uniform buffer
    pub fn write_uniform_buffer(
        &self,
        index: usize,
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    ) -> VulkanResult<()> {
        let set = set_at(&self.sets, index)?;

        let buffer_infos = [vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        }];
        let writes = [vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos)
            .build()];

        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        Ok(())
    }

    /// Allocated descriptor sets
    pub fn sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every set allocated from it
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
