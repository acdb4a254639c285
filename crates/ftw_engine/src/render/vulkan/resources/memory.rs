//! Device memory allocation
//!
//! One dedicated allocation per resource, bound whole at offset 0. There is
//! no sub-allocation pool.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Resource a fresh allocation is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindTarget {
    /// Bind with `vkBindImageMemory`
    Image(vk::Image),
    /// Bind with `vkBindBufferMemory`
    Buffer(vk::Buffer),
}

/// Resolve the lowest memory-type index allowed by `type_bits` whose
/// property flags include every flag in `required`.
pub fn resolve_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = (memory_properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or(VulkanError::NoCompatibleMemoryType { type_bits, required })
}

/// Allocate exactly `requirements.size` bytes from `type_index` and bind them
/// to `target` at offset 0. The allocation is freed again if binding fails.
pub fn allocate_and_bind(
    device: &Device,
    requirements: &vk::MemoryRequirements,
    type_index: u32,
    target: BindTarget,
) -> VulkanResult<vk::DeviceMemory> {
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(type_index);

    let memory = unsafe { device.allocate_memory(&alloc_info, None).map_err(VulkanError::Api)? };

    let bound = unsafe {
        match target {
            BindTarget::Image(image) => device.bind_image_memory(image, memory, 0),
            BindTarget::Buffer(buffer) => device.bind_buffer_memory(buffer, memory, 0),
        }
    };

    if let Err(e) = bound {
        unsafe { device.free_memory(memory, None) };
        return Err(VulkanError::Api(e));
    }

    log::debug!(
        "Allocated {} bytes from memory type {} for {:?}",
        requirements.size,
        type_index,
        target
    );
    Ok(memory)
}

/// Resolve a memory type for `target` and back it with a dedicated allocation
pub fn allocate_for(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    target: BindTarget,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let requirements = unsafe {
        match target {
            BindTarget::Image(image) => device.get_image_memory_requirements(image),
            BindTarget::Buffer(buffer) => device.get_buffer_memory_requirements(buffer),
        }
    };

    let type_index = resolve_type_index(memory_properties, requirements.memory_type_bits, required)?;
    allocate_and_bind(device, &requirements, type_index, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = flags.len() as u32;
        for (slot, &property_flags) in properties.memory_types.iter_mut().zip(flags) {
            *slot = vk::MemoryType {
                property_flags,
                heap_index: 0,
            };
        }
        properties
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn test_lowest_qualifying_index_wins() {
        let properties = table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(resolve_type_index(&properties, 0b111, HOST).unwrap(), 1);
        assert_eq!(resolve_type_index(&properties, 0b100, HOST).unwrap(), 2);
        assert_eq!(
            resolve_type_index(&properties, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn test_empty_requirement_takes_first_allowed_bit() {
        let properties = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST]);
        assert_eq!(
            resolve_type_index(&properties, 0b10, vk::MemoryPropertyFlags::empty()).unwrap(),
            1
        );
    }

    #[test]
    fn test_flags_must_be_a_superset() {
        let properties = table(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let err = resolve_type_index(&properties, 0b1, HOST).unwrap_err();
        assert!(matches!(
            err,
            VulkanError::NoCompatibleMemoryType { type_bits: 0b1, .. }
        ));
    }

    #[test]
    fn test_bits_beyond_reported_count_are_ignored() {
        let mut properties = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        // Stale data past memory_type_count must never be picked
        properties.memory_types[1].property_flags = HOST;
        assert!(resolve_type_index(&properties, 0b10, HOST).is_err());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let properties = table(&[HOST, vk::MemoryPropertyFlags::DEVICE_LOCAL, HOST]);
        let first = resolve_type_index(&properties, 0b101, HOST).unwrap();
        for _ in 0..8 {
            assert_eq!(resolve_type_index(&properties, 0b101, HOST).unwrap(), first);
        }
        assert_eq!(first, 0);
    }

    #[test]
    fn test_not_found_iff_nothing_qualifies() {
        let flags = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            HOST,
        ];
        let properties = table(&flags);
        let wanted = [vk::MemoryPropertyFlags::empty(), vk::MemoryPropertyFlags::HOST_VISIBLE, HOST];

        for bits in 0u32..8 {
            for required in wanted {
                let exists = flags
                    .iter()
                    .enumerate()
                    .any(|(i, f)| bits & (1 << i) != 0 && f.contains(required));
                assert_eq!(resolve_type_index(&properties, bits, required).is_ok(), exists);
            }
        }
    }
}
