//! Vulkan context creation
//!
//! Instance, physical accelerator and logical device, created in that order
//! from the names accepted by capability negotiation. Queue-family election is
//! split in two: graphics capability is known as soon as the accelerator is
//! picked, present support only once the surface exists.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Entry, Instance};
use std::ffi::CString;
use std::os::raw::c_char;

use crate::core::config::VulkanRendererConfig;
use crate::render::vulkan::capabilities::{
    extension_names, fixed_name, layer_names, negotiate, AcceptedCapabilities, CapabilityGroup, Requirement,
};
use crate::render::vulkan::enumerate::{query_list, query_list_infallible};
use crate::render::vulkan::{ContextStage, VulkanError, VulkanResult};

/// Convert accepted names into C strings for create-info structs
fn c_strings(names: &[String], stage: ContextStage) -> VulkanResult<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str()).map_err(|_| VulkanError::ContextCreationFailed {
                stage,
                reason: format!("name contains a NUL byte: {name:?}"),
            })
        })
        .collect()
}

fn pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

/// Layers and extensions the loader reports before any instance exists
#[derive(Debug, Clone, Default)]
pub struct InstanceAvailability {
    /// Instance layer names
    pub layers: Vec<String>,
    /// Instance extension names
    pub extensions: Vec<String>,
}

impl InstanceAvailability {
    /// Enumerate instance layers and extensions
    pub fn enumerate(entry: &Entry) -> VulkanResult<Self> {
        let fp = entry.fp_v1_0();

        let layers = query_list(|count, data| unsafe { (fp.enumerate_instance_layer_properties)(count, data) })
            .map_err(|e| VulkanError::context(ContextStage::InstanceEnumeration, e))?;
        let extensions = query_list(|count, data| unsafe {
            (fp.enumerate_instance_extension_properties)(std::ptr::null(), count, data)
        })
        .map_err(|e| VulkanError::context(ContextStage::InstanceEnumeration, e))?;

        Ok(Self {
            layers: layer_names(&layers),
            extensions: extension_names(&extensions),
        })
    }
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
}

impl VulkanInstance {
    /// Create the instance with the accepted layers and extensions
    pub fn new(entry: &Entry, config: &VulkanRendererConfig, accepted: &AcceptedCapabilities) -> VulkanResult<Self> {
        let stage = ContextStage::InstanceCreation;
        let app_name = c_strings(std::slice::from_ref(&config.application_name), stage)?;
        let engine_name = c_strings(std::slice::from_ref(&config.engine_name), stage)?;
        let (major, minor, patch) = config.application_version;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name[0])
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name[0])
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layers = c_strings(&accepted.layers, stage)?;
        let extensions = c_strings(&accepted.instance_extensions, stage)?;
        let layer_ptrs = pointers(&layers);
        let extension_ptrs = pointers(&extensions);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(|e| VulkanError::context(stage, e))?
        };

        log::info!(
            "Created Vulkan instance with {} layer(s) and {} extension(s)",
            accepted.layers.len(),
            accepted.instance_extensions.len()
        );

        Ok(Self {
            entry: entry.clone(),
            instance,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Pick the first enumerated accelerator
///
/// No scoring: with several accelerators the choice follows driver enumeration order.
pub fn first_accelerator(devices: &[vk::PhysicalDevice]) -> VulkanResult<vk::PhysicalDevice> {
    devices.first().copied().ok_or_else(|| VulkanError::ContextCreationFailed {
        stage: ContextStage::PhysicalDeviceEnumeration,
        reason: "no Vulkan-capable accelerator found".to_string(),
    })
}

/// Families advertising graphics capability, in index order
pub fn graphics_families(families: &[vk::QueueFamilyProperties]) -> Vec<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(index, _)| index as u32)
        .collect()
}

/// First graphics-capable family that can also present to the surface
pub fn elect_queue_family<F>(candidates: &[u32], mut supports_present: F) -> VulkanResult<u32>
where
    F: FnMut(u32) -> VulkanResult<bool>,
{
    for &index in candidates {
        if supports_present(index)? {
            return Ok(index);
        }
    }

    Err(VulkanError::ContextCreationFailed {
        stage: ContextStage::QueueFamilySelection,
        reason: format!("none of the graphics families {candidates:?} can present to the surface"),
    })
}

/// Re-check instance-accepted layers against the accelerator's own layer list.
///
/// Device layers are a legacy mechanism: an accelerator reporting none is
/// treated as not participating, and the instance layers pass through as-is.
pub fn revalidate_device_layers(
    accepted_layers: &[String],
    device_layers: &[String],
    requirement: Requirement,
    enabled: bool,
) -> VulkanResult<Vec<String>> {
    if !enabled || device_layers.is_empty() {
        log::debug!("Device layer revalidation skipped");
        return Ok(accepted_layers.to_vec());
    }

    negotiate(CapabilityGroup::DeviceLayers, requirement, accepted_layers, device_layers)
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory-type table snapshot used for every allocation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Available queue families
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Graphics-capable family indices, before present support is known
    pub graphics_candidates: Vec<u32>,
}

impl PhysicalDeviceInfo {
    /// Enumerate accelerators and take the first one
    pub fn select_first(instance: &Instance) -> VulkanResult<Self> {
        let fp = instance.fp_v1_0();
        let handle = instance.handle();

        let devices = query_list(|count, data| unsafe { (fp.enumerate_physical_devices)(handle, count, data) })
            .map_err(|e| VulkanError::context(ContextStage::PhysicalDeviceEnumeration, e))?;
        log::debug!("Found {} physical device(s)", devices.len());

        let device = first_accelerator(&devices)?;
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families = query_list_infallible(|count, data| unsafe {
            (fp.get_physical_device_queue_family_properties)(device, count, data);
        });
        let graphics_candidates = graphics_families(&queue_families);

        let info = Self {
            device,
            properties,
            memory_properties,
            queue_families,
            graphics_candidates,
        };
        log::info!("Selected GPU: {}", info.name());
        Ok(info)
    }

    /// Human-readable device name
    pub fn name(&self) -> String {
        fixed_name(&self.properties.device_name)
    }

    /// Layer names the accelerator reports
    pub fn layer_names(&self, instance: &Instance) -> VulkanResult<Vec<String>> {
        let fp = instance.fp_v1_0();
        let device = self.device;
        let layers = query_list(|count, data| unsafe { (fp.enumerate_device_layer_properties)(device, count, data) })
            .map_err(|e| VulkanError::context(ContextStage::DeviceLayerRevalidation, e))?;
        Ok(layer_names(&layers))
    }

    /// Extension names the accelerator reports
    pub fn extension_names(&self, instance: &Instance) -> VulkanResult<Vec<String>> {
        let fp = instance.fp_v1_0();
        let device = self.device;
        let extensions = query_list(|count, data| unsafe {
            (fp.enumerate_device_extension_properties)(device, std::ptr::null(), count, data)
        })
        .map_err(|e| VulkanError::context(ContextStage::DeviceExtensionEnumeration, e))?;
        Ok(extension_names(&extensions))
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// The single queue used for graphics, transfer and presentation
    pub queue: vk::Queue,
    /// Family the queue was created from
    pub queue_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with exactly one queue from the elected family
    pub fn new(
        instance: &Instance,
        physical_device: &PhysicalDeviceInfo,
        queue_family: u32,
        accepted: &AcceptedCapabilities,
    ) -> VulkanResult<Self> {
        let stage = ContextStage::DeviceCreation;
        let priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build()];

        let layers = c_strings(&accepted.device_layers, stage)?;
        let extensions = c_strings(&accepted.device_extensions, stage)?;
        let layer_ptrs = pointers(&layers);
        let extension_ptrs = pointers(&extensions);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, None)
                .map_err(|e| VulkanError::context(stage, e))?
        };

        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::info!("Created logical device with one queue from family {}", queue_family);

        Ok(Self {
            device,
            queue,
            queue_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // Ensure device is idle before destruction
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_accelerator_is_fatal() {
        let err = first_accelerator(&[]).unwrap_err();
        assert_eq!(err.stage_tag(), "context/physical device enumeration");
    }

    #[test]
    fn test_first_accelerator_wins() {
        use ash::vk::Handle;
        let devices = [vk::PhysicalDevice::from_raw(2), vk::PhysicalDevice::from_raw(1)];
        assert_eq!(first_accelerator(&devices).unwrap(), devices[0]);
    }

    #[test]
    fn test_graphics_families_skip_compute_and_empty() {
        let families = [
            family(vk::QueueFlags::COMPUTE, 4),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 0),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 2),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(graphics_families(&families), vec![2, 3]);
    }

    #[test]
    fn test_election_requires_present_support() {
        let elected = elect_queue_family(&[2, 3, 5], |index| Ok(index != 2)).unwrap();
        assert_eq!(elected, 3);
    }

    #[test]
    fn test_election_fails_without_presenting_family() {
        let err = elect_queue_family(&[0, 1], |_| Ok(false)).unwrap_err();
        assert!(matches!(
            err,
            VulkanError::ContextCreationFailed {
                stage: ContextStage::QueueFamilySelection,
                ..
            }
        ));
    }

    #[test]
    fn test_election_propagates_query_errors() {
        let err = elect_queue_family(&[0], |_| Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))).unwrap_err();
        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
    }

    #[test]
    fn test_device_layer_revalidation_is_gated() {
        let accepted = vec!["VK_LAYER_KHRONOS_validation".to_string()];

        // Modern accelerators report no device layers: pass through untouched
        let passed = revalidate_device_layers(&accepted, &[], Requirement::Required, true).unwrap();
        assert_eq!(passed, accepted);

        // Disabled by configuration
        let other = vec!["VK_LAYER_other".to_string()];
        let passed = revalidate_device_layers(&accepted, &other, Requirement::Required, false).unwrap();
        assert_eq!(passed, accepted);

        // Legacy accelerator that lacks the layer
        assert!(revalidate_device_layers(&accepted, &other, Requirement::Required, true).is_err());
        let trimmed = revalidate_device_layers(&accepted, &other, Requirement::Advisory, true).unwrap();
        assert!(trimmed.is_empty());
    }
}
