//! Vulkan swapchain management
//!
//! Chain parameters are chosen by pure functions over the surface queries, so
//! the policy can be checked without a device. The chain is created once; a
//! resize does not re-create it.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::vulkan::enumerate::query_list;
use crate::render::vulkan::rendering::commands::CommandPool;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Format used when the surface has no preferred format
pub const FALLBACK_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

/// Present modes in order of preference
pub const PRESENT_MODE_PREFERENCE: [vk::PresentModeKHR; 3] = [
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::IMMEDIATE,
    vk::PresentModeKHR::FIFO,
];

/// Extent of the chain images.
///
/// A current extent of all-ones means the surface lets the swapchain decide;
/// the requested size is used, kept inside the supported range.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    let current = capabilities.current_extent;
    if current.width != u32::MAX || current.height != u32::MAX {
        return current;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: requested.width.max(min.width).min(max.width.max(min.width)),
        height: requested.height.max(min.height).min(max.height.max(min.height)),
    }
}

/// Pixel format and color space of the chain images
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    let first = formats.first().ok_or(VulkanError::SwapchainCreationFailed {
        step: "surface formats",
        reason: "surface reports no formats".to_string(),
    })?;

    if first.format == vk::Format::UNDEFINED {
        return Ok(vk::SurfaceFormatKHR {
            format: FALLBACK_FORMAT,
            color_space: first.color_space,
        });
    }

    Ok(*first)
}

/// Best available present mode; FIFO is always supported
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    PRESENT_MODE_PREFERENCE
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// One more image than the minimum, clamped to the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Identity when the surface supports it, otherwise whatever it currently uses
pub fn choose_pre_transform(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

/// Parameters the chain is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSettings {
    /// Pixel format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Requested minimum image count
    pub image_count: u32,
    /// Pre-transform applied on present
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl ChainSettings {
    /// Apply every selection rule to the surface query results
    pub fn choose(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        requested_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        Ok(Self {
            format: choose_surface_format(formats)?,
            present_mode: choose_present_mode(present_modes),
            extent: choose_extent(capabilities, requested_extent),
            image_count: choose_image_count(capabilities),
            pre_transform: choose_pre_transform(capabilities),
        })
    }
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    settings: ChainSettings,
}

impl Swapchain {
    /// Create the chain on `surface` and fetch its images
    pub fn new(
        swapchain_loader: SwapchainLoader,
        surface: vk::SurfaceKHR,
        settings: ChainSettings,
    ) -> VulkanResult<Self> {
        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(settings.image_count)
            .image_format(settings.format.format)
            .image_color_space(settings.format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(settings.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&swapchain_create_info, None)
                .map_err(|e| VulkanError::swapchain("create", e))?
        };

        let fp = swapchain_loader.fp();
        let device = swapchain_loader.device();
        let images = match query_list(|count, data| unsafe {
            (fp.get_swapchain_images_khr)(device, swapchain, count, data)
        }) {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::swapchain("images", e));
            }
        };

        log::info!(
            "Created swapchain: {} image(s) {}x{} {:?} {:?} {:?}",
            images.len(),
            settings.extent.width,
            settings.extent.height,
            settings.format.format,
            settings.format.color_space,
            settings.present_mode
        );

        Ok(Self {
            swapchain_loader,
            swapchain,
            images,
            settings,
        })
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.settings.format
    }

    /// Settings the chain was created with
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Images owned by the chain, in acquisition index order
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain loader
    pub fn loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            // Chain images go with the chain
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// One chain image with its view and command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentableImage {
    /// Image owned by the chain
    pub image: vk::Image,
    /// 2-D color view owned by this entry
    pub view: vk::ImageView,
    /// Primary command buffer recorded for this image
    pub command_buffer: vk::CommandBuffer,
}

/// Views and command buffers for every chain image, with RAII cleanup
pub struct PresentableImages {
    device: Device,
    command_pool: vk::CommandPool,
    images: Vec<PresentableImage>,
}

fn color_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

impl PresentableImages {
    /// Create a view and allocate a command buffer for each chain image
    pub fn new(device: Device, swapchain: &Swapchain, command_pool: &CommandPool) -> VulkanResult<Self> {
        let mut presentable = Self {
            device,
            command_pool: command_pool.handle(),
            images: Vec::with_capacity(swapchain.images().len()),
        };

        let command_buffers = command_pool
            .allocate_command_buffers(swapchain.images().len() as u32)
            .map_err(|e| VulkanError::SwapchainCreationFailed {
                step: "command buffers",
                reason: e.to_string(),
            })?;

        // Entries are pushed one by one so a failed view leaves only created
        // objects for Drop to release
        let mut command_buffers = command_buffers.into_iter();
        for &image in swapchain.images() {
            let Some(command_buffer) = command_buffers.next() else {
                break;
            };

            let view = unsafe {
                presentable
                    .device
                    .create_image_view(&color_view_info(image, swapchain.format().format), None)
            };

            match view {
                Ok(view) => presentable.images.push(PresentableImage {
                    image,
                    view,
                    command_buffer,
                }),
                Err(e) => {
                    let unused: Vec<vk::CommandBuffer> = std::iter::once(command_buffer).chain(command_buffers).collect();
                    command_pool.free_command_buffers(&unused);
                    return Err(VulkanError::swapchain("image views", e));
                }
            }
        }

        log::debug!("Created {} presentable image(s)", presentable.images.len());
        Ok(presentable)
    }

    /// Entries in chain order
    pub fn images(&self) -> &[PresentableImage] {
        &self.images
    }

    /// Color views in chain order
    pub fn views(&self) -> Vec<vk::ImageView> {
        self.images.iter().map(|entry| entry.view).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl Drop for PresentableImages {
    fn drop(&mut self) {
        let command_buffers: Vec<vk::CommandBuffer> = self.images.iter().map(|entry| entry.command_buffer).collect();

        unsafe {
            if !command_buffers.is_empty() {
                self.device.free_command_buffers(self.command_pool, &command_buffers);
            }
            for entry in self.images.iter().rev() {
                self.device.destroy_image_view(entry.view, None);
            }
        }
    }
}
