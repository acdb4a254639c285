//! Ordered Vulkan bootstrap
//!
//! [`Bootstrap`] owns every object it creates. Objects are created in a fixed
//! order, each one recorded in a [`ResourceLedger`] as soon as it exists, and
//! destroyed by unwinding that ledger. A failure part way through startup
//! therefore releases exactly what was built, newest first.
//!
//! ```text
//! instance -> debug callback -> surface -> device -> command pool
//!   -> swapchain -> presentable images -> depth target
//!   -> descriptor set layout -> pipeline layout -> uniform buffer
//!   -> vertex buffer -> descriptor pool -> render pass -> pipeline cache
//!   -> graphics pipeline -> framebuffers
//! ```

use ash::{vk, Entry};
use nalgebra::Matrix4;

use crate::core::config::VulkanRendererConfig;
use crate::render::vulkan::capabilities::{AcceptedCapabilities, CapabilitySet};
use crate::render::vulkan::debug::{self, DebugCallback};
use crate::render::vulkan::initialization::{
    elect_queue_family, revalidate_device_layers, InstanceAvailability, LogicalDevice, NativeWindow,
    PhysicalDeviceInfo, Surface, VulkanInstance,
};
use crate::render::vulkan::rendering::geometry::{cube_vertices, Camera, UniformData};
use crate::render::vulkan::rendering::{
    CommandPool, GraphicsPipeline, PipelineCache, PipelineFixedState, PipelineLayout, RenderPass, ShaderModuleCache,
    ShaderStages,
};
use crate::render::vulkan::resources::{bootstrap_layout, Buffer, DepthTarget, DescriptorPool, DescriptorSetLayout};
use crate::render::vulkan::state::{
    ChainSettings, Framebuffers, Lifecycle, LifecycleStage, PresentableImages, ResourceKind, ResourceLedger,
    Swapchain, Teardown,
};
use crate::render::vulkan::{ContextStage, VulkanError, VulkanResult};

/// Logical names the two pipeline stages are cached under
const VERTEX_SHADER: &str = "vertex";
const FRAGMENT_SHADER: &str = "fragment";

/// What each resource slot holds
trait SlotTypes {
    type Instance;
    type DebugCallback;
    type Surface;
    type Device;
    type CommandPool;
    type Swapchain;
    type PresentableImages;
    type DepthTarget;
    type DescriptorSetLayout;
    type PipelineLayout;
    type Buffer;
    type DescriptorPool;
    type RenderPass;
    type PipelineCache;
    type Pipeline;
    type Framebuffers;
}

/// Slots filled with live Vulkan objects
struct LiveSlots;

impl SlotTypes for LiveSlots {
    type Instance = VulkanInstance;
    type DebugCallback = DebugCallback;
    type Surface = Surface;
    type Device = LogicalDevice;
    type CommandPool = CommandPool;
    type Swapchain = Swapchain;
    type PresentableImages = PresentableImages;
    type DepthTarget = DepthTarget;
    type DescriptorSetLayout = DescriptorSetLayout;
    type PipelineLayout = PipelineLayout;
    type Buffer = Buffer;
    type DescriptorPool = DescriptorPool;
    type RenderPass = RenderPass;
    type PipelineCache = PipelineCache;
    type Pipeline = GraphicsPipeline;
    type Framebuffers = Framebuffers;
}

/// Slots for everything the bootstrap creates
struct BootstrapResources<S: SlotTypes = LiveSlots> {
    instance: Option<S::Instance>,
    debug_callback: Option<S::DebugCallback>,
    surface: Option<S::Surface>,
    device: Option<S::Device>,
    command_pool: Option<S::CommandPool>,
    swapchain: Option<S::Swapchain>,
    presentable_images: Option<S::PresentableImages>,
    depth_target: Option<S::DepthTarget>,
    descriptor_set_layout: Option<S::DescriptorSetLayout>,
    pipeline_layout: Option<S::PipelineLayout>,
    uniform_buffer: Option<S::Buffer>,
    vertex_buffer: Option<S::Buffer>,
    descriptor_pool: Option<S::DescriptorPool>,
    render_pass: Option<S::RenderPass>,
    pipeline_cache: Option<S::PipelineCache>,
    pipeline: Option<S::Pipeline>,
    framebuffers: Option<S::Framebuffers>,
}

impl<S: SlotTypes> Default for BootstrapResources<S> {
    fn default() -> Self {
        Self {
            instance: None,
            debug_callback: None,
            surface: None,
            device: None,
            command_pool: None,
            swapchain: None,
            presentable_images: None,
            depth_target: None,
            descriptor_set_layout: None,
            pipeline_layout: None,
            uniform_buffer: None,
            vertex_buffer: None,
            descriptor_pool: None,
            render_pass: None,
            pipeline_cache: None,
            pipeline: None,
            framebuffers: None,
        }
    }
}

impl<S: SlotTypes> Teardown for BootstrapResources<S> {
    fn release(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Instance => self.instance = None,
            ResourceKind::DebugCallback => self.debug_callback = None,
            ResourceKind::Surface => self.surface = None,
            ResourceKind::Device => self.device = None,
            ResourceKind::CommandPool => self.command_pool = None,
            ResourceKind::Swapchain => self.swapchain = None,
            ResourceKind::PresentableImages => self.presentable_images = None,
            ResourceKind::DepthTarget => self.depth_target = None,
            ResourceKind::DescriptorSetLayout => self.descriptor_set_layout = None,
            ResourceKind::PipelineLayout => self.pipeline_layout = None,
            ResourceKind::UniformBuffer => self.uniform_buffer = None,
            ResourceKind::VertexBuffer => self.vertex_buffer = None,
            ResourceKind::DescriptorPool => self.descriptor_pool = None,
            ResourceKind::RenderPass => self.render_pass = None,
            ResourceKind::PipelineCache => self.pipeline_cache = None,
            ResourceKind::Pipeline => self.pipeline = None,
            ResourceKind::Framebuffers => self.framebuffers = None,
        }
    }
}

/// Release everything in `resources`, newest first.
///
/// A slot filled after the last successful `record` is not in the ledger; such
/// stragglers are newer than anything recorded and go first.
fn release_all<S: SlotTypes>(ledger: &mut ResourceLedger, resources: &mut BootstrapResources<S>) -> Vec<ResourceKind> {
    for kind in ResourceKind::CREATION_ORDER.into_iter().rev() {
        if !ledger.contains(kind) {
            resources.release(kind);
        }
    }
    ledger.unwind(resources)
}

/// Owner of the whole Vulkan context, from instance to framebuffers
pub struct Bootstrap {
    lifecycle: Lifecycle,
    ledger: ResourceLedger,
    resources: BootstrapResources,
    accepted: AcceptedCapabilities,
    physical_device: Option<PhysicalDeviceInfo>,
    camera: Camera,
}

impl Bootstrap {
    /// Build everything up to `Running` on top of `window`.
    ///
    /// On error, whatever was created has already been destroyed in reverse
    /// order by the time this returns.
    pub fn initialize<W: NativeWindow + ?Sized>(config: &VulkanRendererConfig, window: &mut W) -> VulkanResult<Self> {
        let mut bootstrap = Self {
            lifecycle: Lifecycle::new(),
            ledger: ResourceLedger::new(),
            resources: BootstrapResources::default(),
            accepted: AcceptedCapabilities::default(),
            physical_device: None,
            camera: Camera::default(),
        };

        if let Err(e) = bootstrap.build(config, window) {
            log::error!(
                "Bootstrap failed after reaching '{}' ({}): {}",
                bootstrap.lifecycle.stage(),
                e.stage_tag(),
                e
            );
            return Err(e);
        }

        bootstrap.lifecycle.advance(LifecycleStage::Running)?;
        Ok(bootstrap)
    }

    fn build<W: NativeWindow + ?Sized>(&mut self, config: &VulkanRendererConfig, window: &mut W) -> VulkanResult<()> {
        let caps = &config.capabilities;

        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::ContextCreationFailed {
            stage: ContextStage::Loader,
            reason: e.to_string(),
        })?;

        // Capabilities
        let availability = InstanceAvailability::enumerate(&entry)?;
        let requests = CapabilitySet::from_config(
            caps,
            window.required_instance_extensions()?,
            &debug::extension_name().to_string_lossy(),
        );
        self.accepted = requests.negotiate_instance(&availability.layers, &availability.extensions)?;
        self.ledger = ResourceLedger::planned(ResourceKind::creation_order(self.accepted.diagnostics));
        self.lifecycle.advance(LifecycleStage::CapabilitiesNegotiated)?;

        // Context
        let instance = &self
            .resources
            .instance
            .insert(VulkanInstance::new(&entry, config, &self.accepted)?)
            .instance;
        self.ledger.record(ResourceKind::Instance)?;

        if self.accepted.diagnostics {
            self.resources.debug_callback = Some(DebugCallback::new(&entry, instance)?);
            self.ledger.record(ResourceKind::DebugCallback)?;
        }

        let physical = self.physical_device.insert(PhysicalDeviceInfo::select_first(instance)?);

        let device_layers = if caps.revalidate_device_layers {
            physical.layer_names(instance)?
        } else {
            Vec::new()
        };
        self.accepted.device_layers = revalidate_device_layers(
            &self.accepted.layers,
            &device_layers,
            requests.layers.requirement,
            caps.revalidate_device_layers,
        )?;
        self.accepted.device_extensions = requests
            .device_extensions
            .negotiate(&physical.extension_names(instance)?)?;
        self.lifecycle.advance(LifecycleStage::ContextReady)?;

        // Surface, then the queue family that can present to it
        let surface = &*self.resources.surface.insert(Surface::new(&entry, instance, window)?);
        self.ledger.record(ResourceKind::Surface)?;
        self.lifecycle.advance(LifecycleStage::SurfaceReady)?;

        let queue_family = elect_queue_family(&physical.graphics_candidates, |index| {
            surface.supports_present(physical.device, index)
        })?;

        let device = &*self
            .resources
            .device
            .insert(LogicalDevice::new(instance, physical, queue_family, &self.accepted)?);
        self.ledger.record(ResourceKind::Device)?;

        let command_pool = &*self
            .resources
            .command_pool
            .insert(CommandPool::new(device.device.clone(), queue_family)?);
        self.ledger.record(ResourceKind::CommandPool)?;
        self.lifecycle.advance(LifecycleStage::DeviceReady)?;

        // Presentation chain
        let settings = ChainSettings::choose(
            &surface.capabilities(physical.device)?,
            &surface.formats(physical.device)?,
            &surface.present_modes(physical.device)?,
            window.drawable_extent(),
        )?;

        let swapchain = &*self.resources.swapchain.insert(Swapchain::new(
            device.swapchain_loader.clone(),
            surface.handle(),
            settings,
        )?);
        self.ledger.record(ResourceKind::Swapchain)?;

        let presentable = &*self
            .resources
            .presentable_images
            .insert(PresentableImages::new(device.device.clone(), swapchain, command_pool)?);
        self.ledger.record(ResourceKind::PresentableImages)?;
        self.lifecycle.advance(LifecycleStage::ChainReady)?;

        // Depth, transitioned before its view exists
        let mut setup_commands = command_pool.immediate(device.queue);
        let depth = &*self.resources.depth_target.insert(DepthTarget::new(
            device.device.clone(),
            &physical.memory_properties,
            swapchain.extent(),
            &mut setup_commands,
        )?);
        self.ledger.record(ResourceKind::DepthTarget)?;
        self.lifecycle.advance(LifecycleStage::DepthReady)?;

        // Pipeline
        let set_layout_builder = bootstrap_layout();
        let pool_sizes = set_layout_builder.pool_sizes(1);

        let set_layout = &*self
            .resources
            .descriptor_set_layout
            .insert(set_layout_builder.build(&device.device)?);
        self.ledger.record(ResourceKind::DescriptorSetLayout)?;

        let pipeline_layout = &*self
            .resources
            .pipeline_layout
            .insert(PipelineLayout::new(device.device.clone(), &[set_layout.handle()])?);
        self.ledger.record(ResourceKind::PipelineLayout)?;

        let mvp = self
            .camera
            .model_view_projection(&Matrix4::identity(), swapchain.extent());
        let uniform_buffer = &*self.resources.uniform_buffer.insert(Buffer::with_data(
            device.device.clone(),
            &physical.memory_properties,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            &[UniformData::from_matrix(&mvp)],
        )?);
        self.ledger.record(ResourceKind::UniformBuffer)?;

        self.resources.vertex_buffer = Some(Buffer::with_data(
            device.device.clone(),
            &physical.memory_properties,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &cube_vertices(),
        )?);
        self.ledger.record(ResourceKind::VertexBuffer)?;

        let descriptor_pool = self.resources.descriptor_pool.insert(DescriptorPool::with_sets(
            device.device.clone(),
            &pool_sizes,
            &[set_layout.handle()],
        )?);
        self.ledger.record(ResourceKind::DescriptorPool)?;
        descriptor_pool.write_uniform_buffer(0, 0, uniform_buffer.handle(), uniform_buffer.size())?;

        let render_pass = &*self.resources.render_pass.insert(RenderPass::new(
            device.device.clone(),
            swapchain.format().format,
            depth.format(),
        )?);
        self.ledger.record(ResourceKind::RenderPass)?;

        let pipeline_cache = &*self
            .resources
            .pipeline_cache
            .insert(PipelineCache::new(device.device.clone())?);
        self.ledger.record(ResourceKind::PipelineCache)?;

        let mut shaders = ShaderModuleCache::new(device.device.clone());
        let stages = ShaderStages {
            vertex: shaders.load_shader_module(VERTEX_SHADER, &config.shaders.vertex_shader_path)?,
            fragment: shaders.load_shader_module(FRAGMENT_SHADER, &config.shaders.fragment_shader_path)?,
        };

        self.resources.pipeline = Some(GraphicsPipeline::new(
            device.device.clone(),
            pipeline_cache.handle(),
            pipeline_layout.handle(),
            render_pass.handle(),
            stages,
            &PipelineFixedState::default(),
        )?);
        self.ledger.record(ResourceKind::Pipeline)?;
        shaders.clear();

        self.resources.framebuffers = Some(Framebuffers::new(
            device.device.clone(),
            render_pass.handle(),
            &presentable.views(),
            depth.image_view(),
            swapchain.extent(),
        )?);
        self.ledger.record(ResourceKind::Framebuffers)?;
        self.ledger.ensure_complete()?;
        self.lifecycle.advance(LifecycleStage::PipelineReady)?;

        Ok(())
    }

    /// Current lifecycle stage
    pub fn stage(&self) -> LifecycleStage {
        self.lifecycle.stage()
    }

    /// Live resources in creation order
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Layers and extensions that were enabled
    pub fn accepted(&self) -> &AcceptedCapabilities {
        &self.accepted
    }

    /// The selected accelerator
    pub fn physical_device(&self) -> Option<&PhysicalDeviceInfo> {
        self.physical_device.as_ref()
    }

    /// Logical device, queue and queue family
    pub fn device(&self) -> Option<&LogicalDevice> {
        self.resources.device.as_ref()
    }

    /// The presentation chain
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.resources.swapchain.as_ref()
    }

    /// Per-image views and command buffers
    pub fn presentable_images(&self) -> Option<&PresentableImages> {
        self.resources.presentable_images.as_ref()
    }

    /// One framebuffer per presentable image
    pub fn framebuffers(&self) -> Option<&Framebuffers> {
        self.resources.framebuffers.as_ref()
    }

    /// The fixed graphics pipeline
    pub fn pipeline(&self) -> Option<&GraphicsPipeline> {
        self.resources.pipeline.as_ref()
    }

    /// Destroy everything in reverse creation order and enter `TornDown`
    pub fn teardown(&mut self) -> VulkanResult<()> {
        if let Some(device) = &self.resources.device {
            if let Err(e) = unsafe { device.device.device_wait_idle() } {
                log::warn!("Device did not go idle before teardown: {:?}", e);
            }
        }

        let released = release_all(&mut self.ledger, &mut self.resources);
        self.physical_device = None;
        self.lifecycle.finish_teardown()?;

        log::info!("Released {} resource(s)", released.len());
        Ok(())
    }
}

impl Drop for Bootstrap {
    fn drop(&mut self) {
        if self.lifecycle.stage() != LifecycleStage::TornDown {
            if let Err(e) = self.teardown() {
                log::error!("Teardown failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type DropLog = Rc<RefCell<Vec<ResourceKind>>>;

    /// Stand-in object that logs its kind when destroyed
    struct Tagged {
        kind: ResourceKind,
        log: DropLog,
    }

    impl Drop for Tagged {
        fn drop(&mut self) {
            self.log.borrow_mut().push(self.kind);
        }
    }

    struct TaggedSlots;

    impl SlotTypes for TaggedSlots {
        type Instance = Tagged;
        type DebugCallback = Tagged;
        type Surface = Tagged;
        type Device = Tagged;
        type CommandPool = Tagged;
        type Swapchain = Tagged;
        type PresentableImages = Tagged;
        type DepthTarget = Tagged;
        type DescriptorSetLayout = Tagged;
        type PipelineLayout = Tagged;
        type Buffer = Tagged;
        type DescriptorPool = Tagged;
        type RenderPass = Tagged;
        type PipelineCache = Tagged;
        type Pipeline = Tagged;
        type Framebuffers = Tagged;
    }

    /// Put a tagged object in the slot named after `kind`
    fn fill(resources: &mut BootstrapResources<TaggedSlots>, kind: ResourceKind, log: &DropLog) {
        let tagged = Some(Tagged {
            kind,
            log: Rc::clone(log),
        });
        match kind {
            ResourceKind::Instance => resources.instance = tagged,
            ResourceKind::DebugCallback => resources.debug_callback = tagged,
            ResourceKind::Surface => resources.surface = tagged,
            ResourceKind::Device => resources.device = tagged,
            ResourceKind::CommandPool => resources.command_pool = tagged,
            ResourceKind::Swapchain => resources.swapchain = tagged,
            ResourceKind::PresentableImages => resources.presentable_images = tagged,
            ResourceKind::DepthTarget => resources.depth_target = tagged,
            ResourceKind::DescriptorSetLayout => resources.descriptor_set_layout = tagged,
            ResourceKind::PipelineLayout => resources.pipeline_layout = tagged,
            ResourceKind::UniformBuffer => resources.uniform_buffer = tagged,
            ResourceKind::VertexBuffer => resources.vertex_buffer = tagged,
            ResourceKind::DescriptorPool => resources.descriptor_pool = tagged,
            ResourceKind::RenderPass => resources.render_pass = tagged,
            ResourceKind::PipelineCache => resources.pipeline_cache = tagged,
            ResourceKind::Pipeline => resources.pipeline = tagged,
            ResourceKind::Framebuffers => resources.framebuffers = tagged,
        }
    }

    fn filled(kinds: &[ResourceKind], log: &DropLog) -> BootstrapResources<TaggedSlots> {
        let mut resources = BootstrapResources::default();
        for &kind in kinds {
            fill(&mut resources, kind, log);
        }
        resources
    }

    #[test]
    fn test_release_destroys_only_its_own_slot() {
        for kind in ResourceKind::CREATION_ORDER {
            let log = DropLog::default();
            let mut resources = filled(&ResourceKind::CREATION_ORDER, &log);

            resources.release(kind);
            assert_eq!(*log.borrow(), vec![kind], "releasing {kind}");

            // Releasing again finds the slot empty
            resources.release(kind);
            assert_eq!(log.borrow().len(), 1);
        }
    }

    #[test]
    fn test_full_startup_is_destroyed_in_reverse() {
        for diagnostics in [true, false] {
            let plan = ResourceKind::creation_order(diagnostics);
            let log = DropLog::default();
            let mut resources = filled(&plan, &log);
            let mut ledger = ResourceLedger::planned(plan.clone());
            for &kind in &plan {
                ledger.record(kind).unwrap();
            }

            let released = release_all(&mut ledger, &mut resources);

            let mut expected = plan.clone();
            expected.reverse();
            assert_eq!(released, expected);
            assert_eq!(*log.borrow(), expected);

            // Nothing left for the slots' own drop
            drop(resources);
            assert_eq!(log.borrow().len(), plan.len());
        }
    }

    #[test]
    fn test_unrecorded_object_goes_before_recorded_ones() {
        // Device was created but its record was rejected
        let log = DropLog::default();
        let created = &ResourceKind::CREATION_ORDER[..4];
        let mut resources = filled(created, &log);
        let mut ledger = ResourceLedger::new();
        for &kind in &created[..3] {
            ledger.record(kind).unwrap();
        }

        let released = release_all(&mut ledger, &mut resources);

        assert_eq!(
            released,
            vec![ResourceKind::Surface, ResourceKind::DebugCallback, ResourceKind::Instance]
        );
        assert_eq!(
            *log.borrow(),
            vec![
                ResourceKind::Device,
                ResourceKind::Surface,
                ResourceKind::DebugCallback,
                ResourceKind::Instance,
            ]
        );
    }
}
