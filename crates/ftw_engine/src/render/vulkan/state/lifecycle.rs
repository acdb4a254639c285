//! Bootstrap lifecycle and the resource ledger
//!
//! Startup walks a fixed sequence of stages; each created object is recorded
//! in the ledger, and teardown pops the ledger so objects are destroyed in
//! exactly the reverse of their creation order.

use std::fmt;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Stage of the bootstrap, in startup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleStage {
    /// Nothing created yet
    Uninitialized,
    /// Layers and extensions accepted
    CapabilitiesNegotiated,
    /// Instance (and debug callback) created
    ContextReady,
    /// Presentation surface created
    SurfaceReady,
    /// Logical device, queue and command pool created
    DeviceReady,
    /// Swapchain and presentable images created
    ChainReady,
    /// Depth target created and transitioned
    DepthReady,
    /// Descriptors, buffers, render pass, pipeline and framebuffers created
    PipelineReady,
    /// Ready to record commands
    Running,
    /// Everything destroyed
    TornDown,
}

impl LifecycleStage {
    /// Stages in startup order
    pub const ORDER: [LifecycleStage; 10] = [
        Self::Uninitialized,
        Self::CapabilitiesNegotiated,
        Self::ContextReady,
        Self::SurfaceReady,
        Self::DeviceReady,
        Self::ChainReady,
        Self::DepthReady,
        Self::PipelineReady,
        Self::Running,
        Self::TornDown,
    ];

    /// The stage that follows this one, if any
    pub fn next(self) -> Option<Self> {
        let position = Self::ORDER.iter().position(|&stage| stage == self)?;
        Self::ORDER.get(position + 1).copied()
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::CapabilitiesNegotiated => "capabilities negotiated",
            Self::ContextReady => "context ready",
            Self::SurfaceReady => "surface ready",
            Self::DeviceReady => "device ready",
            Self::ChainReady => "chain ready",
            Self::DepthReady => "depth ready",
            Self::PipelineReady => "pipeline ready",
            Self::Running => "running",
            Self::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

/// One-way stage tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    stage: LifecycleStage,
}

impl Lifecycle {
    /// Start at `Uninitialized`
    pub fn new() -> Self {
        Self {
            stage: LifecycleStage::Uninitialized,
        }
    }

    /// Current stage
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Move to `to`, which must be the stage directly after the current one
    pub fn advance(&mut self, to: LifecycleStage) -> VulkanResult<()> {
        if self.stage.next() != Some(to) || to == LifecycleStage::TornDown {
            return Err(VulkanError::InvalidTransition { from: self.stage, to });
        }

        log::info!("Bootstrap stage: {}", to);
        self.stage = to;
        Ok(())
    }

    /// Enter `TornDown` from any stage, once
    pub fn finish_teardown(&mut self) -> VulkanResult<()> {
        if self.stage == LifecycleStage::TornDown {
            return Err(VulkanError::InvalidTransition {
                from: self.stage,
                to: LifecycleStage::TornDown,
            });
        }

        log::info!("Bootstrap stage: {} (from {})", LifecycleStage::TornDown, self.stage);
        self.stage = LifecycleStage::TornDown;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of object the bootstrap creates; at most one of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Vulkan instance
    Instance,
    /// Debug-report callback
    DebugCallback,
    /// Presentation surface
    Surface,
    /// Logical device and its queue
    Device,
    /// Command pool for the elected family
    CommandPool,
    /// Swapchain and its images
    Swapchain,
    /// Per-image views and command buffers
    PresentableImages,
    /// Depth image, memory and view
    DepthTarget,
    /// Descriptor-set layout
    DescriptorSetLayout,
    /// Pipeline layout
    PipelineLayout,
    /// Uniform buffer holding the MVP matrix
    UniformBuffer,
    /// Vertex buffer holding the cube
    VertexBuffer,
    /// Descriptor pool and its set
    DescriptorPool,
    /// Render pass
    RenderPass,
    /// Pipeline cache
    PipelineCache,
    /// Graphics pipeline
    Pipeline,
    /// Per-image framebuffers
    Framebuffers,
}

impl ResourceKind {
    /// Order in which a full startup creates every kind
    pub const CREATION_ORDER: [ResourceKind; 17] = [
        Self::Instance,
        Self::DebugCallback,
        Self::Surface,
        Self::Device,
        Self::CommandPool,
        Self::Swapchain,
        Self::PresentableImages,
        Self::DepthTarget,
        Self::DescriptorSetLayout,
        Self::PipelineLayout,
        Self::UniformBuffer,
        Self::VertexBuffer,
        Self::DescriptorPool,
        Self::RenderPass,
        Self::PipelineCache,
        Self::Pipeline,
        Self::Framebuffers,
    ];

    /// Creation order for one startup; the debug callback only exists with diagnostics
    pub fn creation_order(diagnostics: bool) -> Vec<ResourceKind> {
        Self::CREATION_ORDER
            .into_iter()
            .filter(|&kind| diagnostics || kind != Self::DebugCallback)
            .collect()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Instance => "instance",
            Self::DebugCallback => "debug callback",
            Self::Surface => "surface",
            Self::Device => "device",
            Self::CommandPool => "command pool",
            Self::Swapchain => "swapchain",
            Self::PresentableImages => "presentable images",
            Self::DepthTarget => "depth target",
            Self::DescriptorSetLayout => "descriptor set layout",
            Self::PipelineLayout => "pipeline layout",
            Self::UniformBuffer => "uniform buffer",
            Self::VertexBuffer => "vertex buffer",
            Self::DescriptorPool => "descriptor pool",
            Self::RenderPass => "render pass",
            Self::PipelineCache => "pipeline cache",
            Self::Pipeline => "graphics pipeline",
            Self::Framebuffers => "framebuffers",
        };
        f.write_str(name)
    }
}

/// Something that can destroy the resource of a given kind
pub trait Teardown {
    /// Destroy the resource recorded as `kind`
    fn release(&mut self, kind: ResourceKind);
}

/// Creation-order record of live resources
///
/// A planned ledger only accepts kinds in the order of its plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    created: Vec<ResourceKind>,
    plan: Option<Vec<ResourceKind>>,
}

impl ResourceLedger {
    /// Create an empty ledger that accepts any order
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger bound to `plan`
    pub fn planned(plan: Vec<ResourceKind>) -> Self {
        Self {
            created: Vec::new(),
            plan: Some(plan),
        }
    }

    /// Next kind the plan expects, if the ledger has a plan
    pub fn next_planned(&self) -> Option<ResourceKind> {
        self.plan.as_ref()?.get(self.created.len()).copied()
    }

    /// Record that `kind` now exists
    pub fn record(&mut self, kind: ResourceKind) -> VulkanResult<()> {
        let in_order = match &self.plan {
            Some(_) => self.next_planned() == Some(kind),
            None => !self.created.contains(&kind),
        };
        if !in_order {
            return Err(VulkanError::CreationOutOfOrder {
                expected: self.next_planned(),
                found: Some(kind),
            });
        }

        log::debug!("Created {}", kind);
        self.created.push(kind);
        Ok(())
    }

    /// Fail unless every planned kind has been recorded
    pub fn ensure_complete(&self) -> VulkanResult<()> {
        match self.next_planned() {
            Some(expected) => Err(VulkanError::CreationOutOfOrder {
                expected: Some(expected),
                found: None,
            }),
            None => Ok(()),
        }
    }

    /// Live resources in creation order
    pub fn created(&self) -> &[ResourceKind] {
        &self.created
    }

    /// Whether `kind` is live
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.created.contains(&kind)
    }

    /// Whether nothing is live
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Release every live resource, newest first, and return the release order
    pub fn unwind<T: Teardown + ?Sized>(&mut self, target: &mut T) -> Vec<ResourceKind> {
        let mut released = Vec::with_capacity(self.created.len());
        while let Some(kind) = self.created.pop() {
            log::debug!("Destroying {}", kind);
            target.release(kind);
            released.push(kind);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_advance_in_order() {
        let mut lifecycle = Lifecycle::new();
        for &stage in &LifecycleStage::ORDER[1..9] {
            lifecycle.advance(stage).unwrap();
            assert_eq!(lifecycle.stage(), stage);
        }
        assert_eq!(lifecycle.stage(), LifecycleStage::Running);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut lifecycle = Lifecycle::new();
        let err = lifecycle.advance(LifecycleStage::ContextReady).unwrap_err();

        assert!(matches!(
            err,
            VulkanError::InvalidTransition {
                from: LifecycleStage::Uninitialized,
                to: LifecycleStage::ContextReady,
            }
        ));
        assert_eq!(lifecycle.stage(), LifecycleStage::Uninitialized);
    }

    #[test]
    fn test_no_going_back() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleStage::CapabilitiesNegotiated).unwrap();
        assert!(lifecycle.advance(LifecycleStage::CapabilitiesNegotiated).is_err());
        assert!(lifecycle.advance(LifecycleStage::Uninitialized).is_err());
    }

    #[test]
    fn test_teardown_from_any_stage_once() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(LifecycleStage::CapabilitiesNegotiated).unwrap();
        lifecycle.finish_teardown().unwrap();
        assert_eq!(lifecycle.stage(), LifecycleStage::TornDown);

        assert!(lifecycle.finish_teardown().is_err());
        assert!(lifecycle.advance(LifecycleStage::ContextReady).is_err());
    }

    #[test]
    fn test_torn_down_only_through_teardown() {
        let mut lifecycle = Lifecycle::new();
        for &stage in &LifecycleStage::ORDER[1..9] {
            lifecycle.advance(stage).unwrap();
        }
        assert!(lifecycle.advance(LifecycleStage::TornDown).is_err());
        assert_eq!(lifecycle.stage(), LifecycleStage::Running);
    }

    #[test]
    fn test_next_walks_the_order() {
        assert_eq!(
            LifecycleStage::Uninitialized.next(),
            Some(LifecycleStage::CapabilitiesNegotiated)
        );
        assert_eq!(LifecycleStage::PipelineReady.next(), Some(LifecycleStage::Running));
        assert_eq!(LifecycleStage::TornDown.next(), None);
    }

    #[test]
    fn test_creation_order_without_diagnostics() {
        let order = ResourceKind::creation_order(false);
        assert_eq!(order.len(), ResourceKind::CREATION_ORDER.len() - 1);
        assert!(!order.contains(&ResourceKind::DebugCallback));
        assert_eq!(&order[..2], &[ResourceKind::Instance, ResourceKind::Surface]);
        assert_eq!(ResourceKind::creation_order(true), ResourceKind::CREATION_ORDER.to_vec());
    }

    #[test]
    fn test_planned_ledger_rejects_out_of_order_kinds() {
        let mut ledger = ResourceLedger::planned(ResourceKind::creation_order(false));
        ledger.record(ResourceKind::Instance).unwrap();

        let err = ledger.record(ResourceKind::Device).unwrap_err();
        assert!(matches!(
            err,
            VulkanError::CreationOutOfOrder {
                expected: Some(ResourceKind::Surface),
                found: Some(ResourceKind::Device),
            }
        ));
        assert_eq!(ledger.created(), &[ResourceKind::Instance]);

        // Debug callback is not part of a plan without diagnostics
        assert!(ledger.record(ResourceKind::DebugCallback).is_err());
    }

    #[test]
    fn test_planned_ledger_must_be_finished() {
        let plan = ResourceKind::creation_order(true);
        let mut ledger = ResourceLedger::planned(plan.clone());
        for &kind in &plan[..plan.len() - 1] {
            ledger.record(kind).unwrap();
        }

        let err = ledger.ensure_complete().unwrap_err();
        assert_eq!(err.stage_tag(), "lifecycle/creation order");

        ledger.record(ResourceKind::Framebuffers).unwrap();
        ledger.ensure_complete().unwrap();
        assert_eq!(ledger.next_planned(), None);
    }

    #[test]
    fn test_unplanned_ledger_rejects_duplicates() {
        let mut ledger = ResourceLedger::new();
        ledger.record(ResourceKind::Instance).unwrap();
        assert!(ledger.record(ResourceKind::Instance).is_err());
        ledger.ensure_complete().unwrap();
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(LifecycleStage::DepthReady.to_string(), "depth ready");
        assert_eq!(ResourceKind::Pipeline.to_string(), "graphics pipeline");
    }
}
