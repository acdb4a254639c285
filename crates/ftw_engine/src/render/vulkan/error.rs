//! Vulkan bootstrap errors
//!
//! Every variant is fatal at the point of detection. Each carries enough to
//! name the stage that failed so the top-level handler can log it and exit.

use ash::vk;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::render::vulkan::capabilities::CapabilityGroup;
use crate::render::vulkan::state::lifecycle::{LifecycleStage, ResourceKind};

/// Step of context creation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStage {
    /// Loading the Vulkan loader library
    Loader,
    /// Enumerating instance layers and extensions
    InstanceEnumeration,
    /// `vkCreateInstance`
    InstanceCreation,
    /// Registering the debug-report callback
    DebugCallback,
    /// Enumerating physical accelerators
    PhysicalDeviceEnumeration,
    /// Re-validating accepted layers against the device layer list
    DeviceLayerRevalidation,
    /// Enumerating device extensions
    DeviceExtensionEnumeration,
    /// Electing a graphics + present queue family
    QueueFamilySelection,
    /// `vkCreateDevice`
    DeviceCreation,
    /// Creating the command pool bound to the elected family
    CommandPoolCreation,
}

impl fmt::Display for ContextStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loader => "loader",
            Self::InstanceEnumeration => "instance enumeration",
            Self::InstanceCreation => "instance creation",
            Self::DebugCallback => "debug callback",
            Self::PhysicalDeviceEnumeration => "physical device enumeration",
            Self::DeviceLayerRevalidation => "device layer revalidation",
            Self::DeviceExtensionEnumeration => "device extension enumeration",
            Self::QueueFamilySelection => "queue family selection",
            Self::DeviceCreation => "device creation",
            Self::CommandPoolCreation => "command pool creation",
        };
        f.write_str(name)
    }
}

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A required layer or extension is not offered by the driver
    #[error("Required {group} entry unavailable: {name}")]
    CapabilityUnavailable {
        /// Group the missing entry was requested in
        group: CapabilityGroup,
        /// First requested name the driver does not report
        name: String,
    },

    /// Instance, accelerator, device or queue setup failed
    #[error("Context creation failed during {stage}: {reason}")]
    ContextCreationFailed {
        /// Step that failed
        stage: ContextStage,
        /// Driver result or description
        reason: String,
    },

    /// The platform rejected the native window handle
    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// Any query or create step of the presentation chain or depth target failed
    #[error("Swapchain creation failed during {step}: {reason}")]
    SwapchainCreationFailed {
        /// Step that failed
        step: &'static str,
        /// Driver result or description
        reason: String,
    },

    /// No memory type satisfies the bitmask and property requirement
    #[error("No compatible memory type for bits {type_bits:#034b} with flags {required:?}")]
    NoCompatibleMemoryType {
        /// Memory type bitmask from the resource requirements
        type_bits: u32,
        /// Property flags every candidate must carry
        required: vk::MemoryPropertyFlags,
    },

    /// Shader bytecode could not be opened, read fully or turned into a module
    #[error("Failed to load shader {path:?}: {reason}")]
    ShaderLoadFailed {
        /// File the bytecode was read from
        path: PathBuf,
        /// Description of the failure
        reason: String,
    },

    /// Any pipeline-builder object failed to create
    #[error("Pipeline creation failed during {step}: {reason}")]
    PipelineCreationFailed {
        /// Step that failed
        step: &'static str,
        /// Driver result or description
        reason: String,
    },

    /// A lifecycle stage was entered out of order
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// Stage the coordinator was in
        from: LifecycleStage,
        /// Stage that was requested
        to: LifecycleStage,
    },

    /// A resource was recorded out of the planned creation order, or the plan
    /// was left unfinished
    #[error("Resource created out of order: expected {expected:?}, found {found:?}")]
    CreationOutOfOrder {
        /// Next kind the plan called for, if any
        expected: Option<ResourceKind>,
        /// Kind that was recorded, if any
        found: Option<ResourceKind>,
    },
}

impl VulkanError {
    /// Context failure at `stage` caused by a driver result
    pub fn context(stage: ContextStage, result: vk::Result) -> Self {
        Self::ContextCreationFailed {
            stage,
            reason: format!("{result:?}"),
        }
    }

    /// Swapchain failure at `step` caused by a driver result
    pub fn swapchain(step: &'static str, result: vk::Result) -> Self {
        Self::SwapchainCreationFailed {
            step,
            reason: format!("{result:?}"),
        }
    }

    /// Pipeline failure at `step` caused by a driver result
    pub fn pipeline(step: &'static str, result: vk::Result) -> Self {
        Self::PipelineCreationFailed {
            step,
            reason: format!("{result:?}"),
        }
    }

    /// Short tag naming the failing stage, for the exit diagnostic
    pub fn stage_tag(&self) -> String {
        match self {
            Self::Api(_) => "driver".to_string(),
            Self::CapabilityUnavailable { group, .. } => format!("capabilities/{group}"),
            Self::ContextCreationFailed { stage, .. } => format!("context/{stage}"),
            Self::SurfaceCreationFailed(_) => "surface".to_string(),
            Self::SwapchainCreationFailed { step, .. } => format!("swapchain/{step}"),
            Self::NoCompatibleMemoryType { .. } => "memory".to_string(),
            Self::ShaderLoadFailed { .. } => "shader".to_string(),
            Self::PipelineCreationFailed { step, .. } => format!("pipeline/{step}"),
            Self::InvalidTransition { to, .. } => format!("lifecycle/{to}"),
            Self::CreationOutOfOrder { .. } => "lifecycle/creation order".to_string(),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
