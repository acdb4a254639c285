//! Layer and extension negotiation
//!
//! Intersects what the application asks for with what the driver reports.
//! A required group is all-or-nothing; an advisory group is trimmed to the
//! entries the driver actually offers, keeping the request order.

use ash::vk;
use std::fmt;
use std::os::raw::c_char;

use crate::core::config::{CapabilityConfig, SWAPCHAIN_EXTENSION};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Which list a capability request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityGroup {
    /// Instance layers
    InstanceLayers,
    /// Instance extensions
    InstanceExtensions,
    /// Extensions only needed for the diagnostics sink
    DiagnosticExtensions,
    /// Layers as reported by the selected accelerator
    DeviceLayers,
    /// Device extensions
    DeviceExtensions,
}

impl fmt::Display for CapabilityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InstanceLayers => "instance layer",
            Self::InstanceExtensions => "instance extension",
            Self::DiagnosticExtensions => "diagnostic extension",
            Self::DeviceLayers => "device layer",
            Self::DeviceExtensions => "device extension",
        };
        f.write_str(name)
    }
}

/// How a missing entry is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Every entry must be available or negotiation fails
    Required,
    /// Unavailable entries are dropped with a warning
    Advisory,
}

/// One group of requested capability names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityRequest {
    /// Group the names belong to
    pub group: CapabilityGroup,
    /// Required or advisory
    pub requirement: Requirement,
    /// Requested names in priority order, duplicates removed
    pub names: Vec<String>,
}

impl CapabilityRequest {
    /// Build a request, dropping repeated names while keeping first occurrence order
    pub fn new<I, S>(group: CapabilityGroup, requirement: Requirement, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        Self {
            group,
            requirement,
            names: unique,
        }
    }

    /// Negotiate this request against an availability list
    pub fn negotiate(&self, available: &[String]) -> VulkanResult<Vec<String>> {
        negotiate(self.group, self.requirement, &self.names, available)
    }
}

/// Requested capability groups for one bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    /// Instance layers (validation)
    pub layers: CapabilityRequest,
    /// Instance extensions (window-system integration and configured extras)
    pub instance_extensions: CapabilityRequest,
    /// Extensions backing the diagnostics sink, empty when diagnostics are off
    pub diagnostic_extensions: CapabilityRequest,
    /// Device extensions (swapchain and configured extras)
    pub device_extensions: CapabilityRequest,
}

impl CapabilitySet {
    /// Build the requests from configuration and the window's own needs.
    ///
    /// `diagnostic_extension` is only requested when diagnostics are enabled.
    pub fn from_config(config: &CapabilityConfig, window_extensions: Vec<String>, diagnostic_extension: &str) -> Self {
        let layer_requirement = if config.layers_required {
            Requirement::Required
        } else {
            Requirement::Advisory
        };

        let diagnostics: Vec<String> = if config.enable_diagnostics {
            vec![diagnostic_extension.to_string()]
        } else {
            Vec::new()
        };

        let mut device_extensions = config.device_extensions.clone();
        if !device_extensions.iter().any(|name| name == SWAPCHAIN_EXTENSION) {
            device_extensions.insert(0, SWAPCHAIN_EXTENSION.to_string());
        }

        Self {
            layers: CapabilityRequest::new(CapabilityGroup::InstanceLayers, layer_requirement, config.layers.clone()),
            instance_extensions: CapabilityRequest::new(
                CapabilityGroup::InstanceExtensions,
                Requirement::Required,
                window_extensions.into_iter().chain(config.instance_extensions.iter().cloned()),
            ),
            diagnostic_extensions: CapabilityRequest::new(
                CapabilityGroup::DiagnosticExtensions,
                Requirement::Advisory,
                diagnostics,
            ),
            device_extensions: CapabilityRequest::new(
                CapabilityGroup::DeviceExtensions,
                Requirement::Required,
                device_extensions,
            ),
        }
    }

    /// Negotiate the instance-level groups.
    ///
    /// The diagnostics sink is only enabled when at least one layer and its
    /// extension were accepted. Device-level fields are left empty.
    pub fn negotiate_instance(&self, layers: &[String], extensions: &[String]) -> VulkanResult<AcceptedCapabilities> {
        let accepted_layers = self.layers.negotiate(layers)?;
        let mut instance_extensions = self.instance_extensions.negotiate(extensions)?;

        let diagnostic_extensions = if accepted_layers.is_empty() {
            Vec::new()
        } else {
            self.diagnostic_extensions.negotiate(extensions)?
        };
        let diagnostics = !diagnostic_extensions.is_empty();
        for name in diagnostic_extensions {
            if !instance_extensions.contains(&name) {
                instance_extensions.push(name);
            }
        }

        log::info!(
            "Accepted layers {:?}, instance extensions {:?}",
            accepted_layers,
            instance_extensions
        );

        Ok(AcceptedCapabilities {
            layers: accepted_layers,
            instance_extensions,
            device_layers: Vec::new(),
            device_extensions: Vec::new(),
            diagnostics,
        })
    }
}

/// Names accepted by negotiation, fed into instance and device creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedCapabilities {
    /// Layers enabled on the instance
    pub layers: Vec<String>,
    /// Extensions enabled on the instance, diagnostics included
    pub instance_extensions: Vec<String>,
    /// Layers enabled on the device after re-validation
    pub device_layers: Vec<String>,
    /// Extensions enabled on the device
    pub device_extensions: Vec<String>,
    /// Whether the debug-report sink should be registered
    pub diagnostics: bool,
}

/// Negotiate `requested` against `available`.
///
/// The result is always a subset of `requested` in request order. For a
/// required group it equals `requested` or the call fails naming the first
/// missing entry.
pub fn negotiate(
    group: CapabilityGroup,
    requirement: Requirement,
    requested: &[String],
    available: &[String],
) -> VulkanResult<Vec<String>> {
    let mut accepted = Vec::with_capacity(requested.len());

    for name in requested {
        if available.iter().any(|candidate| candidate == name) {
            accepted.push(name.clone());
            continue;
        }

        match requirement {
            Requirement::Required => {
                return Err(VulkanError::CapabilityUnavailable {
                    group,
                    name: name.clone(),
                });
            }
            Requirement::Advisory => {
                log::warn!("Requested {} {} is not available, skipping", group, name);
            }
        }
    }

    Ok(accepted)
}

/// Names of the reported layers
pub fn layer_names(properties: &[vk::LayerProperties]) -> Vec<String> {
    properties.iter().map(|p| fixed_name(&p.layer_name)).collect()
}

/// Names of the reported extensions
pub fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<String> {
    properties.iter().map(|p| fixed_name(&p.extension_name)).collect()
}

/// Read a NUL-terminated name out of a fixed-size driver array
pub(crate) fn fixed_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_required_group_accepts_exact_request() {
        let requested = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let available = names(&["VK_KHR_xcb_surface", "VK_EXT_debug_report", "VK_KHR_surface"]);

        let accepted = negotiate(
            CapabilityGroup::InstanceExtensions,
            Requirement::Required,
            &requested,
            &available,
        )
        .unwrap();

        assert_eq!(accepted, requested);
    }

    #[test]
    fn test_required_group_names_missing_entry() {
        let requested = names(&["VK_KHR_surface", "VK_KHR_win32_surface", "VK_KHR_display"]);
        let available = names(&["VK_KHR_surface"]);

        let err = negotiate(
            CapabilityGroup::InstanceExtensions,
            Requirement::Required,
            &requested,
            &available,
        )
        .unwrap_err();

        match err {
            VulkanError::CapabilityUnavailable { group, name } => {
                assert_eq!(group, CapabilityGroup::InstanceExtensions);
                assert_eq!(name, "VK_KHR_win32_surface");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_advisory_group_trims_and_keeps_request_order() {
        let requested = names(&["VK_LAYER_b", "VK_LAYER_missing", "VK_LAYER_a"]);
        let available = names(&["VK_LAYER_a", "VK_LAYER_b"]);

        let accepted = negotiate(
            CapabilityGroup::InstanceLayers,
            Requirement::Advisory,
            &requested,
            &available,
        )
        .unwrap();

        assert_eq!(accepted, names(&["VK_LAYER_b", "VK_LAYER_a"]));
    }

    #[test]
    fn test_acceptance_is_always_subset_of_request() {
        let requested = names(&["a", "b", "c"]);
        let availability = [names(&[]), names(&["c"]), names(&["x", "a", "c", "b"])];

        for available in &availability {
            let accepted =
                negotiate(CapabilityGroup::DeviceLayers, Requirement::Advisory, &requested, available).unwrap();
            assert!(accepted.iter().all(|name| requested.contains(name)));
            assert!(accepted.iter().all(|name| available.contains(name)));

            match negotiate(CapabilityGroup::DeviceLayers, Requirement::Required, &requested, available) {
                Ok(exact) => assert_eq!(exact, requested),
                Err(VulkanError::CapabilityUnavailable { .. }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_request_always_succeeds() {
        let accepted =
            negotiate(CapabilityGroup::DeviceExtensions, Requirement::Required, &[], &[]).unwrap();
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_request_drops_duplicates() {
        let request = CapabilityRequest::new(
            CapabilityGroup::InstanceExtensions,
            Requirement::Required,
            ["VK_KHR_surface", "VK_KHR_xlib_surface", "VK_KHR_surface"],
        );
        assert_eq!(request.names, names(&["VK_KHR_surface", "VK_KHR_xlib_surface"]));
    }

    fn config(layers: &[&str], required: bool, diagnostics: bool) -> CapabilityConfig {
        CapabilityConfig {
            layers: names(layers),
            layers_required: required,
            instance_extensions: Vec::new(),
            device_extensions: Vec::new(),
            enable_diagnostics: diagnostics,
            revalidate_device_layers: true,
        }
    }

    #[test]
    fn test_swapchain_extension_always_requested() {
        let set = CapabilitySet::from_config(&config(&[], false, false), Vec::new(), "VK_EXT_debug_report");
        assert_eq!(set.device_extensions.names, names(&[SWAPCHAIN_EXTENSION]));
        assert_eq!(set.device_extensions.requirement, Requirement::Required);
        assert!(set.diagnostic_extensions.names.is_empty());
    }

    #[test]
    fn test_window_extensions_come_first() {
        let mut cfg = config(&[], false, false);
        cfg.instance_extensions = names(&["VK_KHR_get_physical_device_properties2", "VK_KHR_surface"]);

        let set = CapabilitySet::from_config(&cfg, names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]), "VK_EXT_debug_report");
        assert_eq!(
            set.instance_extensions.names,
            names(&["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_KHR_get_physical_device_properties2"])
        );
    }

    #[test]
    fn test_diagnostics_need_an_accepted_layer() {
        let set = CapabilitySet::from_config(
            &config(&["VK_LAYER_KHRONOS_validation"], false, true),
            names(&["VK_KHR_surface"]),
            "VK_EXT_debug_report",
        );
        let extensions = names(&["VK_KHR_surface", "VK_EXT_debug_report"]);

        let without_layer = set.negotiate_instance(&[], &extensions).unwrap();
        assert!(without_layer.layers.is_empty());
        assert!(!without_layer.diagnostics);
        assert_eq!(without_layer.instance_extensions, names(&["VK_KHR_surface"]));

        let with_layer = set
            .negotiate_instance(&names(&["VK_LAYER_KHRONOS_validation"]), &extensions)
            .unwrap();
        assert!(with_layer.diagnostics);
        assert_eq!(
            with_layer.instance_extensions,
            names(&["VK_KHR_surface", "VK_EXT_debug_report"])
        );
    }

    #[test]
    fn test_required_layers_fail_when_missing() {
        let set = CapabilitySet::from_config(
            &config(&["VK_LAYER_KHRONOS_validation"], true, false),
            Vec::new(),
            "VK_EXT_debug_report",
        );
        let err = set.negotiate_instance(&[], &[]).unwrap_err();
        assert_eq!(err.stage_tag(), "capabilities/instance layer");
    }

    #[test]
    fn test_fixed_name_stops_at_nul() {
        let mut raw = [0 as c_char; vk::MAX_EXTENSION_NAME_SIZE];
        for (slot, byte) in raw.iter_mut().zip(b"VK_KHR_swapchain") {
            *slot = *byte as c_char;
        }
        assert_eq!(fixed_name(&raw), "VK_KHR_swapchain");
    }
}
