//! Validation-layer diagnostics sink
//!
//! Registered only when negotiation accepted validation layers and the
//! debug-report extension. Each report becomes one log line prefixed by its
//! severity, and the driver is always told not to abort the failing call.

use ash::extensions::ext::DebugReport;
use ash::{vk, Entry, Instance};
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

use crate::render::vulkan::{ContextStage, VulkanError, VulkanResult};

/// Instance extension backing the sink
pub fn extension_name() -> &'static CStr {
    DebugReport::name()
}

/// One validation report as delivered by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugReportMessage {
    /// Severity and category bits
    pub flags: vk::DebugReportFlagsEXT,
    /// Type of the object the report is about
    pub object_type: vk::DebugReportObjectTypeEXT,
    /// Raw handle of that object
    pub object: u64,
    /// Layer-defined location code
    pub location: usize,
    /// Layer-defined message code
    pub message_code: i32,
    /// Name of the layer that raised the report
    pub layer_prefix: String,
    /// Message text
    pub message: String,
}

impl DebugReportMessage {
    /// Severity prefix for the rendered line
    pub fn severity_prefix(&self) -> &'static str {
        if self.flags.contains(vk::DebugReportFlagsEXT::ERROR) {
            "[ERROR] "
        } else if self
            .flags
            .intersects(vk::DebugReportFlagsEXT::WARNING | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING)
        {
            "[WARNING] "
        } else {
            ""
        }
    }

    /// Render the report as one human-readable line
    pub fn render(&self) -> String {
        format!(
            "{}{}: code {} ({:?} {:#x} @ {}): {}",
            self.severity_prefix(),
            self.layer_prefix,
            self.message_code,
            self.object_type,
            self.object,
            self.location,
            self.message
        )
    }

    /// Forward the rendered line to the logger at the matching level
    pub fn forward(&self) {
        let line = self.render();
        if self.flags.contains(vk::DebugReportFlagsEXT::ERROR) {
            log::error!("{}", line);
        } else if self.severity_prefix().is_empty() {
            log::info!("{}", line);
        } else {
            log::warn!("{}", line);
        }
    }
}

/// Debug-report callback registration with RAII cleanup
pub struct DebugCallback {
    loader: DebugReport,
    callback: vk::DebugReportCallbackEXT,
}

impl DebugCallback {
    /// Register the sink on `instance`
    pub fn new(entry: &Entry, instance: &Instance) -> VulkanResult<Self> {
        let loader = DebugReport::new(entry, instance);

        let create_info = vk::DebugReportCallbackCreateInfoEXT::builder()
            .flags(
                vk::DebugReportFlagsEXT::ERROR
                    | vk::DebugReportFlagsEXT::WARNING
                    | vk::DebugReportFlagsEXT::PERFORMANCE_WARNING,
            )
            .pfn_callback(Some(debug_report_callback));

        let callback = unsafe {
            loader
                .create_debug_report_callback(&create_info, None)
                .map_err(|e| VulkanError::context(ContextStage::DebugCallback, e))?
        };

        log::debug!("Registered debug-report callback");
        Ok(Self { loader, callback })
    }
}

impl Drop for DebugCallback {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_report_callback(self.callback, None);
        }
    }
}

unsafe fn c_str_lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_report_callback(
    flags: vk::DebugReportFlagsEXT,
    object_type: vk::DebugReportObjectTypeEXT,
    object: u64,
    location: usize,
    message_code: i32,
    p_layer_prefix: *const c_char,
    p_message: *const c_char,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let report = DebugReportMessage {
        flags,
        object_type,
        object,
        location,
        message_code,
        layer_prefix: c_str_lossy(p_layer_prefix),
        message: c_str_lossy(p_message),
    };
    report.forward();

    // Never abort the call that triggered the report
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn report(flags: vk::DebugReportFlagsEXT) -> DebugReportMessage {
        DebugReportMessage {
            flags,
            object_type: vk::DebugReportObjectTypeEXT::IMAGE,
            object: 0xdead,
            location: 12,
            message_code: 7,
            layer_prefix: "Validation".to_string(),
            message: "image layout mismatch".to_string(),
        }
    }

    #[test]
    fn test_severity_prefixes() {
        assert_eq!(report(vk::DebugReportFlagsEXT::ERROR).severity_prefix(), "[ERROR] ");
        assert_eq!(report(vk::DebugReportFlagsEXT::WARNING).severity_prefix(), "[WARNING] ");
        assert_eq!(
            report(vk::DebugReportFlagsEXT::PERFORMANCE_WARNING).severity_prefix(),
            "[WARNING] "
        );
        assert_eq!(report(vk::DebugReportFlagsEXT::INFORMATION).severity_prefix(), "");
    }

    #[test]
    fn test_rendered_line_carries_all_fields() {
        let line = report(vk::DebugReportFlagsEXT::ERROR | vk::DebugReportFlagsEXT::WARNING).render();
        assert!(line.starts_with("[ERROR] Validation: code 7"));
        assert!(line.contains("0xdead"));
        assert!(line.contains("@ 12"));
        assert!(line.ends_with("image layout mismatch"));
    }

    #[test]
    fn test_callback_never_aborts() {
        let layer = CString::new("Validation").unwrap();
        let message = CString::new("something odd").unwrap();
        let verdict = unsafe {
            debug_report_callback(
                vk::DebugReportFlagsEXT::ERROR,
                vk::DebugReportObjectTypeEXT::DEVICE,
                1,
                0,
                0,
                layer.as_ptr(),
                message.as_ptr(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(verdict, vk::FALSE);
    }
}
