//! Graphics pipeline assembly
//!
//! Pipeline layout, pipeline cache and the single fixed-function graphics
//! pipeline. Viewport and scissor are dynamic so the pipeline does not bake in
//! the chain extent.

use ash::{vk, Device};
use std::ffi::CStr;

use crate::render::vulkan::rendering::geometry::Vertex;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Pipeline layout wrapper with RAII cleanup
pub struct PipelineLayout {
    device: Device,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Create a layout over the given descriptor set layouts, no push constants
    pub fn new(device: Device, set_layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);

        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| VulkanError::pipeline("pipeline layout", e))?
        };

        Ok(Self { device, layout })
    }

    /// Get layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Pipeline cache, created empty every run
pub struct PipelineCache {
    device: Device,
    cache: vk::PipelineCache,
}

impl PipelineCache {
    /// Create an empty cache
    pub fn new(device: Device) -> VulkanResult<Self> {
        let cache_info = vk::PipelineCacheCreateInfo::builder();

        let cache = unsafe {
            device
                .create_pipeline_cache(&cache_info, None)
                .map_err(|e| VulkanError::pipeline("pipeline cache", e))?
        };

        Ok(Self { device, cache })
    }

    /// Get cache handle
    pub fn handle(&self) -> vk::PipelineCache {
        self.cache
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_cache(self.cache, None);
        }
    }
}

/// Fixed-function state of the bootstrap pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFixedState {
    /// Primitive assembly
    pub topology: vk::PrimitiveTopology,
    /// Polygon fill mode
    pub polygon_mode: vk::PolygonMode,
    /// Faces culled
    pub cull_mode: vk::CullModeFlags,
    /// Winding treated as front-facing
    pub front_face: vk::FrontFace,
    /// Depth test and write enabled
    pub depth_test: bool,
    /// Depth comparison
    pub depth_compare_op: vk::CompareOp,
    /// Color blending enabled
    pub blend: bool,
    /// States supplied at record time
    pub dynamic_states: Vec<vk::DynamicState>,
}

impl Default for PipelineFixedState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
            blend: false,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }
}

impl PipelineFixedState {
    fn rasterization(&self) -> vk::PipelineRasterizationStateCreateInfo {
        vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .build()
    }

    fn depth_stencil(&self) -> vk::PipelineDepthStencilStateCreateInfo {
        let keep = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            ..Default::default()
        };

        vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_test)
            .depth_compare_op(self.depth_compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .front(keep)
            .back(keep)
            .build()
    }

    fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(self.blend)
            .build()
    }
}

/// Shader modules for the two fixed stages
#[derive(Debug, Clone, Copy)]
pub struct ShaderStages {
    /// Vertex stage module
    pub vertex: vk::ShaderModule,
    /// Fragment stage module
    pub fragment: vk::ShaderModule,
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Create the pipeline through `cache` for subpass 0 of `render_pass`
    pub fn new(
        device: Device,
        cache: vk::PipelineCache,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        shaders: ShaderStages,
        state: &PipelineFixedState,
    ) -> VulkanResult<Self> {
        let entry_point = CStr::from_bytes_with_nul(b"main\0")
            .map_err(|e| VulkanError::PipelineCreationFailed {
                step: "shader entry point",
                reason: e.to_string(),
            })?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shaders.vertex)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shaders.fragment)
                .name(entry_point)
                .build(),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(state.topology)
            .primitive_restart_enable(false);

        // Counts only; the rectangles come from the dynamic state
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = state.rasterization();

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = state.depth_stencil();

        let color_blend_attachments = [state.color_blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&state.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(cache, &[pipeline_info.build()], None)
                .map_err(|(_, e)| VulkanError::pipeline("graphics pipeline", e))?
        };

        let pipeline = pipelines.into_iter().next().ok_or(VulkanError::PipelineCreationFailed {
            step: "graphics pipeline",
            reason: "driver returned no pipeline".to_string(),
        })?;

        log::info!("Created graphics pipeline");
        Ok(Self { device, pipeline })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixed_state() {
        let state = PipelineFixedState::default();

        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(!state.blend);
        assert_eq!(
            state.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
    }

    #[test]
    fn test_depth_state_tests_and_writes() {
        let depth = PipelineFixedState::default().depth_stencil();

        assert_eq!(depth.depth_test_enable, vk::TRUE);
        assert_eq!(depth.depth_write_enable, vk::TRUE);
        assert_eq!(depth.depth_compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(depth.stencil_test_enable, vk::FALSE);
        assert_eq!(depth.back.compare_op, vk::CompareOp::ALWAYS);
    }

    #[test]
    fn test_rasterization_and_blend_follow_state() {
        let state = PipelineFixedState::default();
        let raster = state.rasterization();
        assert_eq!(raster.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(raster.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(raster.line_width, 1.0);

        let blend = state.color_blend_attachment();
        assert_eq!(blend.blend_enable, vk::FALSE);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
