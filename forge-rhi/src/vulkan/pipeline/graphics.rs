//! Vulkan graphics pipeline.

use crate::{
    BlendFactor, BlendOp, BlendState, CullMode, FrontFace, GraphicsPipeline, GraphicsPipelineDescriptor,
    PrimitiveTopology, RhiError, RhiResult, ShaderStage, VertexFormat, VertexInputRate,
};
use ash::vk;
use std::ffi::CString;
use std::sync::Arc;

use super::super::descriptor::{self, VulkanDescriptorSetLayout};

pub struct VulkanGraphicsPipeline {
    device: Arc<ash::Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    // Kept alive for the pipeline's lifetime; destroyed in reverse order on drop.
    _set_layouts: Vec<VulkanDescriptorSetLayout>,
}

impl VulkanGraphicsPipeline {
    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn create(
        device: Arc<ash::Device>,
        desc: &GraphicsPipelineDescriptor,
        render_pass: vk::RenderPass,
        color_attachment_count: u32,
    ) -> RhiResult<Self> {
        let mut stage_modules = Vec::new();
        let mut entry_names: Vec<CString> = Vec::new();
        for stage in &desc.shader.stages {
            let module = create_shader_module(&device, &stage.spirv_words)?;
            stage_modules.push((stage.stage, module));
            entry_names.push(CString::new(stage.entry_point).map_err(|e| RhiError::InvalidArgument(e.to_string()))?);
        }

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = stage_modules
            .iter()
            .zip(entry_names.iter())
            .map(|((stage, module), name)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_flag_to_vk(*stage))
                    .module(*module)
                    .name(name)
            })
            .collect();

        let (binding_descriptions, attribute_descriptions) = vertex_input_descriptions(&desc.vertex_buffers);
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(if desc.rasterization.polygon_mode_line { vk::PolygonMode::LINE } else { vk::PolygonMode::FILL })
            .line_width(desc.rasterization.line_width)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(desc.rasterization.depth_bias_constant != 0.0 || desc.rasterization.depth_bias_slope != 0.0)
            .depth_bias_constant_factor(desc.rasterization.depth_bias_constant)
            .depth_bias_slope_factor(desc.rasterization.depth_bias_slope);

        let multisampling =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(super::super::texture::sample_count_to_vk(desc.sample_count));

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..color_attachment_count)
            .map(|i| {
                let blend = desc.color_blend.get(i as usize).copied().unwrap_or_default();
                blend_attachment_state(blend)
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().logic_op_enable(false).attachments(&color_blend_attachments);

        let depth_stencil_create_info = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test)
            .depth_write_enable(desc.depth_stencil.depth_write)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let set_layouts: Vec<VulkanDescriptorSetLayout> = desc
            .shader
            .reflection
            .sets
            .iter()
            .map(|bindings| descriptor::create_descriptor_set_layout(Arc::clone(&device), bindings))
            .collect::<RhiResult<Vec<_>>>()?;
        let vk_set_layouts: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|l| l.raw()).collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .shader
            .reflection
            .push_constants
            .iter()
            .map(|pc| vk::PushConstantRange::default().stage_flags(shader_stage_to_vk(pc.stage_mask)).offset(pc.offset).size(pc.size))
            .collect();
        let layout_create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&vk_set_layouts).push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blend)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .depth_stencil_state(&depth_stencil_create_info)
            .dynamic_state(&dynamic_state);

        let pipelines = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_partial, res)| RhiError::InvalidArgument(res.to_string()))?
        };
        let pipeline = pipelines[0];

        for (_, module) in stage_modules {
            unsafe {
                device.destroy_shader_module(module, None);
            }
        }

        Ok(Self {
            device,
            pipeline,
            layout,
            _set_layouts: set_layouts,
        })
    }
}

fn create_shader_module(device: &ash::Device, spirv_words: &[u32]) -> RhiResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(spirv_words);
    unsafe {
        device
            .create_shader_module(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))
    }
}

fn vertex_input_descriptions(
    buffers: &[crate::VertexBufferLayout],
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let mut bindings = Vec::with_capacity(buffers.len());
    let mut attributes = Vec::new();
    for (binding, layout) in buffers.iter().enumerate() {
        bindings.push(
            vk::VertexInputBindingDescription::default().binding(binding as u32).stride(layout.stride).input_rate(match layout.input_rate {
                VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
                VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
            }),
        );
        for attr in &layout.attributes {
            attributes.push(
                vk::VertexInputAttributeDescription::default()
                    .location(attr.location)
                    .binding(binding as u32)
                    .format(vertex_format_to_vk(attr.format))
                    .offset(attr.offset),
            );
        }
    }
    (bindings, attributes)
}

fn vertex_format_to_vk(f: VertexFormat) -> vk::Format {
    match f {
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Sint32 => vk::Format::R32_SINT,
        VertexFormat::Uint32 => vk::Format::R32_UINT,
    }
}

fn topology_to_vk(t: PrimitiveTopology) -> vk::PrimitiveTopology {
    match t {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

fn cull_mode_to_vk(c: CullMode) -> vk::CullModeFlags {
    match c {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::Front => vk::CullModeFlags::FRONT,
    }
}

fn front_face_to_vk(f: FrontFace) -> vk::FrontFace {
    match f {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

fn blend_factor_to_vk(f: BlendFactor) -> vk::BlendFactor {
    match f {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    }
}

fn blend_op_to_vk(o: BlendOp) -> vk::BlendOp {
    match o {
        BlendOp::Add => vk::BlendOp::ADD,
    }
}

fn blend_attachment_state(blend: BlendState) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(blend.enabled)
        .src_color_blend_factor(blend_factor_to_vk(blend.src_color))
        .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color))
        .color_blend_op(blend_op_to_vk(blend.color_op))
        .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha))
        .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha))
        .alpha_blend_op(blend_op_to_vk(blend.alpha_op))
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

fn compare_op_to_vk(o: crate::CompareOp) -> vk::CompareOp {
    match o {
        crate::CompareOp::Never => vk::CompareOp::NEVER,
        crate::CompareOp::Less => vk::CompareOp::LESS,
        crate::CompareOp::Equal => vk::CompareOp::EQUAL,
        crate::CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        crate::CompareOp::Greater => vk::CompareOp::GREATER,
        crate::CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        crate::CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        crate::CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn shader_stage_to_vk(s: ShaderStage) -> vk::ShaderStageFlags {
    super::super::descriptor::shader_stage_to_vk(s)
}

fn shader_stage_flag_to_vk(s: ShaderStage) -> vk::ShaderStageFlags {
    shader_stage_to_vk(s)
}

impl Drop for VulkanGraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

impl std::fmt::Debug for VulkanGraphicsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanGraphicsPipeline").finish()
    }
}

impl GraphicsPipeline for VulkanGraphicsPipeline {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
