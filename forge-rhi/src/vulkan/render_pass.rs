//! Vulkan render pass creation and render-pass recording.

use crate::{DescriptorSet, LoadOp, RenderPassDescriptor, RhiError, RhiResult, ShaderStage, StoreOp};
use ash::vk;
use std::sync::Arc;

use super::buffer::VulkanBuffer;
use super::descriptor::VulkanDescriptorSet;
use super::pipeline::VulkanGraphicsPipeline;
use super::texture::format_to_vk;

/// Builds a `VkRenderPass` from a full [`RenderPassDescriptor`], including multiple subpasses
/// and explicit subpass dependencies. Shared by pipeline creation and `begin_render_pass`, both
/// of which go through the device's render-pass cache keyed by this descriptor.
pub fn create_vk_render_pass(device: &ash::Device, desc: &RenderPassDescriptor) -> RhiResult<vk::RenderPass> {
    let attachments: Vec<vk::AttachmentDescription> = desc
        .attachments
        .iter()
        .map(|att| {
            vk::AttachmentDescription::default()
                .format(format_to_vk(att.format))
                .samples(super::texture::sample_count_to_vk(att.sample_count))
                .load_op(load_op_to_vk(att.load_op))
                .store_op(store_op_to_vk(att.store_op))
                .stencil_load_op(load_op_to_vk(att.stencil_load_op))
                .stencil_store_op(store_op_to_vk(att.stencil_store_op))
                .initial_layout(super::image_layout_to_vk(att.initial_layout))
                .final_layout(super::image_layout_to_vk(att.final_layout))
        })
        .collect();

    // AttachmentReference arrays must outlive the SubpassDescription borrows built from them.
    struct SubpassRefs {
        input: Vec<vk::AttachmentReference>,
        color: Vec<vk::AttachmentReference>,
        resolve: Vec<vk::AttachmentReference>,
        depth: Option<vk::AttachmentReference>,
        preserve: Vec<u32>,
    }

    let refs: Vec<SubpassRefs> = desc
        .subpasses
        .iter()
        .map(|sp| SubpassRefs {
            input: sp
                .input_attachments
                .iter()
                .map(|&a| vk::AttachmentReference::default().attachment(a).layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
                .collect(),
            color: sp
                .color_attachments
                .iter()
                .map(|&a| vk::AttachmentReference::default().attachment(a).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                .collect(),
            resolve: sp
                .resolve_attachments
                .iter()
                .map(|&a| vk::AttachmentReference::default().attachment(a).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                .collect(),
            depth: sp
                .depth_stencil_attachment
                .map(|a| vk::AttachmentReference::default().attachment(a).layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)),
            preserve: sp.preserve_attachments.clone(),
        })
        .collect();

    let subpasses: Vec<vk::SubpassDescription> = refs
        .iter()
        .map(|r| {
            let mut s = vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .input_attachments(&r.input)
                .color_attachments(&r.color)
                .preserve_attachments(&r.preserve);
            if !r.resolve.is_empty() {
                s = s.resolve_attachments(&r.resolve);
            }
            if let Some(ref d) = r.depth {
                s = s.depth_stencil_attachment(d);
            }
            s
        })
        .collect();

    let dependencies: Vec<vk::SubpassDependency> = desc
        .dependencies
        .iter()
        .map(|d| {
            vk::SubpassDependency::default()
                .src_subpass(d.src_subpass.unwrap_or(vk::SUBPASS_EXTERNAL))
                .dst_subpass(d.dst_subpass.unwrap_or(vk::SUBPASS_EXTERNAL))
                .src_stage_mask(super::pipeline_stage_to_vk(d.src_stage))
                .dst_stage_mask(super::pipeline_stage_to_vk(d.dst_stage))
                .src_access_mask(super::access_flags_to_vk(d.src_access))
                .dst_access_mask(super::access_flags_to_vk(d.dst_access))
        })
        .collect();

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device
            .create_render_pass(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))
    }
}

fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

/// Records draw commands between `begin_render_pass`/`end`. Does not own the render pass or
/// framebuffer: both are cached at device level and outlive any single recorder.
pub struct VulkanRenderPassRecorder {
    pub(crate) device: Arc<ash::Device>,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) extent: vk::Extent2D,
    pub(crate) pipeline_layout: Option<vk::PipelineLayout>,
}

impl VulkanRenderPassRecorder {
    pub fn new(device: Arc<ash::Device>, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) -> Self {
        Self {
            device,
            command_buffer,
            extent,
            pipeline_layout: None,
        }
    }
}

impl crate::RenderPassRecorder for VulkanRenderPassRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn crate::GraphicsPipeline) {
        let vk_pipe = pipeline
            .as_any()
            .downcast_ref::<VulkanGraphicsPipeline>()
            .expect("pipeline must originate from the Vulkan backend");
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipe.raw());
        }
        self.pipeline_layout = Some(vk_pipe.layout());
        self.set_viewport(0.0, 0.0, self.extent.width as f32, self.extent.height as f32);
        self.set_scissor(0, 0, self.extent.width, self.extent.height);
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let viewport = vk::Viewport::default().x(x).y(y).width(width).height(height).max_depth(1.0);
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    fn set_scissor(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x, y })
            .extent(vk::Extent2D { width, height });
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    fn bind_descriptor_set(&mut self, index: u32, set: &dyn DescriptorSet) {
        let layout = self.pipeline_layout.expect("bind_descriptor_set called before set_pipeline");
        let vk_set = set
            .as_any()
            .downcast_ref::<VulkanDescriptorSet>()
            .expect("descriptor set must originate from the Vulkan backend");
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                index,
                &[vk_set.set],
                &[],
            );
        }
    }

    fn push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]) {
        let layout = self.pipeline_layout.expect("push_constants called before set_pipeline");
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, super::descriptor::shader_stage_to_vk(stage), offset, data);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn crate::Buffer, offset: u64) {
        let vk_buf = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .expect("buffer must originate from the Vulkan backend");
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.command_buffer, slot, &[vk_buf.buffer], &[offset]);
        }
    }

    fn set_index_buffer(&mut self, buffer: &dyn crate::Buffer, offset: u64) {
        let vk_buf = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .expect("buffer must originate from the Vulkan backend");
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, vk_buf.buffer, offset, vk::IndexType::UINT32);
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn end(self: Box<Self>) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }
}

impl std::fmt::Debug for VulkanRenderPassRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanRenderPassRecorder").field("extent", &self.extent).finish_non_exhaustive()
    }
}
