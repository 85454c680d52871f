//! Final composite + entity-ID readback (component L).
//!
//! Tonemaps and gamma-corrects the HDR color target into the swapchain's RGBA8 target. Entity-ID
//! picking reads back a single texel of the G-buffer's entity-ID attachment: barrier to
//! `TransferSrc`, copy the one pixel into a small host-visible buffer, barrier back to its prior
//! layout, then block on `immediate_execute` and read the buffer directly — this is a blocking,
//! once-per-click operation, not part of the steady-state per-frame pipeline.

use crate::config::RendererConfig;
use crate::shader::graphics_program;
use forge_rhi::{
    AttachmentDescriptor, BufferDescriptor, BufferMemoryPreference, BufferUsage, Device,
    DescriptorSetLayoutBinding, DescriptorType, FilterMode, Format, FramebufferDescriptor,
    GraphicsPipeline, GraphicsPipelineDescriptor, ImageLayout, LoadOp, PrimitiveTopology,
    PushConstantRange, RasterizationState, RenderPassDescriptor, RhiResult, Sampler,
    SamplerDescriptor, ShaderStage, StoreOp, SubpassDescriptor, Texture, TextureView,
};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TonemapPushConstants {
    pub exposure: f32,
    pub gamma: f32,
}

const VERTEX_SOURCE: &str = r#"
struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOut {
    var out: VertexOut;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.uv = uv;
    out.clip_position = vec4<f32>(uv * 2.0 - vec2<f32>(1.0, 1.0), 0.0, 1.0);
    return out;
}
"#;

const FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var hdr_source: texture_2d<f32>;
@group(0) @binding(1) var hdr_sampler: sampler;

struct PushConstants {
    exposure: f32,
    gamma: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let hdr = textureSample(hdr_source, hdr_sampler, in.uv).rgb * pc.exposure;
    // Reinhard tonemap, then gamma-correct into the swapchain's display space.
    let mapped = hdr / (hdr + vec3<f32>(1.0));
    let corrected = pow(mapped, vec3<f32>(1.0 / pc.gamma));
    return vec4<f32>(corrected, 1.0);
}
"#;

pub struct CompositePass {
    pipeline: Box<dyn GraphicsPipeline>,
    render_pass: RenderPassDescriptor,
    sampler: Box<dyn Sampler>,
    readback_buffer: Box<dyn forge_rhi::Buffer>,
}

impl CompositePass {
    pub fn new(device: &Arc<dyn Device>, output_format: Format, _config: &RendererConfig) -> RhiResult<Self> {
        let render_pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor {
                format: output_format,
                sample_count: 1,
                load_op: LoadOp::DontCare,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            }],
            subpasses: vec![SubpassDescriptor { color_attachments: vec![0], ..Default::default() }],
            dependencies: vec![],
        };

        let bindings = vec![
            DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ];
        let push_constants = vec![PushConstantRange { stage_mask: ShaderStage::FRAGMENT, offset: 0, size: std::mem::size_of::<TonemapPushConstants>() as u32 }];
        let shader = graphics_program(VERTEX_SOURCE, FRAGMENT_SOURCE, bindings, push_constants);
        let pipeline = device.create_graphics_pipeline(
            &GraphicsPipelineDescriptor {
                label: Some("final_composite"),
                shader,
                vertex_buffers: vec![],
                topology: PrimitiveTopology::TriangleList,
                rasterization: RasterizationState { cull_mode: forge_rhi::CullMode::None, ..Default::default() },
                depth_stencil: Default::default(),
                color_blend: vec![Default::default()],
                sample_count: 1,
            },
            &render_pass,
        )?;

        let sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            ..Default::default()
        })?;

        // One R32Sint texel: the entity-ID G-buffer attachment's format.
        let readback_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("entity_id_readback"),
            size: 4,
            usage: BufferUsage::TRANSFER_DST,
            memory: BufferMemoryPreference::HostVisibleRandom,
        })?;

        Ok(Self { pipeline, render_pass, sampler, readback_buffer })
    }

    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        hdr_source: &dyn TextureView,
        swapchain_target: &dyn TextureView,
        extent: (u32, u32),
        output_format: Format,
        source_set: &dyn forge_rhi::DescriptorSet,
        tonemap: TonemapPushConstants,
    ) -> RhiResult<Box<dyn forge_rhi::CommandBuffer>> {
        source_set.write_combined_image_sampler(0, hdr_source, self.sampler.as_ref(), ImageLayout::ShaderReadOnly);

        let mut encoder = device.create_command_encoder()?;
        let framebuffer = FramebufferDescriptor {
            extent,
            attachment_formats: vec![output_format],
            attachment_usages: vec![forge_rhi::TextureUsage::COLOR_ATTACHMENT],
        };
        let views = [swapchain_target];
        let mut pass = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 1.0]])?;
        pass.set_pipeline(self.pipeline.as_ref());
        pass.set_viewport(0.0, 0.0, extent.0 as f32, extent.1 as f32);
        pass.set_scissor(0, 0, extent.0, extent.1);
        pass.bind_descriptor_set(0, source_set);
        pass.push_constants(ShaderStage::FRAGMENT, 0, bytemuck::bytes_of(&tonemap));
        pass.draw(3, 1, 0, 0);
        pass.end();
        encoder.finish()
    }

    /// Reads the entity ID written under the cursor at `(x, y)` in the G-buffer's entity-ID
    /// attachment. Blocks until the copy completes; not for per-frame use.
    pub fn read_entity_id_from_pixel(
        &self,
        device: &Arc<dyn Device>,
        entity_id_texture: &dyn Texture,
        x: u32,
        y: u32,
    ) -> RhiResult<i32> {
        device.immediate_execute(&mut |encoder| {
            encoder.pipeline_barrier_texture(entity_id_texture, ImageLayout::ShaderReadOnly, ImageLayout::TransferSrc);
            encoder.copy_texture_to_buffer(entity_id_texture, 0, 0, (x, y, 1, 1), self.readback_buffer.as_ref(), 0);
            encoder.pipeline_barrier_texture(entity_id_texture, ImageLayout::TransferSrc, ImageLayout::ShaderReadOnly);
        })?;
        let bytes = self.readback_buffer.read(0, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
