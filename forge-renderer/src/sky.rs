//! Sky + grid pass (component J).
//!
//! Draws directly on top of the lit scene: both draws load the HDR color target and the
//! G-buffer depth (`depth_write = false`, `LESS_OR_EQUAL`) so the sky only shows through pixels
//! nothing opaque wrote, and the grid only shows where depth allows. The sky cube is sampled
//! with the camera's rotation-only view (translation stripped) so it stays infinitely far away.

use crate::config::RendererConfig;
use crate::shader::graphics_program;
use forge_rhi::{
    AttachmentDescriptor, CompareOp, DepthStencilState, Device, Format, FramebufferDescriptor,
    GraphicsPipeline, GraphicsPipelineDescriptor, ImageLayout, LoadOp, PrimitiveTopology,
    PushConstantRange, RasterizationState, RenderPassDescriptor, RhiResult, ShaderStage,
    StoreOp, SubpassDescriptor, TextureView,
};
use glam::Mat4;
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyPushConstants {
    inv_view_rotation_proj: [f32; 16],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GridPushConstants {
    inv_view_proj: [f32; 16],
    camera_position: [f32; 4],
}

const SKY_VERTEX_SOURCE: &str = r#"
struct PushConstants {
    inv_view_rotation_proj: mat4x4<f32>,
}
var<push_constant> pc: PushConstants;

struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOut {
    var out: VertexOut;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.ndc = uv * 2.0 - vec2<f32>(1.0, 1.0);
    out.clip_position = vec4<f32>(out.ndc, 1.0, 1.0);
    return out;
}
"#;

const SKY_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var environment: texture_cube<f32>;
@group(0) @binding(1) var environment_sampler: sampler;

struct PushConstants {
    inv_view_rotation_proj: mat4x4<f32>,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) ndc: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let far = pc.inv_view_rotation_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w);
    return textureSample(environment, environment_sampler, dir);
}
"#;

const GRID_VERTEX_SOURCE: &str = r#"
struct PushConstants {
    inv_view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
}
var<push_constant> pc: PushConstants;

struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOut {
    var out: VertexOut;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let ndc = uv * 2.0 - vec2<f32>(1.0, 1.0);
    let near = pc.inv_view_proj * vec4<f32>(ndc, 0.0, 1.0);
    let far = pc.inv_view_proj * vec4<f32>(ndc, 1.0, 1.0);
    let near_world = near.xyz / near.w;
    let far_world = far.xyz / far.w;
    let t = -near_world.y / (far_world.y - near_world.y);
    out.world_position = near_world + t * (far_world - near_world);
    out.clip_position = vec4<f32>(ndc, 0.9999, 1.0);
    return out;
}
"#;

const GRID_FRAGMENT_SOURCE: &str = r#"
struct FragmentIn {
    @location(0) world_position: vec3<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let coord = in.world_position.xz;
    let grid = abs(fract(coord - 0.5) - 0.5) / fwidth(coord);
    let line = 1.0 - min(min(grid.x, grid.y), 1.0);
    return vec4<f32>(vec3<f32>(0.4), line * 0.5);
}
"#;

pub struct SkyGridPass {
    sky_pipeline: Box<dyn GraphicsPipeline>,
    grid_pipeline: Box<dyn GraphicsPipeline>,
    render_pass: RenderPassDescriptor,
}

impl SkyGridPass {
    pub fn new(device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<Self> {
        let render_pass = RenderPassDescriptor {
            attachments: vec![
                AttachmentDescriptor {
                    format: config.hdr_color_format,
                    sample_count: 1,
                    load_op: LoadOp::Load,
                    store_op: StoreOp::Store,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::ColorAttachment,
                    final_layout: ImageLayout::ColorAttachment,
                },
                AttachmentDescriptor {
                    format: Format::D32Float,
                    sample_count: 1,
                    load_op: LoadOp::Load,
                    store_op: StoreOp::DontCare,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::DepthStencilReadOnly,
                    final_layout: ImageLayout::DepthStencilReadOnly,
                },
            ],
            subpasses: vec![SubpassDescriptor { color_attachments: vec![0], depth_stencil_attachment: Some(1), ..Default::default() }],
            dependencies: vec![],
        };

        let depth_stencil = DepthStencilState { depth_test: true, depth_write: false, depth_compare: CompareOp::LessOrEqual };

        let sky_bindings = vec![
            forge_rhi::DescriptorSetLayoutBinding { binding: 0, descriptor_type: forge_rhi::DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            forge_rhi::DescriptorSetLayoutBinding { binding: 1, descriptor_type: forge_rhi::DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ];
        let sky_push = vec![PushConstantRange { stage_mask: ShaderStage::VERTEX | ShaderStage::FRAGMENT, offset: 0, size: std::mem::size_of::<SkyPushConstants>() as u32 }];
        let sky_shader = graphics_program(SKY_VERTEX_SOURCE, SKY_FRAGMENT_SOURCE, sky_bindings, sky_push);
        let sky_pipeline = device.create_graphics_pipeline(
            &GraphicsPipelineDescriptor {
                label: Some("sky_cube"),
                shader: sky_shader,
                vertex_buffers: vec![],
                topology: PrimitiveTopology::TriangleList,
                rasterization: RasterizationState { cull_mode: forge_rhi::CullMode::None, ..Default::default() },
                depth_stencil,
                color_blend: vec![Default::default()],
                sample_count: 1,
            },
            &render_pass,
        )?;

        let grid_push = vec![PushConstantRange { stage_mask: ShaderStage::VERTEX, offset: 0, size: std::mem::size_of::<GridPushConstants>() as u32 }];
        let grid_shader = graphics_program(GRID_VERTEX_SOURCE, GRID_FRAGMENT_SOURCE, vec![], grid_push);
        let grid_pipeline = device.create_graphics_pipeline(
            &GraphicsPipelineDescriptor {
                label: Some("procedural_grid"),
                shader: grid_shader,
                vertex_buffers: vec![],
                topology: PrimitiveTopology::TriangleList,
                rasterization: RasterizationState { cull_mode: forge_rhi::CullMode::None, ..Default::default() },
                depth_stencil,
                color_blend: vec![forge_rhi::BlendState {
                    enabled: true,
                    src_color: forge_rhi::BlendFactor::SrcAlpha,
                    dst_color: forge_rhi::BlendFactor::OneMinusSrcAlpha,
                    color_op: forge_rhi::BlendOp::Add,
                    src_alpha: forge_rhi::BlendFactor::One,
                    dst_alpha: forge_rhi::BlendFactor::Zero,
                    alpha_op: forge_rhi::BlendOp::Add,
                }],
                sample_count: 1,
            },
            &render_pass,
        )?;

        Ok(Self { sky_pipeline, grid_pipeline, render_pass })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        hdr_target: &dyn TextureView,
        depth_target: &dyn TextureView,
        extent: (u32, u32),
        environment_set: &dyn forge_rhi::DescriptorSet,
        view: Mat4,
        projection: Mat4,
        camera_position: glam::Vec3,
        render_sky: bool,
    ) -> RhiResult<Box<dyn forge_rhi::CommandBuffer>> {
        let mut encoder = device.create_command_encoder()?;
        let framebuffer = FramebufferDescriptor {
            extent,
            attachment_formats: vec![Format::Rgba16Float, Format::D32Float],
            attachment_usages: vec![forge_rhi::TextureUsage::COLOR_ATTACHMENT, forge_rhi::TextureUsage::DEPTH_ATTACHMENT],
        };
        let views = [hdr_target, depth_target];
        let mut pass = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 0.0]; 2])?;
        pass.set_viewport(0.0, 0.0, extent.0 as f32, extent.1 as f32);
        pass.set_scissor(0, 0, extent.0, extent.1);

        if render_sky {
            let rotation_only = Mat4::from_mat3(glam::Mat3::from_mat4(view));
            let inv_view_rotation_proj = (projection * rotation_only).inverse();
            let push = SkyPushConstants { inv_view_rotation_proj: inv_view_rotation_proj.to_cols_array() };
            pass.set_pipeline(self.sky_pipeline.as_ref());
            pass.bind_descriptor_set(0, environment_set);
            pass.push_constants(ShaderStage::VERTEX | ShaderStage::FRAGMENT, 0, bytemuck::bytes_of(&push));
            pass.draw(3, 1, 0, 0);
        }

        let inv_view_proj = (projection * view).inverse();
        let grid_push = GridPushConstants {
            inv_view_proj: inv_view_proj.to_cols_array(),
            camera_position: [camera_position.x, camera_position.y, camera_position.z, 0.0],
        };
        pass.set_pipeline(self.grid_pipeline.as_ref());
        pass.push_constants(ShaderStage::VERTEX, 0, bytemuck::bytes_of(&grid_push));
        pass.draw(3, 1, 0, 0);

        pass.end();
        encoder.finish()
    }
}
