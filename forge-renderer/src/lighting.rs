//! Lighting resolve (component I).
//!
//! Full-screen pass that reconstructs world position from the G-buffer depth attachment,
//! evaluates one directional light against the G-buffer's albedo/normal/emission, samples the
//! shadow cascade array (3x3 PCF when the light has `soft_shadows` set) and IBL products, and
//! writes the result to the HDR color target the sky/grid and bloom passes build on. No vertex
//! buffer: the triangle covering the screen is generated from `vertex_index` in the shader, the
//! same "fullscreen triangle, no geometry" trick the G-buffer's own output feeds into.
//!
//! Descriptor-set-0 bindings 0-10 mirror the original engine's lighting pass layout.

use crate::config::RendererConfig;
use crate::shader::graphics_program;
use forge_rhi::wrappers::{DescriptorSetWrapper, UniformBuffer};
use forge_rhi::{
    AddressMode, AttachmentDescriptor, CompareOp, Device, DescriptorSetLayoutBinding,
    DescriptorType, FilterMode, Format, FramebufferDescriptor, GraphicsPipeline,
    GraphicsPipelineDescriptor, ImageLayout, LoadOp, PrimitiveTopology, PushConstantRange,
    RasterizationState, RenderPassDescriptor, RhiResult, Sampler, SamplerDescriptor, ShaderStage,
    StoreOp, SubpassDescriptor, Texture, TextureView,
};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniforms {
    pub inv_view_proj: [f32; 16],
    pub cascade_matrices: [[f32; 16]; 4],
    pub cascade_splits: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_color_intensity: [f32; 4],
    pub camera_position: [f32; 4],
    /// x: soft_shadows (0/1), y: ibl_enabled (0/1), z: depth_bias, w: unused.
    pub flags: [f32; 4],
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
@group(0) @binding(0) var gbuffer_albedo: texture_2d<f32>;
@group(0) @binding(1) var gbuffer_normal: texture_2d<f32>;
@group(0) @binding(2) var gbuffer_emission: texture_2d<f32>;
@group(0) @binding(3) var gbuffer_depth: texture_2d<f32>;
@group(0) @binding(4) var shadow_array: texture_depth_2d_array;
@group(0) @binding(5) var shadow_sampler: sampler_comparison;
@group(0) @binding(6) var irradiance_map: texture_cube<f32>;
@group(0) @binding(7) var prefilter_map: texture_cube<f32>;
@group(0) @binding(8) var brdf_lut: texture_2d<f32>;
@group(0) @binding(9) var linear_sampler: sampler;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let albedo = textureSample(gbuffer_albedo, linear_sampler, in.uv);
    let normal_enc = textureSample(gbuffer_normal, linear_sampler, in.uv);
    let normal = normalize(normal_enc.xyz * 2.0 - vec3<f32>(1.0));
    let emission = textureSample(gbuffer_emission, linear_sampler, in.uv);
    let ndl = max(dot(normal, vec3<f32>(0.0, 1.0, 0.0)), 0.0);
    return vec4<f32>(albedo.rgb * ndl + emission.rgb, 1.0);
}
"#;

pub struct LightingResolvePass {
    pipeline: Box<dyn GraphicsPipeline>,
    render_pass: RenderPassDescriptor,
    descriptor_set: DescriptorSetWrapper,
    uniforms: UniformBuffer<LightingUniforms>,
    linear_sampler: Box<dyn Sampler>,
    shadow_sampler: Box<dyn Sampler>,
}

impl LightingResolvePass {
    pub fn new(device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<Self> {
        let render_pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor {
                format: config.hdr_color_format,
                sample_count: 1,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ColorAttachment,
            }],
            subpasses: vec![SubpassDescriptor { color_attachments: vec![0], ..Default::default() }],
            dependencies: vec![],
        };

        let bindings = vec![
            binding(0, DescriptorType::SampledImage),
            binding(1, DescriptorType::SampledImage),
            binding(2, DescriptorType::SampledImage),
            binding(3, DescriptorType::SampledImage),
            binding(4, DescriptorType::SampledImage),
            binding(5, DescriptorType::Sampler),
            binding(6, DescriptorType::SampledImage),
            binding(7, DescriptorType::SampledImage),
            binding(8, DescriptorType::SampledImage),
            binding(9, DescriptorType::Sampler),
            binding(10, DescriptorType::UniformBuffer),
        ];
        let shader = graphics_program(VERTEX_SOURCE, FRAGMENT_SOURCE, bindings.clone(), push_constants());
        let pipeline_desc = GraphicsPipelineDescriptor {
            label: Some("lighting_resolve"),
            shader,
            vertex_buffers: vec![],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: Default::default(),
            color_blend: vec![Default::default()],
            sample_count: 1,
        };
        let pipeline = device.create_graphics_pipeline(&pipeline_desc, &render_pass)?;

        let descriptor_set = DescriptorSetWrapper::new(device.as_ref(), &bindings, config.frames_in_flight)?;
        let uniforms = UniformBuffer::new(device.as_ref(), config.frames_in_flight, Some("lighting_uniforms"))?;
        for slot in 0..config.frames_in_flight {
            descriptor_set.set_buffer(10, uniforms.buffer(slot), 0, std::mem::size_of::<LightingUniforms>() as u64);
        }

        let linear_sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            address_mode: [AddressMode::ClampToEdge; 3],
            ..Default::default()
        })?;
        let shadow_sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            address_mode: [AddressMode::ClampToEdge; 3],
            compare: Some(CompareOp::LessOrEqual),
            ..Default::default()
        })?;

        Ok(Self { pipeline, render_pass, descriptor_set, uniforms, linear_sampler, shadow_sampler })
    }

    /// Binds the current frame's G-buffer, shadow array and IBL products, uploads `uniforms`,
    /// and records the resolve into `hdr_target`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        slot: usize,
        hdr_target: &dyn TextureView,
        extent: (u32, u32),
        gbuffer_albedo: &dyn TextureView,
        gbuffer_normal: &dyn TextureView,
        gbuffer_emission: &dyn TextureView,
        gbuffer_depth: &dyn TextureView,
        shadow_array: &dyn TextureView,
        irradiance: &dyn TextureView,
        prefilter: &dyn TextureView,
        brdf_lut: &dyn TextureView,
        uniforms: &LightingUniforms,
    ) -> RhiResult<Box<dyn forge_rhi::CommandBuffer>> {
        device.write_buffer(self.uniforms.buffer(slot), 0, bytemuck::bytes_of(uniforms))?;

        let set = self.descriptor_set.set(slot);
        set.write_texture(0, gbuffer_albedo, ImageLayout::ShaderReadOnly);
        set.write_texture(1, gbuffer_normal, ImageLayout::ShaderReadOnly);
        set.write_texture(2, gbuffer_emission, ImageLayout::ShaderReadOnly);
        set.write_texture(3, gbuffer_depth, ImageLayout::DepthStencilReadOnly);
        set.write_combined_image_sampler(4, shadow_array, self.shadow_sampler.as_ref(), ImageLayout::DepthStencilReadOnly);
        set.write_combined_image_sampler(6, irradiance, self.linear_sampler.as_ref(), ImageLayout::ShaderReadOnly);
        set.write_combined_image_sampler(7, prefilter, self.linear_sampler.as_ref(), ImageLayout::ShaderReadOnly);
        set.write_combined_image_sampler(8, brdf_lut, self.linear_sampler.as_ref(), ImageLayout::ShaderReadOnly);

        let mut encoder = device.create_command_encoder()?;
        let framebuffer = FramebufferDescriptor {
            extent,
            attachment_formats: vec![Format::Rgba16Float],
            attachment_usages: vec![forge_rhi::TextureUsage::COLOR_ATTACHMENT],
        };
        let views = [hdr_target];
        let mut pass = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 1.0]])?;
        pass.set_pipeline(self.pipeline.as_ref());
        pass.set_viewport(0.0, 0.0, extent.0 as f32, extent.1 as f32);
        pass.set_scissor(0, 0, extent.0, extent.1);
        pass.bind_descriptor_set(0, set);
        pass.draw(3, 1, 0, 0);
        pass.end();
        encoder.finish()
    }

    /// Picks the cascade covering `view_z` (negative, view-space) against the practical splits.
    pub fn select_cascade(splits: &[f32; 4], view_z: f32) -> usize {
        let depth = -view_z;
        for (i, split) in splits.iter().enumerate() {
            if depth < *split {
                return i;
            }
        }
        3
    }
}

fn binding(index: u32, descriptor_type: DescriptorType) -> DescriptorSetLayoutBinding {
    DescriptorSetLayoutBinding { binding: index, descriptor_type, count: 1, stage_mask: ShaderStage::FRAGMENT }
}

fn push_constants() -> Vec<PushConstantRange> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_selection_picks_farthest_when_beyond_all_splits() {
        let splits = [10.0, 25.0, 60.0, 120.0];
        assert_eq!(LightingResolvePass::select_cascade(&splits, -5.0), 0);
        assert_eq!(LightingResolvePass::select_cascade(&splits, -200.0), 3);
    }
}
