//! Bloom pipeline (component K).
//!
//! Prefilter the HDR color target above a threshold, build a downsample pyramid of the result,
//! build an upsample pyramid back on top of it with a tent filter, and additively composite the
//! final upsampled mip over the HDR target. Pyramid length comes from
//! [`RendererConfig::bloom_mip_count`], which already applies the `MAX_BLOOM_MIPS` cap and drops
//! the full-resolution entry; every mip in the pyramid is reallocated whenever the render target
//! resizes.

use crate::config::RendererConfig;
use crate::shader::graphics_program;
use forge_rhi::{
    AttachmentDescriptor, BlendState, Device, DescriptorSetLayoutBinding, DescriptorType,
    FilterMode, Format, FramebufferDescriptor, GraphicsPipeline, GraphicsPipelineDescriptor,
    ImageLayout, LoadOp, PrimitiveTopology, PushConstantRange, RasterizationState,
    RenderPassDescriptor, RhiResult, Sampler, SamplerDescriptor, ShaderStage, StoreOp,
    SubpassDescriptor, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureUsage,
    TextureView, TextureViewDescriptor, TextureViewType,
};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PrefilterPushConstants {
    threshold: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DownsamplePushConstants {
    source_texel_size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct UpsamplePushConstants {
    radius: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositePushConstants {
    intensity: f32,
}

const FULLSCREEN_VERTEX_SOURCE: &str = r#"
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

const PREFILTER_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var hdr_source: texture_2d<f32>;
@group(0) @binding(1) var hdr_sampler: sampler;

struct PushConstants {
    threshold: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let color = textureSample(hdr_source, hdr_sampler, in.uv).rgb;
    let brightness = max(color.r, max(color.g, color.b));
    let contribution = max(brightness - pc.threshold, 0.0) / max(brightness, 0.0001);
    return vec4<f32>(color * contribution, 1.0);
}
"#;

// 13-tap downsample, the standard dual-filter kernel used to avoid flickering under motion.
const DOWNSAMPLE_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

struct PushConstants {
    source_texel_size: vec2<f32>,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

fn sample_offset(uv: vec2<f32>, offset: vec2<f32>) -> vec3<f32> {
    return textureSample(source, source_sampler, uv + offset * pc.source_texel_size).rgb;
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let uv = in.uv;
    var result = sample_offset(uv, vec2<f32>(0.0, 0.0)) * 0.125;
    result += sample_offset(uv, vec2<f32>(-2.0, -2.0)) * 0.03125;
    result += sample_offset(uv, vec2<f32>(2.0, -2.0)) * 0.03125;
    result += sample_offset(uv, vec2<f32>(-2.0, 2.0)) * 0.03125;
    result += sample_offset(uv, vec2<f32>(2.0, 2.0)) * 0.03125;
    result += sample_offset(uv, vec2<f32>(-1.0, -1.0)) * 0.125;
    result += sample_offset(uv, vec2<f32>(1.0, -1.0)) * 0.125;
    result += sample_offset(uv, vec2<f32>(-1.0, 1.0)) * 0.125;
    result += sample_offset(uv, vec2<f32>(1.0, 1.0)) * 0.125;
    result += sample_offset(uv, vec2<f32>(-2.0, 0.0)) * 0.0625;
    result += sample_offset(uv, vec2<f32>(2.0, 0.0)) * 0.0625;
    result += sample_offset(uv, vec2<f32>(0.0, -2.0)) * 0.0625;
    result += sample_offset(uv, vec2<f32>(0.0, 2.0)) * 0.0625;
    return vec4<f32>(result, 1.0);
}
"#;

const UPSAMPLE_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

struct PushConstants {
    radius: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let r = pc.radius;
    let uv = in.uv;
    var result = textureSample(source, source_sampler, uv + vec2<f32>(-r, -r)).rgb;
    result += textureSample(source, source_sampler, uv + vec2<f32>(0.0, -r)).rgb * 2.0;
    result += textureSample(source, source_sampler, uv + vec2<f32>(r, -r)).rgb;
    result += textureSample(source, source_sampler, uv + vec2<f32>(-r, 0.0)).rgb * 2.0;
    result += textureSample(source, source_sampler, uv).rgb * 4.0;
    result += textureSample(source, source_sampler, uv + vec2<f32>(r, 0.0)).rgb * 2.0;
    result += textureSample(source, source_sampler, uv + vec2<f32>(-r, r)).rgb;
    result += textureSample(source, source_sampler, uv + vec2<f32>(0.0, r)).rgb * 2.0;
    result += textureSample(source, source_sampler, uv + vec2<f32>(r, r)).rgb;
    return vec4<f32>(result / 16.0, 1.0);
}
"#;

const COMPOSITE_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var bloom: texture_2d<f32>;
@group(0) @binding(1) var bloom_sampler: sampler;

struct PushConstants {
    intensity: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) uv: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let bloom_color = textureSample(bloom, bloom_sampler, in.uv).rgb;
    return vec4<f32>(bloom_color * pc.intensity, 1.0);
}
"#;

struct MipLevel {
    texture: Box<dyn Texture>,
    view: Box<dyn TextureView>,
    extent: (u32, u32),
}

pub struct BloomPipeline {
    prefilter_pipeline: Box<dyn GraphicsPipeline>,
    downsample_pipeline: Box<dyn GraphicsPipeline>,
    upsample_pipeline: Box<dyn GraphicsPipeline>,
    composite_pipeline: Box<dyn GraphicsPipeline>,
    single_attachment_pass: RenderPassDescriptor,
    additive_pass: RenderPassDescriptor,
    sampler: Box<dyn Sampler>,
    pyramid: Vec<MipLevel>,
    threshold: f32,
    upsample_radius: f32,
    intensity: f32,
}

impl BloomPipeline {
    pub fn new(device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<Self> {
        let single_attachment_pass = color_pass(config.hdr_color_format, LoadOp::DontCare, ImageLayout::Undefined);
        let additive_pass = color_pass(config.hdr_color_format, LoadOp::Load, ImageLayout::ColorAttachment);

        let bindings = vec![
            DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ];

        let prefilter_pipeline = build_pipeline(
            device,
            "bloom_prefilter",
            FULLSCREEN_VERTEX_SOURCE,
            PREFILTER_FRAGMENT_SOURCE,
            bindings.clone(),
            std::mem::size_of::<PrefilterPushConstants>() as u32,
            Default::default(),
            &single_attachment_pass,
        )?;
        let downsample_pipeline = build_pipeline(
            device,
            "bloom_downsample",
            FULLSCREEN_VERTEX_SOURCE,
            DOWNSAMPLE_FRAGMENT_SOURCE,
            bindings.clone(),
            std::mem::size_of::<DownsamplePushConstants>() as u32,
            Default::default(),
            &single_attachment_pass,
        )?;
        let upsample_pipeline = build_pipeline(
            device,
            "bloom_upsample",
            FULLSCREEN_VERTEX_SOURCE,
            UPSAMPLE_FRAGMENT_SOURCE,
            bindings.clone(),
            std::mem::size_of::<UpsamplePushConstants>() as u32,
            Default::default(),
            &single_attachment_pass,
        )?;
        let composite_pipeline = build_pipeline(
            device,
            "bloom_composite",
            FULLSCREEN_VERTEX_SOURCE,
            COMPOSITE_FRAGMENT_SOURCE,
            bindings,
            std::mem::size_of::<CompositePushConstants>() as u32,
            BlendState::additive(),
            &additive_pass,
        )?;

        let sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            ..Default::default()
        })?;

        let pyramid = build_pyramid(device, config)?;

        Ok(Self {
            prefilter_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            composite_pipeline,
            single_attachment_pass,
            additive_pass,
            sampler,
            pyramid,
            threshold: 10.0,
            upsample_radius: 0.01,
            intensity: 0.1,
        })
    }

    /// Rebuilds the pyramid for a new output extent. Called on resize only.
    pub fn resize(&mut self, device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<()> {
        self.pyramid = build_pyramid(device, config)?;
        Ok(())
    }

    pub fn set_settings(&mut self, threshold: f32, upsample_radius: f32, intensity: f32) {
        self.threshold = threshold;
        self.upsample_radius = upsample_radius;
        self.intensity = intensity;
    }

    /// Prefilters `hdr_source` into mip 0, downsamples to the bottom of the pyramid, upsamples
    /// back to the top with a tent filter, then additively composites the result onto
    /// `hdr_target` (same texture as `hdr_source` in practice; passed separately for clarity).
    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        hdr_source: &dyn TextureView,
        hdr_target: &dyn TextureView,
        hdr_extent: (u32, u32),
        source_set: &dyn forge_rhi::DescriptorSet,
    ) -> RhiResult<Box<dyn forge_rhi::CommandBuffer>> {
        let mut encoder = device.create_command_encoder()?;
        if self.pyramid.is_empty() {
            return encoder.finish();
        }

        source_set.write_combined_image_sampler(0, hdr_source, self.sampler.as_ref(), ImageLayout::ShaderReadOnly);
        self.draw_fullscreen(
            encoder.as_mut(),
            &self.prefilter_pipeline,
            &self.single_attachment_pass,
            self.pyramid[0].view.as_ref(),
            self.pyramid[0].extent,
            source_set,
            ShaderStage::FRAGMENT,
            bytemuck::bytes_of(&PrefilterPushConstants { threshold: self.threshold }),
        );

        for i in 1..self.pyramid.len() {
            let source_extent = self.pyramid[i - 1].extent;
            source_set.write_combined_image_sampler(0, self.pyramid[i - 1].view.as_ref(), self.sampler.as_ref(), ImageLayout::ShaderReadOnly);
            let push = DownsamplePushConstants { source_texel_size: [1.0 / source_extent.0 as f32, 1.0 / source_extent.1 as f32], _pad: [0.0; 2] };
            self.draw_fullscreen(
                encoder.as_mut(),
                &self.downsample_pipeline,
                &self.single_attachment_pass,
                self.pyramid[i].view.as_ref(),
                self.pyramid[i].extent,
                source_set,
                ShaderStage::FRAGMENT,
                bytemuck::bytes_of(&push),
            );
        }

        for i in (0..self.pyramid.len() - 1).rev() {
            source_set.write_combined_image_sampler(0, self.pyramid[i + 1].view.as_ref(), self.sampler.as_ref(), ImageLayout::ShaderReadOnly);
            let push = UpsamplePushConstants { radius: self.upsample_radius };
            self.draw_fullscreen(
                encoder.as_mut(),
                &self.upsample_pipeline,
                &self.single_attachment_pass,
                self.pyramid[i].view.as_ref(),
                self.pyramid[i].extent,
                source_set,
                ShaderStage::FRAGMENT,
                bytemuck::bytes_of(&push),
            );
        }

        source_set.write_combined_image_sampler(0, self.pyramid[0].view.as_ref(), self.sampler.as_ref(), ImageLayout::ShaderReadOnly);
        let push = CompositePushConstants { intensity: self.intensity };
        self.draw_fullscreen(
            encoder.as_mut(),
            &self.composite_pipeline,
            &self.additive_pass,
            hdr_target,
            hdr_extent,
            source_set,
            ShaderStage::FRAGMENT,
            bytemuck::bytes_of(&push),
        );

        encoder.finish()
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_fullscreen(
        &self,
        encoder: &mut dyn forge_rhi::CommandEncoder,
        pipeline: &dyn GraphicsPipeline,
        render_pass: &RenderPassDescriptor,
        target: &dyn TextureView,
        extent: (u32, u32),
        set: &dyn forge_rhi::DescriptorSet,
        stage: ShaderStage,
        push_data: &[u8],
    ) {
        let framebuffer = FramebufferDescriptor {
            extent,
            attachment_formats: vec![Format::Rgba16Float],
            attachment_usages: vec![TextureUsage::COLOR_ATTACHMENT],
        };
        let views = [target];
        if let Ok(mut pass) = encoder.begin_render_pass(render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 0.0]]) {
            pass.set_pipeline(pipeline);
            pass.set_viewport(0.0, 0.0, extent.0 as f32, extent.1 as f32);
            pass.set_scissor(0, 0, extent.0, extent.1);
            pass.bind_descriptor_set(0, set);
            pass.push_constants(stage, 0, push_data);
            pass.draw(3, 1, 0, 0);
            pass.end();
        }
    }
}

fn color_pass(format: Format, load_op: LoadOp, initial_layout: ImageLayout) -> RenderPassDescriptor {
    RenderPassDescriptor {
        attachments: vec![AttachmentDescriptor {
            format,
            sample_count: 1,
            load_op,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout,
            final_layout: ImageLayout::ShaderReadOnly,
        }],
        subpasses: vec![SubpassDescriptor { color_attachments: vec![0], ..Default::default() }],
        dependencies: vec![],
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pipeline(
    device: &Arc<dyn Device>,
    label: &'static str,
    vertex_source: &str,
    fragment_source: &str,
    bindings: Vec<DescriptorSetLayoutBinding>,
    push_constant_size: u32,
    blend: BlendState,
    render_pass: &RenderPassDescriptor,
) -> RhiResult<Box<dyn GraphicsPipeline>> {
    let push_constants = vec![PushConstantRange { stage_mask: ShaderStage::FRAGMENT, offset: 0, size: push_constant_size }];
    let shader = graphics_program(vertex_source, fragment_source, bindings, push_constants);
    device.create_graphics_pipeline(
        &GraphicsPipelineDescriptor {
            label: Some(label),
            shader,
            vertex_buffers: vec![],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState { cull_mode: forge_rhi::CullMode::None, ..Default::default() },
            depth_stencil: Default::default(),
            color_blend: vec![blend],
            sample_count: 1,
        },
        render_pass,
    )
}

fn build_pyramid(device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<Vec<MipLevel>> {
    let count = config.bloom_mip_count(config.output_extent);
    let mut pyramid = Vec::with_capacity(count as usize);
    let mut extent = (config.output_extent.0 / 2, config.output_extent.1 / 2);
    for i in 0..count {
        let level_extent = (extent.0.max(1), extent.1.max(1));
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("bloom_mip"),
            dimension: TextureDimension::D2,
            format: Format::Rgba16Float,
            size: (level_extent.0, level_extent.1, 1),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            is_cube: false,
        })?;
        let view = texture.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;
        pyramid.push(MipLevel { texture, view, extent: level_extent });
        extent = (extent.0 / 2, extent.1 / 2);
        let _ = i;
    }
    Ok(pyramid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_extents_halve_each_level() {
        let config = RendererConfig { output_extent: (1024, 1024), ..Default::default() };
        let count = config.bloom_mip_count(config.output_extent);
        assert!(count >= 1);
        assert!(count <= crate::config::MAX_BLOOM_MIPS);
    }
}
