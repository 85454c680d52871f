//! G-buffer pass (component H).
//!
//! Writes albedo, view-space normal, emission, entity id and depth in one subpass. Per-draw
//! material parameters travel as push constants rather than a dynamically-offset UBO: the RHI's
//! `bind_descriptor_set` takes a whole set with no per-draw offset, so a UBO would need one
//! descriptor set per draw per frame, which the bucketed descriptor-pool cache (component C) is
//! not sized for. Push constants carry the same four scalars/vectors at a fraction of the cost.
//! Binding 0 stays the one thing that *is* a descriptor set: the default white texture used when
//! a material declares no albedo map.

use crate::config::RendererConfig;
use crate::material::AssetId;
use crate::mesh::{DrawItem, Vertex};
use crate::shader::graphics_program;
use forge_rhi::{
    AddressMode, AttachmentDescriptor, BlendState, CompareOp, CullMode, DepthStencilState,
    DescriptorSetLayoutBinding, DescriptorType, Device, FilterMode, Format, FramebufferDescriptor,
    FrontFace, GraphicsPipeline, GraphicsPipelineDescriptor, ImageLayout, LoadOp,
    PrimitiveTopology, PushConstantRange, RasterizationState, RenderPassDescriptor, RhiResult,
    Sampler, SamplerDescriptor, ShaderStage, StoreOp, SubpassDescriptor, Texture, TextureAspect,
    TextureDescriptor, TextureDimension, TextureUsage, TextureView, TextureViewDescriptor,
    TextureViewType,
};
use forge_rhi::wrappers::DescriptorSetWrapper;
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PushConstants {
    world_view_proj: [f32; 16],
    world: [f32; 16],
    albedo: [f32; 4],
    emission_metallic: [f32; 4],
    roughness_tiling: [f32; 4],
    entity_id: i32,
    _pad: [i32; 3],
}

const VERTEX_SOURCE: &str = r#"
struct PushConstants {
    world_view_proj: mat4x4<f32>,
    world: mat4x4<f32>,
}
var<push_constant> pc: PushConstants;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexIn) -> VertexOut {
    var out: VertexOut;
    out.clip_position = pc.world_view_proj * vec4<f32>(in.position, 1.0);
    out.world_normal = normalize((pc.world * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}
"#;

const FRAGMENT_SOURCE: &str = r#"
struct MaterialConstants {
    world_view_proj: mat4x4<f32>,
    world: mat4x4<f32>,
    albedo: vec4<f32>,
    emission_metallic: vec4<f32>,
    roughness_tiling: vec4<f32>,
}
var<push_constant> pc: MaterialConstants;

@group(0) @binding(0) var albedo_tex: texture_2d<f32>;
@group(0) @binding(1) var albedo_sampler: sampler;

struct FragmentIn {
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct FragmentOut {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) emission: vec4<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> FragmentOut {
    var out: FragmentOut;
    let tex = textureSample(albedo_tex, albedo_sampler, in.uv * pc.roughness_tiling.y);
    out.albedo = vec4<f32>(tex.rgb * pc.albedo.rgb, pc.emission_metallic.w);
    out.normal = vec4<f32>(normalize(in.world_normal) * 0.5 + vec3<f32>(0.5), pc.roughness_tiling.x);
    out.emission = vec4<f32>(pc.emission_metallic.rgb, 1.0);
    return out;
}
"#;

pub struct GBuffer {
    pub albedo: Box<dyn Texture>,
    pub normal: Box<dyn Texture>,
    pub emission: Box<dyn Texture>,
    pub entity_id: Box<dyn Texture>,
    pub depth: Box<dyn Texture>,
    albedo_view: Box<dyn TextureView>,
    normal_view: Box<dyn TextureView>,
    emission_view: Box<dyn TextureView>,
    entity_id_view: Box<dyn TextureView>,
    depth_view: Box<dyn TextureView>,
}

impl GBuffer {
    pub fn new(device: &Arc<dyn Device>, extent: (u32, u32)) -> RhiResult<Self> {
        let make = |label, format, usage| {
            device.create_texture(&TextureDescriptor {
                label: Some(label),
                dimension: TextureDimension::D2,
                format,
                size: (extent.0, extent.1, 1),
                mip_count: 1,
                sample_count: 1,
                usage,
                is_cube: false,
            })
        };
        let color_usage = TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED;
        let albedo = make("gbuffer_albedo", Format::Rgba8Unorm, color_usage)?;
        let normal = make("gbuffer_normal", Format::Rgba16Float, color_usage)?;
        let emission = make("gbuffer_emission", Format::Rgba16Float, color_usage)?;
        let entity_id = make("gbuffer_entity_id", Format::R32Sint, color_usage)?;
        let depth = make("gbuffer_depth", Format::D32Float, TextureUsage::DEPTH_ATTACHMENT | TextureUsage::SAMPLED)?;

        let view_desc_color = TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        let view_desc_depth = TextureViewDescriptor { aspect: TextureAspect::DEPTH, ..view_desc_color };

        Ok(Self {
            albedo_view: albedo.create_view(&view_desc_color)?,
            normal_view: normal.create_view(&view_desc_color)?,
            emission_view: emission.create_view(&view_desc_color)?,
            entity_id_view: entity_id.create_view(&view_desc_color)?,
            depth_view: depth.create_view(&view_desc_depth)?,
            albedo,
            normal,
            emission,
            entity_id,
            depth,
        })
    }

    pub fn albedo_view(&self) -> &dyn TextureView {
        self.albedo_view.as_ref()
    }
    pub fn normal_view(&self) -> &dyn TextureView {
        self.normal_view.as_ref()
    }
    pub fn emission_view(&self) -> &dyn TextureView {
        self.emission_view.as_ref()
    }
    pub fn entity_id_view(&self) -> &dyn TextureView {
        self.entity_id_view.as_ref()
    }
    pub fn depth_view(&self) -> &dyn TextureView {
        self.depth_view.as_ref()
    }
    pub fn entity_id_texture(&self) -> &dyn Texture {
        self.entity_id.as_ref()
    }
}

pub struct GBufferPass {
    pipeline: Box<dyn GraphicsPipeline>,
    render_pass: RenderPassDescriptor,
    descriptor_set: DescriptorSetWrapper,
    white_texture: Box<dyn Texture>,
    _white_view: Box<dyn TextureView>,
    _sampler: Box<dyn Sampler>,
}

impl GBufferPass {
    pub fn new(device: &Arc<dyn Device>, _config: &RendererConfig) -> RhiResult<Self> {
        let render_pass = RenderPassDescriptor {
            attachments: vec![
                color_attachment(Format::Rgba8Unorm),
                color_attachment(Format::Rgba16Float),
                color_attachment(Format::Rgba16Float),
                color_attachment(Format::R32Sint),
                AttachmentDescriptor {
                    format: Format::D32Float,
                    sample_count: 1,
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::Undefined,
                    final_layout: ImageLayout::DepthStencilReadOnly,
                },
            ],
            subpasses: vec![SubpassDescriptor {
                color_attachments: vec![0, 1, 2, 3],
                depth_stencil_attachment: Some(4),
                ..Default::default()
            }],
            dependencies: vec![],
        };

        let bindings = vec![
            DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ];
        let push_constants = vec![PushConstantRange {
            stage_mask: ShaderStage::VERTEX | ShaderStage::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<PushConstants>() as u32,
        }];
        let shader = graphics_program(VERTEX_SOURCE, FRAGMENT_SOURCE, bindings.clone(), push_constants);

        let pipeline_desc = GraphicsPipelineDescriptor {
            label: Some("gbuffer"),
            shader,
            vertex_buffers: vec![Vertex::buffer_layout()],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState { cull_mode: CullMode::Back, front_face: FrontFace::CounterClockwise, ..Default::default() },
            depth_stencil: DepthStencilState { depth_test: true, depth_write: true, depth_compare: CompareOp::Less },
            color_blend: vec![BlendState::default(); 4],
            sample_count: 1,
        };
        let pipeline = device.create_graphics_pipeline(&pipeline_desc, &render_pass)?;

        let white_texture = device.create_texture(&TextureDescriptor {
            label: Some("default_white"),
            dimension: TextureDimension::D2,
            format: Format::Rgba8Unorm,
            size: (1, 1, 1),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            is_cube: false,
        })?;
        device.immediate_execute(&mut |encoder| {
            let staging = device.create_buffer(&forge_rhi::BufferDescriptor {
                label: Some("white_staging"),
                size: 4,
                usage: forge_rhi::BufferUsage::TRANSFER_SRC,
                memory: forge_rhi::BufferMemoryPreference::HostVisibleSequential,
            });
            if let Ok(staging) = staging {
                let _ = device.write_buffer(staging.as_ref(), 0, &[255u8, 255, 255, 255]);
                encoder.pipeline_barrier_texture(white_texture.as_ref(), ImageLayout::Undefined, ImageLayout::TransferDst);
                encoder.copy_buffer_to_texture(staging.as_ref(), 0, white_texture.as_ref(), 0, 0);
                encoder.pipeline_barrier_texture(white_texture.as_ref(), ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
            }
        })?;
        let white_view = white_texture.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;
        let sampler = device.create_sampler(&SamplerDescriptor {
            address_mode: [AddressMode::Repeat, AddressMode::Repeat, AddressMode::Repeat],
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            ..Default::default()
        })?;

        let descriptor_set = DescriptorSetWrapper::new(device.as_ref(), &bindings, 1)?;
        descriptor_set.set_combined_image_sampler(0, white_view.as_ref(), sampler.as_ref(), ImageLayout::ShaderReadOnly);

        Ok(Self { pipeline, render_pass, descriptor_set, white_texture, _white_view: white_view, _sampler: sampler })
    }

    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        gbuffer: &GBuffer,
        draw_items: &[&DrawItem],
        view_proj: glam::Mat4,
        sentinel: i32,
    ) -> RhiResult<Box<dyn forge_rhi::CommandBuffer>> {
        let mut encoder = device.create_command_encoder()?;
        let (w, h) = (gbuffer.albedo.size().0, gbuffer.albedo.size().1);
        let framebuffer = FramebufferDescriptor {
            extent: (w, h),
            attachment_formats: vec![Format::Rgba8Unorm, Format::Rgba16Float, Format::Rgba16Float, Format::R32Sint, Format::D32Float],
            attachment_usages: vec![
                TextureUsage::COLOR_ATTACHMENT,
                TextureUsage::COLOR_ATTACHMENT,
                TextureUsage::COLOR_ATTACHMENT,
                TextureUsage::COLOR_ATTACHMENT,
                TextureUsage::DEPTH_ATTACHMENT,
            ],
        };
        let views = [
            gbuffer.albedo_view.as_ref(),
            gbuffer.normal_view.as_ref(),
            gbuffer.emission_view.as_ref(),
            gbuffer.entity_id_view.as_ref(),
            gbuffer.depth_view.as_ref(),
        ];
        let clear = [
            [0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [sentinel as f32, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        ];
        let mut pass = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &clear)?;
        pass.set_pipeline(self.pipeline.as_ref());
        pass.set_viewport(0.0, 0.0, w as f32, h as f32);
        pass.set_scissor(0, 0, w, h);
        pass.bind_descriptor_set(0, self.descriptor_set.set(0));
        for item in draw_items {
            let world = glam::Mat4::from_cols_array(&item.world_matrix);
            let push = PushConstants {
                world_view_proj: (view_proj * world).to_cols_array(),
                world: world.to_cols_array(),
                albedo: [1.0, 1.0, 1.0, 1.0],
                emission_metallic: [0.0, 0.0, 0.0, 0.0],
                roughness_tiling: [0.5, 1.0, 0.0, 0.0],
                entity_id: item.entity_id,
                _pad: [0; 3],
            };
            pass.push_constants(ShaderStage::VERTEX | ShaderStage::FRAGMENT, 0, bytemuck::bytes_of(&push));
            pass.set_vertex_buffer(0, item.vertex_buffer.as_ref(), 0);
            pass.set_index_buffer(item.index_buffer.as_ref(), 0);
            pass.draw_indexed(item.index_count, 1, 0, 0, 0);
        }
        pass.end();
        encoder.finish()
    }

    /// `AssetId` is resolved through the host's asset registry elsewhere; this pass only ever
    /// binds the built-in white texture today (no per-material texture table yet).
    pub fn default_material(&self) -> AssetId {
        AssetId(1)
    }
}

fn color_attachment(format: Format) -> AttachmentDescriptor {
    AttachmentDescriptor {
        format,
        sample_count: 1,
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        stencil_load_op: LoadOp::DontCare,
        stencil_store_op: StoreOp::DontCare,
        initial_layout: ImageLayout::Undefined,
        final_layout: ImageLayout::ShaderReadOnly,
    }
}
