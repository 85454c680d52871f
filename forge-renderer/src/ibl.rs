//! IBL precompute (component F).
//!
//! Equirectangular environment -> cube (2048^2, full mip chain) -> irradiance convolution
//! (32^2, 1 mip) -> GGX prefilter (256^2, 5 mips) -> split-sum BRDF LUT (512^2). Everything here
//! runs exactly once per loaded environment, inside a single `immediate_execute` block, and all
//! four cube-face stages share one render-pass definition (single color attachment, no depth) —
//! only the attachment format and the framebuffer extent change per stage.
//!
//! The prefilter pass's five mips are recorded as five sequential draws with roughness computed
//! per iteration (`mip / (mip_count - 1)`) rather than one `instance_count = 5` draw selecting
//! roughness from `gl_InstanceIndex` and writing to a mip via multiview: the RHI's render pass
//! takes one explicit view per attachment with no layer/mip fan-out, so there is no single draw
//! call that could target five mip levels at once. Output is identical.

use crate::config::RendererConfig;
use crate::shader::graphics_program;
use forge_rhi::{
    AddressMode, AttachmentDescriptor, Device, DescriptorSetLayoutBinding, DescriptorType,
    FilterMode, Format, FramebufferDescriptor, GraphicsPipeline, GraphicsPipelineDescriptor,
    ImageLayout, LoadOp, PrimitiveTopology, PushConstantRange, RasterizationState,
    RenderPassDescriptor, RhiResult, Sampler, SamplerDescriptor, ShaderStage, StoreOp,
    SubpassDescriptor, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureUsage,
    TextureView, TextureViewDescriptor, TextureViewType,
};
use glam::{Mat4, Vec3};
use std::sync::Arc;

pub const CUBE_FACE_COUNT: u32 = 6;
pub const CUBE_RESOLUTION: u32 = 2048;
pub const IRRADIANCE_RESOLUTION: u32 = 32;
pub const PREFILTER_RESOLUTION: u32 = 256;
pub const PREFILTER_MIP_COUNT: u32 = 5;
pub const BRDF_LUT_RESOLUTION: u32 = 512;

/// The six cube-face view directions, matching the Vulkan cubemap face order.
fn face_view(face: u32) -> Mat4 {
    let (eye, target, up) = match face {
        0 => (Vec3::ZERO, Vec3::X, Vec3::NEG_Y),
        1 => (Vec3::ZERO, Vec3::NEG_X, Vec3::NEG_Y),
        2 => (Vec3::ZERO, Vec3::Y, Vec3::Z),
        3 => (Vec3::ZERO, Vec3::NEG_Y, Vec3::NEG_Z),
        4 => (Vec3::ZERO, Vec3::Z, Vec3::NEG_Y),
        _ => (Vec3::ZERO, Vec3::NEG_Z, Vec3::NEG_Y),
    };
    Mat4::look_at_rh(eye, target, up)
}

fn cube_projection() -> Mat4 {
    Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0)
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FacePushConstants {
    inv_view_proj: [f32; 16],
    roughness: f32,
    _pad: [f32; 3],
}

const EQUIRECT_VERTEX_SOURCE: &str = fullscreen_vertex_source();
const IRRADIANCE_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var environment: texture_cube<f32>;
@group(0) @binding(1) var environment_sampler: sampler;

struct PushConstants {
    inv_view_proj: mat4x4<f32>,
    roughness: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) ndc: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let far = pc.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let normal = normalize(far.xyz / far.w);
    var up = vec3<f32>(0.0, 1.0, 0.0);
    if (abs(normal.y) > 0.99) {
        up = vec3<f32>(1.0, 0.0, 0.0);
    }
    let tangent = normalize(cross(up, normal));
    let bitangent = cross(normal, tangent);

    var irradiance = vec3<f32>(0.0);
    var samples = 0.0;
    let delta = 0.075;
    var phi = 0.0;
    loop {
        if (phi >= 6.28318) { break; }
        var theta = 0.0;
        loop {
            if (theta >= 1.5708) { break; }
            let tangent_sample = vec3<f32>(sin(theta) * cos(phi), sin(theta) * sin(phi), cos(theta));
            let sample_dir = tangent_sample.x * tangent + tangent_sample.y * bitangent + tangent_sample.z * normal;
            irradiance += textureSample(environment, environment_sampler, sample_dir).rgb * cos(theta) * sin(theta);
            samples += 1.0;
            theta += delta;
        }
        phi += delta;
    }
    irradiance = irradiance * 3.14159265 / samples;
    return vec4<f32>(irradiance, 1.0);
}
"#;

const PREFILTER_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var environment: texture_cube<f32>;
@group(0) @binding(1) var environment_sampler: sampler;

struct PushConstants {
    inv_view_proj: mat4x4<f32>,
    roughness: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) ndc: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let far = pc.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let normal = normalize(far.xyz / far.w);
    // GGX importance sample count kept small; this runs once at load time, not per frame.
    var color = vec3<f32>(0.0);
    var total_weight = 0.0;
    let sample_count = 16u;
    for (var i = 0u; i < sample_count; i = i + 1u) {
        let xi = vec2<f32>(f32(i) / f32(sample_count), fract(f32(i) * 0.618034));
        let a = pc.roughness * pc.roughness;
        let phi = 6.28318 * xi.x;
        let cos_theta = sqrt((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y));
        let sin_theta = sqrt(1.0 - cos_theta * cos_theta);
        var up = vec3<f32>(0.0, 1.0, 0.0);
        if (abs(normal.y) > 0.99) {
            up = vec3<f32>(1.0, 0.0, 0.0);
        }
        let tangent = normalize(cross(up, normal));
        let bitangent = cross(normal, tangent);
        let half_local = vec3<f32>(sin_theta * cos(phi), sin_theta * sin(phi), cos_theta);
        let half_vec = half_local.x * tangent + half_local.y * bitangent + half_local.z * normal;
        let sample_dir = 2.0 * dot(normal, half_vec) * half_vec - normal;
        let ndl = max(dot(normal, sample_dir), 0.0);
        color += textureSample(environment, environment_sampler, sample_dir).rgb * ndl;
        total_weight += ndl;
    }
    return vec4<f32>(color / max(total_weight, 0.001), 1.0);
}
"#;

const BRDF_FRAGMENT_SOURCE: &str = r#"
struct FragmentIn {
    @location(0) ndc: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let uv = in.ndc * 0.5 + vec2<f32>(0.5);
    let ndv = max(uv.x, 0.001);
    let roughness = max(uv.y, 0.001);
    let a = roughness * roughness;
    let k = (a * a) / 2.0;
    let g = ndv / (ndv * (1.0 - k) + k);
    let bias = pow(1.0 - ndv, 5.0) * (1.0 - roughness);
    let scale = g - bias;
    return vec4<f32>(scale, bias, 0.0, 1.0);
}
"#;

const EQUIRECT_FRAGMENT_SOURCE: &str = r#"
@group(0) @binding(0) var equirect: texture_2d<f32>;
@group(0) @binding(1) var equirect_sampler: sampler;

struct PushConstants {
    inv_view_proj: mat4x4<f32>,
    roughness: f32,
}
var<push_constant> pc: PushConstants;

struct FragmentIn {
    @location(0) ndc: vec2<f32>,
}

@fragment
fn fs_main(in: FragmentIn) -> @location(0) vec4<f32> {
    let far = pc.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w);
    let u = atan2(dir.z, dir.x) / (2.0 * 3.14159265) + 0.5;
    let v = acos(clamp(dir.y, -1.0, 1.0)) / 3.14159265;
    return textureSample(equirect, equirect_sampler, vec2<f32>(u, v));
}
"#;

const fn fullscreen_vertex_source() -> &'static str {
    r#"
struct PushConstants {
    inv_view_proj: mat4x4<f32>,
    roughness: f32,
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
    out.clip_position = vec4<f32>(out.ndc, 0.0, 1.0);
    return out;
}
"#
}

/// The four products a loaded environment resolves to: the base cube (also sampled directly by
/// the sky pass), its diffuse irradiance convolution, its GGX-prefiltered specular mips, and the
/// shared BRDF integration LUT.
pub struct EnvironmentCube {
    pub cube: Box<dyn Texture>,
    pub cube_view: Box<dyn TextureView>,
    pub irradiance: Box<dyn Texture>,
    pub irradiance_view: Box<dyn TextureView>,
    pub prefilter: Box<dyn Texture>,
    pub prefilter_view: Box<dyn TextureView>,
    pub brdf_lut: Box<dyn Texture>,
    pub brdf_lut_view: Box<dyn TextureView>,
}

pub struct IblPrecompute {
    render_pass: RenderPassDescriptor,
    equirect_pipeline: Box<dyn GraphicsPipeline>,
    irradiance_pipeline: Box<dyn GraphicsPipeline>,
    prefilter_pipeline: Box<dyn GraphicsPipeline>,
    brdf_pipeline: Box<dyn GraphicsPipeline>,
    sampler: Box<dyn Sampler>,
}

impl IblPrecompute {
    pub fn new(device: &Arc<dyn Device>, _config: &RendererConfig) -> RhiResult<Self> {
        let render_pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor {
                format: Format::Rgba16Float,
                sample_count: 1,
                load_op: LoadOp::DontCare,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ShaderReadOnly,
            }],
            subpasses: vec![SubpassDescriptor { color_attachments: vec![0], ..Default::default() }],
            dependencies: vec![],
        };

        let bindings = vec![
            DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ];
        let push_constants = vec![PushConstantRange { stage_mask: ShaderStage::VERTEX | ShaderStage::FRAGMENT, offset: 0, size: std::mem::size_of::<FacePushConstants>() as u32 }];

        let make_pipeline = |label, fragment_source: &str| -> RhiResult<Box<dyn GraphicsPipeline>> {
            let shader = graphics_program(EQUIRECT_VERTEX_SOURCE, fragment_source, bindings.clone(), push_constants.clone());
            device.create_graphics_pipeline(
                &GraphicsPipelineDescriptor {
                    label: Some(label),
                    shader,
                    vertex_buffers: vec![],
                    topology: PrimitiveTopology::TriangleList,
                    rasterization: RasterizationState { cull_mode: forge_rhi::CullMode::None, ..Default::default() },
                    depth_stencil: Default::default(),
                    color_blend: vec![Default::default()],
                    sample_count: 1,
                },
                &render_pass,
            )
        };

        let equirect_pipeline = make_pipeline("ibl_equirect_to_cube", EQUIRECT_FRAGMENT_SOURCE)?;
        let irradiance_pipeline = make_pipeline("ibl_irradiance", IRRADIANCE_FRAGMENT_SOURCE)?;
        let prefilter_pipeline = make_pipeline("ibl_prefilter", PREFILTER_FRAGMENT_SOURCE)?;
        let brdf_pipeline = make_pipeline("ibl_brdf_lut", BRDF_FRAGMENT_SOURCE)?;

        let sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            mip_filter: FilterMode::Linear,
            address_mode: [AddressMode::ClampToEdge; 3],
            ..Default::default()
        })?;

        Ok(Self { render_pass, equirect_pipeline, irradiance_pipeline, prefilter_pipeline, brdf_pipeline, sampler })
    }

    /// Runs the full F-stage pipeline once against an already-uploaded equirectangular texture,
    /// blocking until the GPU finishes (component D `immediate_execute`).
    pub fn precompute(
        &self,
        device: &Arc<dyn Device>,
        equirect: &dyn TextureView,
        equirect_set: &dyn forge_rhi::DescriptorSet,
    ) -> RhiResult<EnvironmentCube> {
        let cube = create_cube(device, "ibl_cube", CUBE_RESOLUTION, forge_rhi::max_mip_count(CUBE_RESOLUTION, CUBE_RESOLUTION))?;
        let irradiance = create_cube(device, "ibl_irradiance", IRRADIANCE_RESOLUTION, 1)?;
        let prefilter = create_cube(device, "ibl_prefilter", PREFILTER_RESOLUTION, PREFILTER_MIP_COUNT)?;
        let brdf_lut = device.create_texture(&TextureDescriptor {
            label: Some("ibl_brdf_lut"),
            dimension: TextureDimension::D2,
            format: Format::Rgba16Float,
            size: (BRDF_LUT_RESOLUTION, BRDF_LUT_RESOLUTION, 1),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            is_cube: false,
        })?;

        let cube_view = cube_view(cube.as_ref())?;
        let irradiance_view = cube_view(irradiance.as_ref())?;
        let prefilter_view = cube_view(prefilter.as_ref())?;
        let brdf_lut_view = brdf_lut.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;

        let cube_set_layout = device.create_descriptor_set_layout(&[
            forge_rhi::DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
            forge_rhi::DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
        ])?;
        let cube_set_pool = device.create_descriptor_pool(cube_set_layout.bindings())?;
        let cube_set = cube_set_pool.allocate(cube_set_layout.as_ref())?;
        cube_set.write_combined_image_sampler(0, cube_view.as_ref(), self.sampler.as_ref(), ImageLayout::ShaderReadOnly);

        device.immediate_execute(&mut |encoder| {
            self.draw_cube_faces(encoder, cube.as_ref(), CUBE_RESOLUTION, 0, self.equirect_pipeline.as_ref(), equirect_set, 0.0);
            encoder.pipeline_barrier_texture(cube.as_ref(), ImageLayout::ShaderReadOnly, ImageLayout::TransferDst);
            encoder.generate_mipmaps(cube.as_ref());
            encoder.pipeline_barrier_texture(cube.as_ref(), ImageLayout::TransferSrc, ImageLayout::ShaderReadOnly);
            self.draw_cube_faces(encoder, irradiance.as_ref(), IRRADIANCE_RESOLUTION, 0, self.irradiance_pipeline.as_ref(), cube_set.as_ref(), 0.0);
            for mip in 0..PREFILTER_MIP_COUNT {
                let resolution = (PREFILTER_RESOLUTION >> mip).max(1);
                let roughness = mip as f32 / (PREFILTER_MIP_COUNT - 1).max(1) as f32;
                self.draw_cube_faces(encoder, prefilter.as_ref(), resolution, mip, self.prefilter_pipeline.as_ref(), cube_set.as_ref(), roughness);
            }
            self.draw_brdf_lut(encoder, brdf_lut.as_ref(), &brdf_lut_view);
        })?;

        Ok(EnvironmentCube { cube, cube_view, irradiance, irradiance_view, prefilter, prefilter_view, brdf_lut, brdf_lut_view })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_cube_faces(
        &self,
        encoder: &mut dyn forge_rhi::CommandEncoder,
        target: &dyn Texture,
        resolution: u32,
        mip: u32,
        pipeline: &dyn GraphicsPipeline,
        source_set: &dyn forge_rhi::DescriptorSet,
        roughness: f32,
    ) {
        for face in 0..CUBE_FACE_COUNT {
            let view = match target.create_view(&TextureViewDescriptor {
                view_type: TextureViewType::D2,
                aspect: TextureAspect::COLOR,
                base_mip: mip,
                mip_count: 1,
                base_layer: face,
                layer_count: 1,
            }) {
                Ok(view) => view,
                Err(_) => continue,
            };
            let framebuffer = FramebufferDescriptor {
                extent: (resolution, resolution),
                attachment_formats: vec![Format::Rgba16Float],
                attachment_usages: vec![TextureUsage::COLOR_ATTACHMENT],
            };
            let views = [view.as_ref()];
            let pass_result = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 0.0]]);
            let mut pass = match pass_result {
                Ok(pass) => pass,
                Err(_) => continue,
            };
            let inv_view_proj = (cube_projection() * face_view(face)).inverse();
            let push = FacePushConstants { inv_view_proj: inv_view_proj.to_cols_array(), roughness, _pad: [0.0; 3] };
            pass.set_pipeline(pipeline);
            pass.set_viewport(0.0, 0.0, resolution as f32, resolution as f32);
            pass.set_scissor(0, 0, resolution, resolution);
            pass.bind_descriptor_set(0, source_set);
            pass.push_constants(ShaderStage::VERTEX | ShaderStage::FRAGMENT, 0, bytemuck::bytes_of(&push));
            pass.draw(3, 1, 0, 0);
            pass.end();
        }
    }

    fn draw_brdf_lut(&self, encoder: &mut dyn forge_rhi::CommandEncoder, _target: &dyn Texture, view: &dyn TextureView) {
        let framebuffer = FramebufferDescriptor {
            extent: (BRDF_LUT_RESOLUTION, BRDF_LUT_RESOLUTION),
            attachment_formats: vec![Format::Rgba16Float],
            attachment_usages: vec![TextureUsage::COLOR_ATTACHMENT],
        };
        let views = [view];
        if let Ok(mut pass) = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[0.0, 0.0, 0.0, 0.0]]) {
            pass.set_pipeline(self.brdf_pipeline.as_ref());
            pass.set_viewport(0.0, 0.0, BRDF_LUT_RESOLUTION as f32, BRDF_LUT_RESOLUTION as f32);
            pass.set_scissor(0, 0, BRDF_LUT_RESOLUTION, BRDF_LUT_RESOLUTION);
            pass.draw(3, 1, 0, 0);
            pass.end();
        }
    }

    pub fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }
}

fn create_cube(device: &Arc<dyn Device>, label: &'static str, resolution: u32, mip_count: u32) -> RhiResult<Box<dyn Texture>> {
    device.create_texture(&TextureDescriptor {
        label: Some(label),
        dimension: TextureDimension::D2,
        format: Format::Rgba16Float,
        size: (resolution, resolution, CUBE_FACE_COUNT),
        mip_count: mip_count.max(1),
        sample_count: 1,
        usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
        is_cube: true,
    })
}

fn cube_view(texture: &dyn Texture) -> RhiResult<Box<dyn TextureView>> {
    texture.create_view(&TextureViewDescriptor {
        view_type: TextureViewType::Cube,
        aspect: TextureAspect::COLOR,
        base_mip: 0,
        mip_count: texture.mip_count(),
        base_layer: 0,
        layer_count: CUBE_FACE_COUNT,
    })
}
