//! Forge Renderer: the deferred scene renderer built on `forge-rhi`.
//!
//! `SceneRenderer` owns one instance of every pass (shadow cascades, G-buffer, lighting resolve,
//! sky + grid, bloom, final composite) plus the IBL precompute pipeline, and sequences them every
//! frame in a fixed order. Unlike [`graph::RenderGraph`] (which tracks a dynamic node/resource
//! dependency set and is exercised directly by its own tests), `SceneRenderer`'s six passes run
//! in one compile-time-known order every frame, so they are recorded and submitted directly
//! rather than re-discovered through the graph's topological sort each frame — the graph serves
//! callers with an actual variable pipeline, not this fixed one.
//!
//! No global renderer singleton: every constructor takes an explicit `Arc<dyn Device>`.

pub mod bloom;
pub mod composite;
pub mod config;
pub mod gbuffer;
pub mod graph;
pub mod ibl;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod shader;
pub mod shadow;
pub mod sky;

use bloom::BloomPipeline;
use composite::{CompositePass, TonemapPushConstants};
use config::RendererConfig;
use gbuffer::{GBuffer, GBufferPass};
use ibl::{EnvironmentCube, IblPrecompute};
use lighting::{LightingResolvePass, LightingUniforms};
use mesh::DrawItem;
use shadow::ShadowCascadePass;
use sky::SkyGridPass;

use forge_rhi::frame::FrameOrchestrator;
use forge_rhi::{
    AddressMode, DescriptorSet, DescriptorSetLayoutBinding, DescriptorType, Device, FilterMode,
    Format, ImageLayout, PresentMode, RhiError, RhiResult, Sampler, SamplerDescriptor,
    ShaderStage, Swapchain, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureUsage, TextureView, TextureViewDescriptor, TextureViewType,
};
use glam::Mat4;
use std::collections::HashMap;
use std::sync::Arc;

pub use render_api::{ExtractedMesh, ExtractedMeshes, ExtractedView};

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error(transparent)]
    Rhi(#[from] RhiError),
    /// A frame was abandoned after a recoverable error; the caller should retry next frame.
    #[error("frame aborted: {reason}")]
    FrameAborted { reason: String },
}

pub type RendererResult<T> = Result<T, RendererError>;

fn single_texture_sampler_bindings() -> Vec<DescriptorSetLayoutBinding> {
    vec![
        DescriptorSetLayoutBinding { binding: 0, descriptor_type: DescriptorType::SampledImage, count: 1, stage_mask: ShaderStage::FRAGMENT },
        DescriptorSetLayoutBinding { binding: 1, descriptor_type: DescriptorType::Sampler, count: 1, stage_mask: ShaderStage::FRAGMENT },
    ]
}

fn raw_descriptor_set(device: &Arc<dyn Device>, bindings: &[DescriptorSetLayoutBinding]) -> RhiResult<Box<dyn DescriptorSet>> {
    let layout = device.create_descriptor_set_layout(bindings)?;
    let pool = device.create_descriptor_pool(bindings)?;
    pool.allocate(layout.as_ref())
}

/// 1x1 black cube + 1x1 BRDF LUT bound in place of a real environment until one is loaded.
struct FallbackEnvironment {
    _black_cube: Box<dyn Texture>,
    black_cube_view: Box<dyn TextureView>,
    _brdf_lut: Box<dyn Texture>,
    brdf_lut_view: Box<dyn TextureView>,
}

impl FallbackEnvironment {
    fn new(device: &Arc<dyn Device>) -> RhiResult<Self> {
        let black_cube = device.create_texture(&TextureDescriptor {
            label: Some("fallback_black_cube"),
            dimension: TextureDimension::D2,
            format: Format::Rgba16Float,
            size: (1, 1, 6),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            is_cube: true,
        })?;
        let brdf_lut = device.create_texture(&TextureDescriptor {
            label: Some("fallback_brdf_lut"),
            dimension: TextureDimension::D2,
            format: Format::Rgba16Float,
            size: (1, 1, 1),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            is_cube: false,
        })?;
        let black_cube_view = black_cube.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::Cube,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 6,
        })?;
        let brdf_lut_view = brdf_lut.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;

        // Both textures start `Undefined`; every sampling site binds them `ShaderReadOnly`, so
        // transition once up front. Contents stay zeroed (cleared at allocation by the backend).
        device.immediate_execute(&mut |encoder| {
            encoder.pipeline_barrier_texture(black_cube.as_ref(), ImageLayout::Undefined, ImageLayout::ShaderReadOnly);
            encoder.pipeline_barrier_texture(brdf_lut.as_ref(), ImageLayout::Undefined, ImageLayout::ShaderReadOnly);
        })?;

        Ok(Self { _black_cube: black_cube, black_cube_view, _brdf_lut: brdf_lut, brdf_lut_view })
    }
}

/// The deferred scene renderer: owns every GPU pass and the per-frame orchestration around them.
pub struct SceneRenderer {
    device: Arc<dyn Device>,
    config: RendererConfig,
    frame: FrameOrchestrator,

    shadow: ShadowCascadePass,
    gbuffer_pass: GBufferPass,
    gbuffer: GBuffer,
    lighting: LightingResolvePass,
    sky_grid: SkyGridPass,
    bloom: BloomPipeline,
    composite: CompositePass,
    ibl: IblPrecompute,

    hdr_color_view: Box<dyn TextureView>,

    environment: Option<EnvironmentCube>,
    fallback_environment: FallbackEnvironment,
    environment_sampler: Box<dyn Sampler>,
    sky_environment_set: Box<dyn DescriptorSet>,
    bloom_source_set: Box<dyn DescriptorSet>,
    composite_source_set: Box<dyn DescriptorSet>,

    draw_cache: HashMap<u64, DrawItem>,
}

impl SceneRenderer {
    pub fn new(device: Arc<dyn Device>, output_format: Format, config: RendererConfig) -> RhiResult<Self> {
        let frame = FrameOrchestrator::new(device.as_ref(), config.frames_in_flight)?;

        let shadow = ShadowCascadePass::new(&device, &config)?;
        let gbuffer_pass = GBufferPass::new(&device, &config)?;
        let gbuffer = GBuffer::new(&device, config.output_extent)?;
        let lighting = LightingResolvePass::new(&device, &config)?;
        let sky_grid = SkyGridPass::new(&device, &config)?;
        let bloom = BloomPipeline::new(&device, &config)?;
        let composite = CompositePass::new(&device, output_format, &config)?;
        let ibl = IblPrecompute::new(&device, &config)?;

        let hdr_color = device.create_texture(&TextureDescriptor {
            label: Some("hdr_color"),
            dimension: TextureDimension::D2,
            format: config.hdr_color_format,
            size: (config.output_extent.0, config.output_extent.1, 1),
            mip_count: 1,
            sample_count: 1,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            is_cube: false,
        })?;
        let hdr_color_view = hdr_color.create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2,
            aspect: TextureAspect::COLOR,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;

        let fallback_environment = FallbackEnvironment::new(&device)?;

        let environment_sampler = device.create_sampler(&SamplerDescriptor {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            address_mode: [AddressMode::ClampToEdge; 3],
            ..Default::default()
        })?;

        let shared_bindings = single_texture_sampler_bindings();
        let sky_environment_set = raw_descriptor_set(&device, &shared_bindings)?;
        let bloom_source_set = raw_descriptor_set(&device, &shared_bindings)?;
        let composite_source_set = raw_descriptor_set(&device, &shared_bindings)?;

        Ok(Self {
            device,
            config,
            frame,
            shadow,
            gbuffer_pass,
            gbuffer,
            lighting,
            sky_grid,
            bloom,
            composite,
            ibl,
            hdr_color_view,
            environment: None,
            fallback_environment,
            environment_sampler,
            sky_environment_set,
            bloom_source_set,
            composite_source_set,
            draw_cache: HashMap::new(),
        })
    }

    /// Runs the full F-stage IBL pipeline against an already-uploaded equirectangular source and
    /// stores the result; subsequent frames sample it from the lighting and sky passes. The host
    /// is responsible for decoding and uploading the source equirectangular texture itself.
    pub fn load_environment(&mut self, equirect: &dyn TextureView) -> RhiResult<()> {
        let bindings = single_texture_sampler_bindings();
        let equirect_set = raw_descriptor_set(&self.device, &bindings)?;
        equirect_set.write_combined_image_sampler(0, equirect, self.environment_sampler.as_ref(), ImageLayout::ShaderReadOnly);
        let environment = self.ibl.precompute(&self.device, equirect, equirect_set.as_ref())?;
        self.environment = Some(environment);
        Ok(())
    }

    /// Prepare phase (render-api contract): uploads any mesh not already cached to GPU buffers
    /// and drops cache entries for meshes no longer extracted.
    pub fn prepare(&mut self, extracted: &ExtractedMeshes) -> RhiResult<()> {
        self.draw_cache.retain(|id, _| extracted.meshes.contains_key(id));
        for mesh in extracted.meshes.values() {
            if !mesh.visible || self.draw_cache.contains_key(&mesh.entity_id) {
                continue;
            }
            let item = upload_mesh(&self.device, mesh)?;
            self.draw_cache.insert(mesh.entity_id, item);
        }
        Ok(())
    }

    /// Renders one frame into the given swapchain. Recoverable GPU errors abort just this frame
    /// (logged via `log::error!`); the caller should simply call `render_frame` again next tick.
    pub fn render_frame(&mut self, view: &ExtractedView, swapchain: &mut dyn Swapchain) -> RendererResult<()> {
        match self.render_frame_inner(view, swapchain) {
            Ok(()) => Ok(()),
            Err(RendererError::Rhi(RhiError::OutOfDate)) | Err(RendererError::Rhi(RhiError::SurfaceLost)) => {
                log::warn!("swapchain out of date, skipping frame");
                Ok(())
            }
            Err(err) => {
                log::error!("frame aborted: {err}");
                Ok(())
            }
        }
    }

    fn render_frame_inner(&mut self, view: &ExtractedView, swapchain: &mut dyn Swapchain) -> RendererResult<()> {
        let (_image_index, swapchain_view) = self.frame.begin_frame(self.device.as_ref(), swapchain)?;
        let slot = self.frame.current_slot_index();

        let draw_items: Vec<&DrawItem> = self.draw_cache.values().collect();
        let view_matrix = Mat4::from_cols_array(&view.view);
        let projection_matrix = Mat4::from_cols_array(&view.projection);
        let view_proj = Mat4::from_cols_array(&view.view_proj);
        let camera_position = glam::Vec3::from_array(view.camera_position);

        let directional = view.directional_light.clone();
        let light_dir = directional
            .as_ref()
            .map(|l| glam::Vec3::from_array(l.direction).normalize())
            .unwrap_or(glam::Vec3::new(0.0, -1.0, 0.0));
        let splits = shadow::practical_splits(0.1, 200.0, config::SHADOW_CASCADE_COUNT, 0.5);
        let mut cascade_splits = [0.0f32; 4];
        cascade_splits.copy_from_slice(&splits[..4]);

        let (shadow_cmd, cascade_matrices) = self.shadow.record(&self.device, &draw_items, view_proj.inverse(), light_dir, &cascade_splits)?;
        submit(&self.device, shadow_cmd)?;

        let gbuffer_cmd = self.gbuffer_pass.record(&self.device, &self.gbuffer, &draw_items, view_proj, self.config.entity_id_sentinel)?;
        submit(&self.device, gbuffer_cmd)?;

        let (irradiance_view, prefilter_view, brdf_lut_view) = match &self.environment {
            Some(env) => (env.irradiance_view.as_ref(), env.prefilter_view.as_ref(), env.brdf_lut_view.as_ref()),
            None => (
                self.fallback_environment.black_cube_view.as_ref(),
                self.fallback_environment.black_cube_view.as_ref(),
                self.fallback_environment.brdf_lut_view.as_ref(),
            ),
        };

        let color_intensity = directional.as_ref().map(|l| [l.color[0], l.color[1], l.color[2], l.intensity]).unwrap_or([1.0, 1.0, 1.0, 1.0]);
        let soft_shadows = directional.as_ref().map(|l| l.soft_shadows).unwrap_or(true);
        let depth_bias = directional.as_ref().map(|l| l.depth_bias).unwrap_or(1.0);
        let ibl_enabled = view.sky_light.as_ref().map(|s| s.ibl_enabled && self.environment.is_some()).unwrap_or(false);

        let uniforms = LightingUniforms {
            inv_view_proj: view_proj.inverse().to_cols_array(),
            cascade_matrices: cascade_matrices.map(|m| m.to_cols_array()),
            cascade_splits,
            light_direction: [light_dir.x, light_dir.y, light_dir.z, 0.0],
            light_color_intensity: color_intensity,
            camera_position: [camera_position.x, camera_position.y, camera_position.z, 0.0],
            flags: [if soft_shadows { 1.0 } else { 0.0 }, if ibl_enabled { 1.0 } else { 0.0 }, depth_bias, 0.0],
        };

        let shadow_array_view = self.shadow.array_texture().create_view(&TextureViewDescriptor {
            view_type: TextureViewType::D2Array,
            aspect: TextureAspect::DEPTH,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: config::SHADOW_CASCADE_COUNT,
        })?;

        let lighting_cmd = self.lighting.record(
            &self.device,
            slot,
            self.hdr_color_view.as_ref(),
            self.config.output_extent,
            self.gbuffer.albedo_view(),
            self.gbuffer.normal_view(),
            self.gbuffer.emission_view(),
            self.gbuffer.depth_view(),
            shadow_array_view.as_ref(),
            irradiance_view,
            prefilter_view,
            brdf_lut_view,
            &uniforms,
        )?;
        submit(&self.device, lighting_cmd)?;

        let sky_cube_view = match &self.environment {
            Some(env) => env.cube_view.as_ref(),
            None => self.fallback_environment.black_cube_view.as_ref(),
        };
        self.sky_environment_set.write_combined_image_sampler(0, sky_cube_view, self.environment_sampler.as_ref(), ImageLayout::ShaderReadOnly);
        let render_sky = view.sky_light.as_ref().map(|s| s.render_sky).unwrap_or(false);
        let sky_cmd = self.sky_grid.record(
            &self.device,
            self.hdr_color_view.as_ref(),
            self.gbuffer.depth_view(),
            self.config.output_extent,
            self.sky_environment_set.as_ref(),
            view_matrix,
            projection_matrix,
            camera_position,
            render_sky,
        )?;
        submit(&self.device, sky_cmd)?;

        if view.post_process.bloom.enabled {
            self.bloom_source_set.write_combined_image_sampler(0, self.hdr_color_view.as_ref(), self.environment_sampler.as_ref(), ImageLayout::ShaderReadOnly);
            let bloom_cmd = self.bloom.record(&self.device, self.hdr_color_view.as_ref(), self.hdr_color_view.as_ref(), self.config.output_extent, self.bloom_source_set.as_ref())?;
            submit(&self.device, bloom_cmd)?;
        }

        let tonemap_enabled = view.post_process.tonemap.enabled;
        let tonemap = TonemapPushConstants {
            exposure: if tonemap_enabled { view.post_process.tonemap.exposure } else { 1.0 },
            gamma: if tonemap_enabled { view.post_process.tonemap.gamma } else { 1.0 },
        };
        self.composite_source_set.write_combined_image_sampler(0, self.hdr_color_view.as_ref(), self.environment_sampler.as_ref(), ImageLayout::ShaderReadOnly);
        let composite_cmd = self.composite.record(
            &self.device,
            self.hdr_color_view.as_ref(),
            swapchain_view,
            self.config.output_extent,
            self.composite_output_format(),
            self.composite_source_set.as_ref(),
            tonemap,
        )?;

        self.frame.end_frame(self.device.as_ref(), composite_cmd)?;
        self.frame.present(swapchain)?;
        Ok(())
    }

    fn composite_output_format(&self) -> Format {
        Format::Rgba8Unorm
    }

    /// Entity-ID picking (§4.L): reads back the G-buffer's entity-ID attachment at `(x, y)`.
    /// Blocking; intended for mouse-click picking, not per-frame use.
    pub fn read_entity_id_from_pixel(&self, x: u32, y: u32) -> RhiResult<i32> {
        self.composite.read_entity_id_from_pixel(&self.device, self.gbuffer.entity_id_texture(), x, y)
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }
}

fn upload_mesh(device: &Arc<dyn Device>, mesh: &ExtractedMesh) -> RhiResult<DrawItem> {
    let vertex_buffer = device.create_buffer(&forge_rhi::BufferDescriptor {
        label: Some("mesh_vertices"),
        size: mesh.vertex_data.len().max(1) as u64,
        usage: forge_rhi::BufferUsage::VERTEX | forge_rhi::BufferUsage::TRANSFER_DST,
        memory: forge_rhi::BufferMemoryPreference::HostVisibleSequential,
    })?;
    device.write_buffer(vertex_buffer.as_ref(), 0, &mesh.vertex_data)?;

    let index_buffer = device.create_buffer(&forge_rhi::BufferDescriptor {
        label: Some("mesh_indices"),
        size: mesh.index_data.len().max(1) as u64,
        usage: forge_rhi::BufferUsage::INDEX | forge_rhi::BufferUsage::TRANSFER_DST,
        memory: forge_rhi::BufferMemoryPreference::HostVisibleSequential,
    })?;
    device.write_buffer(index_buffer.as_ref(), 0, &mesh.index_data)?;

    Ok(DrawItem {
        vertex_buffer,
        index_buffer,
        index_count: (mesh.index_data.len() / std::mem::size_of::<u32>()) as u32,
        world_matrix: mesh.transform,
        material: material::AssetId::from_raw(mesh.material),
        cast_shadow: mesh.cast_shadow,
        entity_id: mesh.entity_id as i32,
    })
}

fn submit(device: &Arc<dyn Device>, cmd: Box<dyn forge_rhi::CommandBuffer>) -> RhiResult<()> {
    device.queue().submit(vec![cmd], &[], &[], None)
}

pub fn default_present_mode() -> PresentMode {
    PresentMode::Fifo
}
