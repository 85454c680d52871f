//! Data types for extraction from the host engine into the render world.
//! The host fills these each frame; the renderer backend never reaches back into host state.

use std::collections::HashMap;

/// Per-mesh instance data extracted from the main world.
#[derive(Clone, Debug)]
pub struct ExtractedMesh {
    /// Host-defined entity or instance id.
    pub entity_id: u64,
    /// Vertex data (position + normal + uv, interleaved) in the layout `forge_renderer::mesh` expects.
    pub vertex_data: Vec<u8>,
    /// Index data (u32 indices).
    pub index_data: Vec<u8>,
    /// World transform: column-major 4x4 matrix.
    /// Index `[col*4+row]`; e.g. `m[0..4]` is the first column.
    pub transform: [f32; 16],
    /// Material this instance should be rendered with.
    pub material: u64,
    /// Whether this instance is visible.
    pub visible: bool,
    /// Whether this instance writes into the shadow cascade pass.
    pub cast_shadow: bool,
}

/// All extracted meshes for the current frame.
#[derive(Default, Debug)]
pub struct ExtractedMeshes {
    pub meshes: HashMap<u64, ExtractedMesh>,
}

/// Point light: position, color, radius, falloff exponent for attenuation.
#[derive(Clone, Debug, Default)]
pub struct PointLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub radius: f32,
    pub falloff_exponent: f32,
}

/// Spot light: position, direction (unit vector), color, radius, inner/outer angles (radians).
#[derive(Clone, Debug, Default)]
pub struct SpotLight {
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub radius: f32,
    pub inner_angle: f32,
    pub outer_angle: f32,
}

/// The single shadow-casting directional light for the frame.
#[derive(Clone, Debug)]
pub struct DirectionalLight {
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    pub soft_shadows: bool,
    pub depth_bias: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: [0.0, -1.0, 0.0],
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            soft_shadows: true,
            depth_bias: 1.0,
        }
    }
}

/// Sky/environment settings. `environment` is the asset id of the equirectangular HDR source
/// the IBL precompute pass consumes; asset-id resolution is `forge_renderer::material::AssetId`'s
/// concern, so this layer only carries the raw id.
#[derive(Clone, Debug)]
pub struct SkyLightSettings {
    pub environment: u64,
    pub ibl_enabled: bool,
    pub intensity: f32,
    pub render_sky: bool,
}

impl Default for SkyLightSettings {
    fn default() -> Self {
        Self {
            environment: 0,
            ibl_enabled: false,
            intensity: 1.0,
            render_sky: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OutlineSettings {
    pub enabled: bool,
    pub width: f32,
    pub color: [f32; 3],
}

impl Default for OutlineSettings {
    fn default() -> Self {
        // Disabled by default; not wired into any pass.
        Self { enabled: false, width: 1.0, color: [1.0, 0.6, 0.0] }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BloomSettings {
    pub enabled: bool,
    pub threshold: f32,
    pub intensity: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self { enabled: true, threshold: 10.0, intensity: 0.1 }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TonemapSettings {
    pub enabled: bool,
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self { enabled: true, exposure: 1.0, gamma: 2.2 }
    }
}

/// Post-process block of an [`ExtractedView`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PostProcessSettings {
    pub outline: OutlineSettings,
    pub fxaa_enabled: bool,
    pub bloom: BloomSettings,
    pub chromatic_aberration_enabled: bool,
    pub tonemap: TonemapSettings,
}

/// View/camera data for the current frame.
#[derive(Clone, Debug)]
pub struct ExtractedView {
    pub view_proj: [f32; 16],
    pub view: [f32; 16],
    pub projection: [f32; 16],
    pub camera_position: [f32; 3],
    pub viewport_size: (u32, u32),
    pub directional_light: Option<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,
    pub sky_light: Option<SkyLightSettings>,
    pub post_process: PostProcessSettings,
}

impl Default for ExtractedView {
    fn default() -> Self {
        const IDENTITY: [f32; 16] = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        Self {
            view_proj: IDENTITY,
            view: IDENTITY,
            projection: IDENTITY,
            camera_position: [0.0, 0.0, 0.0],
            viewport_size: (1920, 1080),
            directional_light: None,
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            sky_light: None,
            post_process: PostProcessSettings::default(),
        }
    }
}
