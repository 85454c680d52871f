//! Vertex layout and per-draw records consumed by the G-buffer pass (component H / §3).

use crate::material::AssetId;
use forge_rhi::{Buffer, VertexAttribute, VertexBufferLayout, VertexFormat, VertexInputRate};

/// Interleaved position/normal/uv vertex, the only layout the G-buffer pipeline accepts.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn buffer_layout() -> VertexBufferLayout {
        VertexBufferLayout {
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: VertexInputRate::Vertex,
            attributes: vec![
                VertexAttribute { location: 0, offset: 0, format: VertexFormat::Float32x3 },
                VertexAttribute { location: 1, offset: 12, format: VertexFormat::Float32x3 },
                VertexAttribute { location: 2, offset: 24, format: VertexFormat::Float32x2 },
            ],
        }
    }
}

/// A material handle as carried by a draw item; an alias rather than a newtype so call sites
/// read as "the material of this draw" without an extra conversion.
pub type MaterialHandle = AssetId;

/// One draw: the buffers and instance state the G-buffer and shadow passes consume.
pub struct DrawItem {
    pub vertex_buffer: Box<dyn Buffer>,
    pub index_buffer: Box<dyn Buffer>,
    pub index_count: u32,
    /// Column-major 4x4 world matrix.
    pub world_matrix: [f32; 16],
    pub material: MaterialHandle,
    pub cast_shadow: bool,
    /// Written to the G-buffer's entity-ID attachment; read back by
    /// `SceneRenderer::read_entity_id_from_pixel`.
    pub entity_id: i32,
}
