//! Forge Bridge: the host engine integration layer.
//! No dependency on Bevy, WGPU, or any other rendering engine.
//! Uses only Forge RHI (Vulkan) and Forge Renderer.

mod extract;
mod plugin;

pub use extract::{ExtractedMesh, ExtractedMeshes, ExtractedView};
pub use plugin::ForgePlugin;
pub use forge_renderer::Renderer;
