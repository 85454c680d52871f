//! Shared render backend API for the host engine.
//! Defines extract types and the `RenderBackend` trait so the host drives a concrete backend
//! (e.g. `forge-bridge`) through one code path: `prepare` then `render_frame`.

mod extract;
mod backend;

pub use extract::{
    BloomSettings, DirectionalLight, ExtractedMesh, ExtractedMeshes, ExtractedView,
    OutlineSettings, PointLight, PostProcessSettings, SkyLightSettings, SpotLight,
    TonemapSettings,
};
pub use backend::{RenderBackend, RenderBackendWindow};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
