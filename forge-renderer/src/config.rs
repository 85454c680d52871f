//! Static renderer configuration (ambient stack: configuration, §2 table).
//!
//! Unlike [`render_api::PostProcessSettings`], which rides along with the per-frame
//! [`render_api::ExtractedView`], `RendererConfig` is fixed at `SceneRenderer::new` time: it
//! sizes the G-buffer, shadow array and bloom pyramid once, up front.

pub use forge_rhi::Format;

/// Maximum bloom pyramid length regardless of resolution (§4.K).
pub const MAX_BLOOM_MIPS: u32 = 6;

/// Number of cascades in the shadow pass (§4.G). Not configurable: the lighting resolve's
/// cascade-selection logic and the shadow array's layer count both assume exactly four.
pub const SHADOW_CASCADE_COUNT: u32 = 4;

/// `zMult` applied to each cascade's frustum-corner AABB before building its orthographic
/// projection (§4.G), widening the near/far planes so casters just outside the frustum still
/// shadow it.
pub const SHADOW_Z_MULTIPLIER: f32 = 10.0;

#[derive(Clone, Copy, Debug)]
pub struct RendererConfig {
    pub frames_in_flight: usize,
    pub output_extent: (u32, u32),
    pub hdr_color_format: Format,
    pub shadow_map_resolution: u32,
    /// Sampling-pyramid length before the `MAX_BLOOM_MIPS` cap (§4.K): the mip_chain of the
    /// render target, truncated.
    pub default_sampling_count: u32,
    pub entity_id_sentinel: i32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            output_extent: (1920, 1080),
            hdr_color_format: Format::Rgba16Float,
            shadow_map_resolution: 2048,
            default_sampling_count: MAX_BLOOM_MIPS,
            entity_id_sentinel: 10,
        }
    }
}

impl RendererConfig {
    /// Bloom pyramid length: `mip_chain(w, h)` truncated to `default_sampling_count` (capped at
    /// `MAX_BLOOM_MIPS`), with the full-resolution entry dropped (the prefilter pass already
    /// wrote it).
    pub fn bloom_mip_count(&self, extent: (u32, u32)) -> u32 {
        let chain_len = forge_rhi::mip_chain(extent.0, extent.1).len() as u32;
        let cap = self.default_sampling_count.min(MAX_BLOOM_MIPS);
        chain_len.saturating_sub(1).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_mip_count_is_capped() {
        let config = RendererConfig { default_sampling_count: MAX_BLOOM_MIPS, ..Default::default() };
        assert!(config.bloom_mip_count((4096, 4096)) <= MAX_BLOOM_MIPS);
        assert_eq!(config.bloom_mip_count((1, 1)), 0);
    }
}
