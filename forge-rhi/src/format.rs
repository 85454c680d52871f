//! Resource handle & format vocabulary (component A).

/// Extent of a texture or a mip level within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Color, depth and block-compressed pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Sint,
    R32Uint,
    B10g11r11Ufloat,
    D16Unorm,
    X8D24Unorm,
    D32Float,
    D24UnormS8Uint,
    D32FloatS8Uint,
    D16UnormS8Uint,
    Bc1RgbaUnorm,
    Bc3Unorm,
    Bc5Unorm,
    Bc7Unorm,
}

impl Format {
    /// True for any of the five depth formats.
    pub fn is_depth_format(self) -> bool {
        matches!(
            self,
            Format::D16Unorm
                | Format::X8D24Unorm
                | Format::D32Float
                | Format::D24UnormS8Uint
                | Format::D32FloatS8Uint
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            Format::D24UnormS8Uint | Format::D32FloatS8Uint | Format::D16UnormS8Uint
        )
    }

    /// Bytes per texel for uncompressed formats; block formats return the block size.
    pub fn texel_size(self) -> u32 {
        match self {
            Format::R8Unorm => 1,
            Format::Rg8Unorm => 2,
            Format::Rgba8Unorm | Format::Rgba8Srgb | Format::Bgra8Unorm | Format::Bgra8Srgb => 4,
            Format::R16Float => 2,
            Format::Rg16Float => 4,
            Format::Rgba16Float => 8,
            Format::R32Float | Format::R32Sint | Format::R32Uint => 4,
            Format::Rg32Float => 8,
            Format::Rgba32Float => 16,
            Format::B10g11r11Ufloat => 4,
            Format::D16Unorm | Format::D16UnormS8Uint => 2,
            Format::X8D24Unorm | Format::D24UnormS8Uint | Format::D32Float => 4,
            Format::D32FloatS8Uint => 8,
            Format::Bc1RgbaUnorm => 8,
            Format::Bc3Unorm | Format::Bc5Unorm | Format::Bc7Unorm => 16,
        }
    }
}

/// Is `f(w, h) ⇒ bool` for `mip_count ≤ 1 + floor(log2(max(w,h)))`.
pub fn max_mip_count(width: u32, height: u32) -> u32 {
    let dim = width.max(height).max(1);
    32 - dim.leading_zeros()
}

/// The descending half-extent list `(w,h) → ... → (1,1)`, `max_mip_count(w,h)` entries long.
pub fn mip_chain(width: u32, height: u32) -> Vec<Extent> {
    let count = max_mip_count(width, height);
    let mut chain = Vec::with_capacity(count as usize);
    let (mut w, mut h) = (width.max(1), height.max(1));
    for _ in 0..count {
        chain.push(Extent::new(w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_ends_at_one_by_one() {
        for &(w, h) in &[(1u32, 1u32), (1, 1), (256, 256), (300, 17), (1920, 1080)] {
            let chain = mip_chain(w, h);
            assert_eq!(chain.len() as u32, max_mip_count(w, h));
            assert_eq!(*chain.last().unwrap(), Extent::new(1, 1));
        }
    }

    #[test]
    fn mip_chain_halves_each_dimension() {
        let chain = mip_chain(8, 4);
        assert_eq!(
            chain,
            vec![
                Extent::new(8, 4),
                Extent::new(4, 2),
                Extent::new(2, 1),
                Extent::new(1, 1),
            ]
        );
    }

    #[test]
    fn depth_formats_are_recognized() {
        assert!(Format::D32Float.is_depth_format());
        assert!(Format::D24UnormS8Uint.is_depth_format());
        assert!(!Format::Rgba8Unorm.is_depth_format());
    }
}
