//! Vulkan Sampler implementation.

use crate::{AddressMode, CompareOp, FilterMode, RhiError, RhiResult, Sampler, SamplerDescriptor};
use ash::vk;
use std::sync::Arc;

fn filter_to_vk(f: FilterMode) -> vk::Filter {
    match f {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

fn mipmap_mode_to_vk(f: FilterMode) -> vk::SamplerMipmapMode {
    match f {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

fn address_mode_to_vk(a: AddressMode) -> vk::SamplerAddressMode {
    match a {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

fn compare_op_to_vk(c: CompareOp) -> vk::CompareOp {
    match c {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn border_color_to_vk(c: [f32; 4]) -> vk::BorderColor {
    match c {
        [0.0, 0.0, 0.0, 0.0] => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        [0.0, 0.0, 0.0, 1.0] => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        _ => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub fn create_sampler(device: Arc<ash::Device>, desc: &SamplerDescriptor) -> RhiResult<VulkanSampler> {
    let anisotropy = desc.anisotropy.map(|c| c.clamp(1.0, 16.0));
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter_to_vk(desc.mag_filter))
        .min_filter(filter_to_vk(desc.min_filter))
        .mipmap_mode(mipmap_mode_to_vk(desc.mip_filter))
        .address_mode_u(address_mode_to_vk(desc.address_mode[0]))
        .address_mode_v(address_mode_to_vk(desc.address_mode[1]))
        .address_mode_w(address_mode_to_vk(desc.address_mode[2]))
        .mip_lod_bias(desc.lod_bias)
        .min_lod(desc.lod_min)
        .max_lod(desc.lod_max)
        .anisotropy_enable(anisotropy.is_some())
        .max_anisotropy(anisotropy.unwrap_or(1.0))
        .compare_enable(desc.compare.is_some())
        .compare_op(desc.compare.map(compare_op_to_vk).unwrap_or(vk::CompareOp::ALWAYS))
        .border_color(border_color_to_vk(desc.border_color))
        .unnormalized_coordinates(desc.unnormalized_coords);
    if desc.unnormalized_coords {
        // Required by the Vulkan spec when unnormalizedCoordinates is true.
        create_info = create_info
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .min_lod(0.0)
            .max_lod(0.0)
            .anisotropy_enable(false)
            .compare_enable(false);
    }
    let sampler = unsafe {
        device
            .create_sampler(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
    };
    Ok(VulkanSampler { device, sampler })
}

pub struct VulkanSampler {
    pub device: Arc<ash::Device>,
    pub sampler: vk::Sampler,
}

impl VulkanSampler {
    pub fn raw(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

impl std::fmt::Debug for VulkanSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSampler").finish()
    }
}

impl Sampler for VulkanSampler {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
