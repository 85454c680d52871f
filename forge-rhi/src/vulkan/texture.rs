//! Vulkan Texture: VkImage, memory, and on-demand VkImageView creation.

use crate::{
    Format, RhiError, RhiResult, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureUsage, TextureView, TextureViewDescriptor, TextureViewType,
};
use ash::vk;
use std::sync::Arc;

pub fn create_texture(
    device: Arc<ash::Device>,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    descriptor: &TextureDescriptor,
) -> RhiResult<VulkanTexture> {
    descriptor.validate()?;
    let (width, height, depth_or_layers) = descriptor.size;
    let extent = vk::Extent3D {
        width: width.max(1),
        height: height.max(1),
        depth: if descriptor.dimension == TextureDimension::D3 { depth_or_layers.max(1) } else { 1 },
    };
    let array_layers = if descriptor.dimension == TextureDimension::D3 { 1 } else { depth_or_layers.max(1) };

    let vk_format = format_to_vk(descriptor.format);
    let usage_flags = texture_usage_to_vk(descriptor.usage, descriptor.format);
    let image_type = texture_dimension_to_image_type(descriptor.dimension);
    let flags = if descriptor.is_cube {
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    } else {
        vk::ImageCreateFlags::empty()
    };
    let mip_levels = descriptor.mip_count.max(1);
    let samples = sample_count_to_vk(descriptor.sample_count);

    let create_info = vk::ImageCreateInfo::default()
        .image_type(image_type)
        .format(vk_format)
        .extent(extent)
        .mip_levels(mip_levels)
        .array_layers(array_layers)
        .samples(samples)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage_flags)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .flags(flags);

    let image = unsafe {
        device
            .create_image(&create_info, None)
            .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
    };
    let memory = super::memory::allocate_for_image(&device, instance, physical_device, image)?;

    let aspect_mask = aspect_mask_for_format(descriptor.format);
    let default_view_type = texture_dimension_to_default_view_type(descriptor.dimension, descriptor.is_cube, array_layers);
    let view = create_image_view(
        &device,
        image,
        vk_format,
        default_view_type,
        aspect_mask,
        0,
        mip_levels,
        0,
        array_layers,
    )?;

    Ok(VulkanTexture {
        device,
        image,
        memory,
        default_view: view,
        format: descriptor.format,
        size: descriptor.size,
        mip_count: mip_levels,
        array_layers,
    })
}

fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    view_type: vk::ImageViewType,
    aspect_mask: vk::ImageAspectFlags,
    base_mip: u32,
    mip_count: u32,
    base_layer: u32,
    layer_count: u32,
) -> RhiResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_mask)
                .base_mip_level(base_mip)
                .level_count(mip_count)
                .base_array_layer(base_layer)
                .layer_count(layer_count),
        );
    unsafe {
        device
            .create_image_view(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))
    }
}

/// Owns the VkImage and a default full-range view; `create_view` mints additional views for
/// mip/layer slices (shadow cascade layers, mip-chain blit sources, IBL cube faces).
pub struct VulkanTexture {
    pub(crate) device: Arc<ash::Device>,
    pub(crate) image: vk::Image,
    pub(crate) memory: vk::DeviceMemory,
    pub(crate) default_view: vk::ImageView,
    pub(crate) format: Format,
    pub(crate) size: (u32, u32, u32),
    pub(crate) mip_count: u32,
    pub(crate) array_layers: u32,
}

impl VulkanTexture {
    pub fn image(&self) -> vk::Image {
        self.image
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.default_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

impl std::fmt::Debug for VulkanTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanTexture")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("mip_count", &self.mip_count)
            .finish()
    }
}

impl Texture for VulkanTexture {
    fn format(&self) -> Format {
        self.format
    }
    fn size(&self) -> (u32, u32, u32) {
        self.size
    }
    fn mip_count(&self) -> u32 {
        self.mip_count
    }
    fn create_view(&self, desc: &TextureViewDescriptor) -> RhiResult<Box<dyn TextureView>> {
        let vk_format = format_to_vk(self.format);
        let view_type = texture_view_type_to_vk(desc.view_type);
        let aspect_mask = texture_aspect_to_vk(desc.aspect);
        let view = create_image_view(
            &self.device,
            self.image,
            vk_format,
            view_type,
            aspect_mask,
            desc.base_mip,
            desc.mip_count.max(1),
            desc.base_layer,
            desc.layer_count.max(1),
        )?;
        Ok(Box::new(VulkanTextureView { device: Arc::clone(&self.device), view }))
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A view minted by [`VulkanTexture::create_view`], or the owned swapchain image view.
pub struct VulkanTextureView {
    pub(crate) device: Arc<ash::Device>,
    pub(crate) view: vk::ImageView,
}

impl VulkanTextureView {
    pub fn raw(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for VulkanTextureView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

impl std::fmt::Debug for VulkanTextureView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanTextureView").finish()
    }
}

impl TextureView for VulkanTextureView {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Returns the raw VkImageView for any texture-view-like handle produced by this backend:
/// a minted [`VulkanTextureView`], a texture's default view, or a swapchain image's view.
pub fn view_handle(view: &dyn TextureView) -> vk::ImageView {
    if let Some(v) = view.as_any().downcast_ref::<VulkanTextureView>() {
        return v.view;
    }
    #[cfg(feature = "window")]
    if let Some(v) = view.as_any().downcast_ref::<super::swapchain::VulkanSwapchainImage>() {
        return v.view();
    }
    panic!("TextureView handle did not originate from the Vulkan backend");
}

pub fn sample_count_to_vk(count: u32) -> vk::SampleCountFlags {
    match count {
        1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        // Unsupported sample count: fall back to single-sampled rather than fail creation.
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::Rg8Unorm => vk::Format::R8G8_UNORM,
        Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::R16Float => vk::Format::R16_SFLOAT,
        Format::Rg16Float => vk::Format::R16G16_SFLOAT,
        Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32Float => vk::Format::R32_SFLOAT,
        Format::Rg32Float => vk::Format::R32G32_SFLOAT,
        Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32Sint => vk::Format::R32_SINT,
        Format::R32Uint => vk::Format::R32_UINT,
        Format::B10g11r11Ufloat => vk::Format::B10G11R11_UFLOAT_PACK32,
        Format::D16Unorm => vk::Format::D16_UNORM,
        Format::X8D24Unorm => vk::Format::X8_D24_UNORM_PACK32,
        Format::D32Float => vk::Format::D32_SFLOAT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        Format::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
        Format::D16UnormS8Uint => vk::Format::D16_UNORM_S8_UINT,
        Format::Bc1RgbaUnorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Format::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        Format::Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        Format::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
    }
}

pub fn vk_format_to_format(format: vk::Format) -> Format {
    match format {
        vk::Format::B8G8R8A8_SRGB => Format::Bgra8Srgb,
        vk::Format::R8G8B8A8_SRGB => Format::Rgba8Srgb,
        vk::Format::B8G8R8A8_UNORM => Format::Bgra8Unorm,
        _ => Format::Rgba8Unorm,
    }
}

pub fn texture_usage_to_vk(usage: TextureUsage, format: Format) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::INPUT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_ATTACHMENT) {
        let _ = format;
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TRANSIENT) {
        flags |= vk::ImageUsageFlags::TRANSIENT_ATTACHMENT;
    }
    flags
}

fn aspect_mask_for_format(format: Format) -> vk::ImageAspectFlags {
    if format.is_depth_format() {
        if format.has_stencil() {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub fn texture_aspect_to_vk(aspect: TextureAspect) -> vk::ImageAspectFlags {
    let mut flags = vk::ImageAspectFlags::empty();
    if aspect.contains(TextureAspect::COLOR) {
        flags |= vk::ImageAspectFlags::COLOR;
    }
    if aspect.contains(TextureAspect::DEPTH) {
        flags |= vk::ImageAspectFlags::DEPTH;
    }
    if aspect.contains(TextureAspect::STENCIL) {
        flags |= vk::ImageAspectFlags::STENCIL;
    }
    flags
}

pub fn texture_dimension_to_image_type(dim: TextureDimension) -> vk::ImageType {
    match dim {
        TextureDimension::D1 => vk::ImageType::TYPE_1D,
        TextureDimension::D2 => vk::ImageType::TYPE_2D,
        TextureDimension::D3 => vk::ImageType::TYPE_3D,
    }
}

fn texture_dimension_to_default_view_type(dim: TextureDimension, is_cube: bool, array_layers: u32) -> vk::ImageViewType {
    match (dim, is_cube) {
        (_, true) if array_layers == 6 => vk::ImageViewType::CUBE,
        (_, true) => vk::ImageViewType::CUBE_ARRAY,
        (TextureDimension::D1, _) => vk::ImageViewType::TYPE_1D,
        (TextureDimension::D3, _) => vk::ImageViewType::TYPE_3D,
        (TextureDimension::D2, _) if array_layers > 1 => vk::ImageViewType::TYPE_2D_ARRAY,
        (TextureDimension::D2, _) => vk::ImageViewType::TYPE_2D,
    }
}

pub fn texture_view_type_to_vk(view_type: TextureViewType) -> vk::ImageViewType {
    match view_type {
        TextureViewType::D1 => vk::ImageViewType::TYPE_1D,
        TextureViewType::D2 => vk::ImageViewType::TYPE_2D,
        TextureViewType::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureViewType::D3 => vk::ImageViewType::TYPE_3D,
        TextureViewType::Cube => vk::ImageViewType::CUBE,
        TextureViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
    }
}
