//! Vulkan swapchain and surface support (feature "window").
//!
//! Capability-query logic (format/present-mode/extent/image-count negotiation) lives here so
//! `VulkanDevice::create_swapchain` only has to supply the physical device's queried
//! capabilities and the caller's request.

use crate::{Format, PresentMode, RhiError, RhiResult, Semaphore, Swapchain, TextureView};
use ash::khr::swapchain::Device as SwapchainDevice;
use ash::vk;
use std::sync::Arc;

use super::texture::{format_to_vk, vk_format_to_format};
use super::VulkanSemaphore;

/// Prefers BGRA8 sRGB, falls back to RGBA8 sRGB, then the surface's first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.iter().find(|f| f.format == vk::Format::R8G8B8A8_SRGB))
        .copied()
        .unwrap_or(formats[0])
}

pub fn choose_present_mode(available: &[vk::PresentModeKHR], requested: PresentMode) -> vk::PresentModeKHR {
    let wanted = match requested {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    };
    if available.contains(&wanted) {
        wanted
    } else {
        // FIFO is required to be supported by every conformant Vulkan implementation.
        vk::PresentModeKHR::FIFO
    }
}

fn vk_present_mode_to_present_mode(mode: vk::PresentModeKHR) -> PresentMode {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => PresentMode::Immediate,
        vk::PresentModeKHR::MAILBOX => PresentMode::Mailbox,
        vk::PresentModeKHR::FIFO_RELAXED => PresentMode::FifoRelaxed,
        _ => PresentMode::Fifo,
    }
}

pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.0.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: requested.1.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    }
}

pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

pub fn choose_composite_alpha(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    const CANDIDATES: [vk::CompositeAlphaFlagsKHR; 4] = [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ];
    CANDIDATES
        .into_iter()
        .find(|&c| capabilities.supported_composite_alpha.contains(c))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// One swapchain image. Implements [`TextureView`] directly (not [`crate::Texture`]) since a
/// swapchain image is only ever consumed as a render-pass attachment view, never sampled.
pub struct VulkanSwapchainImage {
    pub(crate) device: Arc<ash::Device>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) format: Format,
    pub(crate) extent: (u32, u32),
}

impl VulkanSwapchainImage {
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }
}

impl Drop for VulkanSwapchainImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

impl std::fmt::Debug for VulkanSwapchainImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSwapchainImage").field("extent", &self.extent).finish()
    }
}

impl TextureView for VulkanSwapchainImage {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct VulkanSwapchain {
    device: Arc<ash::Device>,
    swapchain_loader: SwapchainDevice,
    swapchain: vk::SwapchainKHR,
    images: Vec<VulkanSwapchainImage>,
    queue: vk::Queue,
    extent: (u32, u32),
    present_mode: PresentMode,
}

impl VulkanSwapchain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: Arc<ash::Device>,
        swapchain_loader: SwapchainDevice,
        swapchain: vk::SwapchainKHR,
        queue: vk::Queue,
        extent: vk::Extent2D,
        format: vk::Format,
        present_mode: vk::PresentModeKHR,
    ) -> RhiResult<Self> {
        let vk_images = unsafe { swapchain_loader.get_swapchain_images(swapchain).map_err(|_| RhiError::SurfaceLost)? };
        let mut images = Vec::with_capacity(vk_images.len());
        for image in vk_images {
            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = unsafe {
                device
                    .create_image_view(&view_create_info, None)
                    .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
            };
            images.push(VulkanSwapchainImage {
                device: Arc::clone(&device),
                image,
                view,
                format: vk_format_to_format(format),
                extent: (extent.width, extent.height),
            });
        }
        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            queue,
            extent: (extent.width, extent.height),
            present_mode: vk_present_mode_to_present_mode(present_mode),
        })
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        self.images.clear();
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

impl std::fmt::Debug for VulkanSwapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSwapchain")
            .field("extent", &self.extent)
            .field("image_count", &self.images.len())
            .finish()
    }
}

impl Swapchain for VulkanSwapchain {
    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> RhiResult<(u32, &dyn TextureView)> {
        let vk_sem = signal
            .as_any()
            .downcast_ref::<VulkanSemaphore>()
            .expect("semaphore must originate from the Vulkan backend")
            .semaphore;
        let (index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, vk_sem, vk::Fence::null())
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_DATE_KHR => RhiError::OutOfDate,
                    _ => RhiError::SurfaceLost,
                })?
        };
        if suboptimal {
            return Err(RhiError::OutOfDate);
        }
        Ok((index, &self.images[index as usize] as &dyn TextureView))
    }

    fn present(&mut self, image_index: u32, wait: &dyn Semaphore) -> RhiResult<()> {
        let vk_sem = wait
            .as_any()
            .downcast_ref::<VulkanSemaphore>()
            .expect("semaphore must originate from the Vulkan backend")
            .semaphore;
        let wait_semas = [vk_sem];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semas)
            .swapchains(std::slice::from_ref(&self.swapchain))
            .image_indices(&image_indices);
        unsafe {
            self.swapchain_loader.queue_present(self.queue, &present_info).map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_DATE_KHR => RhiError::OutOfDate,
                _ => RhiError::SurfaceLost,
            })?;
        }
        Ok(())
    }
}
