//! Vulkan backend for Forge RHI.
//! Implements Device, Buffer, Texture, GraphicsPipeline, ComputePipeline, CommandEncoder, Fence, Semaphore, Queue.

mod buffer;
mod descriptor;
mod memory;
mod pipeline;
mod queue;
mod render_pass;
mod sampler;
mod texture;

#[cfg(feature = "window")]
mod swapchain;

use crate::{
    AccessFlags, Buffer, BufferDescriptor, CommandBuffer, CommandEncoder, ComputePassRecorder,
    ComputePipelineDescriptor, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding,
    Device, DeviceCreateParams, Fence, FramebufferDescriptor, GraphicsPipelineDescriptor,
    ImageLayout, PipelineStage, QueueCapabilities, RenderPassDescriptor, RhiError, RhiResult,
    Sampler, SamplerDescriptor, Semaphore, ShaderStage, Texture, TextureDescriptor, TextureView,
    TypeCounts,
};
#[cfg(feature = "window")]
use crate::PresentMode;
use ash::vk;
use ash::vk::Handle;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::{Arc, Mutex};

pub use buffer::VulkanBuffer;
pub use descriptor::{VulkanDescriptorPool, VulkanDescriptorSet, VulkanDescriptorSetLayout};
pub use pipeline::{VulkanComputePipeline, VulkanGraphicsPipeline};
pub use sampler::VulkanSampler;
pub use texture::{VulkanTexture, VulkanTextureView};

#[cfg(feature = "window")]
pub use swapchain::{VulkanSwapchain, VulkanSwapchainImage};

/// Returns validation layer names to enable if validation is requested (feature or FORGE_VALIDATION=1).
#[cfg(feature = "validation")]
fn validation_layer_names(entry: &ash::Entry) -> Vec<CString> {
    let disable = std::env::var("FORGE_VALIDATION").is_ok_and(|v| v == "0" || v.eq_ignore_ascii_case("false"));
    if disable {
        return vec![];
    }
    let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(l) => l,
        Err(_) => return vec![],
    };
    const KHRONOS: &str = "VK_LAYER_KHRONOS_validation";
    const LUNARG: &str = "VK_LAYER_LUNARG_standard_validation";
    for prop in &layers {
        let name = unsafe { std::ffi::CStr::from_ptr(prop.layer_name.as_ptr()).to_string_lossy() };
        if name == KHRONOS {
            return vec![CString::new(KHRONOS).unwrap()];
        }
        if name == LUNARG {
            return vec![CString::new(LUNARG).unwrap()];
        }
    }
    vec![]
}

#[cfg(not(feature = "validation"))]
fn validation_layer_names(_entry: &ash::Entry) -> Vec<CString> {
    eprintln!("validation requested but forge-rhi built without the 'validation' feature; layers not available");
    vec![]
}

/// Converts the device-agnostic layout vocabulary to its Vulkan counterpart.
pub(crate) fn image_layout_to_vk(l: ImageLayout) -> vk::ImageLayout {
    match l {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Bitwise union of a [`PipelineStage`] set into its Vulkan flags. Shared by subpass
/// dependencies (`render_pass.rs`), barrier code here, and queue submission (`queue.rs`).
pub(crate) fn pipeline_stage_to_vk(stage: PipelineStage) -> vk::PipelineStageFlags {
    let mut flags = vk::PipelineStageFlags::empty();
    if stage.contains(PipelineStage::TOP_OF_PIPE) {
        flags |= vk::PipelineStageFlags::TOP_OF_PIPE;
    }
    if stage.contains(PipelineStage::TRANSFER) {
        flags |= vk::PipelineStageFlags::TRANSFER;
    }
    if stage.contains(PipelineStage::COLOR_ATTACHMENT_OUTPUT) {
        flags |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    }
    if stage.contains(PipelineStage::EARLY_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    }
    if stage.contains(PipelineStage::LATE_FRAGMENT_TESTS) {
        flags |= vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
    }
    if stage.contains(PipelineStage::FRAGMENT_SHADER) {
        flags |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if stage.contains(PipelineStage::COMPUTE_SHADER) {
        flags |= vk::PipelineStageFlags::COMPUTE_SHADER;
    }
    if stage.contains(PipelineStage::BOTTOM_OF_PIPE) {
        flags |= vk::PipelineStageFlags::BOTTOM_OF_PIPE;
    }
    if stage.contains(PipelineStage::HOST) {
        flags |= vk::PipelineStageFlags::HOST;
    }
    flags
}

pub(crate) fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    if access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if access.contains(AccessFlags::DEPTH_STENCIL_WRITE) {
        flags |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if access.contains(AccessFlags::SHADER_READ) {
        flags |= vk::AccessFlags::SHADER_READ;
    }
    if access.contains(AccessFlags::SHADER_WRITE) {
        flags |= vk::AccessFlags::SHADER_WRITE;
    }
    if access.contains(AccessFlags::TRANSFER_READ) {
        flags |= vk::AccessFlags::TRANSFER_READ;
    }
    if access.contains(AccessFlags::TRANSFER_WRITE) {
        flags |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if access.contains(AccessFlags::MEMORY_READ) {
        flags |= vk::AccessFlags::MEMORY_READ;
    }
    if access.contains(AccessFlags::MEMORY_WRITE) {
        flags |= vk::AccessFlags::MEMORY_WRITE;
    }
    flags
}

/// Returns (src_stage, src_access, dst_stage, dst_access) for a whole-resource layout transition
/// issued by [`VulkanCommandEncoder::pipeline_barrier_texture`].
fn image_barrier_stages_access(
    old_layout: ImageLayout,
    new_layout: ImageLayout,
    is_depth: bool,
) -> (vk::PipelineStageFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::AccessFlags) {
    let attachment_write = if is_depth {
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
    } else {
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE
    };
    let attachment_stage = if is_depth {
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
    } else {
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
    };
    let shader_stages =
        vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER;
    match (old_layout, new_layout) {
        (ImageLayout::Undefined, ImageLayout::ColorAttachment)
        | (ImageLayout::Undefined, ImageLayout::DepthStencilAttachment)
        | (ImageLayout::PresentSrc, ImageLayout::ColorAttachment) => {
            (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty(), attachment_stage, attachment_write)
        }
        (ImageLayout::ColorAttachment, ImageLayout::PresentSrc) => {
            (attachment_stage, attachment_write, vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::MEMORY_READ)
        }
        (ImageLayout::Undefined, ImageLayout::TransferDst) => {
            (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty(), vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly) => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE, shader_stages, vk::AccessFlags::SHADER_READ)
        }
        (ImageLayout::TransferDst, ImageLayout::TransferSrc) => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ)
        }
        (ImageLayout::TransferSrc, ImageLayout::ShaderReadOnly) => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ, shader_stages, vk::AccessFlags::SHADER_READ)
        }
        (ImageLayout::TransferSrc, ImageLayout::TransferDst) => {
            (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE)
        }
        (ImageLayout::ShaderReadOnly, ImageLayout::ColorAttachment)
        | (ImageLayout::ShaderReadOnly, ImageLayout::DepthStencilAttachment) => {
            (shader_stages, vk::AccessFlags::SHADER_READ, attachment_stage, attachment_write)
        }
        (ImageLayout::ColorAttachment, ImageLayout::ShaderReadOnly)
        | (ImageLayout::DepthStencilAttachment, ImageLayout::ShaderReadOnly)
        | (ImageLayout::DepthStencilReadOnly, ImageLayout::ShaderReadOnly) => {
            (attachment_stage, attachment_write, shader_stages, vk::AccessFlags::SHADER_READ)
        }
        (ImageLayout::General, ImageLayout::ShaderReadOnly) => {
            (vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE, shader_stages, vk::AccessFlags::SHADER_READ)
        }
        (ImageLayout::ShaderReadOnly, ImageLayout::General) => {
            (shader_stages, vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE)
        }
        (ImageLayout::Undefined, ImageLayout::General) => {
            (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty(), vk::PipelineStageFlags::COMPUTE_SHADER, vk::AccessFlags::SHADER_WRITE)
        }
        _ => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        ),
    }
}

/// Finds or creates the `VkRenderPass` for `desc`, keyed directly off the hashable descriptor.
/// Shared by pipeline creation (which only needs the handle) and `begin_render_pass` (which also
/// needs a matching framebuffer).
fn get_or_create_render_pass(
    device: &ash::Device,
    cache: &Mutex<HashMap<RenderPassDescriptor, vk::RenderPass>>,
    desc: &RenderPassDescriptor,
) -> RhiResult<vk::RenderPass> {
    let mut cache = cache.lock().unwrap();
    if let Some(&rp) = cache.get(desc) {
        return Ok(rp);
    }
    let rp = render_pass::create_vk_render_pass(device, desc)?;
    cache.insert(desc.clone(), rp);
    Ok(rp)
}

/// Key for caching `VkFramebuffer` by the render pass and the concrete image views bound to it.
/// Kept separate from [`FramebufferDescriptor`]: the descriptor records shapes, but a framebuffer
/// is only ever valid for one exact set of image views.
#[derive(Hash, Eq, PartialEq, Clone)]
struct FramebufferCacheKey {
    render_pass: u64,
    width: u32,
    height: u32,
    attachment_views: Vec<u64>,
}

fn get_or_create_framebuffer(
    device: &ash::Device,
    cache: &Mutex<HashMap<FramebufferCacheKey, vk::Framebuffer>>,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    views: &[vk::ImageView],
) -> RhiResult<vk::Framebuffer> {
    let key = FramebufferCacheKey {
        render_pass: render_pass.as_raw(),
        width: extent.width,
        height: extent.height,
        attachment_views: views.iter().map(|v| v.as_raw()).collect(),
    };
    let mut cache = cache.lock().unwrap();
    if let Some(&fb) = cache.get(&key) {
        return Ok(fb);
    }
    let create_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(views)
        .width(extent.width)
        .height(extent.height)
        .layers(1);
    let fb = unsafe {
        device
            .create_framebuffer(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
    };
    cache.insert(key, fb);
    Ok(fb)
}

pub struct VulkanDevice {
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    graphics_queue: queue::VulkanQueue,
    /// Dedicated transfer-only queue, when the device exposes a family distinct from graphics.
    transfer_queue: Option<queue::VulkanQueue>,
    /// Capability flags per queue family, indexed by family index; backs `query_queue_id`.
    queue_family_capabilities: Vec<QueueCapabilities>,
    command_pool: vk::CommandPool,
    descriptor_pool_cache: descriptor::DescriptorPoolCache,
    render_pass_cache: Arc<Mutex<HashMap<RenderPassDescriptor, vk::RenderPass>>>,
    framebuffer_cache: Arc<Mutex<HashMap<FramebufferCacheKey, vk::Framebuffer>>>,
    #[cfg(feature = "window")]
    surface_state: Option<SurfaceState>,
}

#[cfg(feature = "window")]
struct SurfaceState {
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
}

impl VulkanDevice {
    /// Creates a Vulkan device. With the `window` feature and `params.surface` set, also creates
    /// a `VkSurfaceKHR` and picks a graphics family that can present to it.
    pub fn new(params: DeviceCreateParams) -> RhiResult<Arc<Self>> {
        let entry = unsafe { ash::Entry::load().map_err(|e| RhiError::NotSupported(e.to_string()))? };
        let app_name = CString::new(params.app_name).unwrap_or_else(|_| CString::new("forge").unwrap());
        let engine_name = CString::new("forge").unwrap();
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_2)
            .application_name(&app_name)
            .engine_name(&engine_name);

        #[cfg(feature = "window")]
        let display_handle = params.surface.map(|(_, d)| d);
        #[cfg(feature = "window")]
        let window_handle = params.surface.map(|(w, _)| w);

        #[cfg(feature = "window")]
        let instance_extensions: Vec<*const std::ffi::c_char> = match display_handle {
            Some(dh) => ash_window::enumerate_required_extensions(dh)
                .map_err(|e| RhiError::NotSupported(e.to_string()))?
                .to_vec(),
            None => vec![],
        };
        #[cfg(not(feature = "window"))]
        let instance_extensions: Vec<*const std::ffi::c_char> = vec![];

        let layer_names: Vec<CString> = if params.enable_validation { validation_layer_names(&entry) } else { vec![] };
        let layer_ptrs: Vec<*const std::ffi::c_char> = layer_names.iter().map(|c| c.as_ptr()).collect();

        let instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&instance_extensions)
            .enabled_layer_names(&layer_ptrs);
        let instance = unsafe {
            entry
                .create_instance(&instance_create_info, None)
                .map_err(|e| RhiError::NotSupported(e.to_string()))?
        };

        #[cfg(feature = "window")]
        let surface_state_pre: Option<(vk::SurfaceKHR, ash::khr::surface::Instance)> = match (window_handle, display_handle) {
            (Some(wh), Some(dh)) => {
                let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
                let surface = unsafe {
                    ash_window::create_surface(&entry, &instance, dh, wh, None)
                        .map_err(|e| RhiError::NotSupported(e.to_string()))?
                };
                Some((surface, surface_loader))
            }
            _ => None,
        };

        let physical_devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(|e| RhiError::NotSupported(e.to_string()))?
        };
        let physical_device = physical_devices
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::NotSupported("no Vulkan physical device found".into()))?;

        let queue_family_properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let queue_family_capabilities: Vec<QueueCapabilities> = queue_family_properties
            .iter()
            .map(|p| {
                let mut caps = QueueCapabilities::empty();
                if p.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    caps |= QueueCapabilities::GRAPHICS;
                }
                if p.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                    caps |= QueueCapabilities::COMPUTE;
                }
                // Graphics and compute queues implicitly support transfer per the Vulkan spec,
                // even when the TRANSFER bit itself is not reported.
                if p.queue_flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER) {
                    caps |= QueueCapabilities::TRANSFER;
                }
                caps
            })
            .collect();

        #[cfg(feature = "window")]
        let graphics_family = queue_family_properties
            .iter()
            .enumerate()
            .position(|(i, p)| {
                let graphics = p.queue_flags.contains(vk::QueueFlags::GRAPHICS);
                let present = match &surface_state_pre {
                    Some((surface, loader)) => unsafe {
                        loader
                            .get_physical_device_surface_support(physical_device, i as u32, *surface)
                            .unwrap_or(false)
                    },
                    None => true,
                };
                graphics && present
            })
            .ok_or_else(|| RhiError::NotSupported("no queue family with graphics (and present) support".into()))?
            as u32;
        #[cfg(not(feature = "window"))]
        let graphics_family = queue_family_properties
            .iter()
            .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS) || p.queue_flags.contains(vk::QueueFlags::COMPUTE))
            .ok_or_else(|| RhiError::NotSupported("no suitable queue family".into()))? as u32;

        // Dedicated transfer-only family, when the device exposes one distinct from graphics.
        let transfer_family = queue_family_properties
            .iter()
            .position(|p| {
                p.queue_flags.contains(vk::QueueFlags::TRANSFER)
                    && !p.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && !p.queue_flags.contains(vk::QueueFlags::COMPUTE)
            })
            .map(|i| i as u32)
            .filter(|&i| i != graphics_family);

        let queue_priorities = [1.0f32];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&queue_priorities)];
        if let Some(tf) = transfer_family {
            queue_create_infos.push(vk::DeviceQueueCreateInfo::default().queue_family_index(tf).queue_priorities(&queue_priorities));
        }

        #[cfg(feature = "window")]
        let device_extensions: Vec<*const std::ffi::c_char> =
            if surface_state_pre.is_some() { vec![ash::khr::swapchain::NAME.as_ptr()] } else { vec![] };
        #[cfg(not(feature = "window"))]
        let device_extensions: Vec<*const std::ffi::c_char> = vec![];

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extensions);
        let device_raw = unsafe {
            instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| RhiError::NotSupported(e.to_string()))?
        };

        let graphics_queue_raw = unsafe { device_raw.get_device_queue(graphics_family, 0) };
        let transfer_queue_raw = transfer_family.map(|tf| unsafe { device_raw.get_device_queue(tf, 0) });

        let command_pool_create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe {
            device_raw
                .create_command_pool(&command_pool_create_info, None)
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
        };

        let device = Arc::new(device_raw);

        #[cfg(feature = "window")]
        let surface_state = surface_state_pre.map(|(surface, surface_loader)| SurfaceState {
            surface,
            surface_loader,
            swapchain_loader: ash::khr::swapchain::Device::new(&instance, &device),
        });

        Ok(Arc::new(Self {
            entry,
            instance,
            physical_device,
            graphics_queue: queue::VulkanQueue::new(Arc::clone(&device), graphics_queue_raw),
            transfer_queue: transfer_queue_raw.map(|q| queue::VulkanQueue::new(Arc::clone(&device), q)),
            queue_family_capabilities,
            command_pool,
            descriptor_pool_cache: descriptor::DescriptorPoolCache::new(),
            render_pass_cache: Arc::new(Mutex::new(HashMap::new())),
            framebuffer_cache: Arc::new(Mutex::new(HashMap::new())),
            #[cfg(feature = "window")]
            surface_state,
            device,
        }))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        // PoolSlot::drop destroys a raw VkDescriptorPool; it must run before the device below.
        let _ = std::mem::take(&mut self.descriptor_pool_cache);
        if let Ok(mut cache) = self.framebuffer_cache.lock() {
            for (_, fb) in cache.drain() {
                unsafe {
                    self.device.destroy_framebuffer(fb, None);
                }
            }
        }
        if let Ok(mut cache) = self.render_pass_cache.lock() {
            for (_, rp) in cache.drain() {
                unsafe {
                    self.device.destroy_render_pass(rp, None);
                }
            }
        }
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
        #[cfg(feature = "window")]
        if let Some(ref s) = self.surface_state {
            unsafe {
                s.surface_loader.destroy_surface(s.surface, None);
            }
        }
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDevice").finish_non_exhaustive()
    }
}

impl Device for VulkanDevice {
    fn create_buffer(&self, desc: &BufferDescriptor) -> RhiResult<Box<dyn Buffer>> {
        let buf = buffer::create_buffer(Arc::clone(&self.device), &self.instance, self.physical_device, desc)?;
        Ok(Box::new(buf))
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> RhiResult<Box<dyn Texture>> {
        let tex = texture::create_texture(Arc::clone(&self.device), &self.instance, self.physical_device, desc)?;
        Ok(Box::new(tex))
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> RhiResult<Box<dyn Sampler>> {
        let s = sampler::create_sampler(Arc::clone(&self.device), desc)?;
        Ok(Box::new(s))
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDescriptor,
        render_pass: &RenderPassDescriptor,
    ) -> RhiResult<Box<dyn crate::GraphicsPipeline>> {
        let vk_render_pass = get_or_create_render_pass(&self.device, &self.render_pass_cache, render_pass)?;
        let color_attachment_count = render_pass.subpasses.first().map(|s| s.color_attachments.len()).unwrap_or(0) as u32;
        let pipe = pipeline::VulkanGraphicsPipeline::create(Arc::clone(&self.device), desc, vk_render_pass, color_attachment_count)?;
        Ok(Box::new(pipe))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor) -> RhiResult<Box<dyn crate::ComputePipeline>> {
        let pipe = pipeline::VulkanComputePipeline::create(Arc::clone(&self.device), desc)?;
        Ok(Box::new(pipe))
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorSetLayoutBinding]) -> RhiResult<Box<dyn DescriptorSetLayout>> {
        let layout = descriptor::create_descriptor_set_layout(Arc::clone(&self.device), bindings)?;
        Ok(Box::new(layout))
    }

    fn create_descriptor_pool(&self, bindings: &[DescriptorSetLayoutBinding]) -> RhiResult<Box<dyn crate::DescriptorPool>> {
        let counts = TypeCounts::from_bindings(bindings);
        let pool = self.descriptor_pool_cache.acquire(Arc::clone(&self.device), counts)?;
        Ok(Box::new(pool))
    }

    fn create_command_encoder(&self) -> RhiResult<Box<dyn CommandEncoder>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
        };
        let cmd = buffers[0];
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?;
        }
        Ok(Box::new(VulkanCommandEncoder {
            device: Arc::clone(&self.device),
            buffer: cmd,
            finished: false,
            render_pass_cache: Arc::clone(&self.render_pass_cache),
            framebuffer_cache: Arc::clone(&self.framebuffer_cache),
        }))
    }

    fn queue(&self) -> &dyn crate::Queue {
        &self.graphics_queue
    }

    fn transfer_queue(&self) -> &dyn crate::Queue {
        self.transfer_queue.as_ref().map(|q| q as &dyn crate::Queue).unwrap_or(&self.graphics_queue)
    }

    fn write_buffer(&self, buffer: &dyn Buffer, offset: u64, data: &[u8]) -> RhiResult<()> {
        let vk_buf = buffer
            .as_any()
            .downcast_ref::<buffer::VulkanBuffer>()
            .ok_or_else(|| RhiError::InvalidArgument("buffer must originate from the Vulkan backend".into()))?;
        vk_buf.write(offset, data)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle().map_err(|_| RhiError::DeviceLost) }
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<Box<dyn Fence>> {
        let create_info =
            vk::FenceCreateInfo::default().flags(if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() });
        let fence = unsafe {
            self.device
                .create_fence(&create_info, None)
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
        };
        Ok(Box::new(VulkanFence { device: Arc::clone(&self.device), fence }))
    }

    fn create_semaphore(&self) -> RhiResult<Box<dyn Semaphore>> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe {
            self.device
                .create_semaphore(&create_info, None)
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
        };
        Ok(Box::new(VulkanSemaphore { device: Arc::clone(&self.device), semaphore }))
    }

    fn query_queue_id(&self, capabilities: QueueCapabilities) -> Option<u32> {
        self.queue_family_capabilities
            .iter()
            .enumerate()
            .find(|(_, caps)| caps.contains(capabilities))
            .map(|(i, _)| i as u32)
    }

    #[cfg(feature = "window")]
    fn create_swapchain(&self, extent: (u32, u32), present_mode: PresentMode) -> RhiResult<Box<dyn crate::Swapchain>> {
        let state = self
            .surface_state
            .as_ref()
            .ok_or_else(|| RhiError::NotSupported("device was created without a surface".into()))?;
        let capabilities = unsafe {
            state
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, state.surface)
                .map_err(|_| RhiError::SurfaceLost)?
        };
        let formats = unsafe {
            state
                .surface_loader
                .get_physical_device_surface_formats(self.physical_device, state.surface)
                .map_err(|_| RhiError::SurfaceLost)?
        };
        let present_modes = unsafe {
            state
                .surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, state.surface)
                .map_err(|_| RhiError::SurfaceLost)?
        };

        let format = swapchain::choose_surface_format(&formats);
        let vk_present_mode = swapchain::choose_present_mode(&present_modes, present_mode);
        let vk_extent = swapchain::choose_extent(&capabilities, extent);
        let image_count = swapchain::choose_image_count(&capabilities);
        let composite_alpha = swapchain::choose_composite_alpha(&capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(state.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(vk_extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(vk_present_mode)
            .clipped(true);

        let vk_swapchain = unsafe {
            state
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
        };

        let vulkan_swapchain = swapchain::VulkanSwapchain::new(
            Arc::clone(&self.device),
            state.swapchain_loader.clone(),
            vk_swapchain,
            self.graphics_queue.queue,
            vk_extent,
            format.format,
            vk_present_mode,
        )?;
        Ok(Box::new(vulkan_swapchain))
    }

    fn immediate_execute(&self, f: &mut dyn FnMut(&mut dyn CommandEncoder)) -> RhiResult<()> {
        let mut encoder = self.create_command_encoder()?;
        f(encoder.as_mut());
        let cmd = encoder.finish()?;
        let fence = self.create_fence(false)?;
        self.queue().submit(vec![cmd], &[], &[], Some(fence.as_ref()))?;
        fence.wait(u64::MAX)?;
        Ok(())
    }
}

struct VulkanCommandEncoder {
    device: Arc<ash::Device>,
    buffer: vk::CommandBuffer,
    finished: bool,
    render_pass_cache: Arc<Mutex<HashMap<RenderPassDescriptor, vk::RenderPass>>>,
    framebuffer_cache: Arc<Mutex<HashMap<FramebufferCacheKey, vk::Framebuffer>>>,
}

impl Drop for VulkanCommandEncoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = unsafe { self.device.end_command_buffer(self.buffer) };
        }
    }
}

impl std::fmt::Debug for VulkanCommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandEncoder").finish()
    }
}

impl CommandEncoder for VulkanCommandEncoder {
    fn begin_render_pass(
        &mut self,
        render_pass: &RenderPassDescriptor,
        framebuffer: &FramebufferDescriptor,
        views: &[&dyn TextureView],
        clear_values: &[[f32; 4]],
    ) -> RhiResult<Box<dyn crate::RenderPassRecorder + '_>> {
        let vk_render_pass = get_or_create_render_pass(&self.device, &self.render_pass_cache, render_pass)?;
        let image_views: Vec<vk::ImageView> = views.iter().map(|v| texture::view_handle(*v)).collect();
        let extent = vk::Extent2D { width: framebuffer.extent.0, height: framebuffer.extent.1 };
        let vk_framebuffer = get_or_create_framebuffer(&self.device, &self.framebuffer_cache, vk_render_pass, extent, &image_views)?;

        let vk_clear_values: Vec<vk::ClearValue> = framebuffer
            .attachment_formats
            .iter()
            .zip(clear_values.iter())
            .map(|(format, cv)| {
                if format.is_depth_format() {
                    vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: cv[0], stencil: cv[1] as u32 } }
                } else {
                    vk::ClearValue { color: vk::ClearColorValue { float32: *cv } }
                }
            })
            .collect();

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass)
            .framebuffer(vk_framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .clear_values(&vk_clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(self.buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Ok(Box::new(render_pass::VulkanRenderPassRecorder::new(Arc::clone(&self.device), self.buffer, extent)))
    }

    fn begin_compute_pass(&mut self) -> Box<dyn ComputePassRecorder + '_> {
        Box::new(VulkanComputePassRecorder { device: Arc::clone(&self.device), buffer: self.buffer, pipeline_layout: None })
    }

    fn copy_buffer_to_buffer(&mut self, src: &dyn Buffer, src_offset: u64, dst: &dyn Buffer, dst_offset: u64, size: u64) {
        let src_buf = src.as_any().downcast_ref::<buffer::VulkanBuffer>().expect("src must originate from the Vulkan backend");
        let dst_buf = dst.as_any().downcast_ref::<buffer::VulkanBuffer>().expect("dst must originate from the Vulkan backend");
        let region = vk::BufferCopy::default().src_offset(src_offset).dst_offset(dst_offset).size(size);
        unsafe {
            self.device.cmd_copy_buffer(self.buffer, src_buf.buffer, dst_buf.buffer, &[region]);
        }
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, src_offset: u64, dst: &dyn Texture, mip: u32, layer: u32) {
        let src_buf = src.as_any().downcast_ref::<buffer::VulkanBuffer>().expect("src must originate from the Vulkan backend");
        let dst_tex = dst.as_any().downcast_ref::<VulkanTexture>().expect("dst must originate from the Vulkan backend");
        let mip_w = (dst_tex.size.0 >> mip).max(1);
        let mip_h = (dst_tex.size.1 >> mip).max(1);
        let region = vk::BufferImageCopy::default()
            .buffer_offset(src_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(mip)
                    .base_array_layer(layer)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D { width: mip_w, height: mip_h, depth: 1 });
        unsafe {
            self.device
                .cmd_copy_buffer_to_image(self.buffer, src_buf.buffer, dst_tex.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
        }
    }

    fn copy_texture_to_buffer(
        &mut self,
        src: &dyn Texture,
        mip: u32,
        layer: u32,
        region: (u32, u32, u32, u32),
        dst: &dyn Buffer,
        dst_offset: u64,
    ) {
        let src_tex = src.as_any().downcast_ref::<VulkanTexture>().expect("src must originate from the Vulkan backend");
        let dst_buf = dst.as_any().downcast_ref::<buffer::VulkanBuffer>().expect("dst must originate from the Vulkan backend");
        let (x, y, width, height) = region;
        let copy = vk::BufferImageCopy::default()
            .buffer_offset(dst_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(mip)
                    .base_array_layer(layer)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D { x: x as i32, y: y as i32, z: 0 })
            .image_extent(vk::Extent3D { width, height, depth: 1 });
        unsafe {
            self.device
                .cmd_copy_image_to_buffer(self.buffer, src_tex.image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, dst_buf.buffer, &[copy]);
        }
    }

    fn pipeline_barrier_texture(&mut self, texture: &dyn Texture, old_layout: ImageLayout, new_layout: ImageLayout) {
        let vk_tex = texture.as_any().downcast_ref::<VulkanTexture>().expect("texture must originate from the Vulkan backend");
        let is_depth = texture.format().is_depth_format();
        let aspect_mask = if is_depth {
            if texture.format().has_stencil() {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            } else {
                vk::ImageAspectFlags::DEPTH
            }
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let (src_stage, src_access, dst_stage, dst_access) = image_barrier_stages_access(old_layout, new_layout, is_depth);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(old_layout))
            .new_layout(image_layout_to_vk(new_layout))
            .image(vk_tex.image)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .base_array_layer(0)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            );
        unsafe {
            self.device
                .cmd_pipeline_barrier(self.buffer, src_stage, dst_stage, vk::DependencyFlags::empty(), &[], &[], &[barrier]);
        }
    }

    fn pipeline_barrier_buffer(&mut self, buffer: &dyn Buffer, offset: u64, size: u64) {
        let vk_buf = buffer.as_any().downcast_ref::<buffer::VulkanBuffer>().expect("buffer must originate from the Vulkan backend");
        let size = if size == 0 { buffer.size().saturating_sub(offset) } else { size };
        if size == 0 {
            return;
        }
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(vk_buf.buffer)
            .offset(offset)
            .size(size);
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    fn generate_mipmaps(&mut self, texture: &dyn Texture) {
        let vk_tex = texture.as_any().downcast_ref::<VulkanTexture>().expect("texture must originate from the Vulkan backend");
        let image = vk_tex.image;
        let (mut mip_w, mut mip_h, _) = vk_tex.size;
        let mip_count = vk_tex.mip_count;

        for level in 1..mip_count {
            let next_w = (mip_w / 2).max(1);
            let next_h = (mip_h / 2).max(1);
            let to_src = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
                .image(image)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(level - 1)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            unsafe {
                self.device.cmd_pipeline_barrier(
                    self.buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_src],
                );
            }
            let blit = vk::ImageBlit::default()
                .src_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(level - 1)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .src_offsets([vk::Offset3D::default(), vk::Offset3D { x: mip_w as i32, y: mip_h as i32, z: 1 }])
                .dst_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(level)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .dst_offsets([vk::Offset3D::default(), vk::Offset3D { x: next_w as i32, y: next_h as i32, z: 1 }]);
            unsafe {
                self.device.cmd_blit_image(
                    self.buffer,
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }
            mip_w = next_w;
            mip_h = next_h;
        }

        // The loop leaves every level but the last in TransferSrc; bring the last level along so
        // the whole chain is uniformly TransferSrc for the caller's next barrier.
        let final_to_src = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(mip_count - 1)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[final_to_src],
            );
        }
    }

    fn finish(mut self: Box<Self>) -> RhiResult<Box<dyn CommandBuffer>> {
        unsafe {
            self.device
                .end_command_buffer(self.buffer)
                .map_err(|e| RhiError::InvalidArgument(e.to_string()))?;
        }
        self.finished = true;
        Ok(Box::new(VulkanCommandBuffer { buffer: self.buffer }))
    }
}

struct VulkanComputePassRecorder {
    device: Arc<ash::Device>,
    buffer: vk::CommandBuffer,
    pipeline_layout: Option<vk::PipelineLayout>,
}

impl std::fmt::Debug for VulkanComputePassRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanComputePassRecorder").finish()
    }
}

impl ComputePassRecorder for VulkanComputePassRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn crate::ComputePipeline) {
        let vk_pipe = pipeline
            .as_any()
            .downcast_ref::<pipeline::VulkanComputePipeline>()
            .expect("pipeline must originate from the Vulkan backend");
        unsafe {
            self.device.cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::COMPUTE, vk_pipe.raw());
        }
        self.pipeline_layout = Some(vk_pipe.layout());
    }

    fn bind_descriptor_set(&mut self, index: u32, set: &dyn DescriptorSet) {
        let layout = self.pipeline_layout.expect("bind_descriptor_set called before set_pipeline");
        let vk_set = set
            .as_any()
            .downcast_ref::<descriptor::VulkanDescriptorSet>()
            .expect("descriptor set must originate from the Vulkan backend");
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(self.buffer, vk::PipelineBindPoint::COMPUTE, layout, index, &[vk_set.set], &[]);
        }
    }

    fn push_constants(&mut self, stage: ShaderStage, offset: u32, data: &[u8]) {
        let layout = self.pipeline_layout.expect("push_constants called before set_pipeline");
        unsafe {
            self.device.cmd_push_constants(self.buffer, layout, descriptor::shader_stage_to_vk(stage), offset, data);
        }
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe {
            self.device.cmd_dispatch(self.buffer, x, y, z);
        }
    }

    fn end(self: Box<Self>) {}
}

/// A finished command buffer ready for submission. Not individually freed on drop: buffers
/// allocated from `VulkanDevice::command_pool` are reclaimed only when the pool itself is reset
/// or destroyed, so a `Queue::submit` that drops its `Vec<Box<dyn CommandBuffer>>` right after
/// submitting never frees a buffer the GPU is still executing.
pub struct VulkanCommandBuffer {
    buffer: vk::CommandBuffer,
}

impl std::fmt::Debug for VulkanCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandBuffer").finish()
    }
}

impl CommandBuffer for VulkanCommandBuffer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanFence {
    device: Arc<ash::Device>,
    fence: vk::Fence,
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

impl std::fmt::Debug for VulkanFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanFence").finish()
    }
}

impl Fence for VulkanFence {
    fn wait(&self, timeout_ns: u64) -> RhiResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns).map_err(|_| RhiError::DeviceLost) }
    }

    fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(|_| RhiError::DeviceLost) }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanSemaphore {
    device: Arc<ash::Device>,
    semaphore: vk::Semaphore,
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

impl std::fmt::Debug for VulkanSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSemaphore").finish()
    }
}

impl Semaphore for VulkanSemaphore {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
