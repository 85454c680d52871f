//! Vulkan Descriptor Set Layout, Pool, and Set.
//!
//! Pools are bucketed by [`TypeCounts`]: each raw `VkDescriptorPool` is sized for
//! [`POOL_CAPACITY`] sets of one exact type-count shape, and handed out to callers whose
//! `create_descriptor_pool` request hashes to that shape until it fills up, at which point a
//! fresh raw pool is created for the same bucket.

use crate::{
    Buffer, DescriptorPool, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutBinding,
    DescriptorType, ImageLayout, RhiError, RhiResult, Sampler, ShaderStage, TextureView, TypeCounts,
};
use ash::vk;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const POOL_CAPACITY: u32 = 64;

pub struct VulkanDescriptorSetLayout {
    pub device: Arc<ash::Device>,
    pub layout: vk::DescriptorSetLayout,
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

impl VulkanDescriptorSetLayout {
    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

impl std::fmt::Debug for VulkanDescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDescriptorSetLayout").finish()
    }
}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn descriptor_type_to_vk(t: DescriptorType) -> vk::DescriptorType {
    match t {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        DescriptorType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub fn shader_stage_to_vk(s: ShaderStage) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if s.contains(ShaderStage::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if s.contains(ShaderStage::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if s.contains(ShaderStage::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub fn create_descriptor_set_layout(
    device: Arc<ash::Device>,
    bindings: &[DescriptorSetLayoutBinding],
) -> RhiResult<VulkanDescriptorSetLayout> {
    let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
        .iter()
        .map(|b| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                .descriptor_count(b.count.max(1))
                .stage_flags(shader_stage_to_vk(b.stage_mask))
        })
        .collect();
    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
    let layout = unsafe {
        device
            .create_descriptor_set_layout(&create_info, None)
            .map_err(|e| RhiError::InvalidArgument(e.to_string()))?
    };
    Ok(VulkanDescriptorSetLayout {
        device,
        layout,
        bindings: bindings.to_vec(),
    })
}

struct PoolSlot {
    device: Arc<ash::Device>,
    pool: vk::DescriptorPool,
    allocated: AtomicU32,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

fn create_raw_pool(device: &ash::Device, counts: TypeCounts) -> RhiResult<vk::DescriptorPool> {
    let pool_sizes: Vec<vk::DescriptorPoolSize> = (0..crate::DESCRIPTOR_TYPE_COUNT)
        .filter(|&i| counts.0[i] > 0)
        .map(|i| {
            let ty = DESCRIPTOR_TYPES[i];
            vk::DescriptorPoolSize::default()
                .ty(descriptor_type_to_vk(ty))
                .descriptor_count(counts.0[i] * POOL_CAPACITY)
        })
        .collect();
    if pool_sizes.is_empty() {
        return Err(RhiError::InvalidArgument(
            "descriptor pool requested with no bindings".into(),
        ));
    }
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(POOL_CAPACITY)
        .pool_sizes(&pool_sizes);
    unsafe {
        device
            .create_descriptor_pool(&create_info, None)
            .map_err(|e| RhiError::OutOfMemory(e.to_string()))
    }
}

const DESCRIPTOR_TYPES: [DescriptorType; crate::DESCRIPTOR_TYPE_COUNT] = [
    DescriptorType::Sampler,
    DescriptorType::SampledImage,
    DescriptorType::CombinedImageSampler,
    DescriptorType::StorageImage,
    DescriptorType::UniformBuffer,
    DescriptorType::StorageBuffer,
    DescriptorType::UniformTexelBuffer,
    DescriptorType::StorageTexelBuffer,
    DescriptorType::InputAttachment,
];

/// Device-wide cache of raw pools bucketed by [`TypeCounts`]. Owned by `VulkanDevice`.
#[derive(Default)]
pub struct DescriptorPoolCache {
    buckets: Mutex<HashMap<TypeCounts, Vec<Arc<PoolSlot>>>>,
}

impl DescriptorPoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a bucketed pool with spare capacity for `counts`, or creates a fresh one.
    pub fn acquire(&self, device: Arc<ash::Device>, counts: TypeCounts) -> RhiResult<VulkanDescriptorPool> {
        let mut buckets = self.buckets.lock().unwrap();
        let slots = buckets.entry(counts).or_default();
        for slot in slots.iter() {
            loop {
                let current = slot.allocated.load(Ordering::Acquire);
                if current >= POOL_CAPACITY {
                    break;
                }
                if slot
                    .allocated
                    .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(VulkanDescriptorPool { device, slot: Arc::clone(slot) });
                }
            }
        }
        let raw = create_raw_pool(&device, counts)?;
        let slot = Arc::new(PoolSlot {
            device: Arc::clone(&device),
            pool: raw,
            allocated: AtomicU32::new(1),
        });
        slots.push(Arc::clone(&slot));
        Ok(VulkanDescriptorPool { device, slot })
    }
}

/// A checked-out slot in a bucketed raw pool. Dropping it releases the slot's reservation but
/// does not destroy the underlying `VkDescriptorPool`, which is retained by the device's cache
/// for reuse by the next `create_descriptor_pool` call that hashes to the same bucket.
pub struct VulkanDescriptorPool {
    device: Arc<ash::Device>,
    slot: Arc<PoolSlot>,
}

impl Drop for VulkanDescriptorPool {
    fn drop(&mut self) {
        self.slot.allocated.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for VulkanDescriptorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDescriptorPool").finish()
    }
}

impl DescriptorPool for VulkanDescriptorPool {
    fn allocate(&self, layout: &dyn DescriptorSetLayout) -> RhiResult<Box<dyn DescriptorSet>> {
        let vk_layout = layout
            .as_any()
            .downcast_ref::<VulkanDescriptorSetLayout>()
            .ok_or_else(|| RhiError::InvalidArgument("layout must be VulkanDescriptorSetLayout".into()))?;
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.slot.pool)
            .set_layouts(std::slice::from_ref(&vk_layout.layout));
        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
        };
        Ok(Box::new(VulkanDescriptorSet {
            device: Arc::clone(&self.device),
            set: sets[0],
            bindings: vk_layout.bindings.clone(),
        }))
    }
}

pub struct VulkanDescriptorSet {
    pub device: Arc<ash::Device>,
    pub set: vk::DescriptorSet,
    bindings: Vec<DescriptorSetLayoutBinding>,
}

impl std::fmt::Debug for VulkanDescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDescriptorSet").finish()
    }
}

impl VulkanDescriptorSet {
    fn descriptor_type_for_binding(&self, binding: u32) -> DescriptorType {
        self.bindings
            .iter()
            .find(|b| b.binding == binding)
            .map(|b| b.descriptor_type)
            .expect("write to a binding absent from this descriptor set's layout")
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn write_buffer(&self, binding: u32, buffer: &dyn Buffer, offset: u64, size: u64) {
        let descriptor_type = self.descriptor_type_for_binding(binding);
        let vk_buf = buffer
            .as_any()
            .downcast_ref::<super::buffer::VulkanBuffer>()
            .expect("buffer must originate from the Vulkan backend");
        let range = if size > 0 { size } else { buffer.size() - offset };
        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(vk_buf.buffer)
            .offset(offset)
            .range(range);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(descriptor_type_to_vk(descriptor_type))
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    fn write_texture(&self, binding: u32, view: &dyn TextureView, layout: ImageLayout) {
        let descriptor_type = self.descriptor_type_for_binding(binding);
        let image_view = super::texture::view_handle(view);
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(image_view)
            .image_layout(super::image_layout_to_vk(layout));
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(descriptor_type_to_vk(descriptor_type))
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    fn write_combined_image_sampler(&self, binding: u32, view: &dyn TextureView, sampler: &dyn Sampler, layout: ImageLayout) {
        let descriptor_type = self.descriptor_type_for_binding(binding);
        let image_view = super::texture::view_handle(view);
        let vk_sampler = sampler
            .as_any()
            .downcast_ref::<super::sampler::VulkanSampler>()
            .expect("sampler must originate from the Vulkan backend");
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(image_view)
            .image_layout(super::image_layout_to_vk(layout))
            .sampler(vk_sampler.sampler);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.set)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(descriptor_type_to_vk(descriptor_type))
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            self.device.update_descriptor_sets(&[write], &[]);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
