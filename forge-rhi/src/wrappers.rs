//! Per-frame multi-buffered resource wrappers (component E).

use crate::{
    Buffer, BufferDescriptor, BufferMemoryPreference, BufferUsage, DescriptorPool, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutBinding, Device, ImageLayout, RhiResult, Sampler,
    TextureView,
};
use std::marker::PhantomData;

/// A uniform or storage buffer duplicated `frames_in_flight` times. `write(bytes)` writes only
/// the *current* slot's backend buffer (safe because the orchestrator waited on that slot's
/// fence before this call could be reached). `T` must be `bytemuck::Pod` so the wrapper can hand
/// raw bytes to `Device::write_buffer` without `unsafe` at the call site.
pub struct UniformBuffer<T: bytemuck::Pod> {
    buffers: Vec<Box<dyn Buffer>>,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    pub fn new(device: &dyn Device, frames_in_flight: usize, label: Option<&'static str>) -> RhiResult<Self> {
        let size = std::mem::size_of::<T>() as u64;
        let mut buffers = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            buffers.push(device.create_buffer(&BufferDescriptor {
                label,
                size,
                usage: BufferUsage::UNIFORM,
                memory: BufferMemoryPreference::HostVisibleRandom,
            })?);
        }
        Ok(Self { buffers, _marker: PhantomData })
    }

    pub fn buffer(&self, slot: usize) -> &dyn Buffer {
        self.buffers[slot].as_ref()
    }

    pub fn write(&self, device: &dyn Device, slot: usize, value: &T) -> RhiResult<()> {
        device.write_buffer(self.buffers[slot].as_ref(), 0, bytemuck::bytes_of(value))
    }
}

/// A descriptor set duplicated `frames_in_flight` times against the same layout. `set_resource`
/// writes every slot's backend set so an in-flight slot never observes a stale binding after a
/// subsequent resize/re-create; `flush` is a no-op placeholder kept for symmetry with backends
/// that batch writes (the Vulkan backend issues `vkUpdateDescriptorSets` immediately per write).
pub struct DescriptorSetWrapper {
    sets: Vec<Box<dyn DescriptorSet>>,
    layout: Box<dyn DescriptorSetLayout>,
    _pool: Box<dyn DescriptorPool>,
}

impl DescriptorSetWrapper {
    pub fn new(device: &dyn Device, bindings: &[DescriptorSetLayoutBinding], frames_in_flight: usize) -> RhiResult<Self> {
        let layout = device.create_descriptor_set_layout(bindings)?;
        let pool = device.create_descriptor_pool(bindings)?;
        let mut sets = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            sets.push(pool.allocate(layout.as_ref())?);
        }
        Ok(Self { sets, layout, _pool: pool })
    }

    pub fn layout(&self) -> &dyn DescriptorSetLayout {
        self.layout.as_ref()
    }

    pub fn set(&self, slot: usize) -> &dyn DescriptorSet {
        self.sets[slot].as_ref()
    }

    pub fn set_buffer(&self, binding: u32, buffer: &dyn Buffer, offset: u64, size: u64) {
        for set in &self.sets {
            set.write_buffer(binding, buffer, offset, size);
        }
    }

    pub fn set_texture(&self, binding: u32, view: &dyn TextureView, layout: ImageLayout) {
        for set in &self.sets {
            set.write_texture(binding, view, layout);
        }
    }

    pub fn set_combined_image_sampler(&self, binding: u32, view: &dyn TextureView, sampler: &dyn Sampler, layout: ImageLayout) {
        for set in &self.sets {
            set.write_combined_image_sampler(binding, view, sampler, layout);
        }
    }

    /// Present for API symmetry with a batched-write backend; the bindings above already took
    /// effect immediately on this backend.
    pub fn flush(&self) {}
}
