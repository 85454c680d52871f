//! Vulkan Buffer implementation.

use crate::{Buffer, BufferDescriptor, BufferMemoryPreference, BufferUsage, RhiError, RhiResult};
use ash::vk;
use std::sync::Arc;

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM_TEXEL) {
        flags |= vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE_TEXEL) {
        flags |= vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER;
    }
    flags
}

pub fn create_buffer(
    device: Arc<ash::Device>,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    desc: &BufferDescriptor,
) -> RhiResult<VulkanBuffer> {
    let size = desc.size.max(1);
    let create_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(buffer_usage_to_vk(desc.usage))
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe {
        device
            .create_buffer(&create_info, None)
            .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
    };
    let memory = super::memory::allocate_for_buffer(&device, instance, physical_device, buffer, desc.memory)?;
    let host_visible = !matches!(desc.memory, BufferMemoryPreference::DeviceLocal);
    Ok(VulkanBuffer {
        device,
        buffer,
        memory,
        size,
        host_visible,
    })
}

pub struct VulkanBuffer {
    pub device: Arc<ash::Device>,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: u64,
    pub host_visible: bool,
}

impl VulkanBuffer {
    /// Maps the whole allocation, copies `data` at `offset`, and unmaps. Only valid for
    /// host-visible buffers; callers must check `host_visible` first.
    pub fn write(&self, offset: u64, data: &[u8]) -> RhiResult<()> {
        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?;
            let dst = ptr.cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Maps the whole allocation, copies `len` bytes starting at `offset` out, and unmaps.
    pub fn read(&self, offset: u64, len: usize) -> RhiResult<Vec<u8>> {
        let mut out = vec![0u8; len];
        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(|e| RhiError::OutOfMemory(e.to_string()))?;
            let src = ptr.cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), len);
            self.device.unmap_memory(self.memory);
        }
        Ok(out)
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

impl std::fmt::Debug for VulkanBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBuffer")
            .field("size", &self.size)
            .field("host_visible", &self.host_visible)
            .finish()
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }
    fn read(&self, offset: u64, len: usize) -> RhiResult<Vec<u8>> {
        VulkanBuffer::read(self, offset, len)
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
