//! Shared Vulkan memory-type selection and allocation. Buffers and textures route through this
//! single helper rather than each owning a bespoke allocator (component A/C).

use crate::{BufferMemoryPreference, RhiError, RhiResult};
use ash::vk;

pub fn memory_property_flags(preference: BufferMemoryPreference) -> vk::MemoryPropertyFlags {
    match preference {
        BufferMemoryPreference::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        BufferMemoryPreference::HostVisibleSequential | BufferMemoryPreference::HostVisibleRandom => {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        }
    }
}

pub fn find_memory_type(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    let props = unsafe { instance.get_physical_device_memory_properties(physical_device) };
    (0..props.memory_type_count)
        .find(|i| {
            let suitable = (type_bits & (1 << i)) != 0;
            suitable && props.memory_types[*i as usize].property_flags.contains(required)
        })
        .or_else(|| (0..props.memory_type_count).find(|i| (type_bits & (1 << i)) != 0))
        .ok_or_else(|| RhiError::OutOfMemory("no suitable memory type for requested resource".into()))
}

pub fn allocate_for_buffer(
    device: &ash::Device,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    buffer: vk::Buffer,
    preference: BufferMemoryPreference,
) -> RhiResult<vk::DeviceMemory> {
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let memory_type_index = find_memory_type(
        instance,
        physical_device,
        requirements.memory_type_bits,
        memory_property_flags(preference),
    )?;
    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    let memory = unsafe {
        device
            .allocate_memory(&allocate_info, None)
            .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
    };
    unsafe {
        device
            .bind_buffer_memory(buffer, memory, 0)
            .map_err(|_| RhiError::DeviceLost)?;
    }
    Ok(memory)
}

pub fn allocate_for_image(
    device: &ash::Device,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    image: vk::Image,
) -> RhiResult<vk::DeviceMemory> {
    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type_index = find_memory_type(
        instance,
        physical_device,
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    let memory = unsafe {
        device
            .allocate_memory(&allocate_info, None)
            .map_err(|e| RhiError::OutOfMemory(e.to_string()))?
    };
    unsafe {
        device
            .bind_image_memory(image, memory, 0)
            .map_err(|_| RhiError::DeviceLost)?;
    }
    Ok(memory)
}
