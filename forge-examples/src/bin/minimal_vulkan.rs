//! Minimal runnable example: Forge + Vulkan only. No Bevy, no WGPU.
//! Creates a Vulkan device, buffer, fence, submits an empty command buffer, and exits.

use forge_rhi::Device;

fn main() {
    let device = forge_rhi::VulkanDevice::new().expect("VulkanDevice::new");
    let _buffer = device.create_buffer(&forge_rhi::BufferDescriptor {
        label: Some("minimal"),
        size: 256,
        usage: forge_rhi::BufferUsage::STORAGE,
        memory: forge_rhi::BufferMemoryPreference::HostVisible,
    }).expect("create_buffer");
    let _fence = device.create_fence(false).expect("create_fence");
    let _sem = device.create_semaphore().expect("create_semaphore");
    let encoder = device.create_command_encoder().expect("create_command_encoder");
    let cmd = encoder.finish().expect("finish");
    device.submit(vec![cmd]).expect("submit");
    device.wait_idle().expect("wait_idle");
    println!("Forge + Vulkan OK");
}
