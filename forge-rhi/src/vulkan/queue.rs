//! Vulkan queue submission.

use crate::{CommandBuffer, Fence, PipelineStage, Queue, RhiError, RhiResult, Semaphore};
use ash::vk;
use std::sync::Arc;

pub struct VulkanQueue {
    pub device: Arc<ash::Device>,
    pub queue: vk::Queue,
}

impl VulkanQueue {
    pub fn new(device: Arc<ash::Device>, queue: vk::Queue) -> Self {
        Self { device, queue }
    }
}

impl std::fmt::Debug for VulkanQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanQueue").finish()
    }
}

impl Queue for VulkanQueue {
    fn submit(
        &self,
        command_buffers: Vec<Box<dyn CommandBuffer>>,
        wait: &[(&dyn Semaphore, PipelineStage)],
        signal: &[&dyn Semaphore],
        fence: Option<&dyn Fence>,
    ) -> RhiResult<()> {
        // Command buffers are allocated from a pool that is reset wholesale once its frame slot's
        // fence signals (see VulkanCommandBuffer); dropping the Vec here does not free them early.
        let vk_buffers: Vec<vk::CommandBuffer> = command_buffers
            .iter()
            .filter_map(|b| b.as_any().downcast_ref::<super::VulkanCommandBuffer>().map(|vb| vb.buffer))
            .collect();
        if vk_buffers.is_empty() {
            return Ok(());
        }

        let wait_semas: Vec<vk::Semaphore> = wait
            .iter()
            .filter_map(|(s, _)| s.as_any().downcast_ref::<super::VulkanSemaphore>().map(|vs| vs.semaphore))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = wait.iter().map(|(_, stage)| super::pipeline_stage_to_vk(*stage)).collect();
        let signal_semas: Vec<vk::Semaphore> = signal
            .iter()
            .filter_map(|s| s.as_any().downcast_ref::<super::VulkanSemaphore>().map(|vs| vs.semaphore))
            .collect();

        let vk_fence = fence
            .and_then(|f| f.as_any().downcast_ref::<super::VulkanFence>().map(|vf| vf.fence))
            .unwrap_or(vk::Fence::null());

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&vk_buffers)
            .wait_semaphores(&wait_semas)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semas);

        unsafe {
            self.device.queue_submit(self.queue, &[submit_info], vk_fence).map_err(|e| {
                log::error!("queue_submit failed: {:?}", e);
                RhiError::DeviceLost
            })?;
        }
        Ok(())
    }
}
