//! Frame orchestrator (component D): per-frame resources, deferred destruction, presentation.

use crate::{CommandBuffer, Device, Fence, PipelineStage, RhiError, RhiResult, Semaphore, Swapchain, TextureView};
use std::fmt;

/// A destroy request queued until the GPU has finished the frame that referenced the handle.
/// The backend exposes one coarse-grained destroy entry point per handle kind so the
/// orchestrator doesn't need to know concrete backend types.
pub enum DeferredDestroy {
    Buffer(Box<dyn crate::Buffer>),
    Texture(Box<dyn crate::Texture>),
    TextureView(Box<dyn TextureView>),
    Sampler(Box<dyn crate::Sampler>),
    DescriptorSet(Box<dyn crate::DescriptorSet>),
    GraphicsPipeline(Box<dyn crate::GraphicsPipeline>),
    ComputePipeline(Box<dyn crate::ComputePipeline>),
}

impl fmt::Debug for DeferredDestroy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            DeferredDestroy::Buffer(_) => "Buffer",
            DeferredDestroy::Texture(_) => "Texture",
            DeferredDestroy::TextureView(_) => "TextureView",
            DeferredDestroy::Sampler(_) => "Sampler",
            DeferredDestroy::DescriptorSet(_) => "DescriptorSet",
            DeferredDestroy::GraphicsPipeline(_) => "GraphicsPipeline",
            DeferredDestroy::ComputePipeline(_) => "ComputePipeline",
        };
        write!(f, "DeferredDestroy::{kind}")
    }
}

/// Per in-flight-frame tuple: command buffer, two semaphores, a fence, and a deferred-destroy
/// queue. `command_buffer` is `None` between `end_frame`/`finish` and the next `begin_frame`.
pub struct FrameSlot {
    pub present_semaphore: Box<dyn Semaphore>,
    pub render_semaphore: Box<dyn Semaphore>,
    pub fence: Box<dyn Fence>,
    pub deferred_destroy: Vec<DeferredDestroy>,
    pub waiting_signal: bool,
}

impl FrameSlot {
    fn new(device: &dyn Device) -> RhiResult<Self> {
        Ok(Self {
            present_semaphore: device.create_semaphore()?,
            render_semaphore: device.create_semaphore()?,
            fence: device.create_fence(false)?,
            deferred_destroy: Vec::new(),
            waiting_signal: false,
        })
    }
}

/// Drains a slot's pending destroys. The actual drop of each boxed handle runs the backend's
/// destructor; this just moves ownership out of the queue so it runs exactly once.
fn drain(slot: &mut FrameSlot) {
    slot.deferred_destroy.clear();
}

/// Orchestrates per-frame GPU resource lifetime and swapchain acquire/present (§4.D).
pub struct FrameOrchestrator {
    frames_in_flight: usize,
    frame_index: usize,
    slots: Vec<FrameSlot>,
    acquired_image_index: Option<u32>,
}

impl FrameOrchestrator {
    pub fn new(device: &dyn Device, frames_in_flight: usize) -> RhiResult<Self> {
        let frames_in_flight = frames_in_flight.max(1);
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSlot::new(device)?);
        }
        Ok(Self {
            frames_in_flight,
            frame_index: 0,
            slots,
            acquired_image_index: None,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn current_slot_index(&self) -> usize {
        self.frame_index
    }

    pub fn current_slot(&self) -> &FrameSlot {
        &self.slots[self.frame_index]
    }

    /// Queues `handle` for destruction on the *current* slot; the queue draining on the next
    /// `begin_frame` for this slot guarantees a full GPU round-trip has elapsed.
    pub fn destroy_pending(&mut self, handle: DeferredDestroy) {
        self.slots[self.frame_index].deferred_destroy.push(handle);
    }

    /// Step 1-6 of §4.D `begin_frame`. Returns the acquired swapchain image view.
    pub fn begin_frame<'a>(
        &mut self,
        device: &dyn Device,
        swapchain: &'a mut dyn Swapchain,
    ) -> RhiResult<(u32, &'a dyn TextureView)> {
        {
            let slot = &mut self.slots[self.frame_index];
            if slot.waiting_signal {
                slot.fence.wait(u64::MAX)?;
                slot.fence.reset()?;
                slot.waiting_signal = false;
            }
            // Drained unconditionally, even on the very first frame: harmless no-op then,
            // and keeps the state machine simple (open question in the source, resolved here).
            drain(slot);
        }

        let (image_index, view) = swapchain.acquire_next_image(self.slots[self.frame_index].present_semaphore.as_ref())?;
        self.acquired_image_index = Some(image_index);
        Ok((image_index, view))
    }

    /// Step 1-2 of §4.D `end_frame`: submits `command_buffer`, arming the slot's fence.
    pub fn end_frame(&mut self, device: &dyn Device, command_buffer: Box<dyn CommandBuffer>) -> RhiResult<()> {
        let slot = &mut self.slots[self.frame_index];
        device.queue().submit(
            vec![command_buffer],
            &[(slot.present_semaphore.as_ref(), PipelineStage::COLOR_ATTACHMENT_OUTPUT)],
            &[slot.render_semaphore.as_ref()],
            Some(slot.fence.as_ref()),
        )?;
        slot.waiting_signal = true;
        Ok(())
    }

    /// Presents the acquired image, waiting on the render-complete semaphore, then advances
    /// `frame_index = (frame_index + 1) mod frames_in_flight`.
    pub fn present(&mut self, swapchain: &mut dyn Swapchain) -> RhiResult<()> {
        let image_index = self
            .acquired_image_index
            .take()
            .ok_or_else(|| RhiError::InvalidArgument("present called without a prior begin_frame".into()))?;
        let result = swapchain.present(image_index, self.slots[self.frame_index].render_semaphore.as_ref());
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight;
        result
    }

    /// §4.D `immediate_execute`: runs `f` on the device's own dedicated fence/command buffer and
    /// blocks until complete. Used only for startup uploads, IBL precompute, and ID readback.
    pub fn immediate_execute(&self, device: &dyn Device, f: &mut dyn FnMut(&mut dyn crate::CommandEncoder)) -> RhiResult<()> {
        device.immediate_execute(f)
    }
}

#[cfg(test)]
mod tests {
    // `FrameOrchestrator` needs a live `Device`; its state-machine invariants (drain-then-wait
    // ordering, frame_index wraparound) are covered against a fake in forge-renderer's tests
    // where a headless mock device is available.
}
