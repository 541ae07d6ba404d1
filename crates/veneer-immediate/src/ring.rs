//! # Frame ring
//!
//! Fixed rotation of [NUM_COMMAND_FRAMES] slots. Each slot bundles a command buffer with the fence that tells when its
//! last submission retired, an optional binary semaphore for chaining, and an optional transient descriptor pool.
//!
//! The slot at the cursor is never in flight while commands are recorded into it: before a slot is reopened its fence
//! is waited on. That fence belongs to the submission made `NUM_COMMAND_FRAMES` flushes ago, so the host can run at
//! most `NUM_COMMAND_FRAMES - 1` submissions ahead of the GPU.

use std::sync::Arc;

use veneer::{
    ash::vk,
    context::Device,
    resources::{CommandBuffer, CommandPool, DescriptorPool},
    sync::{Fence, Semaphore},
};

use crate::ImmediateError;

///Number of slots in the ring. Power of two, so advancing the cursor is a mask.
pub const NUM_COMMAND_FRAMES: usize = 4;
const _: () = assert!(NUM_COMMAND_FRAMES.is_power_of_two());

///Descriptor budget of one transient pool.
pub const TRANSIENT_POOL_SIZES: [vk::DescriptorPoolSize; 5] = [
    vk::DescriptorPoolSize {
        ty: vk::DescriptorType::SAMPLER,
        descriptor_count: 128,
    },
    vk::DescriptorPoolSize {
        ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        descriptor_count: 1024,
    },
    vk::DescriptorPoolSize {
        ty: vk::DescriptorType::SAMPLED_IMAGE,
        descriptor_count: 1024,
    },
    vk::DescriptorPoolSize {
        ty: vk::DescriptorType::STORAGE_IMAGE,
        descriptor_count: 512,
    },
    vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 128,
    },
];
///Maximum number of transient sets per slot and cycle.
pub const TRANSIENT_POOL_MAX_SETS: u32 = 32;

///One rotation unit of the ring.
///
/// Field order is drop order: descriptor pool, fence, semaphore, then the command buffer.
pub(crate) struct Slot {
    pub(crate) transient_pool: Option<DescriptorPool>,
    pub(crate) fence: Fence,
    pub(crate) semaphore: Option<Semaphore>,
    pub(crate) buffer: CommandBuffer,
    ///Semaphores signaled by the slot's last submission. Kept alive until the slot retired.
    pub(crate) retained: Vec<Arc<Semaphore>>,
    ///Incremented whenever `transient_pool` is reset.
    pub(crate) epoch: u64,
}

pub(crate) struct FrameRing {
    slots: Vec<Slot>,
    cursor: usize,
    recording: bool,
    device: Arc<Device>,
}

impl FrameRing {
    ///Creates all slots for `queue_family` and opens slot 0 for recording.
    pub(crate) fn new(device: &Arc<Device>, queue_family: u32) -> Result<Self, ImmediateError> {
        let pool = Arc::new(CommandPool::new(
            device,
            queue_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?);

        let buffers = pool.allocate_buffers(NUM_COMMAND_FRAMES as u32)?;

        let mut slots = Vec::with_capacity(NUM_COMMAND_FRAMES);
        for (i, buffer) in buffers.into_iter().enumerate() {
            #[cfg(feature = "debug_marker")]
            if let Ok(name) =
                std::ffi::CString::new(format!("veneer immediate command list ({})", i))
            {
                device.name_object(buffer.inner, &name);
            }

            //signaled, so waiting on a slot that never submitted succeeds
            let fence = Fence::new(device, true).map_err(veneer::DeviceError::FenceCreation)?;

            let semaphore = if device.capabilities.signal_semaphores {
                Some(Semaphore::new_binary(device).map_err(veneer::DeviceError::SemaphoreCreation)?)
            } else {
                None
            };

            let transient_pool = if device.capabilities.push_descriptor {
                None
            } else {
                Some(DescriptorPool::new(
                    device,
                    vk::DescriptorPoolCreateFlags::empty(),
                    &TRANSIENT_POOL_SIZES,
                    TRANSIENT_POOL_MAX_SETS,
                )?)
            };

            #[cfg(feature = "logging")]
            log::trace!(
                "Created immediate slot {} (semaphore: {}, transient pool: {})",
                i,
                semaphore.is_some(),
                transient_pool.is_some()
            );

            slots.push(Slot {
                transient_pool,
                fence,
                semaphore,
                buffer,
                retained: Vec::new(),
                epoch: 0,
            });
        }

        let mut ring = FrameRing {
            slots,
            cursor: 0,
            recording: false,
            device: device.clone(),
        };

        ring.active()
            .buffer
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .map_err(veneer::CommandBufferError::from)?;
        ring.recording = true;

        Ok(ring)
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording
    }

    pub(crate) fn active(&self) -> &Slot {
        &self.slots[self.cursor]
    }

    pub(crate) fn active_mut(&mut self) -> &mut Slot {
        &mut self.slots[self.cursor]
    }

    pub(crate) fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    ///Moves the cursor to the next slot. Does not open it, see [reopen_active](FrameRing::reopen_active).
    pub(crate) fn advance(&mut self) -> usize {
        self.recording = false;
        self.cursor = (self.cursor + 1) & (NUM_COMMAND_FRAMES - 1);
        self.cursor
    }

    ///Prepares the active slot for a new cycle: waits until its previous submission retired, releases what that
    /// submission kept alive, resets the transient pool and begins the command buffer.
    pub(crate) fn reopen_active(&mut self) -> Result<(), ImmediateError> {
        let slot = &mut self.slots[self.cursor];

        slot.fence
            .wait_if_pending(u64::MAX)
            .map_err(ImmediateError::Wait)?;
        slot.retained.clear();

        if let Some(pool) = &slot.transient_pool {
            //all sets of the previous cycle become invalid at once
            if let Err(e) = pool.reset() {
                #[cfg(feature = "logging")]
                log::error!("Failed to reset transient descriptor pool: {}", e);
            }
            slot.epoch += 1;
        }

        slot.buffer
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .map_err(ImmediateError::Reopen)?;
        self.recording = true;
        Ok(())
    }

    ///Begins the active buffer again after closing or submitting it failed. Recorded commands are discarded.
    pub(crate) fn restart_active(&mut self) {
        match self
            .active()
            .buffer
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
        {
            Ok(()) => self.recording = true,
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("Failed to restart immediate command list: {}", e);
                self.recording = false;
            }
        }
    }

    ///Makes sure the active slot's fence is signaled after a failed submission. Nothing will signal the reset fence
    /// anymore, so it is replaced by a fresh, signaled one.
    pub(crate) fn restore_active_fence(&mut self) {
        if let Ok(true) = self.active().fence.get_status() {
            return;
        }
        match Fence::new(&self.device, true) {
            Ok(fence) => self.active_mut().fence = fence,
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("Failed to replace fence of failed submission: {}", e);
            }
        }
    }
}

impl Drop for FrameRing {
    fn drop(&mut self) {
        //buffers must not be freed while pending
        for slot in self.slots.iter() {
            if let Err(e) = slot.fence.wait_if_pending(u64::MAX) {
                #[cfg(feature = "logging")]
                log::error!("Failed waiting for immediate slot on drop: {}", e);
            }
        }
    }
}
