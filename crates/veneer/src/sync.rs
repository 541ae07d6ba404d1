//! # Synchronisation
//!
//! Veneer wraps the three primitives an injected command stream needs:
//!
//! - fences: host ↔ device. Each ring slot owns one, it tells the host that the slot's last submission retired and the
//!   command buffer can be recorded again.
//! - binary semaphores: device ↔ device. Used to chain an overlay submission after (or before) a host submission,
//!   for instance after the host's swapchain acquire semaphore.
//! - timeline semaphores: device → host with a counter. Query pools use them to announce "results up to value `n` are
//!   available".
//!
//! All of them are destroyed when dropped. Dropping a primitive that is still referenced by pending GPU work is UB in
//! Vulkan, the owner has to make sure that work retired first.

use crate::context::Device;
use ash::vk;
use std::fmt::Debug;
use std::sync::Arc;

///Host-waitable fence.
pub struct Fence {
    pub inner: vk::Fence,
    pub device: Arc<Device>,
}

impl Fence {
    ///Creates a fence. If `signaled` is true, waiting on the fence succeeds immediately until it is reset.
    pub fn new(device: &Arc<Device>, signaled: bool) -> Result<Self, vk::Result> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.inner.create_fence(&ci)? };

        Ok(Fence {
            inner: fence,
            device: device.clone(),
        })
    }

    ///Moves the fence into the unsignaled state. Only do this right before a submission that signals it again.
    pub fn reset(&self) -> Result<(), vk::Result> {
        unsafe { self.device.inner.reset_fences(core::slice::from_ref(&self.inner)) }
    }

    ///Returns true if the fence is signaled.
    pub fn get_status(&self) -> Result<bool, vk::Result> {
        unsafe { self.device.inner.get_fence_status(self.inner) }
    }

    ///Blocks until the fence is signaled or `timeout` (in nanoseconds) elapsed.
    pub fn wait(&self, timeout: u64) -> Result<(), vk::Result> {
        unsafe {
            self.device
                .inner
                .wait_for_fences(core::slice::from_ref(&self.inner), true, timeout)
        }
    }

    ///Like [wait](Fence::wait), but checks the status first. Saves the (possibly expensive) wait call if the
    /// fence already signaled.
    pub fn wait_if_pending(&self, timeout: u64) -> Result<(), vk::Result> {
        match self.get_status() {
            Ok(true) => Ok(()),
            Ok(false) => self.wait(timeout),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_fence(self.inner) }
    }
}

impl Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

///Binary or [timeline](https://www.khronos.org/blog/vulkan-timeline-semaphores) semaphore.
pub struct Semaphore {
    pub inner: vk::Semaphore,
    pub device: Arc<Device>,
    pub is_timeline: bool,
}

impl Semaphore {
    ///Creates a binary semaphore, the kind that can be chained between queue submissions.
    pub fn new_binary(device: &Arc<Device>) -> Result<Self, vk::Result> {
        let ci = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.inner.create_semaphore(&ci)? };

        Ok(Semaphore {
            inner: semaphore,
            device: device.clone(),
            is_timeline: false,
        })
    }

    pub fn new_timeline(device: &Arc<Device>, initial_value: u64) -> Result<Self, vk::Result> {
        let mut timeline_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);

        let semaphore = unsafe {
            let ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_ci);
            device.inner.create_semaphore(&ci)?
        };

        Ok(Semaphore {
            inner: semaphore,
            device: device.clone(),
            is_timeline: true,
        })
    }

    ///Returns the current value of a timeline semaphore. Note that this can change at any time if the semaphore is in use on
    /// the device.
    ///
    /// Returns `u64::MAX` if the value can't be read, for instance because `self` is a binary semaphore.
    pub fn get_value(&self) -> u64 {
        if !self.is_timeline {
            return u64::MAX;
        }
        unsafe {
            self.device
                .inner
                .get_semaphore_counter_value(self.inner)
                .unwrap_or(u64::MAX)
        }
    }

    ///Sets the timeline value from the host. Note that it [has to be](https://registry.khronos.org/vulkan/specs/1.2-extensions/html/chap7.html#VUID-VkSemaphoreSignalInfo-value-03258) greater then the current value.
    ///
    /// # Error
    ///
    /// Returns an error if the value was not greater. The value returned in this case is the current value.
    pub fn set_value(&self, value: u64) -> Result<(), u64> {
        let signal_info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.inner)
            .value(value);

        if unsafe { self.device.inner.signal_semaphore(&signal_info) }.is_err() {
            Err(self.get_value())
        } else {
            Ok(())
        }
    }

    ///Blocks until the timeline reaches `value`, or the `timeout` is reached.
    pub fn wait(&self, value: u64, timeout: u64) -> Result<(), vk::Result> {
        let sem = [self.inner];
        let val = [value];
        let wait = vk::SemaphoreWaitInfo::default()
            .semaphores(&sem)
            .values(&val);

        unsafe { self.device.inner.wait_semaphores(&wait, timeout) }
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_semaphore(self.inner) }
    }
}

impl Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}
