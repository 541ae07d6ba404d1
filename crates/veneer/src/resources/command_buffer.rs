use std::sync::Arc;

use ash::vk;

use crate::{context::Device, error::CommandBufferError};

pub struct CommandPool {
    ///Device this pool was created on.
    pub device: Arc<Device>,
    ///The queue family this pool's buffers can be used on.
    pub queue_family: u32,
    ///the raw vulkan handle.
    pub inner: vk::CommandPool,
}

impl CommandPool {
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self, CommandBufferError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(flags)
            .queue_family_index(queue_family);

        let pool = unsafe { device.inner.create_command_pool(&create_info)? };

        Ok(CommandPool {
            device: device.clone(),
            inner: pool,
            queue_family,
        })
    }

    ///Allocates `count` primary buffers in one call. Fails if the driver returns fewer buffers than requested.
    pub fn allocate_buffers(
        self: &Arc<Self>,
        count: u32,
    ) -> Result<Vec<CommandBuffer>, CommandBufferError> {
        let raw = unsafe {
            self.device.inner.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.inner)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(count),
            )?
        };

        if raw.len() < count as usize {
            #[cfg(feature = "logging")]
            log::error!(
                "Allocated too few command buffers, expected {}, got {}",
                count,
                raw.len()
            );
            //wrap what we got, so it is freed again
            let allocated = raw.len();
            drop(self.wrap(raw));
            return Err(CommandBufferError::FailedToAllocate {
                allocated,
                count: count as usize,
            });
        }

        Ok(self.wrap(raw))
    }

    fn wrap(self: &Arc<Self>, raw: Vec<vk::CommandBuffer>) -> Vec<CommandBuffer> {
        raw.into_iter()
            .map(|inner| CommandBuffer {
                pool: self.clone(),
                inner,
            })
            .collect()
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_command_pool(self.inner) }
    }
}

///Primary command buffer. Keeps its pool alive and frees itself on drop.
pub struct CommandBuffer {
    ///Pool this command buffer was created from. Freed from on drop.
    pub pool: Arc<CommandPool>,
    ///the raw vulkan handle
    pub inner: vk::CommandBuffer,
}

impl CommandBuffer {
    ///Starts recording. Implicitly resets the buffer if the pool allows it.
    pub fn begin(&self, flags: vk::CommandBufferUsageFlags) -> Result<(), vk::Result> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        unsafe {
            self.pool
                .device
                .inner
                .begin_command_buffer(self.inner, &begin_info)
        }
    }

    pub fn end(&self) -> Result<(), vk::Result> {
        unsafe { self.pool.device.inner.end_command_buffer(self.inner) }
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe {
            self.pool
                .device
                .inner
                .free_command_buffers(self.pool.inner, core::slice::from_ref(&self.inner))
        }
    }
}
