use ash::vk;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Could not create fence")]
    FenceCreation(#[source] vk::Result),
    #[error("Could not create semaphore")]
    SemaphoreCreation(#[source] vk::Result),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug)]
pub enum CommandBufferError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Failed to allocate command buffer. Requested {count}, got {allocated}")]
    FailedToAllocate { allocated: usize, count: usize },
}

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Failed to allocate Descriptors from pool. Requested {requested} got {count}")]
    Allocation { requested: usize, count: usize },
}

#[derive(Error, Debug)]
pub enum VeneerError {
    #[error("CommandBuffer error: {0}")]
    CommandBufferError(#[from] CommandBufferError),
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),
    #[error("Desriptor error: {0}")]
    DescriptorError(#[from] DescriptorError),
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use crate::{
        VeneerError,
        error::{CommandBufferError, DescriptorError, DeviceError},
    };

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(DeviceError: Send, Sync);
        assert_impl_all!(CommandBufferError: Send, Sync);
        assert_impl_all!(DescriptorError: Send, Sync);
        assert_impl_all!(VeneerError: Send, Sync);
    }

    #[test]
    fn nested_errors_convert() {
        let err: VeneerError = CommandBufferError::FailedToAllocate {
            allocated: 2,
            count: 4,
        }
        .into();
        assert!(matches!(
            err,
            VeneerError::CommandBufferError(CommandBufferError::FailedToAllocate {
                allocated: 2,
                count: 4
            })
        ));
        assert_eq!(
            err.to_string(),
            "CommandBuffer error: Failed to allocate command buffer. Requested 4, got 2"
        );
    }
}
