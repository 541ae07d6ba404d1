use thiserror::Error;
use veneer::{CommandBufferError, DescriptorError, DeviceError, VeneerError, ash::vk};

#[derive(Debug, Error)]
pub enum ImmediateError {
    ///Some object of the ring could not be created. Everything created up to that point was released again.
    #[error("Failed to create immediate command list: {0}")]
    Construction(#[from] VeneerError),
    ///The active command buffer could not be closed. It was reopened, recorded commands are lost.
    #[error("Failed to close immediate command list: {0}")]
    Close(#[source] vk::Result),
    ///The queue rejected the batch. The command buffer was reopened, recorded commands are lost.
    #[error("Failed to submit immediate command list: {0}")]
    Submit(#[source] vk::Result),
    ///The next slot could not be reopened for recording. The next flush tries again.
    #[error("Failed to reset immediate command list: {0}")]
    Reopen(#[source] vk::Result),
    #[error("Failed to wait for immediate command list: {0}")]
    Wait(#[source] vk::Result),
    #[error("Immediate command list is not open for recording")]
    NotRecording,
    ///The device lacks the extension the command needs.
    #[error("Command needs {0}, which is not enabled on the device")]
    Unsupported(&'static str),
}

impl From<CommandBufferError> for ImmediateError {
    fn from(value: CommandBufferError) -> Self {
        ImmediateError::Construction(value.into())
    }
}

impl From<DescriptorError> for ImmediateError {
    fn from(value: DescriptorError) -> Self {
        ImmediateError::Construction(value.into())
    }
}

impl From<DeviceError> for ImmediateError {
    fn from(value: DeviceError) -> Self {
        ImmediateError::Construction(value.into())
    }
}
