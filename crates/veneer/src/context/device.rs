use std::{ffi::CStr, sync::Arc};

use ash::{
    prelude::VkResult,
    vk::{self, Handle},
};

///Device level function table used by every veneer object.
///
/// The functions mirror their [ash::Device] counterparts (minus allocation callbacks, which veneer never uses).
/// [AshDispatch](crate::context::AshDispatch) forwards them to a real device, tests can implement the trait to
/// observe and steer what happens on "the GPU".
///
/// # Safety
///
/// All functions carry the same safety requirements as the Vulkan command they represent. Most importantly every
/// handle passed in must have been created from the same device.
pub trait DeviceDispatch: Send + Sync {
    unsafe fn create_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool>;
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool);
    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;
    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    unsafe fn create_fence(&self, create_info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence>;
    unsafe fn destroy_fence(&self, fence: vk::Fence);
    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()>;
    unsafe fn get_fence_status(&self, fence: vk::Fence) -> VkResult<bool>;
    unsafe fn wait_for_fences(&self, fences: &[vk::Fence], wait_all: bool, timeout: u64)
    -> VkResult<()>;

    unsafe fn create_semaphore(
        &self,
        create_info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore>;
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    unsafe fn get_semaphore_counter_value(&self, semaphore: vk::Semaphore) -> VkResult<u64>;
    unsafe fn signal_semaphore(&self, signal_info: &vk::SemaphoreSignalInfo<'_>) -> VkResult<()>;
    unsafe fn wait_semaphores(
        &self,
        wait_info: &vk::SemaphoreWaitInfo<'_>,
        timeout: u64,
    ) -> VkResult<()>;

    unsafe fn create_descriptor_pool(
        &self,
        create_info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool>;
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()>;
    unsafe fn allocate_descriptor_sets(
        &self,
        allocate_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    unsafe fn create_query_pool(
        &self,
        create_info: &vk::QueryPoolCreateInfo<'_>,
    ) -> VkResult<vk::QueryPool>;
    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool);

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()>;

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );
    ///Only called if [Capabilities::push_descriptor] is set.
    unsafe fn cmd_push_descriptor_set(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: &[vk::WriteDescriptorSet<'_>],
    );
    unsafe fn cmd_update_buffer(
        &self,
        buffer: vk::CommandBuffer,
        dst: vk::Buffer,
        offset: vk::DeviceSize,
        data: &[u8],
    );
    unsafe fn cmd_copy_buffer_to_image(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );
    unsafe fn cmd_end_query(&self, buffer: vk::CommandBuffer, pool: vk::QueryPool, query: u32);
    ///Only called if [Capabilities::acceleration_structure] is set.
    unsafe fn cmd_write_acceleration_structures_properties(
        &self,
        buffer: vk::CommandBuffer,
        structures: &[vk::AccelerationStructureKHR],
        query_type: vk::QueryType,
        pool: vk::QueryPool,
        first_query: u32,
    );

    ///Names an object for debugging tools. Does nothing by default.
    unsafe fn set_object_name(
        &self,
        _ty: vk::ObjectType,
        _handle: u64,
        _name: &CStr,
    ) -> VkResult<()> {
        Ok(())
    }
}

///Optional device features that change how veneer works. Resolved once when the [Device] is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    ///`VK_KHR_push_descriptor` is enabled. If not, descriptor updates go through transient descriptor sets.
    pub push_descriptor: bool,
    ///`VK_KHR_acceleration_structure` is enabled.
    pub acceleration_structure: bool,
    ///Each ring slot owns a binary semaphore that submissions can signal for chaining.
    pub signal_semaphores: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            push_descriptor: false,
            acceleration_structure: false,
            signal_semaphores: true,
        }
    }
}

///Wrapped device. Owns its dispatch table, but not the underlying Vulkan device, which belongs to the host.
pub struct Device {
    pub inner: Box<dyn DeviceDispatch>,
    pub capabilities: Capabilities,
}

impl Device {
    pub fn new<D: DeviceDispatch + 'static>(dispatch: D, capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Device {
            inner: Box::new(dispatch),
            capabilities,
        })
    }

    ///Wraps a host device. Capabilities are derived from `enabled_extensions`, which should be the extension list
    /// the host created the device with.
    ///
    /// Set `debug_utils` if the host instance was created with `VK_EXT_debug_utils`. Objects are named in that case.
    pub fn from_ash(
        instance: &ash::Instance,
        device: ash::Device,
        enabled_extensions: &[&CStr],
        debug_utils: bool,
    ) -> Arc<Self> {
        let (mut dispatch, capabilities) =
            super::AshDispatch::new(instance, device, enabled_extensions);
        if debug_utils {
            dispatch = dispatch.with_debug_utils(instance);
        }
        Self::new(dispatch, capabilities)
    }

    pub fn dispatch(&self) -> &dyn DeviceDispatch {
        self.inner.as_ref()
    }

    ///Names `handle` if the dispatch table supports debug names. Failure is only logged.
    pub fn name_object<H: Handle>(&self, handle: H, name: &CStr) {
        if let Err(e) = unsafe { self.inner.set_object_name(H::TYPE, handle.as_raw(), name) } {
            #[cfg(feature = "logging")]
            log::warn!("Failed to name object {:?}: {}", name, e);
        }
    }
}
