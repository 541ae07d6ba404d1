use std::ffi::CStr;

use ash::{prelude::VkResult, vk};

use super::{Capabilities, Debugger, DeviceDispatch};

///[DeviceDispatch] implementation that forwards to a real [ash::Device].
///
/// Extension loaders are only created if the host enabled the extension when creating the device.
pub struct AshDispatch {
    pub inner: ash::Device,
    pub push_descriptor: Option<ash::khr::push_descriptor::Device>,
    pub acceleration_structure: Option<ash::khr::acceleration_structure::Device>,
    pub debugger: Option<Debugger>,
}

impl AshDispatch {
    ///Creates the dispatch table and resolves the device's [Capabilities] from `enabled_extensions`.
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        enabled_extensions: &[&CStr],
    ) -> (Self, Capabilities) {
        let has = |name: &CStr| enabled_extensions.iter().any(|ext| *ext == name);

        let push_descriptor = if has(ash::khr::push_descriptor::NAME) {
            Some(ash::khr::push_descriptor::Device::new(instance, &device))
        } else {
            None
        };
        let acceleration_structure = if has(ash::khr::acceleration_structure::NAME) {
            Some(ash::khr::acceleration_structure::Device::new(
                instance, &device,
            ))
        } else {
            None
        };

        let capabilities = Capabilities {
            push_descriptor: push_descriptor.is_some(),
            acceleration_structure: acceleration_structure.is_some(),
            signal_semaphores: true,
        };

        #[cfg(feature = "logging")]
        log::info!("Wrapped device with {:?}", capabilities);

        (
            AshDispatch {
                inner: device,
                push_descriptor,
                acceleration_structure,
                debugger: None,
            },
            capabilities,
        )
    }

    ///Enables object naming. Only call this if the host instance has `VK_EXT_debug_utils` enabled.
    pub fn with_debug_utils(mut self, instance: &ash::Instance) -> Self {
        self.debugger = Some(Debugger::new(instance, &self.inner));
        self
    }
}

impl DeviceDispatch for AshDispatch {
    unsafe fn create_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.inner.create_command_pool(create_info, None) }
    }
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.inner.destroy_command_pool(pool, None) }
    }
    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.inner.allocate_command_buffers(allocate_info) }
    }
    unsafe fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.inner.free_command_buffers(pool, buffers) }
    }
    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.inner.begin_command_buffer(buffer, begin_info) }
    }
    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.inner.end_command_buffer(buffer) }
    }

    unsafe fn create_fence(&self, create_info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        unsafe { self.inner.create_fence(create_info, None) }
    }
    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.inner.destroy_fence(fence, None) }
    }
    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.inner.reset_fences(fences) }
    }
    unsafe fn get_fence_status(&self, fence: vk::Fence) -> VkResult<bool> {
        unsafe { self.inner.get_fence_status(fence) }
    }
    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout: u64,
    ) -> VkResult<()> {
        unsafe { self.inner.wait_for_fences(fences, wait_all, timeout) }
    }

    unsafe fn create_semaphore(
        &self,
        create_info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        unsafe { self.inner.create_semaphore(create_info, None) }
    }
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.inner.destroy_semaphore(semaphore, None) }
    }
    unsafe fn get_semaphore_counter_value(&self, semaphore: vk::Semaphore) -> VkResult<u64> {
        unsafe { self.inner.get_semaphore_counter_value(semaphore) }
    }
    unsafe fn signal_semaphore(&self, signal_info: &vk::SemaphoreSignalInfo<'_>) -> VkResult<()> {
        unsafe { self.inner.signal_semaphore(signal_info) }
    }
    unsafe fn wait_semaphores(
        &self,
        wait_info: &vk::SemaphoreWaitInfo<'_>,
        timeout: u64,
    ) -> VkResult<()> {
        unsafe { self.inner.wait_semaphores(wait_info, timeout) }
    }

    unsafe fn create_descriptor_pool(
        &self,
        create_info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        unsafe { self.inner.create_descriptor_pool(create_info, None) }
    }
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.inner.destroy_descriptor_pool(pool, None) }
    }
    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        unsafe {
            self.inner
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
        }
    }
    unsafe fn allocate_descriptor_sets(
        &self,
        allocate_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        unsafe { self.inner.allocate_descriptor_sets(allocate_info) }
    }
    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.inner.update_descriptor_sets(writes, &[]) }
    }

    unsafe fn create_query_pool(
        &self,
        create_info: &vk::QueryPoolCreateInfo<'_>,
    ) -> VkResult<vk::QueryPool> {
        unsafe { self.inner.create_query_pool(create_info, None) }
    }
    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool) {
        unsafe { self.inner.destroy_query_pool(pool, None) }
    }

    unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        unsafe { self.inner.queue_submit(queue, submits, fence) }
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.inner
                .cmd_bind_descriptor_sets(buffer, bind_point, layout, first_set, sets, &[])
        }
    }
    unsafe fn cmd_push_descriptor_set(
        &self,
        buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: &[vk::WriteDescriptorSet<'_>],
    ) {
        if let Some(loader) = &self.push_descriptor {
            unsafe { loader.cmd_push_descriptor_set(buffer, bind_point, layout, set, writes) }
        } else {
            #[cfg(feature = "logging")]
            log::error!("Push descriptor called, but VK_KHR_push_descriptor is not loaded");
        }
    }
    unsafe fn cmd_update_buffer(
        &self,
        buffer: vk::CommandBuffer,
        dst: vk::Buffer,
        offset: vk::DeviceSize,
        data: &[u8],
    ) {
        unsafe { self.inner.cmd_update_buffer(buffer, dst, offset, data) }
    }
    unsafe fn cmd_copy_buffer_to_image(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.inner
                .cmd_copy_buffer_to_image(buffer, src, dst, dst_layout, regions)
        }
    }
    unsafe fn cmd_end_query(&self, buffer: vk::CommandBuffer, pool: vk::QueryPool, query: u32) {
        unsafe { self.inner.cmd_end_query(buffer, pool, query) }
    }
    unsafe fn cmd_write_acceleration_structures_properties(
        &self,
        buffer: vk::CommandBuffer,
        structures: &[vk::AccelerationStructureKHR],
        query_type: vk::QueryType,
        pool: vk::QueryPool,
        first_query: u32,
    ) {
        if let Some(loader) = &self.acceleration_structure {
            unsafe {
                loader.cmd_write_acceleration_structures_properties(
                    buffer,
                    structures,
                    query_type,
                    pool,
                    first_query,
                )
            }
        } else {
            #[cfg(feature = "logging")]
            log::error!(
                "Acceleration structure query recorded, but VK_KHR_acceleration_structure is not loaded"
            );
        }
    }

    #[cfg(feature = "debug_marker")]
    unsafe fn set_object_name(&self, ty: vk::ObjectType, handle: u64, name: &CStr) -> VkResult<()> {
        match &self.debugger {
            Some(debugger) => debugger.name_raw_object(ty, handle, name),
            None => Ok(()),
        }
    }
}
