//! Recording [DeviceDispatch] used by the tests. Simulates fences and semaphores on the host, logs every call and
//! can be told to fail specific calls.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use ahash::AHashMap;
use veneer::{
    ash::{
        prelude::VkResult,
        vk::{self, Handle},
    },
    context::{Capabilities, Device, DeviceDispatch, Queue},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub wait: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub signal: Vec<vk::Semaphore>,
    pub signal_values: Vec<u64>,
    pub fence: vk::Fence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    CommandPool,
    CommandBuffer,
    Fence,
    Semaphore,
    DescriptorPool,
    QueryPool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Begin(vk::CommandBuffer),
    End(vk::CommandBuffer),
    ResetFence(vk::Fence),
    WaitFence(vk::Fence),
    Submit(Submission),
    ResetDescriptorPool(vk::DescriptorPool),
    AllocateSet {
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    },
    WriteSet {
        set: vk::DescriptorSet,
        ty: vk::DescriptorType,
        count: u32,
    },
    BindSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    PushDescriptor {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        ty: vk::DescriptorType,
        count: u32,
    },
    UpdateBuffer {
        cmd: vk::CommandBuffer,
        dst: vk::Buffer,
        offset: vk::DeviceSize,
        len: usize,
    },
    CopyBufferToImage {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        regions: usize,
    },
    EndQuery {
        cmd: vk::CommandBuffer,
        pool: vk::QueryPool,
        query: u32,
    },
    WriteAccelerationStructureProperties {
        pool: vk::QueryPool,
        first_query: u32,
        count: usize,
    },
    SetName {
        ty: vk::ObjectType,
        handle: u64,
        name: String,
    },
    Destroy(Kind, u64),
}

#[derive(Default)]
pub struct MockState {
    next_handle: u64,
    pub calls: Vec<Call>,
    pub fences: AHashMap<vk::Fence, bool>,
    pub timelines: AHashMap<vk::Semaphore, u64>,
    pub live: HashSet<u64>,
    pub fences_created: usize,
    ///If false, submitted fences stay unsignaled until waited on or [MockState::complete_all] is called.
    pub auto_complete: bool,
    pub fail_end: usize,
    pub fail_submit: usize,
    pub fail_begin: usize,
    pub fail_allocate_sets: usize,
    pub fail_create_fence_at: Option<usize>,
    pub short_command_buffer_allocation: bool,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        self.next_handle
    }

    fn destroy(&mut self, kind: Kind, raw: u64) {
        self.live.remove(&raw);
        self.calls.push(Call::Destroy(kind, raw));
    }

    pub fn complete_all(&mut self) {
        for signaled in self.fences.values_mut() {
            *signaled = true;
        }
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

fn take_failure(counter: &mut usize) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

#[derive(Clone)]
pub struct MockDispatch {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDispatch {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

///Routes log output of the tests to stdout. Only the first call installs the logger.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Trace)
        .init();
}

///Mock device plus a handle to its state.
pub fn device(capabilities: Capabilities) -> (Arc<Device>, Arc<Mutex<MockState>>) {
    init_logging();
    let state = Arc::new(Mutex::new(MockState {
        auto_complete: true,
        ..Default::default()
    }));
    let device = Device::new(
        MockDispatch {
            state: state.clone(),
        },
        capabilities,
    );
    (device, state)
}

pub fn queue() -> Queue {
    Queue::new(vk::Queue::from_raw(0xfeed), 0)
}

impl DeviceDispatch for MockDispatch {
    unsafe fn create_command_pool(
        &self,
        _create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.lock().handle()))
    }
    unsafe fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.lock().destroy(Kind::CommandPool, pool.as_raw());
    }
    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.lock();
        let mut count = allocate_info.command_buffer_count;
        if state.short_command_buffer_allocation {
            count = count.saturating_sub(1);
        }
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.handle()))
            .collect())
    }
    unsafe fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.lock();
        for buffer in buffers {
            state.destroy(Kind::CommandBuffer, buffer.as_raw());
        }
    }
    unsafe fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        _begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::Begin(buffer));
        if take_failure(&mut state.fail_begin) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Ok(())
    }
    unsafe fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::End(buffer));
        if take_failure(&mut state.fail_end) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(())
    }

    unsafe fn create_fence(&self, create_info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        let mut state = self.lock();
        if state.fail_create_fence_at == Some(state.fences_created) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        state.fences_created += 1;
        let fence = vk::Fence::from_raw(state.handle());
        let signaled = create_info.flags.contains(vk::FenceCreateFlags::SIGNALED);
        state.fences.insert(fence, signaled);
        Ok(fence)
    }
    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.lock();
        state.fences.remove(&fence);
        state.destroy(Kind::Fence, fence.as_raw());
    }
    unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        let mut state = self.lock();
        for fence in fences {
            state.calls.push(Call::ResetFence(*fence));
            state.fences.insert(*fence, false);
        }
        Ok(())
    }
    unsafe fn get_fence_status(&self, fence: vk::Fence) -> VkResult<bool> {
        self.lock()
            .fences
            .get(&fence)
            .copied()
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }
    unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        _wait_all: bool,
        _timeout: u64,
    ) -> VkResult<()> {
        let mut state = self.lock();
        for fence in fences {
            state.calls.push(Call::WaitFence(*fence));
            //the "GPU" finishes whatever the host waits for
            state.fences.insert(*fence, true);
        }
        Ok(())
    }

    unsafe fn create_semaphore(
        &self,
        create_info: &vk::SemaphoreCreateInfo<'_>,
    ) -> VkResult<vk::Semaphore> {
        let mut state = self.lock();
        let semaphore = vk::Semaphore::from_raw(state.handle());
        if !create_info.p_next.is_null() {
            state.timelines.insert(semaphore, 0);
        }
        Ok(semaphore)
    }
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.lock();
        state.timelines.remove(&semaphore);
        state.destroy(Kind::Semaphore, semaphore.as_raw());
    }
    unsafe fn get_semaphore_counter_value(&self, semaphore: vk::Semaphore) -> VkResult<u64> {
        self.lock()
            .timelines
            .get(&semaphore)
            .copied()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }
    unsafe fn signal_semaphore(&self, signal_info: &vk::SemaphoreSignalInfo<'_>) -> VkResult<()> {
        self.lock()
            .timelines
            .insert(signal_info.semaphore, signal_info.value);
        Ok(())
    }
    unsafe fn wait_semaphores(
        &self,
        _wait_info: &vk::SemaphoreWaitInfo<'_>,
        _timeout: u64,
    ) -> VkResult<()> {
        Ok(())
    }

    unsafe fn create_descriptor_pool(
        &self,
        _create_info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        Ok(vk::DescriptorPool::from_raw(self.lock().handle()))
    }
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.lock().destroy(Kind::DescriptorPool, pool.as_raw());
    }
    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        self.lock().calls.push(Call::ResetDescriptorPool(pool));
        Ok(())
    }
    unsafe fn allocate_descriptor_sets(
        &self,
        allocate_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        let mut state = self.lock();
        let layouts = unsafe {
            raw_slice(
                allocate_info.p_set_layouts,
                allocate_info.descriptor_set_count,
            )
        };
        for layout in layouts {
            state.calls.push(Call::AllocateSet {
                pool: allocate_info.descriptor_pool,
                layout: *layout,
            });
        }
        if take_failure(&mut state.fail_allocate_sets) {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        //sets are not tracked as live objects, the pool owns them
        Ok(layouts
            .iter()
            .map(|_| {
                state.next_handle += 1;
                vk::DescriptorSet::from_raw(state.next_handle)
            })
            .collect())
    }
    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        let mut state = self.lock();
        for write in writes {
            state.calls.push(Call::WriteSet {
                set: write.dst_set,
                ty: write.descriptor_type,
                count: write.descriptor_count,
            });
        }
    }

    unsafe fn create_query_pool(
        &self,
        _create_info: &vk::QueryPoolCreateInfo<'_>,
    ) -> VkResult<vk::QueryPool> {
        Ok(vk::QueryPool::from_raw(self.lock().handle()))
    }
    unsafe fn destroy_query_pool(&self, pool: vk::QueryPool) {
        self.lock().destroy(Kind::QueryPool, pool.as_raw());
    }

    unsafe fn queue_submit(
        &self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut state = self.lock();
        for submit in submits {
            let signal_values = if submit.p_next.is_null() {
                Vec::new()
            } else {
                let timeline = unsafe { &*(submit.p_next as *const vk::TimelineSemaphoreSubmitInfo) };
                assert_eq!(
                    timeline.s_type,
                    vk::StructureType::TIMELINE_SEMAPHORE_SUBMIT_INFO
                );
                unsafe {
                    raw_slice(
                        timeline.p_signal_semaphore_values,
                        timeline.signal_semaphore_value_count,
                    )
                }
                .to_vec()
            };
            let submission = unsafe {
                Submission {
                    command_buffers: raw_slice(
                        submit.p_command_buffers,
                        submit.command_buffer_count,
                    )
                    .to_vec(),
                    wait: raw_slice(submit.p_wait_semaphores, submit.wait_semaphore_count)
                        .to_vec(),
                    wait_stages: raw_slice(
                        submit.p_wait_dst_stage_mask,
                        submit.wait_semaphore_count,
                    )
                    .to_vec(),
                    signal: raw_slice(submit.p_signal_semaphores, submit.signal_semaphore_count)
                        .to_vec(),
                    signal_values,
                    fence,
                }
            };
            state.calls.push(Call::Submit(submission));
        }

        if take_failure(&mut state.fail_submit) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }

        if state.auto_complete {
            state.fences.insert(fence, true);
            let submitted = state.submissions();
            if let Some(last) = submitted.last() {
                for (semaphore, value) in last.signal.iter().zip(last.signal_values.iter()) {
                    if let Some(current) = state.timelines.get_mut(semaphore) {
                        *current = (*current).max(*value);
                    }
                }
            }
        }
        Ok(())
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        _buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.lock().calls.push(Call::BindSets {
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
        });
    }
    unsafe fn cmd_push_descriptor_set(
        &self,
        _buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: &[vk::WriteDescriptorSet<'_>],
    ) {
        let mut state = self.lock();
        for write in writes {
            state.calls.push(Call::PushDescriptor {
                bind_point,
                layout,
                set,
                ty: write.descriptor_type,
                count: write.descriptor_count,
            });
        }
    }
    unsafe fn set_object_name(
        &self,
        ty: vk::ObjectType,
        handle: u64,
        name: &std::ffi::CStr,
    ) -> VkResult<()> {
        self.lock().calls.push(Call::SetName {
            ty,
            handle,
            name: name.to_string_lossy().into_owned(),
        });
        Ok(())
    }
    unsafe fn cmd_update_buffer(
        &self,
        buffer: vk::CommandBuffer,
        dst: vk::Buffer,
        offset: vk::DeviceSize,
        data: &[u8],
    ) {
        self.lock().calls.push(Call::UpdateBuffer {
            cmd: buffer,
            dst,
            offset,
            len: data.len(),
        });
    }
    unsafe fn cmd_copy_buffer_to_image(
        &self,
        buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        _dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        self.lock().calls.push(Call::CopyBufferToImage {
            cmd: buffer,
            src,
            dst,
            regions: regions.len(),
        });
    }
    unsafe fn cmd_end_query(&self, buffer: vk::CommandBuffer, pool: vk::QueryPool, query: u32) {
        self.lock().calls.push(Call::EndQuery {
            cmd: buffer,
            pool,
            query,
        });
    }
    unsafe fn cmd_write_acceleration_structures_properties(
        &self,
        _buffer: vk::CommandBuffer,
        structures: &[vk::AccelerationStructureKHR],
        _query_type: vk::QueryType,
        pool: vk::QueryPool,
        first_query: u32,
    ) {
        self.lock()
            .calls
            .push(Call::WriteAccelerationStructureProperties {
                pool,
                first_query,
                count: structures.len(),
            });
    }
}
