//! # Veneer-Immediate
//!
//! An immediate command list lets an overlay inject GPU work (uploads, queries, descriptor bindings, draws) into an
//! application it does not control. The host keeps submitting its own command buffers on its own schedule. The overlay
//! appends its work into a small [ring](ring) of reusable command buffers and [flushes](ImmediateCommandList::flush)
//! them onto the host's queue between host frames.
//!
//! The list never interprets the commands it records. Anything that is not covered by the helpers here can be recorded
//! through [ImmediateCommandList::record], which hands out the device dispatch table and the active raw command buffer.
//!
//! # Synchronisation
//!
//! Each slot of the ring owns a fence. Before a slot is recorded again the host waits for that fence, so the overlay
//! runs at most [NUM_COMMAND_FRAMES]` - 1` submissions ahead of the GPU. Ordering with host submissions is only
//! established through [SemaphoreChain]s.
//!
//! # Threading
//!
//! A list has a single writer. Every mutating operation takes `&mut self`; share a list between threads through a
//! `Mutex`. Which list was used last on a thread is tracked by the [ActiveSessionRegistry], see [routing].

use std::sync::Arc;

use smallvec::SmallVec;
use veneer::{
    ash::vk,
    context::{Device, DeviceDispatch, Queue},
    resources::{DescriptorTableUpdate, DescriptorWrite, QueryPool, bind_point_for_stages},
    sync::Semaphore,
};

mod error;
pub use error::ImmediateError;

mod flush;
pub use flush::SemaphoreChain;

pub mod ring;
pub use ring::NUM_COMMAND_FRAMES;

pub mod routing;
pub use routing::{ActiveSessionRegistry, SessionId};

mod transient;
pub use transient::{DescriptorUpdatePath, LayoutLookup, LayoutRegistry, TransientSet};

#[cfg(test)]
mod mock;

///Largest chunk a single `vkCmdUpdateBuffer` may write.
pub const MAX_UPDATE_BUFFER_SIZE: usize = 65536;

///Ring buffered command list that records into the host's queue. See the [crate documentation](crate).
pub struct ImmediateCommandList {
    id: SessionId,
    registry: Arc<ActiveSessionRegistry>,
    lookup: Arc<dyn LayoutLookup>,
    path: DescriptorUpdatePath,
    ///Timeline values the next submission signals.
    pending_query_signals: SmallVec<[(Arc<Semaphore>, u64); 4]>,
    has_commands: bool,
    queue: Queue,
    ring: ring::FrameRing,
    device: Arc<Device>,
}

impl ImmediateCommandList {
    ///Creates a list that submits to `queue`, tracked in the [global](ActiveSessionRegistry::global) registry.
    ///
    /// `lookup` is only consulted if the device has no push descriptors.
    pub fn new(
        device: &Arc<Device>,
        queue: Queue,
        lookup: Arc<dyn LayoutLookup>,
    ) -> Result<Self, ImmediateError> {
        Self::with_registry(device, queue, lookup, ActiveSessionRegistry::global())
    }

    pub fn with_registry(
        device: &Arc<Device>,
        queue: Queue,
        lookup: Arc<dyn LayoutLookup>,
        registry: Arc<ActiveSessionRegistry>,
    ) -> Result<Self, ImmediateError> {
        let ring = ring::FrameRing::new(device, queue.family_index)?;
        let id = SessionId::next();
        registry.set(id);

        let path = DescriptorUpdatePath::for_capabilities(&device.capabilities);
        #[cfg(feature = "logging")]
        log::info!(
            "Created immediate command list {:?} on queue family {} ({:?} descriptors)",
            id,
            queue.family_index,
            path
        );

        Ok(ImmediateCommandList {
            id,
            registry,
            lookup,
            path,
            pending_query_signals: SmallVec::new(),
            has_commands: false,
            queue,
            ring,
            device: device.clone(),
        })
    }

    fn active_buffer(&self) -> Result<vk::CommandBuffer, ImmediateError> {
        if self.ring.is_recording() {
            Ok(self.ring.active().buffer.inner)
        } else {
            Err(ImmediateError::NotRecording)
        }
    }

    ///Appends opaque commands. `cmd` is called with the dispatch table and the active command buffer and may record
    /// anything into it.
    pub fn record<F>(&mut self, cmd: F) -> Result<(), ImmediateError>
    where
        F: FnOnce(&dyn DeviceDispatch, vk::CommandBuffer),
    {
        let buffer = self.active_buffer()?;
        cmd(self.device.dispatch(), buffer);
        self.has_commands = true;
        Ok(())
    }

    ///Writes `data` into `dst` at `dst_offset` through the command stream.
    ///
    /// # Panics
    ///
    /// If either the byte size of `data` or `dst_offset` is not a multiple of 4.
    pub fn update_buffer_region<T: bytemuck::Pod>(
        &mut self,
        data: &[T],
        dst: vk::Buffer,
        dst_offset: vk::DeviceSize,
    ) -> Result<(), ImmediateError> {
        self.registry.set(self.id);

        let bytes: &[u8] = bytemuck::cast_slice(data);
        assert!(
            bytes.len() % 4 == 0 && dst_offset % 4 == 0,
            "buffer updates must be 4 byte aligned (size {}, offset {})",
            bytes.len(),
            dst_offset
        );

        let buffer = self.active_buffer()?;
        if bytes.is_empty() {
            return Ok(());
        }

        let mut offset = dst_offset;
        for chunk in bytes.chunks(MAX_UPDATE_BUFFER_SIZE) {
            unsafe {
                self.device
                    .inner
                    .cmd_update_buffer(buffer, dst, offset, chunk)
            };
            offset += chunk.len() as vk::DeviceSize;
        }
        self.has_commands = true;
        Ok(())
    }

    ///Copies `regions` of the caller filled `staging` buffer into `dst`. `dst` has to be in `TRANSFER_DST_OPTIMAL`.
    pub fn update_texture_region(
        &mut self,
        staging: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) -> Result<(), ImmediateError> {
        self.registry.set(self.id);

        let buffer = self.active_buffer()?;
        if regions.is_empty() {
            return Ok(());
        }
        unsafe {
            self.device.inner.cmd_copy_buffer_to_image(
                buffer,
                staging,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            )
        };
        self.has_commands = true;
        Ok(())
    }

    ///Updates descriptor table `layout_param` of `layout`.
    ///
    /// With push descriptors the update is recorded inline and `None` is returned. Otherwise a transient set is
    /// allocated, written and bound. The returned set is only valid until its slot is recycled. If no set could be
    /// allocated the update is dropped (and logged), which also yields `None`.
    ///
    /// # Panics
    ///
    /// On the transient path, if the update does not target binding 0 at array offset 0.
    pub fn push_descriptors(
        &mut self,
        stages: vk::ShaderStageFlags,
        layout: vk::PipelineLayout,
        layout_param: u32,
        update: &DescriptorTableUpdate<'_>,
    ) -> Result<Option<TransientSet>, ImmediateError> {
        if update.count() == 0 {
            return Ok(None);
        }
        let buffer = self.active_buffer()?;

        match self.path {
            DescriptorUpdatePath::Push => {
                let write = DescriptorWrite::new(update);
                unsafe {
                    self.device.inner.cmd_push_descriptor_set(
                        buffer,
                        bind_point_for_stages(stages),
                        layout,
                        layout_param,
                        core::slice::from_ref(&write.as_raw(vk::DescriptorSet::null())),
                    )
                };
                self.has_commands = true;
                Ok(None)
            }
            DescriptorUpdatePath::Transient => {
                assert!(
                    update.binding == 0 && update.array_offset == 0,
                    "transient descriptor updates only support binding 0 at offset 0, got binding {} offset {}",
                    update.binding,
                    update.array_offset
                );

                let Some(set) = transient::allocate_and_write(
                    &self.ring,
                    self.lookup.as_ref(),
                    layout,
                    layout_param,
                    update,
                ) else {
                    return Ok(None);
                };
                self.bind_descriptor_sets(stages, layout, layout_param, &[set.set])?;
                Ok(Some(set))
            }
        }
    }

    ///Binds `sets`, starting at `first_set`.
    pub fn bind_descriptor_sets(
        &mut self,
        stages: vk::ShaderStageFlags,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) -> Result<(), ImmediateError> {
        let buffer = self.active_buffer()?;
        if sets.is_empty() {
            return Ok(());
        }
        unsafe {
            self.device.inner.cmd_bind_descriptor_sets(
                buffer,
                bind_point_for_stages(stages),
                layout,
                first_set,
                sets,
            )
        };
        self.has_commands = true;
        Ok(())
    }

    ///Ends query `index` of `pool`. Returns the timeline value of `pool` that signals once the result is available.
    /// The value is signaled by the next flush.
    pub fn end_query(&mut self, pool: &QueryPool, index: u32) -> Result<u64, ImmediateError> {
        assert!(
            index < pool.size(),
            "query {} out of range for pool of size {}",
            index,
            pool.size()
        );
        let buffer = self.active_buffer()?;
        unsafe { self.device.inner.cmd_end_query(buffer, pool.pool, index) };
        self.has_commands = true;
        Ok(self.queue_query_signal(pool))
    }

    ///Writes the properties of `structures` (compacted size for instance, depending on `pool`'s type) into `pool`
    /// starting at `first_query`. Returns the timeline value that signals availability, as in
    /// [end_query](Self::end_query).
    pub fn query_acceleration_structures(
        &mut self,
        structures: &[vk::AccelerationStructureKHR],
        pool: &QueryPool,
        first_query: u32,
    ) -> Result<u64, ImmediateError> {
        if !self.device.capabilities.acceleration_structure {
            return Err(ImmediateError::Unsupported("VK_KHR_acceleration_structure"));
        }
        assert!(
            first_query as usize + structures.len() <= pool.size() as usize,
            "{} queries starting at {} do not fit into pool of size {}",
            structures.len(),
            first_query,
            pool.size()
        );

        let buffer = self.active_buffer()?;
        if structures.is_empty() {
            return Ok(pool.last_signal_value());
        }
        unsafe {
            self.device
                .inner
                .cmd_write_acceleration_structures_properties(
                    buffer,
                    structures,
                    pool.ty,
                    pool.pool,
                    first_query,
                )
        };
        self.has_commands = true;
        Ok(self.queue_query_signal(pool))
    }

    fn queue_query_signal(&mut self, pool: &QueryPool) -> u64 {
        let value = pool.next_signal_value();
        //a semaphore may only be signaled once per submission, keep the highest value
        if let Some(entry) = self
            .pending_query_signals
            .iter_mut()
            .find(|(semaphore, _)| Arc::ptr_eq(semaphore, &pool.timeline))
        {
            entry.1 = entry.1.max(value);
        } else {
            self.pending_query_signals
                .push((pool.timeline.clone(), value));
        }
        value
    }

    ///True if the active slot is open for recording. Only false after reopening a slot failed, the next
    /// [flush](Self::flush) retries.
    pub fn is_recording(&self) -> bool {
        self.ring.is_recording()
    }

    ///True if commands were recorded since the last flush.
    pub fn has_commands(&self) -> bool {
        self.has_commands
    }

    ///Index of the active ring slot.
    pub fn cursor(&self) -> usize {
        self.ring.cursor()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn registry(&self) -> &Arc<ActiveSessionRegistry> {
        &self.registry
    }

    ///True if this list was the last one used on the calling thread.
    pub fn is_active_on_current_thread(&self) -> bool {
        self.registry.get() == Some(self.id)
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn descriptor_update_path(&self) -> DescriptorUpdatePath {
        self.path
    }

    ///False once the slot `set` was allocated from was reset.
    pub fn is_transient_set_live(&self, set: &TransientSet) -> bool {
        transient::is_live(&self.ring, set)
    }
}

impl Drop for ImmediateCommandList {
    fn drop(&mut self) {
        //never flushes, unsubmitted commands are discarded
        #[cfg(feature = "logging")]
        if self.has_commands {
            log::warn!(
                "Dropping immediate command list {:?} with unsubmitted commands",
                self.id
            );
        }
        self.registry.forget(self.id);
    }
}
