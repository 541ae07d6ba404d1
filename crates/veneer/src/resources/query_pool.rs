use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ash::vk;

use crate::{context::Device, sync::Semaphore};

///Query pool that announces result availability through a timeline semaphore.
///
/// Every time a query is ended on an immediate command list, the pool hands out the next timeline value. The command
/// list signals that value with the submission containing the query, so a reader can wait for
/// `timeline.wait(value, ..)` before reading the results back.
pub struct QueryPool {
    pub pool: vk::QueryPool,
    pub device: Arc<Device>,
    pub ty: vk::QueryType,
    pub timeline: Arc<Semaphore>,
    //NOTE hiding since changing that would make the struct invalid
    pub(crate) size: u32,
    next_value: AtomicU64,
}

impl QueryPool {
    pub fn new(device: &Arc<Device>, size: u32, ty: vk::QueryType) -> Result<Self, vk::Result> {
        let timeline = Arc::new(Semaphore::new_timeline(device, 0)?);

        let create_info = vk::QueryPoolCreateInfo::default()
            .query_type(ty)
            .query_count(size);
        let pool = unsafe { device.inner.create_query_pool(&create_info)? };

        Ok(QueryPool {
            pool,
            device: device.clone(),
            ty,
            timeline,
            size,
            next_value: AtomicU64::new(0),
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    ///Reserves the next timeline value. Results of all queries ended before that value is signaled are available
    /// once the timeline reaches it.
    pub fn next_signal_value(&self) -> u64 {
        self.next_value.fetch_add(1, Ordering::AcqRel) + 1
    }

    ///The last value handed out by [next_signal_value](QueryPool::next_signal_value).
    pub fn last_signal_value(&self) -> u64 {
        self.next_value.load(Ordering::Acquire)
    }
}

impl Drop for QueryPool {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_query_pool(self.pool);
        }
    }
}
