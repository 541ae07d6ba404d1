use std::sync::Arc;

use ash::vk;

use crate::{context::Device, error::DescriptorError};

mod update;
pub use update::{
    DescriptorTableUpdate, DescriptorWrite, Descriptors, SamplerWithView, bind_point_for_stages,
};

pub struct DescriptorPool {
    pub device: Arc<Device>,
    ///actual inner pool
    pub inner: vk::DescriptorPool,
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_descriptor_pool(self.inner) }
    }
}

impl DescriptorPool {
    ///Simple [vk::DescriptorPool](ash::vk::DescriptorPool) creation wrapper. At most `max_sets` sets can be allocated
    /// between two resets.
    pub fn new(
        device: &Arc<Device>,
        flags: vk::DescriptorPoolCreateFlags,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<Self, DescriptorError> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(max_sets)
            .pool_sizes(sizes);

        let pool = unsafe { device.inner.create_descriptor_pool(&create_info)? };

        Ok(DescriptorPool {
            device: device.clone(),
            inner: pool,
        })
    }

    ///Allocates a single set of `layout`. The set stays valid until the pool is [reset](DescriptorPool::reset) or dropped.
    pub fn allocate(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, DescriptorError> {
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.inner)
            .set_layouts(core::slice::from_ref(&layout));

        let mut sets = unsafe { self.device.inner.allocate_descriptor_sets(&allocate_info)? };

        if sets.is_empty() {
            return Err(DescriptorError::Allocation {
                requested: 1,
                count: 0,
            });
        }

        #[cfg(feature = "logging")]
        if sets.len() > 1 {
            log::warn!(
                "Allocate too many descriptor sets, expected 1 got {}",
                sets.len()
            );
        }

        Ok(sets.remove(0))
    }

    ///Returns all sets allocated from this pool to the pool at once. Any set handle allocated before becomes invalid.
    pub fn reset(&self) -> Result<(), DescriptorError> {
        unsafe { self.device.inner.reset_descriptor_pool(self.inner) }.map_err(|e| e.into())
    }
}
