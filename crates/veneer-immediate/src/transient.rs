//! # Transient descriptors
//!
//! Without `VK_KHR_push_descriptor` a descriptor set has to exist before it can be written. For those devices each ring
//! slot owns a small descriptor pool. Every descriptor table update allocates exactly one set from the active slot's
//! pool, writes it and binds it right away. When the slot comes around again, the whole pool is reset, invalidating
//! every set of that cycle at once.

use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;
use veneer::{
    ash::vk,
    resources::{DescriptorTableUpdate, DescriptorWrite},
};

use crate::ring::FrameRing;

///Supplies the set layout that matches a pipeline layout's parameter.
pub trait LayoutLookup: Send + Sync {
    ///Layout of set `param` of `layout`. `None` if the pipeline layout is unknown.
    fn set_layout(&self, layout: vk::PipelineLayout, param: u32) -> Option<vk::DescriptorSetLayout>;
}

///Simple [LayoutLookup]. The owner registers each pipeline layout together with the set layouts it was created from.
#[derive(Debug, Default)]
pub struct LayoutRegistry {
    layouts: RwLock<AHashMap<vk::PipelineLayout, Vec<vk::DescriptorSetLayout>>>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, layout: vk::PipelineLayout, set_layouts: &[vk::DescriptorSetLayout]) {
        self.layouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(layout, set_layouts.to_vec());
    }

    pub fn unregister(&self, layout: vk::PipelineLayout) {
        self.layouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&layout);
    }
}

impl LayoutLookup for LayoutRegistry {
    fn set_layout(&self, layout: vk::PipelineLayout, param: u32) -> Option<vk::DescriptorSetLayout> {
        self.layouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&layout)
            .and_then(|sets| sets.get(param as usize))
            .copied()
    }
}

///How descriptor table updates reach the command buffer. Chosen once, from the device capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorUpdatePath {
    ///Native `vkCmdPushDescriptorSetKHR`.
    Push,
    ///Allocate, write and bind a single-use set from the active slot's pool.
    Transient,
}

impl DescriptorUpdatePath {
    pub fn for_capabilities(capabilities: &veneer::context::Capabilities) -> Self {
        if capabilities.push_descriptor {
            DescriptorUpdatePath::Push
        } else {
            DescriptorUpdatePath::Transient
        }
    }
}

///A single-use descriptor set. Only valid until its slot is recycled, check with
/// [is_transient_set_live](crate::ImmediateCommandList::is_transient_set_live).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransientSet {
    pub set: vk::DescriptorSet,
    pub slot: usize,
    pub epoch: u64,
}

///Allocates one set for `layout`/`param` from the active slot and writes `update` into it.
///
/// Returns `None` (after logging) if the layout is unknown or the pool is exhausted. The update is dropped in that case.
pub(crate) fn allocate_and_write(
    ring: &FrameRing,
    lookup: &dyn LayoutLookup,
    layout: vk::PipelineLayout,
    param: u32,
    update: &DescriptorTableUpdate<'_>,
) -> Option<TransientSet> {
    let slot = ring.active();
    let Some(pool) = &slot.transient_pool else {
        #[cfg(feature = "logging")]
        log::error!("Transient descriptor update without transient pool");
        return None;
    };

    let Some(set_layout) = lookup.set_layout(layout, param) else {
        #[cfg(feature = "logging")]
        log::error!(
            "No descriptor set layout for pipeline layout {:?}, parameter {}",
            layout,
            param
        );
        return None;
    };

    let set = match pool.allocate(set_layout) {
        Ok(set) => set,
        Err(e) => {
            #[cfg(feature = "logging")]
            log::error!(
                "Failed to allocate {} transient descriptor handle(s) of type {:?}: {}",
                update.count(),
                update.descriptors.descriptor_type(),
                e
            );
            return None;
        }
    };

    let write = DescriptorWrite::new(update);
    unsafe {
        pool.device
            .inner
            .update_descriptor_sets(core::slice::from_ref(&write.as_raw(set)))
    };

    Some(TransientSet {
        set,
        slot: ring.cursor(),
        epoch: slot.epoch,
    })
}

///True while `set`'s slot was not reset since the set was allocated.
pub(crate) fn is_live(ring: &FrameRing, set: &TransientSet) -> bool {
    ring.slot(set.slot).epoch == set.epoch
}
