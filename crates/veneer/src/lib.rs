//! # Veneer
//!
//! Thin wrappers around the Vulkan objects a post-processing overlay needs when it lives inside somebody else's
//! application. The host owns instance, device and queues. Veneer only owns what it creates on top of those:
//! command pools and buffers, fences, semaphores, descriptor pools and query pools.
//!
//! # Usage
//!
//! Wrap the host device once via [Device::from_ash](context::Device::from_ash). Every wrapper keeps an `Arc` of that
//! device and destroys its Vulkan object when dropped.
//!
//! All Vulkan calls go through the [DeviceDispatch](context::DeviceDispatch) trait object stored in the device. This
//! keeps the rest of the code independent of the loader and makes it possible to drive the wrappers without a GPU.

pub use ash;

///Device handle, capabilities and queue.
pub mod context;

///Owned Vulkan objects: command pools/buffers, descriptor pools, query pools and descriptor updates.
pub mod resources;

///Vulkan synchronisation primitives
pub mod sync;

mod error;
pub use error::{CommandBufferError, DescriptorError, DeviceError, VeneerError};
