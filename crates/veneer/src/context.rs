//! ## Context
//!
//! Veneer never creates the Vulkan instance or device itself. Both belong to the host application, the overlay
//! only gets to see them when the device is created or hooked. Therefore the [Device](context::Device) is a thin
//! handle that carries
//!
//! - a [DeviceDispatch] table, the device-level functions veneer calls. For a real device this is
//!   [AshDispatch], tests can substitute their own implementation,
//! - the device [Capabilities] which are resolved once, when the device is wrapped.
//!
//! Queues are treated as opaque handles as well. A [Queue] is just the raw handle and the family it belongs to.
//!
//! All other wrappers (fences, semaphores, pools…) keep an `Arc<Device>` to destroy themselves when dropped.

mod ash_dispatch;
pub use ash_dispatch::AshDispatch;

mod debugger;
pub use debugger::Debugger;

mod device;
pub use device::{Capabilities, Device, DeviceDispatch};

mod queue;
pub use queue::Queue;
