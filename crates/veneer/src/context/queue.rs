///Abstract queue that collects a [ash::vk::Queue](ash::vk::Queue) and its family.
///
/// The queue is usually shared with the host application. Veneer never assumes any ordering relative to the host's
/// own submissions, that has to be established through semaphores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Queue {
    pub inner: ash::vk::Queue,
    pub family_index: u32,
}

impl Queue {
    pub fn new(inner: ash::vk::Queue, family_index: u32) -> Self {
        Queue {
            inner,
            family_index,
        }
    }
}
