use std::sync::Arc;

use smallvec::SmallVec;
use veneer::{ash::vk, sync::Semaphore};

use crate::{ImmediateCommandList, ImmediateError};

///Semaphores a flush waits on, and whether it should signal one.
///
/// After a successful flush the chain is rewritten: it then waits on exactly the semaphore that flush signaled (if
/// any), and the signal request is consumed. Passing the same chain to consecutive flushes therefore orders them on
/// the GPU.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SemaphoreChain {
    pub wait: SmallVec<[vk::Semaphore; 4]>,
    ///Stage of each entry in `wait`. Missing entries default to `ALL_COMMANDS`.
    pub wait_stages: SmallVec<[vk::PipelineStageFlags; 4]>,
    pub signal: bool,
}

impl SemaphoreChain {
    pub fn new() -> Self {
        Self::default()
    }

    ///Waits for `semaphore` at `stage`, for instance the host's swapchain acquire semaphore.
    pub fn with_wait(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags) -> Self {
        self.wait.push(semaphore);
        self.wait_stages.push(stage);
        self
    }

    ///Requests the next flush to signal its slot semaphore, even if it waits on nothing.
    pub fn with_signal(mut self) -> Self {
        self.signal = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.wait.is_empty() && !self.signal
    }

    fn stage(&self, index: usize) -> vk::PipelineStageFlags {
        self.wait_stages
            .get(index)
            .copied()
            .unwrap_or(vk::PipelineStageFlags::ALL_COMMANDS)
    }
}

impl ImmediateCommandList {
    ///Submits everything recorded since the last flush and opens the next ring slot.
    ///
    /// Does nothing if no commands are pending. The submission waits on `chain`, and signals the slot's semaphore if
    /// `chain` waits on anything or requests a signal. On success `chain` is rewritten to wait on that semaphore.
    ///
    /// # Errors
    ///
    /// - [Close](ImmediateError::Close)/[Submit](ImmediateError::Submit): the recorded commands are discarded, the same
    ///   slot is open for recording again.
    /// - [Reopen](ImmediateError::Reopen)/[Wait](ImmediateError::Wait): the batch was submitted, but the next slot
    ///   could not be opened. Nothing can be recorded until the next flush reopened it.
    pub fn flush(&mut self, chain: &mut SemaphoreChain) -> Result<(), ImmediateError> {
        self.registry.set(self.id);

        if !self.ring.is_recording() {
            #[cfg(feature = "logging")]
            log::info!("Retrying to open immediate slot {}", self.ring.cursor());
            return self.ring.reopen_active();
        }

        if !self.has_commands {
            return Ok(());
        }

        self.has_commands = false;
        let query_signals = std::mem::take(&mut self.pending_query_signals);

        let slot = self.ring.active();
        if let Err(e) = slot.buffer.end() {
            #[cfg(feature = "logging")]
            log::error!("Failed to close immediate command list: {}", e);
            release_query_signals(&query_signals);
            self.ring.restart_active();
            return Err(ImmediateError::Close(e));
        }

        let slot_signal = if !chain.wait.is_empty() || chain.signal {
            slot.semaphore.as_ref().map(|s| s.inner)
        } else {
            None
        };

        let wait_stages: SmallVec<[vk::PipelineStageFlags; 4]> =
            (0..chain.wait.len()).map(|i| chain.stage(i)).collect();

        //binary semaphores ignore their value
        let mut signal: SmallVec<[vk::Semaphore; 4]> = slot_signal.into_iter().collect();
        let mut signal_values: SmallVec<[u64; 4]> = slot_signal.iter().map(|_| 0).collect();
        for (timeline, value) in query_signals.iter() {
            signal.push(timeline.inner);
            signal_values.push(*value);
        }

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let mut submit = vk::SubmitInfo::default()
            .wait_semaphores(&chain.wait)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(core::slice::from_ref(&slot.buffer.inner))
            .signal_semaphores(&signal);
        if !query_signals.is_empty() {
            submit = submit.push_next(&mut timeline_info);
        }

        //reset right before the submit that signals it again
        let result = slot.fence.reset().and_then(|_| unsafe {
            self.device.inner.queue_submit(
                self.queue.inner,
                core::slice::from_ref(&submit),
                slot.fence.inner,
            )
        });

        if let Err(e) = result {
            #[cfg(feature = "logging")]
            log::error!("Failed to submit immediate command list: {}", e);
            release_query_signals(&query_signals);
            self.ring.restore_active_fence();
            self.ring.restart_active();
            return Err(ImmediateError::Submit(e));
        }

        #[cfg(feature = "logging")]
        log::trace!(
            "Submitted immediate slot {} (wait: {}, signal: {})",
            self.ring.cursor(),
            chain.wait.len(),
            signal.len()
        );

        self.ring.active_mut().retained = query_signals
            .into_iter()
            .map(|(timeline, _)| timeline)
            .collect();

        let next_stage = chain.stage(0);
        chain.wait.clear();
        chain.wait_stages.clear();
        chain.signal = false;
        if let Some(signaled) = slot_signal {
            chain.wait.push(signaled);
            chain.wait_stages.push(next_stage);
        }

        self.ring.advance();
        self.ring.reopen_active()
    }

    ///Flushes and blocks until the GPU executed the submitted commands.
    pub fn flush_and_wait(&mut self) -> Result<(), ImmediateError> {
        //nothing to wait for, but a failed reopen is retried like in flush
        if !self.has_commands || !self.ring.is_recording() {
            return self.flush(&mut SemaphoreChain::new());
        }

        let submitted = self.ring.cursor();
        let result = self.flush(&mut SemaphoreChain::new());
        if let Err(ImmediateError::Close(_) | ImmediateError::Submit(_)) = result {
            return result;
        }

        //the batch is on the queue, even if the next slot failed to open
        self.ring
            .slot(submitted)
            .fence
            .wait(u64::MAX)
            .map_err(ImmediateError::Wait)?;
        result
    }
}

///Signals the promised values of a batch that never reached the queue from the host. The queries were discarded with
/// the batch, but readers waiting on the timeline must not block forever.
fn release_query_signals(signals: &[(Arc<Semaphore>, u64)]) {
    for (timeline, value) in signals {
        if timeline.get_value() >= *value {
            continue;
        }
        if let Err(current) = timeline.set_value(*value) {
            #[cfg(feature = "logging")]
            log::error!(
                "Failed to release query timeline value {} (currently {})",
                value,
                current
            );
        }
    }
}
