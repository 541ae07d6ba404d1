//! Per-thread "last active session" routing.
//!
//! Helpers that upload data (a generic resource copy for instance) are sometimes invoked by surrounding code that does
//! not hold an explicit [ImmediateCommandList](crate::ImmediateCommandList). They ask the registry which session was
//! touched last on the current thread and route their work through that one.
//!
//! The registry is a routing hint, not a synchronisation mechanism. Each thread only ever sees its own entry.

use std::{
    sync::{
        Arc, OnceLock, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::ThreadId,
};

use ahash::AHashMap;

///Process unique identifier of an immediate command list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

///Maps each thread to the session it touched last.
#[derive(Debug, Default)]
pub struct ActiveSessionRegistry {
    active: RwLock<AHashMap<ThreadId, SessionId>>,
}

impl ActiveSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    ///Process wide default registry. Used by [ImmediateCommandList::new](crate::ImmediateCommandList::new).
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ActiveSessionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ActiveSessionRegistry::new())).clone()
    }

    ///Marks `id` as the last active session of the calling thread.
    pub fn set(&self, id: SessionId) {
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(std::thread::current().id(), id);
    }

    ///Last active session of the calling thread, if any.
    pub fn get(&self) -> Option<SessionId> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&std::thread::current().id())
            .copied()
    }

    ///Clears the calling thread's entry, but only if it still references `id`. Returns true if it did.
    pub fn clear_if(&self, id: SessionId) -> bool {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let thread = std::thread::current().id();
        if active.get(&thread) == Some(&id) {
            active.remove(&thread);
            true
        } else {
            false
        }
    }

    ///Removes `id` from every thread that still references it. Called when the session is destroyed.
    pub fn forget(&self, id: SessionId) {
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, active| *active != id);
    }
}
