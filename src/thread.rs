//! Cooperative guest thread manager.
//!
//! The host never runs two guest threads in parallel on one emulator;
//! "multithreading" here means time-slicing one engine by stopping it at
//! chosen points, swapping register state and log sink, and resuming. The
//! orchestrator holds a reference to the manager, never to individual
//! threads directly — callers reach a thread only by id.

use std::collections::HashMap;

use crate::hooks::StopReason;
use crate::logging::LogSink;

pub type ThreadId = u32;

/// One guest thread's saved state while it isn't the one currently driving
/// the engine.
pub struct GuestThread {
    pub id: ThreadId,
    pub registers: HashMap<crate::engine::RegId, u64>,
    pub sink: LogSink,
    pub stop_reason: Option<StopReason>,
}

impl GuestThread {
    fn new(id: ThreadId, sink: LogSink) -> Self {
        Self { id, registers: HashMap::new(), sink, stop_reason: None }
    }
}

/// Collaborator the orchestrator consults when `multithread` is enabled.
/// Absent entirely for single-threaded emulator instances.
#[derive(Default)]
pub struct ThreadManager {
    threads: HashMap<ThreadId, GuestThread>,
    current: Option<ThreadId>,
    next_id: ThreadId,
}

impl ThreadManager {
    pub fn new() -> Self {
        Self { threads: HashMap::new(), current: None, next_id: 1 }
    }

    /// Spawn a new guest thread with its own captured log sink, and make it
    /// current if no thread is running yet.
    pub fn spawn(&mut self) -> ThreadId {
        let id = self.next_id;
        self.next_id += 1;
        self.threads.insert(id, GuestThread::new(id, LogSink::captured()));
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn current_sink(&self) -> Option<LogSink> {
        self.current.and_then(|id| self.threads.get(&id)).map(|t| t.sink.clone())
    }

    /// Mark the current thread stopped with `reason`. No-op if no thread is current.
    pub fn stop_current(&mut self, reason: StopReason) {
        if let Some(id) = self.current {
            if let Some(t) = self.threads.get_mut(&id) {
                t.stop_reason = Some(reason);
            }
        }
    }

    /// Switch to the next runnable (not yet stopped) thread, if any.
    pub fn switch_to_next(&mut self) -> Option<ThreadId> {
        let mut ids: Vec<ThreadId> = self.threads.keys().copied().collect();
        ids.sort_unstable();
        let start = self.current.map(|c| ids.iter().position(|&i| i == c).unwrap_or(0) + 1).unwrap_or(0);
        for offset in 0..ids.len() {
            let idx = (start + offset) % ids.len();
            let id = ids[idx];
            if self.threads[&id].stop_reason.is_none() {
                self.current = Some(id);
                return Some(id);
            }
        }
        None
    }

    pub fn get(&self, id: ThreadId) -> Option<&GuestThread> {
        self.threads.get(&id)
    }

    pub fn all_stopped(&self) -> bool {
        self.threads.values().all(|t| t.stop_reason.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_spawned_thread_becomes_current() {
        let mut mgr = ThreadManager::new();
        let id = mgr.spawn();
        assert_eq!(mgr.current(), Some(id));
    }

    #[test]
    fn switch_skips_stopped_threads() {
        let mut mgr = ThreadManager::new();
        let a = mgr.spawn();
        let _b = mgr.spawn();
        mgr.stop_current(StopReason::ExitGroup(0));
        let next = mgr.switch_to_next();
        assert_ne!(next, Some(a));
    }

    #[test]
    fn all_stopped_reports_true_once_every_thread_stopped() {
        let mut mgr = ThreadManager::new();
        mgr.spawn();
        mgr.spawn();
        assert!(!mgr.all_stopped());
        mgr.stop_current(StopReason::ExitGroup(0));
        mgr.switch_to_next();
        mgr.stop_current(StopReason::ExitGroup(0));
        assert!(mgr.all_stopped());
    }
}
