//! Core server functionality
//!
//! This module provides:
//! - Server lifecycle state (shutdown flag, termination callback)
//! - The monotonic simulation clock
//! - The default logic tick

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Logic tick in milliseconds when the config leaves it out
pub const DEFAULT_TICK_MS: u64 = 10;

/// Type alias for termination callback functions
/// These run once when shutdown is requested
pub type TermFunc = Box<dyn Fn() + Send + 'static>;

/// Milliseconds since server start. Every timestamp in the simulation
/// (buff expiry, trap lifetime, waits) is measured on this clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn milliseconds(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide lifecycle state, shared between the logic loop, the
/// listener and the signal handler.
pub struct ServerState {
    shutdown_requested: AtomicBool,
    term_func: Mutex<Option<TermFunc>>,
}

impl ServerState {
    pub fn new() -> Self {
        ServerState {
            shutdown_requested: AtomicBool::new(false),
            term_func: Mutex::new(None),
        }
    }

    /// Request server shutdown. The termination callback runs on the first
    /// request only.
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            self.call_term_func();
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    pub fn set_term_func<F>(&self, func: F)
    where
        F: Fn() + Send + 'static,
    {
        *self.term_func.lock() = Some(Box::new(func));
    }

    fn call_term_func(&self) {
        if let Some(func) = self.term_func.lock().as_ref() {
            func();
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedServerState = Arc<ServerState>;

pub fn create_server_state() -> SharedServerState {
    Arc::new(ServerState::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_server_state_shutdown() {
        let state = ServerState::new();
        assert!(!state.should_shutdown());

        state.request_shutdown();
        assert!(state.should_shutdown());
    }

    #[test]
    fn test_term_func_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let state = create_server_state();
        state.set_term_func(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        state.request_shutdown();
        state.request_shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.milliseconds();
        std::thread::sleep(Duration::from_millis(5));
        let b = clock.milliseconds();
        assert!(a >= 0);
        assert!(b >= a + 5);
    }
}
