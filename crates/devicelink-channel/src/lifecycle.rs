//! Device channel lifecycle state machine.
//!
//! # States
//!
//! - `Uninitialized`: created, backend handle not opened
//! - `Initializing`: backend handle being opened
//! - `Ready`: reads and writes allowed
//! - `Closing`: backend handle being closed
//! - `Closed`: backend handle closed, channel cannot be reopened
//! - `Disposing`: backend being closed and released
//! - `Disposed`: backend released, every operation fails
//!
//! # Valid Transitions
//!
//! - Uninitialized → Initializing → Ready
//! - Initializing → Uninitialized (open failed)
//! - Uninitialized/Initializing/Ready → Closing → Closed
//! - any → Disposing → Disposed
//!
//! A closed channel never returns to `Ready`; reconnecting means building a
//! new channel.
//!
//! Close is guarded by an in-progress flag rather than by holding the state
//! lock, so a second close while one is running returns immediately instead
//! of blocking. A dispose that starts during a close leaves the backend to
//! that close.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Lifecycle state of a device channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Closing,
    Closed,
    Disposing,
    Disposed,
}

impl LifecycleState {
    /// Check if the state is terminal for I/O (closed or disposed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Disposing | Self::Disposed)
    }

    /// Check if disposal has started.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposing | Self::Disposed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Disposing => write!(f, "disposing"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Owned lifecycle state of one channel.
///
/// Each method checks and sets the state under a short lock that is never
/// held across an await.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    closing: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Uninitialized),
            closing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        // The state is a plain Copy value, always valid even after a panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.lock()
    }

    /// True once disposal has started.
    pub fn is_disposed(&self) -> bool {
        self.state().is_disposed()
    }

    /// True while a close is running.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Uninitialized → Initializing.
    ///
    /// # Errors
    ///
    /// Returns the current state if the transition is not allowed.
    pub fn begin_initialize(&self) -> Result<(), LifecycleState> {
        let mut state = self.lock();
        match *state {
            LifecycleState::Uninitialized => {
                *state = LifecycleState::Initializing;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Initializing → Ready.
    ///
    /// # Errors
    ///
    /// Returns the current state if a close or dispose overtook the
    /// initialization.
    pub fn finish_initialize(&self) -> Result<(), LifecycleState> {
        let mut state = self.lock();
        match *state {
            LifecycleState::Initializing => {
                *state = LifecycleState::Ready;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Initializing → Uninitialized, after the backend failed to open.
    pub fn abort_initialize(&self) {
        let mut state = self.lock();
        if *state == LifecycleState::Initializing {
            *state = LifecycleState::Uninitialized;
        }
    }

    /// Enter `Closing`.
    ///
    /// Returns the state the channel was in, or `None` if there is nothing to
    /// do: another close is in progress, or the channel is already closed or
    /// disposed.
    pub fn begin_close(&self) -> Option<LifecycleState> {
        if self
            .closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let mut state = self.lock();
        if state.is_terminal() {
            drop(state);
            self.closing.store(false, Ordering::Release);
            return None;
        }

        let previous = *state;
        *state = LifecycleState::Closing;
        Some(previous)
    }

    /// Closing → Closed, and clear the in-progress flag.
    pub fn finish_close(&self) {
        {
            let mut state = self.lock();
            if *state == LifecycleState::Closing {
                *state = LifecycleState::Closed;
            }
        }
        self.closing.store(false, Ordering::Release);
    }

    /// Enter `Disposing`.
    ///
    /// Returns the state the channel was in, or `None` if disposal already
    /// started.
    pub fn begin_dispose(&self) -> Option<LifecycleState> {
        let mut state = self.lock();
        if state.is_disposed() {
            return None;
        }
        let previous = *state;
        *state = LifecycleState::Disposing;
        Some(previous)
    }

    /// Enter the final `Disposed` state.
    pub fn finish_dispose(&self) {
        *self.lock() = LifecycleState::Disposed;
    }
}
