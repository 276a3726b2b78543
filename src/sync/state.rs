//! Sync engine state machine.
//!
//! # State Transitions
//! ```text
//! Idle → Registering → Synced → Watching
//! Watching → Watching (field change applied)
//! Watching → Reconnecting → Watching (monitor failure, fixed delay)
//! ```

use std::fmt;

/// Lifecycle state of a namespace's sync engine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle = 0,
    Registering = 1,
    Synced = 2,
    Watching = 3,
    Reconnecting = 4,
}

impl From<u8> for SyncState {
    fn from(val: u8) -> Self {
        match val {
            1 => SyncState::Registering,
            2 => SyncState::Synced,
            3 => SyncState::Watching,
            4 => SyncState::Reconnecting,
            _ => SyncState::Idle,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Registering => "registering",
            SyncState::Synced => "synced",
            SyncState::Watching => "watching",
            SyncState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
