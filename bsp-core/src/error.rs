/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Fatal error kinds returned from [`crate::environment`] spawn functions.
//!
//! Per the model's error-handling contract: every kind here is fatal and
//! terminates the whole processor group. Misuse that *can* be shrugged off
//! (an out-of-range coarray put, a queue read with no pending message) is
//! instead logged through [`crate::world::World::log`] and the call becomes a
//! no-op — it never reaches this enum.

use std::fmt;

/// Errors that can escape a `spawn` call.
#[derive(Debug, thiserror::Error)]
pub enum BspError {
    /// Invalid processor count, or a transport resource the backend needs
    /// could not be acquired.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A peer misused the collective protocol: divergent registration order,
    /// an out-of-bounds access that the backend chose to treat as fatal
    /// rather than a logged no-op, or a type-mismatched queue read.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The transport substrate itself faulted (a thread panicked, a channel
    /// disconnected, an OS-level failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A peer called [`World::abort`](crate::world::World::abort).
    #[error("aborted by rank {rank}: {reason}")]
    Abort { rank: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, BspError>;

/// Panic payload used to unwind a peer's thread when [`World::abort`] is
/// called, so the unwind can be told apart from a genuine user panic in
/// [`crate::backends`] thread runners (which wrap each peer closure in
/// `catch_unwind`).
#[derive(Debug, Clone)]
pub(crate) struct AbortSignal {
    pub rank: usize,
    pub reason: String,
}

impl fmt::Display for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {} called World::abort: {}", self.rank, self.reason)
    }
}

/// Panic payload for a fatal protocol misuse (per `spec.md` §7: divergent
/// collective registration, an out-of-bounds access the backend treats as
/// fatal, a type-mismatched queue read). Distinguished from a genuine panic
/// so a backend's `spawn` can report [`BspError::ProtocolViolation`] instead
/// of the catch-all [`BspError::Transport`].
#[derive(Debug, Clone)]
pub(crate) struct ProtocolViolationSignal(pub String);

impl fmt::Display for ProtocolViolationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol violation: {}", self.0)
    }
}

/// Unwinds the calling peer's thread with a [`ProtocolViolationSignal`].
/// Used at every spot a backend detects fatal misuse of the collective
/// protocol (an id nobody registered, a put/get past a variable's
/// registered length) instead of an unstructured `.expect(...)` panic, so
/// the violation survives `catch_unwind` as a typed, reportable error.
pub(crate) fn protocol_violation(reason: impl Into<String>) -> ! {
    std::panic::panic_any(ProtocolViolationSignal(reason.into()))
}
