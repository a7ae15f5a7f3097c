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

//! Group-wide state shared by every peer in a `thread` or `accelerator`
//! world: one [`Registry`] for variables, one for queues, one log buffer
//! per rank, and the abort flag carried by the backend's [`super::barrier::SyncPrimitive`].
//!
//! Sharing one instance (behind an `Arc`) across all peer threads is what
//! makes `put`/`get` a direct pointer copy instead of a serialized message —
//! this is the actual difference between this backend and
//! `message_passing`, which gives each peer a *private* registry because a
//! real distributed-memory machine has no such shared state to reach into.

use std::cell::UnsafeCell;
use std::sync::Mutex;

use crate::environment::LogSink;
use crate::registry::Registry;

use super::barrier::SyncPrimitive;

/// A variable's per-peer local image. The byte buffer is heap-allocated so
/// its address stays stable even if the `VarSlot` itself is moved while the
/// registry's backing `Vec` grows. `capacity` is fixed at construction and
/// never touched through the `UnsafeCell`, so reading it needs none of the
/// raw-pointer care `as_ptr` does — it is what lets a backend's `put`/`get`
/// reject an out-of-range access as the `spec.md` §7 recoverable no-op
/// instead of writing or reading past the buffer.
pub(crate) struct VarSlot {
    buffer: UnsafeCell<Box<[u8]>>,
    capacity: usize,
}

// SAFETY: concurrent access to `buffer` is never through `&VarSlot` alone —
// every read/write goes through the raw pointer from `as_ptr`, bracketed by
// the barriers in `SharedMemoryWorld::sync`, which establish the needed
// happens-before edges. See that file for the exact phase ordering.
unsafe impl Sync for VarSlot {}

impl VarSlot {
    pub fn new(byte_len: usize) -> Self {
        Self {
            buffer: UnsafeCell::new(vec![0u8; byte_len].into_boxed_slice()),
            capacity: byte_len,
        }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        // SAFETY: only the pointer value escapes; no reference is created.
        unsafe { (*self.buffer.get()).as_mut_ptr() }
    }

    /// The registered length of this slot, in bytes. A `put`/`get` whose
    /// `byte_offset + byte_len` exceeds this is out of range.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A queue's per-peer inbox: messages addressed to this peer, appended by
/// any sender during a resolve phase and drained wholesale by the owning
/// [`crate::objects::Queue`] once per `sync`.
#[derive(Default)]
pub(crate) struct QueueSlot {
    pending: Mutex<Vec<Vec<u8>>>,
}

impl QueueSlot {
    pub fn deliver(&self, payload: Vec<u8>) {
        self.pending.lock().expect("queue slot mutex poisoned").push(payload);
    }

    pub fn take_delivered(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending.lock().expect("queue slot mutex poisoned"))
    }
}

/// The failure a peer reported through `World::abort`, recorded so every
/// other peer's unwind carries the same rank/reason.
pub(crate) struct AbortInfo {
    pub rank: usize,
    pub reason: String,
}

pub(crate) struct WorldState<B: SyncPrimitive> {
    pub active_processors: usize,
    pub barrier: B,
    pub registry: Registry<VarSlot>,
    pub queue_registry: Registry<QueueSlot>,
    pub log_buffers: Vec<Mutex<Vec<String>>>,
    pub log_sink: LogSink,
    pub abort_info: Mutex<Option<AbortInfo>>,
}

impl<B: SyncPrimitive> WorldState<B> {
    pub fn new(active_processors: usize, log_sink: LogSink) -> Self {
        Self {
            active_processors,
            barrier: B::new(active_processors),
            registry: Registry::new(active_processors),
            queue_registry: Registry::new(active_processors),
            log_buffers: (0..active_processors).map(|_| Mutex::new(Vec::new())).collect(),
            log_sink,
            abort_info: Mutex::new(None),
        }
    }

    /// Rank 0 drains every peer's log buffer in rank order and hands each
    /// line to the sink. Ranks keep intra-rank call order because `Vec`
    /// push order is preserved, so the overall emission is a stable sort by
    /// rank as required.
    pub fn drain_logs(&self) {
        for (rank, buffer) in self.log_buffers.iter().enumerate() {
            let mut lines = buffer.lock().expect("log buffer mutex poisoned");
            for line in lines.drain(..) {
                self.log_sink.emit(rank, &line);
            }
        }
    }
}
