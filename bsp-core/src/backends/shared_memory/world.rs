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

//! [`SharedMemoryWorld`]: one `World` implementation shared by the `thread`
//! and `accelerator` backends, parameterized over which [`SyncPrimitive`]
//! a peer blocks on. Both backends are, underneath, the same shared-address-
//! space algorithm from `backends/thread/world.hpp`'s `sync()`; the
//! accelerator variant only swaps a condvar park for a spin-poll, standing
//! in for a hardware barrier.

use std::panic;
use std::sync::{Arc, Mutex};

use crate::deferred::{DeferredBuffers, GetOp, MessageOp, PutOp, RawAddr};
use crate::error::AbortSignal;
use crate::registry::ObjectId;
use crate::world::{GetHandle, World};

use super::barrier::SyncPrimitive;
use super::state::{QueueSlot, VarSlot, WorldState};

pub struct SharedMemoryWorld<B: SyncPrimitive> {
    pub(crate) rank: usize,
    pub(crate) state: Arc<WorldState<B>>,
    deferred: Mutex<DeferredBuffers>,
}

impl<B: SyncPrimitive> std::fmt::Debug for SharedMemoryWorld<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryWorld")
            .field("rank", &self.rank)
            .field("active_processors", &self.state.active_processors)
            .finish_non_exhaustive()
    }
}

impl<B: SyncPrimitive> SharedMemoryWorld<B> {
    pub(crate) fn new(rank: usize, state: Arc<WorldState<B>>) -> Self {
        Self {
            rank,
            state,
            deferred: Mutex::new(DeferredBuffers::new()),
        }
    }

    /// Unwinds this peer with the group's recorded abort reason if the
    /// barrier it just left was released by an abort rather than a full
    /// arrival.
    fn check_abort(&self) {
        if self.state.barrier.is_aborted() {
            let info = self.state.abort_info.lock().expect("abort info mutex poisoned");
            let (rank, reason) = match info.as_ref() {
                Some(info) => (info.rank, info.reason.clone()),
                None => (self.rank, "aborted by a peer".to_string()),
            };
            drop(info);
            panic::panic_any(AbortSignal { rank, reason });
        }
    }
}

impl<B: SyncPrimitive> World for SharedMemoryWorld<B> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn active_processors(&self) -> usize {
        self.state.active_processors
    }

    fn barrier(&self) {
        self.state.barrier.wait();
        self.check_abort();
    }

    fn sync(&self) {
        // Phase 1: every peer has finished this superstep's local code.
        self.state.barrier.wait();
        self.check_abort();

        let gets = self.deferred.lock().expect("deferred mutex poisoned").take_gets();
        for get in gets {
            // SAFETY: phase 1's barrier guarantees every peer, including the
            // target this `src` points into, has stopped writing its local
            // image for this superstep.
            let bytes = unsafe { std::slice::from_raw_parts(get.src.0, get.len) }.to_vec();
            get.handle.fulfill(bytes);
        }

        // Phase 2: every get has observed pre-superstep state.
        self.state.barrier.wait();
        self.check_abort();

        let (puts, messages) = self
            .deferred
            .lock()
            .expect("deferred mutex poisoned")
            .take_puts_and_messages();
        for put in puts {
            // SAFETY: no peer reads its own local image again until this
            // `sync` returns, so concurrent writes here (including two
            // peers targeting the same destination) race only against each
            // other, never against a reader — an implementation-defined but
            // documented last-write-wins outcome.
            unsafe {
                std::ptr::copy_nonoverlapping(put.payload.as_ptr(), put.dst.0, put.payload.len());
            }
        }
        for message in messages {
            self.state
                .queue_registry
                .with(message.queue_id, message.target, |slot: &QueueSlot| {
                    slot.deliver(message.payload)
                })
                .unwrap_or_else(|| crate::error::protocol_violation("send to an unregistered queue"));
        }

        if self.rank == 0 {
            self.state.drain_logs();
        }

        // Phase 3: every put and message has landed, every log is emitted.
        self.state.barrier.wait();
        self.check_abort();
    }

    fn log(&self, message: String) {
        self.state.log_buffers[self.rank]
            .lock()
            .expect("log buffer mutex poisoned")
            .push(message);
    }

    fn abort(&self, reason: String) -> ! {
        *self.state.abort_info.lock().expect("abort info mutex poisoned") = Some(super::state::AbortInfo {
            rank: self.rank,
            reason: reason.clone(),
        });
        self.state.barrier.abort();
        panic::panic_any(AbortSignal {
            rank: self.rank,
            reason,
        });
    }

    fn register_variable(&self, byte_len: usize) -> ObjectId {
        self.state.registry.register(self.rank, VarSlot::new(byte_len))
    }

    fn unregister_variable(&self, id: ObjectId) {
        self.state.registry.unregister(id, self.rank);
    }

    fn local_variable_bytes(&self, id: ObjectId) -> *mut u8 {
        self.state
            .registry
            .with(id, self.rank, VarSlot::as_ptr)
            .unwrap_or_else(|| crate::error::protocol_violation("access to an unregistered variable"))
    }

    fn put(&self, target: usize, id: ObjectId, byte_offset: usize, bytes: &[u8]) {
        let (dst_base, capacity) = self
            .state
            .registry
            .with(id, target, |slot: &VarSlot| (slot.as_ptr(), slot.capacity()))
            .unwrap_or_else(|| crate::error::protocol_violation("put to an unregistered variable"));

        // spec.md §7: an out-of-range put is recoverable misuse, not fatal —
        // log a diagnostic and drop it rather than writing past `capacity`.
        if byte_offset.checked_add(bytes.len()).is_none_or(|end| end > capacity) {
            tracing::warn!(target, id, byte_offset, len = bytes.len(), capacity, "out-of-range put dropped");
            self.log(format!(
                "out-of-range put to rank {target} variable {id}: offset {byte_offset} + {} exceeds capacity {capacity}; dropped",
                bytes.len()
            ));
            return;
        }

        // SAFETY: just checked `byte_offset + bytes.len() <= capacity` above.
        let dst = unsafe { dst_base.add(byte_offset) };
        self.deferred.lock().expect("deferred mutex poisoned").push_put(PutOp {
            dst: RawAddr(dst),
            payload: bytes.to_vec(),
        });
    }

    fn get(&self, target: usize, id: ObjectId, byte_offset: usize, byte_len: usize) -> GetHandle {
        let (src_base, capacity) = self
            .state
            .registry
            .with(id, target, |slot: &VarSlot| (slot.as_ptr(), slot.capacity()))
            .unwrap_or_else(|| crate::error::protocol_violation("get from an unregistered variable"));
        let handle = GetHandle::new();

        // spec.md §7: an out-of-range get is recoverable too — reading past
        // `capacity` would be as unsound as the equivalent put, so this
        // resolves to a zeroed result instead of reading out of bounds.
        if byte_offset.checked_add(byte_len).is_none_or(|end| end > capacity) {
            tracing::warn!(target, id, byte_offset, byte_len, capacity, "out-of-range get returns zeroed result");
            self.log(format!(
                "out-of-range get from rank {target} variable {id}: offset {byte_offset} + {byte_len} exceeds capacity {capacity}; returning zeroed result"
            ));
            handle.fulfill(vec![0u8; byte_len]);
            return handle;
        }

        // SAFETY: just checked `byte_offset + byte_len <= capacity` above.
        let src = unsafe { src_base.add(byte_offset) };
        self.deferred.lock().expect("deferred mutex poisoned").push_get(GetOp {
            src: RawAddr(src),
            len: byte_len,
            handle: handle.clone(),
        });
        handle
    }

    fn register_queue(&self) -> ObjectId {
        self.state.queue_registry.register(self.rank, QueueSlot::default())
    }

    fn unregister_queue(&self, id: ObjectId) {
        self.state.queue_registry.unregister(id, self.rank);
    }

    fn send(&self, target: usize, id: ObjectId, bytes: Vec<u8>) {
        self.deferred
            .lock()
            .expect("deferred mutex poisoned")
            .push_message(MessageOp {
                target,
                queue_id: id,
                payload: bytes,
            });
    }

    fn take_delivered_messages(&self, id: ObjectId) -> Vec<Vec<u8>> {
        self.state
            .queue_registry
            .with(id, self.rank, QueueSlot::take_delivered)
            .unwrap_or_else(|| crate::error::protocol_violation("read from an unregistered queue"))
    }
}
