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

//! `World` implementation for the message-passing backend. Unlike the
//! shared-memory backends, each peer owns a *private* [`Registry`] — there
//! is no shared address space to reach into, so every cross-peer
//! communication crosses [`std::sync::mpsc`] channels standing in for
//! network sockets, encoded with [`super::wire`]. Grounded in
//! `backends/mpi/world.hpp`.

use std::collections::HashMap;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::backends::shared_memory::barrier::{CondvarBarrier, SyncPrimitive};
use crate::backends::shared_memory::state::{AbortInfo, QueueSlot, VarSlot};
use crate::error::AbortSignal;
use crate::registry::{ObjectId, Registry};
use crate::world::{GetHandle, World};

use super::wire::{GetRequestWire, GetResponseWire, LogFlushWire, PutWire, QueueMessageWire, WireMessage};

pub(crate) struct MpShared {
    pub barrier: CondvarBarrier,
    pub abort_info: Mutex<Option<AbortInfo>>,
}

impl MpShared {
    pub fn new(active_processors: usize) -> Self {
        Self {
            barrier: CondvarBarrier::new(active_processors),
            abort_info: Mutex::new(None),
        }
    }
}

pub struct MessagePassingWorld {
    rank: usize,
    active_processors: usize,
    shared: Arc<MpShared>,
    registry: Registry<VarSlot>,
    queue_registry: Registry<QueueSlot>,
    outboxes: Vec<Sender<Vec<u8>>>,
    inbox: Mutex<Receiver<Vec<u8>>>,
    pending_gets: Mutex<HashMap<u64, GetHandle>>,
    next_request_id: AtomicU64,
    /// Messages drained from the inbox before their resolve phase, held
    /// until the phase that may legitimately act on them.
    stashed: Mutex<Vec<WireMessage>>,
    log_buffer: Mutex<Vec<String>>,
    /// Rank 0 only: `(rank, lines)` received via `LogFlush` this superstep.
    incoming_logs: Mutex<Vec<(usize, Vec<String>)>>,
    log_sink: Arc<crate::environment::LogSink>,
}

impl std::fmt::Debug for MessagePassingWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePassingWorld")
            .field("rank", &self.rank)
            .field("active_processors", &self.active_processors)
            .finish_non_exhaustive()
    }
}

impl MessagePassingWorld {
    pub(crate) fn new(
        rank: usize,
        active_processors: usize,
        shared: Arc<MpShared>,
        outboxes: Vec<Sender<Vec<u8>>>,
        inbox: Receiver<Vec<u8>>,
        log_sink: Arc<crate::environment::LogSink>,
    ) -> Self {
        Self {
            rank,
            active_processors,
            shared,
            // A private registry has exactly one column: every lookup uses
            // rank 0 regardless of this peer's real rank.
            registry: Registry::new(1),
            queue_registry: Registry::new(1),
            outboxes,
            inbox: Mutex::new(inbox),
            pending_gets: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            stashed: Mutex::new(Vec::new()),
            log_buffer: Mutex::new(Vec::new()),
            incoming_logs: Mutex::new(Vec::new()),
            log_sink,
        }
    }

    fn check_abort(&self) {
        if self.shared.barrier.is_aborted() {
            let info = self.shared.abort_info.lock().expect("abort info mutex poisoned");
            let (rank, reason) = match info.as_ref() {
                Some(info) => (info.rank, info.reason.clone()),
                None => (self.rank, "aborted by a peer".to_string()),
            };
            drop(info);
            panic::panic_any(AbortSignal { rank, reason });
        }
    }

    fn drain_inbox_into(&self, out: &mut Vec<WireMessage>) {
        let inbox = self.inbox.lock().expect("inbox mutex poisoned");
        loop {
            match inbox.try_recv() {
                Ok(bytes) => out.push(WireMessage::decode(&bytes)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn read_local(&self, id: ObjectId, byte_offset: usize, byte_len: usize) -> Vec<u8> {
        self.registry
            .with(id, 0, |slot: &VarSlot| {
                let capacity = slot.capacity();
                // spec.md §7: an out-of-range get is recoverable, not fatal —
                // log and return a zeroed result instead of reading past
                // `capacity`.
                if byte_offset.checked_add(byte_len).is_none_or(|end| end > capacity) {
                    tracing::warn!(id, byte_offset, byte_len, capacity, "out-of-range get request returns zeroed result");
                    self.log(format!(
                        "out-of-range get from variable {id}: offset {byte_offset} + {byte_len} exceeds capacity {capacity}; returning zeroed result"
                    ));
                    return vec![0u8; byte_len];
                }
                // SAFETY: our own phase-one barrier has already passed, so
                // no local write for this superstep is still in flight, and
                // the range check above guarantees this stays in bounds.
                unsafe { std::slice::from_raw_parts(slot.as_ptr().add(byte_offset), byte_len) }.to_vec()
            })
            .unwrap_or_else(|| crate::error::protocol_violation("get request against an unregistered variable"))
    }

    fn respond_to_get(&self, request: GetRequestWire) {
        let payload = self.read_local(request.id, request.byte_offset, request.byte_len);
        let response = WireMessage::GetResponse(GetResponseWire {
            request_id: request.request_id,
            payload,
        });
        self.outboxes[request.requester]
            .send(response.encode())
            .expect("get response send failed");
    }

    fn apply_put(&self, put: PutWire) {
        let id = put.id;
        let byte_offset = put.byte_offset;
        let len = put.payload.len();
        let out_of_range = self
            .registry
            .with(id, 0, |slot: &VarSlot| {
                let capacity = slot.capacity();
                // spec.md §7: an out-of-range put is recoverable, not fatal —
                // log and drop it instead of writing past `capacity`.
                if byte_offset.checked_add(len).is_none_or(|end| end > capacity) {
                    return Some(capacity);
                }
                // SAFETY: applied only after the barrier that follows get
                // resolution, so no peer reads this image again until this
                // `sync` returns; the range check above keeps this in bounds.
                unsafe {
                    std::ptr::copy_nonoverlapping(put.payload.as_ptr(), slot.as_ptr().add(byte_offset), len);
                }
                None
            })
            .unwrap_or_else(|| crate::error::protocol_violation("put against an unregistered variable"));

        if let Some(capacity) = out_of_range {
            tracing::warn!(id, byte_offset, len, capacity, "out-of-range put dropped");
            self.log(format!(
                "out-of-range put to variable {id}: offset {byte_offset} + {len} exceeds capacity {capacity}; dropped"
            ));
        }
    }

    fn apply_queue_message(&self, message: QueueMessageWire) {
        self.queue_registry
            .with(message.id, 0, |slot: &QueueSlot| slot.deliver(message.payload))
            .unwrap_or_else(|| crate::error::protocol_violation("message sent to an unregistered queue"));
    }

    fn resolve_gets_phase(&self) {
        let mut incoming = Vec::new();
        self.drain_inbox_into(&mut incoming);
        let mut stash = self.stashed.lock().expect("stash mutex poisoned");
        for message in incoming {
            match message {
                WireMessage::GetRequest(request) => self.respond_to_get(request),
                other => stash.push(other),
            }
        }
    }

    fn flush_log_buffer(&self) {
        let lines = std::mem::take(&mut *self.log_buffer.lock().expect("log buffer mutex poisoned"));
        if lines.is_empty() {
            return;
        }
        if self.rank == 0 {
            self.incoming_logs.lock().expect("incoming logs mutex poisoned").push((0, lines));
        } else {
            let message = WireMessage::LogFlush(LogFlushWire { rank: self.rank, lines });
            self.outboxes[0].send(message.encode()).expect("log flush send failed");
        }
    }

    fn resolve_puts_phase(&self) {
        let mut incoming = Vec::new();
        self.drain_inbox_into(&mut incoming);
        let mut stash = self.stashed.lock().expect("stash mutex poisoned");
        let mut all = std::mem::take(&mut *stash);
        drop(stash);
        all.extend(incoming);

        for message in all {
            match message {
                WireMessage::Put(put) => self.apply_put(put),
                WireMessage::QueueMessage(queue_message) => self.apply_queue_message(queue_message),
                WireMessage::GetRequest(request) => self.respond_to_get(request),
                WireMessage::GetResponse(response) => {
                    if let Some(handle) = self.pending_gets.lock().expect("pending gets mutex poisoned").remove(&response.request_id) {
                        handle.fulfill(response.payload);
                    }
                }
                WireMessage::LogFlush(flush) => {
                    self.incoming_logs
                        .lock()
                        .expect("incoming logs mutex poisoned")
                        .push((flush.rank, flush.lines));
                }
            }
        }

        if self.rank == 0 {
            let mut logs = std::mem::take(&mut *self.incoming_logs.lock().expect("incoming logs mutex poisoned"));
            logs.sort_by_key(|(rank, _)| *rank);
            for (rank, lines) in logs {
                for line in lines {
                    self.log_sink.emit(rank, &line);
                }
            }
        }
    }
}

impl World for MessagePassingWorld {
    fn rank(&self) -> usize {
        self.rank
    }

    fn active_processors(&self) -> usize {
        self.active_processors
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
        self.check_abort();
    }

    fn sync(&self) {
        self.shared.barrier.wait(); // S1: every peer issued this superstep's ops.
        self.check_abort();

        self.resolve_gets_phase();
        self.flush_log_buffer();

        self.shared.barrier.wait(); // S2: every get-request has been answered.
        self.check_abort();

        self.resolve_puts_phase();

        self.shared.barrier.wait(); // S3: every put/message/log has landed.
        self.check_abort();
    }

    fn log(&self, message: String) {
        self.log_buffer.lock().expect("log buffer mutex poisoned").push(message);
    }

    fn abort(&self, reason: String) -> ! {
        *self.shared.abort_info.lock().expect("abort info mutex poisoned") = Some(AbortInfo {
            rank: self.rank,
            reason: reason.clone(),
        });
        self.shared.barrier.abort();
        panic::panic_any(AbortSignal {
            rank: self.rank,
            reason,
        });
    }

    fn register_variable(&self, byte_len: usize) -> ObjectId {
        self.registry.register(0, VarSlot::new(byte_len))
    }

    fn unregister_variable(&self, id: ObjectId) {
        self.registry.unregister(id, 0);
    }

    fn local_variable_bytes(&self, id: ObjectId) -> *mut u8 {
        self.registry.with(id, 0, VarSlot::as_ptr).unwrap_or_else(|| crate::error::protocol_violation("access to an unregistered variable"))
    }

    fn put(&self, target: usize, id: ObjectId, byte_offset: usize, bytes: &[u8]) {
        let message = WireMessage::Put(PutWire {
            id,
            byte_offset,
            payload: bytes.to_vec(),
        });
        self.outboxes[target].send(message.encode()).expect("put send failed");
    }

    fn get(&self, target: usize, id: ObjectId, byte_offset: usize, byte_len: usize) -> GetHandle {
        let handle = GetHandle::new();
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        self.pending_gets
            .lock()
            .expect("pending gets mutex poisoned")
            .insert(request_id, handle.clone());
        let message = WireMessage::GetRequest(GetRequestWire {
            id,
            byte_offset,
            byte_len,
            request_id,
            requester: self.rank,
        });
        self.outboxes[target].send(message.encode()).expect("get request send failed");
        handle
    }

    fn register_queue(&self) -> ObjectId {
        self.queue_registry.register(0, QueueSlot::default())
    }

    fn unregister_queue(&self, id: ObjectId) {
        self.queue_registry.unregister(id, 0);
    }

    fn send(&self, target: usize, id: ObjectId, bytes: Vec<u8>) {
        let message = WireMessage::QueueMessage(QueueMessageWire { id, payload: bytes });
        self.outboxes[target].send(message.encode()).expect("queue send failed");
    }

    fn take_delivered_messages(&self, id: ObjectId) -> Vec<Vec<u8>> {
        self.queue_registry
            .with(id, 0, QueueSlot::take_delivered)
            .unwrap_or_else(|| crate::error::protocol_violation("read from an unregistered queue"))
    }
}
