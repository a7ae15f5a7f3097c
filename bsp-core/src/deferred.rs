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

//! Per-peer buffers of not-yet-applied communication, drained by a
//! backend's `sync` implementation.
//!
//! Grounded in `backends/thread/world.hpp`'s `copy_task { dst, src, size }`
//! and its `get_tasks_`/`put_tasks_` vectors: a `put`/`get` call never
//! touches memory immediately, it only records *where* the eventual copy
//! should land. `sync` drains these buffers in the two-phase order the
//! model requires (all gets observe pre-superstep state, then all puts and
//! messages land together).

use crate::registry::ObjectId;
use crate::world::GetHandle;

/// A raw local address, carried across threads. Sound only because every
/// read/write through it is bracketed by the barrier that the owning
/// backend's `sync` already performs — the barrier's mutex release/acquire
/// is what establishes happens-before between the writer and the next
/// reader, not any property of this type.
pub(crate) struct RawAddr(pub *mut u8);

// SAFETY: `RawAddr` is sent between peer threads inside a single
// `sync` call only after the sending side has stopped mutating the pointee
// for this superstep, and the receiving side reads it only after the
// barrier that follows. See the backend's `sync` for the exact ordering.
unsafe impl Send for RawAddr {}

/// A buffered write: copy `payload` into `dst` at the next resolve phase.
pub(crate) struct PutOp {
    pub dst: RawAddr,
    pub payload: Vec<u8>,
}

/// A buffered read: copy `len` bytes starting at `src` into `handle` at the
/// next resolve phase. `src` points into the *target* peer's image, so this
/// op is only safe to resolve after the barrier that guarantees the target
/// has finished its own writes for the superstep.
pub(crate) struct GetOp {
    pub src: RawAddr,
    pub len: usize,
    pub handle: GetHandle,
}

/// A buffered outgoing message: deliver `payload` into `queue_id` on
/// `target` at the next resolve phase.
pub(crate) struct MessageOp {
    pub target: usize,
    pub queue_id: ObjectId,
    pub payload: Vec<u8>,
}

/// One peer's queued-but-unresolved communication for the superstep in
/// progress. Reset by `take` at the start of each `sync`.
#[derive(Default)]
pub(crate) struct DeferredBuffers {
    puts: Vec<PutOp>,
    gets: Vec<GetOp>,
    messages: Vec<MessageOp>,
}

impl DeferredBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_put(&mut self, op: PutOp) {
        self.puts.push(op);
    }

    pub fn push_get(&mut self, op: GetOp) {
        self.gets.push(op);
    }

    pub fn push_message(&mut self, op: MessageOp) {
        self.messages.push(op);
    }

    /// Empties the buffers, handing ownership of their contents to the
    /// caller. Called once per phase of `sync`: once to pull the gets (so
    /// they can resolve before any put touches shared state), once more to
    /// pull the puts and messages.
    pub fn take_gets(&mut self) -> Vec<GetOp> {
        std::mem::take(&mut self.gets)
    }

    pub fn take_puts_and_messages(&mut self) -> (Vec<PutOp>, Vec<MessageOp>) {
        (std::mem::take(&mut self.puts), std::mem::take(&mut self.messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_gets_empties_only_gets() {
        let mut buf = DeferredBuffers::new();
        let mut byte = 0u8;
        buf.push_put(PutOp {
            dst: RawAddr(&mut byte as *mut u8),
            payload: vec![1],
        });
        buf.push_get(GetOp {
            src: RawAddr(&mut byte as *mut u8),
            len: 1,
            handle: GetHandle::new(),
        });

        let gets = buf.take_gets();
        assert_eq!(gets.len(), 1);
        let (puts, messages) = buf.take_puts_and_messages();
        assert_eq!(puts.len(), 1);
        assert!(messages.is_empty());
    }

    #[test]
    fn take_is_idempotent_drain() {
        let mut buf = DeferredBuffers::new();
        buf.push_message(MessageOp {
            target: 1,
            queue_id: 0,
            payload: vec![9],
        });
        let (_, messages) = buf.take_puts_and_messages();
        assert_eq!(messages.len(), 1);
        let (_, messages_again) = buf.take_puts_and_messages();
        assert!(messages_again.is_empty());
    }
}
