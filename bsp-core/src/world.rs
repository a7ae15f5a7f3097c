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

//! The per-processor facade: [`World`] is the abstract contract every
//! backend implements. Distributed objects (`crate::objects`) are generic
//! over `W: World` and never reach into a concrete backend — this is the
//! "polymorphism across backends" design: one trait, several substrates.

use std::sync::{Arc, Mutex};

pub use crate::registry::ObjectId;

/// A cell a pending `get` writes its result into at `sync`. Cloned freely;
/// all clones observe the same eventual payload. `try_peek` is used by
/// [`crate::objects::Future::value`], which is only meaningful after the
/// `sync` that resolves it has returned.
#[derive(Clone)]
pub struct GetHandle(Arc<Mutex<Option<Vec<u8>>>>);

impl GetHandle {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    pub(crate) fn fulfill(&self, bytes: Vec<u8>) {
        *self.0.lock().expect("get-handle mutex poisoned") = Some(bytes);
    }

    /// Returns the resolved bytes, or `None` if `sync` has not resolved this
    /// get yet.
    pub fn try_peek(&self) -> Option<Vec<u8>> {
        self.0.lock().expect("get-handle mutex poisoned").clone()
    }
}

impl std::fmt::Debug for GetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetHandle").finish_non_exhaustive()
    }
}

/// The BSP operations and registration hooks every backend provides.
///
/// All operations are collective unless their doc comment says otherwise.
/// Implementors own the superstep algorithm (`sync`); distributed objects
/// only ever call through this trait.
pub trait World: Send {
    /// The local processor's rank in `[0, active_processors())`.
    fn rank(&self) -> usize;

    /// The number of processors in this SPMD group. Pure, local.
    fn active_processors(&self) -> usize;

    /// The rank of the logically-next processor, wrapping at
    /// `active_processors()`.
    fn next_rank(&self) -> usize {
        let next = self.rank() + 1;
        if next >= self.active_processors() {
            0
        } else {
            next
        }
    }

    /// The rank of the logically-previous processor, wrapping below zero.
    fn prev_rank(&self) -> usize {
        if self.rank() == 0 {
            self.active_processors() - 1
        } else {
            self.rank() - 1
        }
    }

    /// Blocks until every peer has called `barrier`. Performs no
    /// communication resolution and does not clear queues.
    fn barrier(&self);

    /// The superstep boundary: barrier, resolve every buffered get, barrier,
    /// resolve every buffered put and install delivered queue messages,
    /// emit buffered logs in rank order, barrier.
    fn sync(&self);

    /// Non-collective. Queues a formatted line tagged with this rank for
    /// emission at the next `sync`.
    fn log(&self, message: String);

    /// Signals catastrophic failure: unblocks every peer waiting in
    /// `barrier`/`sync` and causes `spawn` to return
    /// [`crate::error::BspError::Abort`]. Never returns normally — it
    /// unwinds the calling peer's closure.
    fn abort(&self, reason: String) -> !;

    /// Collective. Registers a `byte_len`-byte local image and returns the
    /// id every peer's matching call receives.
    fn register_variable(&self, byte_len: usize) -> ObjectId;

    /// Collective for the group's bookkeeping; the actual deregistration of
    /// this peer's slot is local.
    fn unregister_variable(&self, id: ObjectId);

    /// Raw pointer to this peer's own local image for the variable
    /// registered as `id`. Valid for the variable's lifetime; writes through
    /// it are visible to this peer's own subsequent reads immediately (no
    /// sync needed) but to other peers only after the next `sync` observes
    /// a put.
    fn local_variable_bytes(&self, id: ObjectId) -> *mut u8;

    /// Non-collective. Buffers a write of `bytes` into `target`'s image for
    /// `id`, starting at `byte_offset`. Takes effect at the next `sync`.
    fn put(&self, target: usize, id: ObjectId, byte_offset: usize, bytes: &[u8]);

    /// Non-collective. Buffers a read of `byte_len` bytes from `target`'s
    /// image for `id`, starting at `byte_offset`. The returned handle is
    /// fulfilled during the next `sync`, observing `target`'s value as of
    /// the end of the superstep in which `get` was called (never a
    /// same-superstep put from a third peer).
    fn get(&self, target: usize, id: ObjectId, byte_offset: usize, byte_len: usize) -> GetHandle;

    /// Collective.
    fn register_queue(&self) -> ObjectId;

    /// See [`World::unregister_variable`].
    fn unregister_queue(&self, id: ObjectId);

    /// Non-collective. Buffers an outgoing message for delivery to
    /// `target`'s queue `id` at the next `sync`.
    fn send(&self, target: usize, id: ObjectId, bytes: Vec<u8>);

    /// Returns the messages delivered into this peer's queue `id` during
    /// the superstep that just ended, removing them. Called once per
    /// `sync` by the owning [`crate::objects::Queue`] as it refreshes its
    /// iterable view.
    fn take_delivered_messages(&self, id: ObjectId) -> Vec<Vec<u8>>;
}
