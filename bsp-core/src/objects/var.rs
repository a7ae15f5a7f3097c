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

//! A single distributed element (`spec.md` §4.5 `var<T>`). Collectively
//! constructed, has exactly one image per peer; remote access goes through
//! [`Var::at`], per the "Pattern: overloaded indexing" design note, which
//! prefers a named `at(rank)` proxy over operator overloading.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::registry::ObjectId;
use crate::world::World;

use super::codec::{decode, encode};
use super::Future;

/// A registered, single-element distributed object. Construction is
/// collective: every peer must call `Var::new` at the same logical point,
/// with a `T` whose encoded size matches across peers (`spec.md` §3: the
/// quadruple `{local_address, receive_buffer, capacity, filled_size}` fixes
/// one capacity for the id's lifetime).
pub struct Var<'w, W: World, T> {
    world: &'w W,
    id: ObjectId,
    byte_len: usize,
    _marker: PhantomData<T>,
}

impl<'w, W: World, T> Var<'w, W, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Registers a new variable seeded with `initial`, collectively. Every
    /// peer's matching call (the k-th call to `Var::new`/`Coarray::new`/
    /// `Queue::new` on this `world`) receives the same id, per `spec.md`
    /// §4.3's collective-registration invariant; the trailing `barrier`
    /// makes that collective step visible at the call site rather than
    /// hiding it in a constructor side effect, per the "Pattern: collective
    /// construction as an implicit barrier" design note.
    #[must_use]
    pub fn new(world: &'w W, initial: T) -> Self {
        let bytes = encode(&initial);
        let byte_len = bytes.len();
        let id = world.register_variable(byte_len);
        world.barrier();
        // SAFETY: every peer has just crossed the barrier above, so no
        // put/get against this id is in flight yet anywhere in the group.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), world.local_variable_bytes(id), byte_len);
        }
        Self {
            world,
            id,
            byte_len,
            _marker: PhantomData,
        }
    }

    /// Overwrites the local image. Non-collective; visible to this peer's
    /// own subsequent reads immediately, to other peers only via a remote
    /// `put` resolved at the next `sync`.
    pub fn local_set(&self, value: T) {
        let bytes = encode(&value);
        assert_eq!(
            bytes.len(),
            self.byte_len,
            "Var<T>::local_set: T's encoded size changed across calls"
        );
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.world.local_variable_bytes(self.id), self.byte_len);
        }
    }

    /// Reads the local image.
    #[must_use]
    pub fn value(&self) -> T {
        let ptr = self.world.local_variable_bytes(self.id);
        // SAFETY: `ptr` is this peer's own registered slot, `byte_len` bytes
        // long since construction; no concurrent writer exists outside the
        // barriers `sync`/`local_set` already bracket their writes with.
        let bytes = unsafe { std::slice::from_raw_parts(ptr, self.byte_len) };
        decode(bytes)
    }

    /// Builds a proxy for remote access to this variable on `target_rank`.
    #[must_use]
    pub fn at(&self, target_rank: usize) -> VarProxy<'_, 'w, W, T> {
        VarProxy {
            var: self,
            target_rank,
        }
    }
}

impl<'w, W: World, T> std::fmt::Debug for Var<'w, W, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<'w, W: World, T> Drop for Var<'w, W, T> {
    fn drop(&mut self) {
        self.world.unregister_variable(self.id);
    }
}

/// A remote handle to one peer's image of a [`Var`]. Buffered: `put` and
/// `get` enqueue work that the next `sync` resolves, per `spec.md` §4.2.
pub struct VarProxy<'a, 'w, W: World, T> {
    var: &'a Var<'w, W, T>,
    target_rank: usize,
}

impl<'a, 'w, W: World, T> std::fmt::Debug for VarProxy<'a, 'w, W, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VarProxy")
            .field("target_rank", &self.target_rank)
            .finish_non_exhaustive()
    }
}

impl<'a, 'w, W: World, T> VarProxy<'a, 'w, W, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Buffers a write of `value` into the target's image. Takes effect at
    /// the next `sync`.
    pub fn put(&self, value: T) {
        let bytes = encode(&value);
        self.var.world.put(self.target_rank, self.var.id, 0, &bytes);
    }

    /// Buffers a read of the target's image. The returned future resolves
    /// at the next `sync`, observing the target's value as of the end of
    /// the superstep in which `get` was called.
    #[must_use]
    pub fn get(&self) -> Future<T> {
        let handle = self.var.world.get(self.target_rank, self.var.id, 0, self.var.byte_len);
        Future::new(handle)
    }
}
