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

//! A distributed array with one local segment per peer (`spec.md` §4.5
//! `coarray<T>`). The uniform-element-size byte model from `crate::world`
//! gives each index a fixed stride, so a range put/get is just a run of
//! contiguous bytes rather than a loop of single-element operations.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::registry::ObjectId;
use crate::world::World;

use super::codec::{decode, encode};
use super::Future;

/// A registered, per-peer segment of a distributed array. `T` must be
/// `Default` so an empty local segment (`local_len == 0`) can still fix an
/// element size without ever encoding a real element — `spec.md` §7 calls
/// out the zero-length range put as a boundary case, not an error.
pub struct Coarray<'w, W: World, T> {
    world: &'w W,
    id: ObjectId,
    local_len: usize,
    elem_size: usize,
    _marker: PhantomData<T>,
}

impl<'w, W: World, T> Coarray<'w, W, T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Registers a coarray whose local segment holds `local_values`,
    /// collectively (see [`crate::objects::Var::new`] for the collective
    /// registration/barrier pattern this also follows). Peers may pass
    /// segments of different lengths; the element size is fixed by `T` and
    /// must be uniform across peers.
    #[must_use]
    pub fn new(world: &'w W, local_values: Vec<T>) -> Self {
        let elem_size = encode(&T::default()).len();
        let local_len = local_values.len();
        let byte_len = elem_size * local_len;
        let id = world.register_variable(byte_len);
        world.barrier();
        let base = world.local_variable_bytes(id);
        for (index, value) in local_values.iter().enumerate() {
            let bytes = encode(value);
            assert_eq!(bytes.len(), elem_size, "Coarray<T>: T's encoded size is not uniform");
            // SAFETY: every peer has just crossed the barrier above, so no
            // remote put/get against this id is in flight yet; `index` is
            // in bounds of the `byte_len`-sized slot this id owns.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(index * elem_size), elem_size);
            }
        }
        Self {
            world,
            id,
            local_len,
            elem_size,
            _marker: PhantomData,
        }
    }

    /// The number of elements in this peer's local segment.
    #[must_use]
    pub fn local_len(&self) -> usize {
        self.local_len
    }

    /// Reads the element at local `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.local_len()`.
    #[must_use]
    pub fn get_local(&self, index: usize) -> T {
        assert!(index < self.local_len, "Coarray<T>::get_local: index out of bounds");
        let ptr = self.world.local_variable_bytes(self.id);
        // SAFETY: `index` checked above; `ptr` is this peer's own slot.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.add(index * self.elem_size), self.elem_size) };
        decode(bytes)
    }

    /// Overwrites the element at local `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.local_len()`.
    pub fn set_local(&self, index: usize, value: T) {
        assert!(index < self.local_len, "Coarray<T>::set_local: index out of bounds");
        let bytes = encode(&value);
        assert_eq!(bytes.len(), self.elem_size, "Coarray<T>::set_local: T's encoded size changed");
        let ptr = self.world.local_variable_bytes(self.id);
        // SAFETY: `index` checked above; `ptr` is this peer's own slot.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(index * self.elem_size), self.elem_size);
        }
    }

    /// Iterates this peer's local segment by value.
    pub fn iter_local(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.local_len).map(move |index| self.get_local(index))
    }

    /// Builds a proxy for remote access to `target_rank`'s segment.
    #[must_use]
    pub fn at(&self, target_rank: usize) -> CoarrayProxy<'_, 'w, W, T> {
        CoarrayProxy {
            coarray: self,
            target_rank,
        }
    }
}

impl<'w, W: World, T> std::fmt::Debug for Coarray<'w, W, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coarray")
            .field("id", &self.id)
            .field("local_len", &self.local_len)
            .finish_non_exhaustive()
    }
}

impl<'w, W: World, T> Drop for Coarray<'w, W, T> {
    fn drop(&mut self) {
        self.world.unregister_variable(self.id);
    }
}

/// A remote handle to one peer's segment of a [`Coarray`].
pub struct CoarrayProxy<'a, 'w, W: World, T> {
    coarray: &'a Coarray<'w, W, T>,
    target_rank: usize,
}

impl<'a, 'w, W: World, T> std::fmt::Debug for CoarrayProxy<'a, 'w, W, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoarrayProxy")
            .field("target_rank", &self.target_rank)
            .finish_non_exhaustive()
    }
}

impl<'a, 'w, W: World, T> CoarrayProxy<'a, 'w, W, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Buffers a write of `value` to element `index` of the target's
    /// segment. Takes effect at the next `sync`.
    pub fn put(&self, index: usize, value: T) {
        let bytes = encode(&value);
        let offset = index * self.coarray.elem_size;
        self.coarray.world.put(self.target_rank, self.coarray.id, offset, &bytes);
    }

    /// Buffers a read of element `index` of the target's segment. The
    /// returned future resolves at the next `sync`.
    #[must_use]
    pub fn get(&self, index: usize) -> Future<T> {
        let offset = index * self.coarray.elem_size;
        let handle = self
            .coarray
            .world
            .get(self.target_rank, self.coarray.id, offset, self.coarray.elem_size);
        Future::new(handle)
    }

    /// Buffers a write of `values` starting at local index `start` of the
    /// target's segment — `spec.md` §8's "coarray range put" scenario
    /// (`xs(rank)[{a, b}] = span`). An empty `values` is a no-op: no data
    /// motion, no error, per `spec.md` §7.
    pub fn put_range(&self, start: usize, values: &[T]) {
        if values.is_empty() {
            return;
        }
        let mut bytes = Vec::with_capacity(values.len() * self.coarray.elem_size);
        for value in values {
            let encoded = encode(value);
            assert_eq!(encoded.len(), self.coarray.elem_size, "Coarray<T>::put_range: T's encoded size changed");
            bytes.extend_from_slice(&encoded);
        }
        let offset = start * self.coarray.elem_size;
        self.coarray.world.put(self.target_rank, self.coarray.id, offset, &bytes);
    }
}
