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

//! A distributed FIFO message queue (`spec.md` §4.5 `queue<M>`). Registered
//! collectively like [`crate::objects::Var`]; sends are buffered and
//! delivered at the next `sync`, after which the receiving end's inbox is
//! visible for exactly one superstep.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::registry::ObjectId;
use crate::world::World;

use super::codec::{decode, encode};

/// A registered message queue. `M` stands in for `spec.md`'s variadic
/// template element list: any `Serialize + DeserializeOwned` payload works,
/// including tuples, which cover the "several payload fields per message"
/// case via serde's built-in tuple support, per the "Pattern: variadic
/// message queues" design note.
pub struct Queue<'w, W: World, M> {
    world: &'w W,
    id: ObjectId,
    _marker: PhantomData<M>,
}

impl<'w, W: World, M> Queue<'w, W, M>
where
    M: Serialize + DeserializeOwned,
{
    /// Registers a new queue, collectively (see [`crate::objects::Var::new`]
    /// for the collective registration/barrier pattern).
    #[must_use]
    pub fn new(world: &'w W) -> Self {
        let id = world.register_queue();
        world.barrier();
        Self {
            world,
            id,
            _marker: PhantomData,
        }
    }

    /// Builds a proxy for sending to `target_rank`'s queue.
    #[must_use]
    pub fn at(&self, target_rank: usize) -> QueueProxy<'_, 'w, W, M> {
        QueueProxy {
            queue: self,
            target_rank,
        }
    }

    /// Drains and decodes this peer's inbox as of the last `sync`. Calling
    /// this more than once between two syncs returns an empty `Vec` on the
    /// second and later calls — this is a direct, one-shot drain of the
    /// backend's delivered-message buffer (see
    /// [`crate::world::World::take_delivered_messages`]'s doc comment),
    /// not a cached view, so it does not re-yield messages already taken.
    /// `spec.md` §9's Open Question on queue clear-timing is resolved this
    /// way: messages are visible for exactly one call per superstep rather
    /// than for the whole superstep regardless of how many times
    /// `messages` is called.
    #[must_use]
    pub fn messages(&self) -> Vec<M> {
        self.world
            .take_delivered_messages(self.id)
            .into_iter()
            .map(|bytes| decode(&bytes))
            .collect()
    }
}

impl<'w, W: World, M> std::fmt::Debug for Queue<'w, W, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<'w, W: World, M> Drop for Queue<'w, W, M> {
    fn drop(&mut self) {
        self.world.unregister_queue(self.id);
    }
}

/// A remote handle for sending to one peer's [`Queue`] inbox.
pub struct QueueProxy<'a, 'w, W: World, M> {
    queue: &'a Queue<'w, W, M>,
    target_rank: usize,
}

impl<'a, 'w, W: World, M> std::fmt::Debug for QueueProxy<'a, 'w, W, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProxy")
            .field("target_rank", &self.target_rank)
            .finish_non_exhaustive()
    }
}

impl<'a, 'w, W: World, M> QueueProxy<'a, 'w, W, M>
where
    M: Serialize + DeserializeOwned,
{
    /// Buffers `message` for delivery to the target's inbox at the next
    /// `sync`.
    pub fn send(&self, message: M) {
        let bytes = encode(&message);
        self.queue.world.send(self.target_rank, self.queue.id, bytes);
    }
}
