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

//! Group-wide table mapping a symbolic identifier to a per-peer payload.
//!
//! Grounded in `backends/thread/world.hpp`'s `register_location_` /
//! `unregister_location_`: ids are assigned by scanning for the first
//! vacant `rank`-th slot, growing the table by `active_processors` entries
//! when none is found. Because registration is collective and every peer
//! calls it at the same point in program order, all peers agree on the id
//! without any cross-peer coordination beyond the lock that guards the grow
//! step.

use std::sync::Mutex;

/// An identifier handed out by [`Registry::register`]. Stable for the
/// lifetime of the registration; may be reused by a later `register` once
/// [`Registry::unregister`] has vacated every peer's slot at that id.
pub type ObjectId = usize;

/// Group-wide registry of per-peer payloads, indexed by `(id, rank)` as
/// `id + rank` into a flat, `active_processors`-strided table.
pub struct Registry<P> {
    active_processors: usize,
    slots: Mutex<Vec<Option<P>>>,
}

impl<P> Registry<P> {
    pub fn new(active_processors: usize) -> Self {
        assert!(active_processors > 0, "a registry needs at least one peer");
        Self {
            active_processors,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Registers `payload` for `rank` at the id determined by the current
    /// occupancy of this peer's column. Collective: every peer must call
    /// this at the same logical point, in the same order, for the ids to
    /// line up — callers are expected to follow that with a barrier.
    pub fn register(&self, rank: usize, payload: P) -> ObjectId {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        let stride = self.active_processors;

        let mut id = None;
        let mut i = 0;
        while i < slots.len() {
            if slots[i + rank].is_none() {
                id = Some(i);
                break;
            }
            i += stride;
        }

        let id = id.unwrap_or_else(|| {
            let base = slots.len();
            slots.resize_with(base + stride, || None);
            base
        });

        slots[id + rank] = Some(payload);
        id
    }

    /// Vacates this peer's slot at `id`. Non-collective: each peer clears a
    /// distinct index, so no coordination with other peers is needed beyond
    /// the lock already held for any concurrent `register` grow step.
    pub fn unregister(&self, id: ObjectId, rank: usize) -> Option<P> {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        slots[id + rank].take()
    }

    /// Runs `f` against the registered payload for `(id, rank)`, panicking
    /// with a clear message if the slot is vacant (a `ProtocolViolation` in
    /// the making: a peer referenced an id nobody registered there).
    pub fn with<R>(&self, id: ObjectId, rank: usize, f: impl FnOnce(&P) -> R) -> Option<R> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        slots.get(id + rank).and_then(|slot| slot.as_ref()).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collective_registration_assigns_matching_ids() {
        let registry: Registry<u32> = Registry::new(3);
        let id_p0 = registry.register(0, 10);
        let id_p1 = registry.register(1, 20);
        let id_p2 = registry.register(2, 30);
        assert_eq!(id_p0, id_p1);
        assert_eq!(id_p1, id_p2);
    }

    #[test]
    fn second_registration_grows_table() {
        let registry: Registry<u32> = Registry::new(2);
        let first = registry.register(0, 1);
        registry.register(1, 1);
        let second = registry.register(0, 2);
        registry.register(1, 2);
        assert_ne!(first, second);
    }

    #[test]
    fn unregister_then_register_reclaims_slot() {
        let registry: Registry<u32> = Registry::new(2);
        let id = registry.register(0, 1);
        registry.register(1, 1);
        registry.unregister(id, 0);
        registry.unregister(id, 1);
        let reused = registry.register(0, 99);
        registry.register(1, 99);
        assert_eq!(id, reused);
    }

    #[test]
    fn lookup_returns_payload_for_rank() {
        let registry: Registry<u32> = Registry::new(2);
        let id = registry.register(0, 42);
        registry.register(1, 7);
        assert_eq!(registry.with(id, 0, |p| *p), Some(42));
        assert_eq!(registry.with(id, 1, |p| *p), Some(7));
    }
}
