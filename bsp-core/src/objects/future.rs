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

//! Deferred reads (`spec.md` §4.5/§9 "Pattern: futures as deferred reads").
//! The source library returns a move-only handle type from `get`; we use an
//! opaque [`GetHandle`](crate::world::GetHandle) plus a typed wrapper so
//! `result()` can deserialize on demand instead of the handle owning a
//! pre-typed payload.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::protocol_violation;
use crate::world::GetHandle;

use super::codec::decode;

/// A private, movable handle to a value that becomes available at the next
/// `sync`. Not collectively registered — `spec.md` §4.5: "Futures are not
/// collectively registered."
pub struct Future<T> {
    handle: GetHandle,
    _marker: PhantomData<T>,
}

impl<T> Future<T> {
    pub(crate) fn new(handle: GetHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Future<T> {
    /// Returns the resolved value, or `None` if the `sync` that resolves
    /// this future has not returned yet.
    #[must_use]
    pub fn try_result(&self) -> Option<T> {
        self.handle.try_peek().map(|bytes| decode(&bytes))
    }

    /// Returns the resolved value. Only valid after the `sync` that resolves
    /// this future has returned; calling it earlier is a
    /// [`crate::error::BspError::ProtocolViolation`] in the making, per the
    /// "Pattern: futures as deferred reads" design note.
    ///
    /// # Panics
    ///
    /// Panics (unwinding as a protocol violation, caught by the owning
    /// backend's `spawn`) if called before the resolving `sync` returns.
    #[must_use]
    pub fn result(&self) -> T {
        self.try_result()
            .unwrap_or_else(|| protocol_violation("Future::result called before its resolving sync returned"))
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future").finish_non_exhaustive()
    }
}
