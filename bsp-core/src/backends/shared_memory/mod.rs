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

//! Shared machinery for the `thread` and `accelerator` backends: both are
//! one-address-space implementations of the BSP model, differing only in
//! how a peer blocks at a barrier. See [`world::SharedMemoryWorld`] for the
//! `World` implementation and [`spawn_impl`] for the common spawn/join/
//! abort-translation logic both backend modules call into.

pub mod barrier;
pub(crate) mod state;
pub(crate) mod world;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

pub use world::SharedMemoryWorld;

pub(crate) use barrier::SyncPrimitive;
pub(crate) use state::WorldState;

use crate::environment::LogSink;
use crate::error::{AbortSignal, BspError, ProtocolViolationSignal, Result};

/// Spawns one OS thread per processor, runs `f` against that peer's world,
/// and joins every thread before returning. `catch_unwind` distinguishes a
/// deliberate [`AbortSignal`] unwind (from `World::abort`) from a genuine
/// panic in the SPMD closure, per `World::abort`'s contract: every peer's
/// `spawn` call sees the same `BspError::Abort`, never a raw panic.
pub(crate) fn spawn_impl<B, F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
where
    B: SyncPrimitive + 'static,
    F: Fn(&SharedMemoryWorld<B>) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    if processors == 0 {
        return Err(BspError::Configuration(
            "processors must be at least 1".to_string(),
        ));
    }

    tracing::debug!(processors, "spawning shared-memory worker group");
    let state = Arc::new(WorldState::<B>::new(processors, log_sink));
    let f = Arc::new(f);

    let handles: Vec<_> = (0..processors)
        .map(|rank| {
            let state = Arc::clone(&state);
            let f = Arc::clone(&f);
            thread::Builder::new()
                .name(format!("bsp-worker-{rank}"))
                .spawn(move || {
                    let world = SharedMemoryWorld::new(rank, state);
                    panic::catch_unwind(AssertUnwindSafe(|| f(&world)))
                })
                .expect("failed to spawn a BSP worker thread")
        })
        .collect();

    let mut results = Vec::with_capacity(processors);
    let mut abort: Option<AbortSignal> = None;
    for (rank, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(payload)) => {
                if let Some(signal) = downcast_abort(&payload) {
                    abort.get_or_insert(signal);
                } else if let Some(violation) = downcast_protocol_violation(&payload) {
                    return Err(BspError::ProtocolViolation(format!(
                        "peer {rank}: {}",
                        violation.0
                    )));
                } else {
                    return Err(BspError::Transport(format!(
                        "peer {rank} panicked: {}",
                        panic_message(&payload)
                    )));
                }
            }
            Err(join_err) => {
                return Err(BspError::Transport(format!(
                    "peer {rank}'s worker thread could not be joined: {}",
                    panic_message(&join_err)
                )));
            }
        };
    }

    tracing::debug!(processors, "worker group finished");
    match abort {
        Some(signal) => Err(BspError::Abort {
            rank: signal.rank,
            reason: signal.reason,
        }),
        None => Ok(results),
    }
}

fn downcast_abort(payload: &Box<dyn Any + Send>) -> Option<AbortSignal> {
    payload.downcast_ref::<AbortSignal>().cloned()
}

fn downcast_protocol_violation(payload: &Box<dyn Any + Send>) -> Option<ProtocolViolationSignal> {
    payload.downcast_ref::<ProtocolViolationSignal>().cloned()
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
