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

//! Message-passing backend: peers are OS threads standing in for separate
//! processes on separate nodes, each with private memory. All
//! communication — puts, gets, queue sends, even log lines bound for rank
//! 0 — crosses an `mpsc::channel` as an encoded [`wire::WireMessage`],
//! never a shared pointer. Grounded in `backends/mpi/world.hpp`.

mod wire;
mod world;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use crate::environment::LogSink;
use crate::error::{AbortSignal, BspError, ProtocolViolationSignal, Result};

use world::MpShared;

pub use world::MessagePassingWorld;

/// The simulated group size this backend reports as its hardware ceiling.
/// A real network backend would read this from a job scheduler or
/// hostfile; we fix it since there is no cluster attached.
const SIMULATED_GROUP_SIZE: usize = 8;

pub fn spawn<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
where
    F: Fn(&MessagePassingWorld) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    if processors == 0 {
        return Err(BspError::Configuration("processors must be at least 1".to_string()));
    }

    tracing::debug!(processors, "spawning message-passing worker group");
    let shared = Arc::new(MpShared::new(processors));
    let log_sink = Arc::new(log_sink);
    let f = Arc::new(f);

    let (senders, receivers): (Vec<_>, Vec<_>) = (0..processors).map(|_| mpsc::channel::<Vec<u8>>()).unzip();

    let handles: Vec<_> = receivers
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| {
            let shared = Arc::clone(&shared);
            let outboxes = senders.clone();
            let log_sink = Arc::clone(&log_sink);
            let f = Arc::clone(&f);
            thread::Builder::new()
                .name(format!("bsp-mp-worker-{rank}"))
                .spawn(move || {
                    let world = MessagePassingWorld::new(rank, processors, shared, outboxes, inbox, log_sink);
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

pub fn available_processors() -> usize {
    SIMULATED_GROUP_SIZE
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
