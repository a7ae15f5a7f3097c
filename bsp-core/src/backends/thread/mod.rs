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

//! Thread/shared-memory backend: peers are OS threads in one process,
//! sharing one address space, so `put`/`get` resolve as direct memory
//! copies through [`SharedMemoryWorld`](super::shared_memory::SharedMemoryWorld)
//! rather than serialized messages. Grounded in `backends/thread/world.hpp`.

use std::thread::available_parallelism;

use crate::environment::LogSink;
use crate::error::Result;

use super::shared_memory::barrier::CondvarBarrier;
use super::shared_memory::{spawn_impl, SharedMemoryWorld};

/// The concrete `World` this backend hands to the SPMD closure.
pub type ThreadWorld = SharedMemoryWorld<CondvarBarrier>;

/// Runs `f` once per processor on its own OS thread, returning each peer's
/// result in rank order. See [`crate::environment`] for the shared
/// `ConfigurationError`/`AbortError` contract every backend's `spawn`
/// follows.
pub fn spawn<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
where
    F: Fn(&ThreadWorld) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    spawn_impl(processors, log_sink, f)
}

/// The number of processors this backend can host, taken from the OS's
/// report of available hardware parallelism (falling back to 1 if the
/// platform can't answer).
pub fn available_processors() -> usize {
    available_parallelism().map(|n| n.get()).unwrap_or(1)
}
