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

//! Accelerator-style backend: a software simulation of a manycore device's
//! barrier/mailbox substrate (no physical hardware is available to this
//! crate). Peers share one address space exactly like the `thread` backend
//! and reuse [`SharedMemoryWorld`](super::shared_memory::SharedMemoryWorld),
//! but block on a busy-polling [`SpinBarrier`] standing in for a hardware
//! spin barrier instead of parking on a condvar.

use crate::environment::LogSink;
use crate::error::Result;

use super::shared_memory::barrier::SpinBarrier;
use super::shared_memory::{spawn_impl, SharedMemoryWorld};

pub type AcceleratorWorld = SharedMemoryWorld<SpinBarrier>;

/// The simulated core grid size. A real accelerator backend would read this
/// from the device; we fix it since no hardware is attached.
const SIMULATED_CORE_COUNT: usize = 16;

pub fn spawn<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
where
    F: Fn(&AcceleratorWorld) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    spawn_impl(processors, log_sink, f)
}

/// The number of cores the simulated device exposes.
pub fn available_processors() -> usize {
    SIMULATED_CORE_COUNT
}
