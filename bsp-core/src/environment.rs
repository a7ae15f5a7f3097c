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

//! The spawning facade (`spec.md` §4.1): starts the SPMD group of P
//! processors, hands each peer a [`crate::world::World`], joins all peers,
//! and drains/emits their buffered logs. `spec.md` describes one
//! `Environment` abstractly; this crate ships three concrete backends
//! (`crate::backends::{thread, message_passing, accelerator}`), each with
//! its own `World` type, so [`Environment<B>`] is generic over a zero-sized
//! [`Backend`] marker rather than over a single dispatch enum — the "one
//! abstract contract, several substrates" design note from `spec.md` §9,
//! applied at the type level so backend selection costs nothing at runtime
//! and every peer closure stays statically typed against its `World`.

use std::marker::PhantomData;

use crate::backends::{accelerator, message_passing, thread};
use crate::error::Result;
use crate::world::World;

/// Where [`World::log`] lines go once a `sync` drains them. The default
/// (used when a caller never calls [`Environment::set_log_callback`]) is
/// [`LogSink::Stdout`], per `spec.md` §4.1 ("when unset, logs are written
/// to standard output").
pub enum LogSink {
    Stdout,
    Callback(Box<dyn Fn(usize, &str) + Send + Sync>),
}

impl LogSink {
    pub(crate) fn emit(&self, rank: usize, text: &str) {
        match self {
            LogSink::Stdout => println!("[{rank}] {text}"),
            LogSink::Callback(callback) => callback(rank, text),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        LogSink::Stdout
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSink::Stdout => f.write_str("LogSink::Stdout"),
            LogSink::Callback(_) => f.write_str("LogSink::Callback(..)"),
        }
    }
}

/// One execution substrate. Sealed to this crate's three backends — adding
/// a fourth substrate is a crate-internal change, not something downstream
/// code does by implementing a public trait.
pub trait Backend: private::Sealed {
    /// The concrete `World` this backend hands to the SPMD closure.
    type World: World;

    /// See `spec.md` §4.1: hardware-derived for shared-memory backends,
    /// fixed for fixed-topology backends.
    fn available_processors() -> usize;

    #[doc(hidden)]
    fn spawn_impl<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
    where
        F: Fn(&Self::World) -> T + Send + Sync + 'static,
        T: Send + 'static;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Thread {}
    impl Sealed for super::MessagePassing {}
    impl Sealed for super::Accelerator {}
}

/// Selects [`crate::backends::thread`]: peers are OS threads sharing one
/// address space.
#[derive(Debug, Clone, Copy)]
pub struct Thread;

impl Backend for Thread {
    type World = thread::ThreadWorld;

    fn available_processors() -> usize {
        thread::available_processors()
    }

    fn spawn_impl<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
    where
        F: Fn(&Self::World) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        thread::spawn(processors, log_sink, f)
    }
}

/// Selects [`crate::backends::message_passing`]: peers have private memory
/// and communicate only by encoded byte messages.
#[derive(Debug, Clone, Copy)]
pub struct MessagePassing;

impl Backend for MessagePassing {
    type World = message_passing::MessagePassingWorld;

    fn available_processors() -> usize {
        message_passing::available_processors()
    }

    fn spawn_impl<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
    where
        F: Fn(&Self::World) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        message_passing::spawn(processors, log_sink, f)
    }
}

/// Selects [`crate::backends::accelerator`]: a software simulation of a
/// manycore device's spin-barrier/mailbox substrate.
#[derive(Debug, Clone, Copy)]
pub struct Accelerator;

impl Backend for Accelerator {
    type World = accelerator::AcceleratorWorld;

    fn available_processors() -> usize {
        accelerator::available_processors()
    }

    fn spawn_impl<F, T>(processors: usize, log_sink: LogSink, f: F) -> Result<Vec<T>>
    where
        F: Fn(&Self::World) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        accelerator::spawn(processors, log_sink, f)
    }
}

/// Builder for one SPMD run on backend `B`. `spec.md` §4.1's `spawn`,
/// `available_processors`, and `set_log_callback` as a small fluent API:
///
/// ```ignore
/// let sums = Environment::<Thread>::new()
///     .set_log_callback(|rank, line| eprintln!("peer {rank}: {line}"))
///     .spawn(4, |world| world.rank())?;
/// ```
pub struct Environment<B: Backend> {
    log_sink: LogSink,
    _backend: PhantomData<B>,
}

impl<B: Backend> std::fmt::Debug for Environment<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").field("log_sink", &self.log_sink).finish()
    }
}

impl<B: Backend> Default for Environment<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Environment<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_sink: LogSink::default(),
            _backend: PhantomData,
        }
    }

    /// Installs a per-message log sink; overrides the standard-output
    /// default. Non-collective with respect to `spawn` — set once, before
    /// spawning.
    #[must_use]
    pub fn set_log_callback(mut self, callback: impl Fn(usize, &str) + Send + Sync + 'static) -> Self {
        self.log_sink = LogSink::Callback(Box::new(callback));
        self
    }

    /// The implementation-defined maximum processor count for this
    /// backend.
    #[must_use]
    pub fn available_processors(&self) -> usize {
        B::available_processors()
    }

    /// Runs `f(world)` on `processors` peers concurrently, joining on
    /// return. Fails with [`crate::error::BspError::Configuration`] if
    /// `processors` is zero or exceeds [`Environment::available_processors`].
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`crate::error::BspError`] reported by any
    /// peer: a configuration error, a protocol violation, a transport
    /// fault, or an explicit `abort`.
    pub fn spawn<F, T>(self, processors: usize, f: F) -> Result<Vec<T>>
    where
        F: Fn(&B::World) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        let available = B::available_processors();
        if processors > available {
            return Err(crate::error::BspError::Configuration(format!(
                "requested {processors} processors but this backend only has {available} available"
            )));
        }
        B::spawn_impl(processors, self.log_sink, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_on_zero_processors() {
        let result = Environment::<Thread>::new().spawn(0, |world| world.rank());
        assert!(matches!(result, Err(crate::error::BspError::Configuration(_))));
    }

    #[test]
    fn configuration_error_when_processors_exceeds_available() {
        let available = Environment::<Thread>::new().available_processors();
        let result = Environment::<Thread>::new().spawn(available + 1, |world| world.rank());
        assert!(matches!(result, Err(crate::error::BspError::Configuration(_))));
    }

    #[test]
    fn single_processor_round_trips() {
        let result = Environment::<Thread>::new().spawn(1, |world| world.rank()).unwrap();
        assert_eq!(result, vec![0]);
    }

    #[test]
    fn log_callback_receives_rank_and_text() {
        use std::sync::{Arc, Mutex};
        let captured: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let captured_for_callback = Arc::clone(&captured);

        Environment::<Thread>::new()
            .set_log_callback(move |rank, text| {
                captured_for_callback.lock().unwrap().push((rank, text.to_string()));
            })
            .spawn(2, |world| {
                world.log(format!("hello from {}", world.rank()));
                world.sync();
            })
            .unwrap();

        let lines = captured.lock().unwrap();
        assert_eq!(lines.len(), 2);
    }
}
