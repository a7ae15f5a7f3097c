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

//! # bsp_core
//!
//! A Bulk-Synchronous Parallel (BSP) runtime: spawn a fixed-size group of
//! SPMD peers, let each superstep do local computation plus buffered
//! remote communication, and resolve that communication at an explicit
//! `sync` barrier. Three substrates share one abstract contract:
//!
//! - [`backends::thread`] — OS threads in one address space.
//! - [`backends::message_passing`] — independent peers wired by an
//!   in-process simulated network, communicating only via encoded byte
//!   messages.
//! - [`backends::accelerator`] — a software simulation of a manycore
//!   device's spin-barrier/mailbox substrate.
//!
//! ## Quick start
//!
//! ```
//! use bsp_core::{Environment, Thread};
//!
//! let results = Environment::<Thread>::new()
//!     .spawn(4, |world| {
//!         world.log(format!("hello from rank {}", world.rank()));
//!         world.sync();
//!         world.rank()
//!     })
//!     .unwrap();
//!
//! assert_eq!(results, vec![0, 1, 2, 3]);
//! ```
//!
//! Typed distributed objects ([`Var`], [`Coarray`], [`Queue`]) layer over
//! the [`World`] trait's byte-level `put`/`get`/`send` primitives; see
//! [`objects`] for those and the [`Future`] both reads resolve through.

pub mod backends;
pub mod deferred;
pub mod environment;
pub mod error;
pub mod logging;
pub mod objects;
pub mod registry;
pub mod world;

pub use environment::{Accelerator, Backend, Environment, LogSink, MessagePassing, Thread};
pub use error::{BspError, Result};
pub use objects::{Coarray, CoarrayProxy, Future, Queue, QueueProxy, Var, VarProxy};
pub use world::World;
