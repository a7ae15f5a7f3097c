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

//! Typed distributed objects layered over [`crate::world::World`]'s
//! byte-level primitives: [`Var`], [`Coarray`], [`Queue`], and the
//! [`Future`] both reads resolve through. `spec.md` §4.5.

mod coarray;
mod codec;
mod future;
mod queue;
mod var;

pub use coarray::{Coarray, CoarrayProxy};
pub use future::Future;
pub use queue::{Queue, QueueProxy};
pub use var::{Var, VarProxy};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, Thread};
    use crate::world::World;

    #[test]
    fn var_put_resolves_after_sync() {
        Environment::<Thread>::new()
            .spawn(2, |world| {
                let var = Var::new(world, world.rank() as u64);
                world.barrier();
                let next = world.next_rank();
                var.at(next).put(99u64);
                world.sync();
                assert_eq!(var.value(), 99u64);
            })
            .unwrap();
    }

    #[test]
    fn var_get_future_resolves_after_sync() {
        Environment::<Thread>::new()
            .spawn(2, |world| {
                let var = Var::new(world, (world.rank() as u64) * 10);
                world.barrier();
                let next = world.next_rank();
                let future = var.at(next).get();
                assert!(future.try_result().is_none());
                world.sync();
                assert_eq!(future.result(), (next as u64) * 10);
            })
            .unwrap();
    }

    #[test]
    fn coarray_range_put_and_zero_length_put_are_both_fine() {
        Environment::<Thread>::new()
            .spawn(2, |world| {
                let local = vec![0u32, 0u32, 0u32];
                let xs = Coarray::new(world, local);
                world.barrier();
                let next = world.next_rank();
                xs.at(next).put_range(0, &[1, 2, 3]);
                xs.at(next).put_range(1, &[]);
                world.sync();
                assert_eq!(xs.iter_local().collect::<Vec<_>>(), vec![1, 2, 3]);
            })
            .unwrap();
    }

    #[test]
    fn queue_round_robin_delivers_one_message_per_sync() {
        Environment::<Thread>::new()
            .spawn(3, |world| {
                let queue: Queue<_, u64> = Queue::new(world);
                world.barrier();
                let next = world.next_rank();
                queue.at(next).send(world.rank() as u64);
                world.sync();
                let received = queue.messages();
                assert_eq!(received, vec![world.prev_rank() as u64]);
                world.sync();
                assert!(queue.messages().is_empty());
            })
            .unwrap();
    }
}
