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

//! End-to-end scenarios run against real spawned worker threads, one per
//! backend where the backend's topology makes the scenario meaningful.
//! Every scenario below mirrors a concrete case the runtime is expected to
//! satisfy; boundary cases (`P == 1`, zero-length range put) get their own
//! tests.

use pretty_assertions::assert_eq;
use test_case::test_case;

use bsp_core::{Coarray, Environment, MessagePassing, Queue, Thread, Var, World};

#[test_case(2; "p2")]
#[test_case(4; "p4")]
#[test_case(8; "p8")]
fn ring_put(processors: usize) {
    let results = Environment::<Thread>::new()
        .spawn(processors, move |world| {
            let a = Var::new(world, 0xFFFFusize);
            world.barrier();
            let next = world.next_rank();
            a.at(next).put(world.rank());
            world.sync();
            let expected = (world.rank() + world.active_processors() - 1) % world.active_processors();
            assert_eq!(a.value(), expected);
            a.value()
        })
        .unwrap();

    let expected: Vec<usize> = (0..processors).map(|p| (p + processors - 1) % processors).collect();
    assert_eq!(results, expected);
}

#[test]
fn get_vs_put_race_observes_pre_superstep_value() {
    let results = Environment::<Thread>::new()
        .spawn(3, |world| {
            let x = Var::new(world, 0i64);
            world.barrier();

            if world.rank() == 0 {
                x.local_set(5);
            }
            world.sync();

            match world.rank() {
                1 => {
                    x.at(0).put(18);
                    world.sync();
                    None
                }
                2 => {
                    let f = x.at(0).get();
                    world.sync();
                    Some(f.result())
                }
                _ => {
                    world.sync();
                    Some(x.value())
                }
            }
        })
        .unwrap();

    assert_eq!(results[2], Some(5));
    assert_eq!(results[0], Some(18));
}

#[test]
fn gather_all_via_coarray() {
    let processors = 4;
    let results = Environment::<Thread>::new()
        .spawn(processors, move |world| {
            let local = vec![0i64; processors];
            let xs = Coarray::new(world, local);
            world.barrier();

            let value = (world.rank() * world.rank()) as i64;
            for target in 0..world.active_processors() {
                xs.at(target).put(world.rank(), value);
            }
            world.sync();

            xs.iter_local().collect::<Vec<_>>()
        })
        .unwrap();

    let expected: Vec<i64> = (0..processors).map(|p| (p * p) as i64).collect();
    for gathered in results {
        assert_eq!(gathered, expected);
    }
}

#[test]
fn queue_round_robin_every_peer_hears_from_every_other_peer() {
    let processors = 4;
    let results = Environment::<Thread>::new()
        .spawn(processors, move |world| {
            let queue: Queue<_, usize> = Queue::new(world);
            world.barrier();

            for target in 0..world.active_processors() {
                queue.at(target).send(world.rank());
            }
            world.sync();

            let mut received = queue.messages();
            received.sort_unstable();
            received
        })
        .unwrap();

    let expected: Vec<usize> = (0..processors).collect();
    for received in results {
        assert_eq!(received, expected);
    }
}

#[test]
fn coarray_range_put() {
    let results = Environment::<Thread>::new()
        .spawn(2, |world| {
            let xs = Coarray::new(world, vec![0i32; if world.rank() == 0 { 10 } else { 0 }]);
            world.barrier();

            if world.rank() == 1 {
                xs.at(0).put_range(2, &[7, 8, 9]);
            }
            world.sync();

            xs.iter_local().collect::<Vec<_>>()
        })
        .unwrap();

    assert_eq!(results[0], vec![0, 0, 7, 8, 9, 0, 0, 0, 0, 0]);
}

#[test]
fn abort_propagates_as_fatal_error() {
    let result = Environment::<Thread>::new().spawn(4, |world| {
        world.sync();
        if world.rank() == 0 {
            world.abort("deliberate test abort".to_string());
        }
        world.sync();
    });

    match result {
        Err(bsp_core::BspError::Abort { rank, .. }) => assert_eq!(rank, 0),
        other => panic!("expected BspError::Abort, got {other:?}"),
    }
}

#[test]
fn single_processor_remote_operations_are_local_copies() {
    let result = Environment::<Thread>::new()
        .spawn(1, |world| {
            let a = Var::new(world, 1i32);
            world.barrier();
            a.at(0).put(42);
            let f = a.at(0).get();
            world.sync();
            (a.value(), f.result())
        })
        .unwrap();

    assert_eq!(result, vec![(42, 1)]);
}

#[test]
fn zero_length_coarray_range_put_is_a_no_op() {
    let results = Environment::<Thread>::new()
        .spawn(2, |world| {
            let xs = Coarray::new(world, vec![1i32, 2, 3]);
            world.barrier();

            let next = world.next_rank();
            xs.at(next).put_range(1, &[]);
            world.sync();

            xs.iter_local().collect::<Vec<_>>()
        })
        .unwrap();

    assert_eq!(results[0], vec![1, 2, 3]);
    assert_eq!(results[1], vec![1, 2, 3]);
}

#[test]
fn self_targeted_put_is_staged_not_short_circuited() {
    let results = Environment::<Thread>::new()
        .spawn(2, |world| {
            let a = Var::new(world, 1i32);
            world.barrier();
            a.at(world.rank()).put(99);
            assert_eq!(a.value(), 1, "a self-put must not apply before the next sync");
            world.sync();
            a.value()
        })
        .unwrap();

    assert_eq!(results, vec![99, 99]);
}

#[test]
fn ring_put_over_message_passing_backend() {
    let processors = 3;
    let results = Environment::<MessagePassing>::new()
        .spawn(processors, move |world| {
            let a = Var::new(world, 0xFFFFusize);
            world.barrier();
            let next = world.next_rank();
            a.at(next).put(world.rank());
            world.sync();
            a.value()
        })
        .unwrap();

    let expected: Vec<usize> = (0..processors).map(|p| (p + processors - 1) % processors).collect();
    assert_eq!(results, expected);
}
