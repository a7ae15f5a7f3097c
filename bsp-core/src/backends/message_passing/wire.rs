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

//! The simulated network's wire format: a one-byte kind tag in `0..7`
//! followed by a `bincode`-encoded payload, per the model's native-
//! endianness, no-cross-endianness wire contract. Grounded in
//! `backends/mpi/world.hpp`'s `message_t` enum, which tags every buffer
//! crossing an MPI rank boundary the same way.
//!
//! Every message this backend exchanges — puts, get request/response
//! round trips, queue sends, and even the per-superstep log lines a
//! non-root peer hands to rank 0 — travels as one of these, never as a
//! shared pointer: unlike the `thread`/`accelerator` backends, no two
//! peers here share an address space.

use serde::{Deserialize, Serialize};

use crate::registry::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum MessageKind {
    Put = 0,
    GetRequest = 1,
    GetResponse = 2,
    QueueMessage = 3,
    LogFlush = 4,
}

impl MessageKind {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Put,
            1 => Self::GetRequest,
            2 => Self::GetResponse,
            3 => Self::QueueMessage,
            4 => Self::LogFlush,
            other => panic!("unrecognized wire message kind tag {other}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct PutWire {
    pub id: ObjectId,
    pub byte_offset: usize,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct GetRequestWire {
    pub id: ObjectId,
    pub byte_offset: usize,
    pub byte_len: usize,
    pub request_id: u64,
    pub requester: usize,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct GetResponseWire {
    pub request_id: u64,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct QueueMessageWire {
    pub id: ObjectId,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct LogFlushWire {
    pub rank: usize,
    pub lines: Vec<String>,
}

pub(crate) enum WireMessage {
    Put(PutWire),
    GetRequest(GetRequestWire),
    GetResponse(GetResponseWire),
    QueueMessage(QueueMessageWire),
    LogFlush(LogFlushWire),
}

impl WireMessage {
    pub fn encode(&self) -> Vec<u8> {
        let (kind, body) = match self {
            WireMessage::Put(w) => (MessageKind::Put, bincode::serialize(w)),
            WireMessage::GetRequest(w) => (MessageKind::GetRequest, bincode::serialize(w)),
            WireMessage::GetResponse(w) => (MessageKind::GetResponse, bincode::serialize(w)),
            WireMessage::QueueMessage(w) => (MessageKind::QueueMessage, bincode::serialize(w)),
            WireMessage::LogFlush(w) => (MessageKind::LogFlush, bincode::serialize(w)),
        };
        let body = body.expect("wire payload failed to serialize");
        let mut bytes = Vec::with_capacity(1 + body.len());
        bytes.push(kind as u8);
        bytes.extend(body);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let (tag, body) = bytes.split_first().expect("empty wire message");
        match MessageKind::from_tag(*tag) {
            MessageKind::Put => WireMessage::Put(
                bincode::deserialize(body).expect("malformed Put wire message"),
            ),
            MessageKind::GetRequest => WireMessage::GetRequest(
                bincode::deserialize(body).expect("malformed GetRequest wire message"),
            ),
            MessageKind::GetResponse => WireMessage::GetResponse(
                bincode::deserialize(body).expect("malformed GetResponse wire message"),
            ),
            MessageKind::QueueMessage => WireMessage::QueueMessage(
                bincode::deserialize(body).expect("malformed QueueMessage wire message"),
            ),
            MessageKind::LogFlush => WireMessage::LogFlush(
                bincode::deserialize(body).expect("malformed LogFlush wire message"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_round_trips_through_the_wire() {
        let original = WireMessage::Put(PutWire {
            id: 3,
            byte_offset: 4,
            payload: vec![1, 2, 3, 4],
        });
        let bytes = original.encode();
        match WireMessage::decode(&bytes) {
            WireMessage::Put(decoded) => {
                assert_eq!(decoded.id, 3);
                assert_eq!(decoded.byte_offset, 4);
                assert_eq!(decoded.payload, vec![1, 2, 3, 4]);
            }
            _ => panic!("expected a Put message"),
        }
    }

    #[test]
    fn log_flush_round_trips_through_the_wire() {
        let original = WireMessage::LogFlush(LogFlushWire {
            rank: 2,
            lines: vec!["hello".to_string(), "world".to_string()],
        });
        let bytes = original.encode();
        match WireMessage::decode(&bytes) {
            WireMessage::LogFlush(decoded) => {
                assert_eq!(decoded.rank, 2);
                assert_eq!(decoded.lines, vec!["hello", "world"]);
            }
            _ => panic!("expected a LogFlush message"),
        }
    }

    #[test]
    #[should_panic(expected = "unrecognized wire message kind tag")]
    fn unknown_tag_panics() {
        WireMessage::decode(&[9, 0, 0, 0]);
    }
}
