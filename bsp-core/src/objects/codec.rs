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

//! Byte encoding shared by every distributed object. Grounded in the
//! `message_passing` backend's wire codec (`backends/message_passing/wire.rs`):
//! `bincode`'s native-endianness, fixed-width encoding for the element types
//! these objects carry (numeric types, fixed-size arrays/structs of them,
//! tuples — exactly the "variadic template queue" element shapes `spec.md`
//! §4.5/§9 describes). The `World` trait only ever sees byte slices; this is
//! the one place a `T` becomes bytes or bytes become a `T`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::protocol_violation;

pub(crate) fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).unwrap_or_else(|err| protocol_violation(format!("failed to encode value: {err}")))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> T {
    bincode::deserialize(bytes).unwrap_or_else(|err| protocol_violation(format!("failed to decode value: {err}")))
}
