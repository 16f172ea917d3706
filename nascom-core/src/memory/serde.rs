/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory snapshots.
//!
//! Only the 64kb address space is stored: as a base64 string in human readable formats and as
//! raw bytes otherwise. The wrap-around slot is rebuilt from address `0` after loading.
use core::fmt;
use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{
    Serialize, Serializer, Deserialize, Deserializer,
    de::{self, Visitor}
};

use super::{NascomMemory, Memory64k};

/// The number of bytes in a memory snapshot.
pub const SNAPSHOT_LEN: usize = 0x10000;

#[derive(Serialize, Deserialize)]
#[serde(rename = "Memory64k")]
struct Snapshot<'a> {
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")]
    mem: Cow<'a, [u8]>
}

impl Serialize for Memory64k {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Snapshot { mem: Cow::Borrowed(self.mem_ref()) }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Memory64k {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Snapshot { mem } = Snapshot::deserialize(deserializer)?;
        if mem.len() != SNAPSHOT_LEN {
            return Err(de::Error::invalid_length(mem.len(), &"65536 bytes of memory"))
        }
        let mut memory = Memory64k::default();
        memory.mem_mut().copy_from_slice(&mem);
        memory.sync_wraparound();
        Ok(memory)
    }
}

fn serialize_bytes<S: Serializer>(bytes: &Cow<'_, [u8]>, serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
    else {
        serializer.serialize_bytes(bytes)
    }
}

fn deserialize_bytes<'de, 'a, D: Deserializer<'de>>(deserializer: D) -> Result<Cow<'a, [u8]>, D::Error> {
    let bytes = if deserializer.is_human_readable() {
        let string: Cow<str> = Deserialize::deserialize(deserializer)?;
        STANDARD.decode(&*string).map_err(de::Error::custom)?
    }
    else {
        deserializer.deserialize_byte_buf(ByteBufVisitor)?
    };
    Ok(Cow::Owned(bytes))
}

struct ByteBufVisitor;

impl Visitor<'_> for ByteBufVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a byte array")
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Vec::from(v))
    }
}
