/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Utilities for serializing register files and engine states as base64 strings or just bytes
//! in binary serializers.
use core::fmt;
use std::borrow::Cow;

use serde::{
    Serializer, Deserialize, Deserializer,
    de::{self, Visitor}
};

pub fn serialize_blob<T, S>(blob: &T, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer,
          T: AsRef<[u8]> + ?Sized
{
    let slice = blob.as_ref();
    if serializer.is_human_readable() {
        serializer.serialize_str(&base64::encode(slice))
    }
    else {
        serializer.serialize_bytes(slice)
    }
}

pub fn deserialize_blob<'de, D>(deserializer: D) -> Result<Box<[u8]>, D::Error>
    where D: Deserializer<'de>
{
    if deserializer.is_human_readable() {
        Deserialize::deserialize(deserializer).and_then(|string: Cow<str>|
            base64::decode(&*string).map_err(de::Error::custom)
        )
        .map(Vec::into_boxed_slice)
    }
    else {
        deserializer.deserialize_byte_buf(ByteBufVisitor)
                    .map(Vec::into_boxed_slice)
    }
}

struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
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

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element()? {
            buf.push(byte);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Serialize, Deserialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(serialize_with = "super::serialize_blob", deserialize_with = "super::deserialize_blob")]
        data: Box<[u8]>,
    }

    #[test]
    fn blob_serde_works() {
        let blob = Blob { data: vec![0u8, 1, 2, 0xFE, 0xFF].into_boxed_slice() };
        let json = serde_json::to_string(&blob).unwrap();
        assert_eq!(json, r#"{"data":"AAEC/v8="}"#);
        assert_eq!(serde_json::from_str::<Blob>(&json).unwrap(), blob);
        let bin = bincode::serialize(&blob).unwrap();
        assert_eq!(bin.len(), 8 + 5);
        assert_eq!(bincode::deserialize::<Blob>(&bin).unwrap(), blob);
        assert!(serde_json::from_str::<Blob>(r#"{"data":"!!"}"#).is_err());
    }
}
