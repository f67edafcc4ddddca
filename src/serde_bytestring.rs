//! Serde helpers that store fixed-size binary values as base64 strings.
//!
//! Use as `#[serde(with = "crate::serde_bytestring")]` on any field whose type
//! implements [`Serializable`].

use serde::de::{Error, Unexpected};
use serde::{Deserialize, Deserializer, Serializer};

/// A value with a canonical byte encoding.
pub trait Serializable {
    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Option<Self>
    where
        Self: Sized;
}

impl<const N: usize> Serializable for [u8; N] {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok()
    }
}

pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serializable,
    S: Serializer,
{
    serializer.serialize_str(&base64::encode(value.to_bytes()))
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Serializable,
    D: Deserializer<'de>,
{
    let string = String::deserialize(deserializer)?;
    let bytes = base64::decode(&string)
        .map_err(|_| D::Error::invalid_value(Unexpected::Str(&string), &"a base64 string"))?;
    T::from_bytes(&bytes)
        .ok_or_else(|| D::Error::invalid_length(bytes.len(), &"a correctly sized byte string"))
}
