//! Deterministic binary serializer
//!
//! The wire format is MessagePack compatible. Maps keep insertion order and
//! integers always take their smallest encoding, so encoding the same value
//! twice produces identical bytes; package content hashes depend on that.
//!
//! Two layers are exposed:
//! - [`encode`] / [`decode`] work on the dynamic [`Value`] tree
//! - [`to_bytes`] / [`from_bytes`] go through serde for typed structs, with
//!   fields written in declaration order

pub mod bytes;
mod de;
mod decode;
mod encode;
mod options;
mod ser;
mod value;

pub use decode::decode_with;
pub use encode::encode_with;
pub use options::{ArrayMapMode, BigIntMode, DecodeOptions, EncodeOptions, FloatMode, StrBinMode};
pub use value::Value;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Extension tag carrying integers wider than 64 bits
pub const BIGINT_EXT: i8 = 1;

/// Encode a value with default options
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with(value, &EncodeOptions::default())
}

/// Decode a value with default options
pub fn decode(bytes: &[u8]) -> Result<Value> {
    decode_with(bytes, &DecodeOptions::default())
}

/// Convert any serializable type into a [`Value`]
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ser::ValueSerializer)
}

/// Build a typed value back out of a [`Value`]
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(value)
}

pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    encode(&to_value(value)?)
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    from_value(decode(bytes)?)
}
