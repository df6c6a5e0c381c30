//! Value codecs.
//!
//! The store itself only moves bytes. A [`Codec`] turns a caller's value
//! into bytes before [`Group::put`] and back after [`Handle::dump`];
//! [`Group::put_value`] and [`Handle::load`] wire the two together.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PoolError, Result};
use crate::group::Group;
use crate::handle::Handle;

/// Converts values of type `T` to and from their stored byte form.
pub trait Codec<T> {
    /// Serialize `value`.
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Rebuild a value from bytes produced by [`encode`](Self::encode).
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Identity codec for raw byte buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// `bincode` codec for any serde type.
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create a codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BincodeCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| PoolError::Codec {
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| PoolError::Codec {
            reason: e.to_string(),
        })
    }
}

impl Group {
    /// Encode `value` with `codec` and store it.
    pub fn put_value<T, C: Codec<T>>(&self, codec: &C, value: &T) -> Result<Handle> {
        let bytes = codec.encode(value)?;
        self.put(&bytes)
    }
}

impl Handle {
    /// Dump the stored bytes and decode them with `codec`.
    ///
    /// The lease is released before returning.
    pub fn load<T, C: Codec<T>>(&self, codec: &C) -> Result<T> {
        let lease = self.dump()?;
        codec.decode(&lease)
    }
}
