//  Copyright 2026 spillover Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::{
    fmt::Debug,
    hash::Hash,
    io::{Read, Write},
};

/// Key bound of the cache.
///
/// Keys must be comparable the same way the memory tier's map compares them.
pub trait Key: Hash + Eq + Clone + Debug + Send + Sync + 'static {}
impl<T: Hash + Eq + Clone + Debug + Send + Sync + 'static> Key for T {}

/// Value bound of the cache.
pub trait Value: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Value for T {}

/// Value bound of the cache when values can overflow to disk.
pub trait StorageValue: Value + Code {}
impl<T: Value + Code> StorageValue for T {}

/// Error raised by [`Code`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// Std I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The decoder returned before consuming the whole input.
    #[error("{0} trailing bytes left after decoding")]
    TrailingBytes(usize),
    /// Other coding error, raised by customized implementations or the serde backend.
    #[error("coding error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl CodeError {
    /// Wrap a customized coding error.
    pub fn other<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Other(e.into())
    }
}

#[cfg(feature = "serde")]
impl From<bincode::Error> for CodeError {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(e) => Self::Io(e),
            kind => Self::Other(Box::new(kind)),
        }
    }
}

/// Serialization collaborator of the disk tier.
///
/// The bytes produced by `encode` are exactly what lands in a persisted entry file. `decode` must never allocate
/// more than the reader can supply: entry files may be truncated or corrupt, and a bogus length prefix has to fail
/// the decode instead of the process.
///
/// With the `serde` feature enabled, `Code` is implemented for every `Serialize + DeserializeOwned` type with
/// `bincode`.
pub trait Code {
    /// Encode the object into a writer.
    fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError>;

    /// Decode the object from a reader.
    fn decode(reader: &mut impl Read) -> Result<Self, CodeError>
    where
        Self: Sized;

    /// Estimated encoded size, used to pre-allocate the encode buffer.
    fn estimated_size(&self) -> usize;
}

/// Same layout as `bincode::serialize`: fixed-width integers and length prefixes.
#[cfg(feature = "serde")]
fn bincode_options() -> impl bincode::Options {
    use bincode::Options;

    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// The serde implementation reads the reader to its end. Bytes left after the value are a
/// [`CodeError::TrailingBytes`] error.
#[cfg(feature = "serde")]
impl<T> Code for T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError> {
        use bincode::Options;

        bincode_options().serialize_into(writer, self).map_err(CodeError::from)
    }

    fn decode(reader: &mut impl Read) -> Result<Self, CodeError> {
        use bincode::Options;

        let mut buf = vec![];
        reader.read_to_end(&mut buf)?;

        // The limit makes bincode reject a length prefix beyond the input before it allocates for it.
        let mut slice = buf.as_slice();
        let value = bincode_options()
            .with_limit(buf.len() as u64)
            .deserialize_from(&mut slice)
            .map_err(CodeError::from)?;
        if !slice.is_empty() {
            return Err(CodeError::TrailingBytes(slice.len()));
        }
        Ok(value)
    }

    fn estimated_size(&self) -> usize {
        use bincode::Options;

        bincode_options()
            .serialized_size(self)
            .map(|size| size as usize)
            .unwrap_or_default()
    }
}

#[cfg(not(feature = "serde"))]
macro_rules! impl_code_for_primitives {
    ($( $type:ty, )*) => {
        $(
            impl Code for $type {
                fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError> {
                    writer.write_all(&self.to_le_bytes()).map_err(CodeError::from)
                }

                fn decode(reader: &mut impl Read) -> Result<Self, CodeError> {
                    let mut buf = [0u8; std::mem::size_of::<$type>()];
                    reader.read_exact(&mut buf)?;
                    Ok(<$type>::from_le_bytes(buf))
                }

                fn estimated_size(&self) -> usize {
                    std::mem::size_of::<$type>()
                }
            }
        )*
    };
}

#[cfg(not(feature = "serde"))]
impl_code_for_primitives! {
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    f32, f64,
}

#[cfg(not(feature = "serde"))]
impl Code for bool {
    fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError> {
        (*self as u8).encode(writer)
    }

    fn decode(reader: &mut impl Read) -> Result<Self, CodeError> {
        match u8::decode(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(CodeError::other(format!("invalid bool tag: {v}"))),
        }
    }

    fn estimated_size(&self) -> usize {
        1
    }
}

#[cfg(not(feature = "serde"))]
impl Code for Vec<u8> {
    fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError> {
        (self.len() as u64).encode(writer)?;
        writer.write_all(self).map_err(CodeError::from)
    }

    fn decode(reader: &mut impl Read) -> Result<Self, CodeError> {
        let len = u64::decode(reader)?;
        // Grows with the bytes actually read, never with the claimed length.
        let mut buf = vec![];
        reader.take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(buf)
    }

    fn estimated_size(&self) -> usize {
        8 + self.len()
    }
}

#[cfg(not(feature = "serde"))]
impl Code for String {
    fn encode(&self, writer: &mut impl Write) -> Result<(), CodeError> {
        (self.len() as u64).encode(writer)?;
        writer.write_all(self.as_bytes()).map_err(CodeError::from)
    }

    fn decode(reader: &mut impl Read) -> Result<Self, CodeError> {
        let bytes = Vec::<u8>::decode(reader)?;
        String::from_utf8(bytes).map_err(CodeError::other)
    }

    fn estimated_size(&self) -> usize {
        8 + self.len()
    }
}
