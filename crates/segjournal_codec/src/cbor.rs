//! CBOR codec for any serde type.

use crate::error::{CodecError, CodecResult};
use crate::EntryCodec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Encodes entries as CBOR through serde.
///
/// ```
/// use segjournal_codec::{CborCodec, EntryCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Vote { term: u64, candidate: String }
///
/// let codec = CborCodec::<Vote>::new();
/// let vote = Vote { term: 3, candidate: "node-2".into() };
///
/// let mut buf = Vec::new();
/// codec.encode(&vote, &mut buf).unwrap();
/// assert_eq!(codec.decode(&buf).unwrap(), vote);
/// ```
pub struct CborCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborCodec<T> {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CborCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CborCodec")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> EntryCodec for CborCodec<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Entry = T;

    fn encode(&self, entry: &T, buf: &mut Vec<u8>) -> CodecResult<()> {
        ciborium::into_writer(entry, buf).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<T> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}
