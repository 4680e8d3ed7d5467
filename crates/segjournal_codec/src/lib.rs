//! # segjournal codec
//!
//! Entry payload codecs for segjournal.
//!
//! The journal stores opaque payloads; the consumer owns their format and
//! injects it as an [`EntryCodec`]. Two codecs ship with the crate:
//!
//! - [`RawCodec`] - payloads are already bytes, stored as-is
//! - [`CborCodec`] - any `serde` type, encoded as CBOR
//!
//! ## Usage
//!
//! ```
//! use segjournal_codec::{EntryCodec, RawCodec};
//!
//! let mut buf = Vec::new();
//! RawCodec.encode(&b"entry".to_vec(), &mut buf).unwrap();
//! assert_eq!(RawCodec.decode(&buf).unwrap(), b"entry");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod raw;

pub use cbor::CborCodec;
pub use error::{CodecError, CodecResult};
pub use raw::RawCodec;

/// Serializes and deserializes journal entry payloads.
///
/// Implementations must be deterministic: the journal checksums the encoded
/// bytes, and a replicated entry is verified by re-encoding it.
pub trait EntryCodec: Send + Sync + 'static {
    /// The in-memory entry type.
    type Entry: Clone + Send + Sync + 'static;

    /// Appends the encoded form of `entry` to `buf`.
    fn encode(&self, entry: &Self::Entry, buf: &mut Vec<u8>) -> CodecResult<()>;

    /// Decodes an entry from exactly the bytes of one payload.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Self::Entry>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn raw_codec_is_identity(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut buf = Vec::new();
            RawCodec.encode(&bytes, &mut buf).unwrap();
            prop_assert_eq!(&buf, &bytes);
            prop_assert_eq!(RawCodec.decode(&buf).unwrap(), bytes);
        }

        #[test]
        fn cbor_codec_preserves_strings(s in ".{0,64}") {
            let codec = CborCodec::<String>::new();
            let mut buf = Vec::new();
            codec.encode(&s, &mut buf).unwrap();
            prop_assert_eq!(codec.decode(&buf).unwrap(), s);
        }
    }
}
