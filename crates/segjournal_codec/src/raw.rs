//! Identity codec for opaque byte payloads.

use crate::error::CodecResult;
use crate::EntryCodec;

/// Stores entries exactly as given.
///
/// Use this when the consumer already owns its own serialization and hands
/// the journal finished byte buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCodec;

impl EntryCodec for RawCodec {
    type Entry = Vec<u8>;

    fn encode(&self, entry: &Vec<u8>, buf: &mut Vec<u8>) -> CodecResult<()> {
        buf.extend_from_slice(entry);
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}
