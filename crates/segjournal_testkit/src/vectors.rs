//! Byte-level format vectors.
//!
//! These vectors pin the on-disk layout of frames and descriptors and the
//! CBOR encoding of entries, so any change to either shows up as a test
//! failure rather than as unreadable journals.

use serde::{Deserialize, Serialize};

/// A format vector that can be exported as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded).
    pub input_hex: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
    /// Expected outcome if this should not decode.
    pub expected_error: Option<String>,
}

/// Encodes bytes as a hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes a hexadecimal string to bytes.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// Frame vectors: payload in, framed bytes out.
pub fn frame_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "frame_abc".into(),
            description: "Three-byte payload".into(),
            input_hex: "616263".into(),
            expected_hex: "03000000c2412435616263".into(),
            expected_error: None,
        },
        TestVector {
            id: "frame_check".into(),
            description: "CRC-32 check string".into(),
            input_hex: "313233343536373839".into(),
            expected_hex: "090000002639f4cb313233343536373839".into(),
            expected_error: None,
        },
        TestVector {
            id: "frame_zero_length".into(),
            description: "Zero length marks unwritten space".into(),
            input_hex: "0000000000000000".into(),
            expected_hex: String::new(),
            expected_error: Some("end of data".into()),
        },
        TestVector {
            id: "frame_negative_length".into(),
            description: "Negative length is never a frame".into(),
            input_hex: "ffffffff00000000616263".into(),
            expected_hex: String::new(),
            expected_error: Some("end of data".into()),
        },
        TestVector {
            id: "frame_bad_checksum".into(),
            description: "Checksum of a different payload".into(),
            input_hex: "03000000c2412435616264".into(),
            expected_hex: String::new(),
            expected_error: Some("end of data".into()),
        },
        TestVector {
            id: "frame_torn".into(),
            description: "Header promises more bytes than were written".into(),
            input_hex: "03000000c24124356162".into(),
            expected_hex: String::new(),
            expected_error: Some("end of data".into()),
        },
    ]
}

/// Descriptor vectors: `id`, `index`, `max_segment_size`, `max_entries`
/// and `updated` as little-endian u64s in, the 64-byte header out.
pub fn descriptor_vectors() -> Vec<TestVector> {
    vec![TestVector {
        id: "descriptor_first_segment".into(),
        description: "Segment 1 starting at index 1, 1 KiB, 16 entries".into(),
        input_hex: concat!(
            "0100000000000000",
            "0100000000000000",
            "0004000000000000",
            "1000000000000000",
            "0807060504030201",
        )
        .into(),
        expected_hex: concat!(
            "534a4e4c",
            "01000000",
            "0100000000000000",
            "0100000000000000",
            "00040000",
            "10000000",
            "0807060504030201",
            "00",
            "0000000000000000000000000000000000000000000000",
        )
        .into(),
        expected_error: None,
    }]
}

/// CBOR entry vectors.
pub fn cbor_entry_vectors() -> Vec<TestVector> {
    vec![
        TestVector {
            id: "cbor_u64".into(),
            description: "Unsigned integer 500".into(),
            input_hex: "f401000000000000".into(),
            expected_hex: "1901f4".into(),
            expected_error: None,
        },
        TestVector {
            id: "cbor_text".into(),
            description: "Text string \"abc\"".into(),
            input_hex: "616263".into(),
            expected_hex: "63616263".into(),
            expected_error: None,
        },
    ]
}

/// Generate all format vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        frame: frame_vectors(),
        descriptor: descriptor_vectors(),
        cbor: cbor_entry_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    frame: Vec<TestVector>,
    descriptor: Vec<TestVector>,
    cbor: Vec<TestVector>,
}
