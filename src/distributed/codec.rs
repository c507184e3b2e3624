//! Partial result codec
//!
//! A worker's [`TagCount`] crosses the wire as a flat JSON object mapping each
//! tag to its count, followed by a single NUL terminator:
//!
//! ```text
//! {"Failed password":12,"Invalid user":3}\0
//! ```
//!
//! The terminator is counted in the length prefix the transport sends ahead of
//! the payload. Decoding accepts the payload with or without it.
//!
//! Decoding is strict: anything other than a flat object with unique,
//! non-empty string keys and non-negative integer values is rejected.

use crate::aggregate::TagCount;
use crate::error::{Result, TallyError};
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::fmt;

/// Terminator appended to every encoded payload
pub const TERMINATOR: u8 = 0;

impl Serialize for TagCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (tag, count) in self {
            map.serialize_entry(tag, count)?;
        }
        map.end()
    }
}

struct TagCountVisitor;

impl<'de> Visitor<'de> for TagCountVisitor {
    type Value = TagCount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a flat object of tag to non-negative integer count")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<TagCount, A::Error> {
        let mut seen = HashSet::new();
        let mut counts = TagCount::new();

        while let Some((tag, count)) = access.next_entry::<String, u64>()? {
            if tag.is_empty() {
                return Err(de::Error::custom("empty tag"));
            }
            if !seen.insert(tag.clone()) {
                return Err(de::Error::custom(format!("duplicate tag '{}'", tag)));
            }
            counts.add(tag, count).map_err(de::Error::custom)?;
        }

        Ok(counts)
    }
}

impl<'de> Deserialize<'de> for TagCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(TagCountVisitor)
    }
}

/// Encode a partial result for the wire
pub fn encode(counts: &TagCount) -> Result<Vec<u8>> {
    let mut payload = serde_json::to_vec(counts)
        .map_err(|e| TallyError::CorruptPayload(format!("failed to encode result: {}", e)))?;
    payload.push(TERMINATOR);
    Ok(payload)
}

/// Decode a partial result received from a worker
pub fn decode(payload: &[u8]) -> Result<TagCount> {
    let body = match payload.split_last() {
        Some((&TERMINATOR, body)) => body,
        _ => payload,
    };

    serde_json::from_slice(body)
        .map_err(|e| TallyError::CorruptPayload(format!("failed to decode result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TagCount {
        [("Failed password", 12), ("Invalid user", 3), ("Accepted publickey", 1)]
            .into_iter()
            .collect()
    }

    fn assert_corrupt(payload: &[u8]) {
        match decode(payload) {
            Err(TallyError::CorruptPayload(_)) => {}
            other => panic!("expected CorruptPayload for {:?}, got {:?}", payload, other),
        }
    }

    #[test]
    fn test_round_trip() {
        let counts = sample();
        let payload = encode(&counts).unwrap();
        assert_eq!(decode(&payload).unwrap(), counts);
    }

    #[test]
    fn test_encoded_form() {
        let counts: TagCount = [("B", 1), ("A", 2)].into_iter().collect();
        assert_eq!(encode(&counts).unwrap(), b"{\"A\":2,\"B\":1}\0".to_vec());
    }

    #[test]
    fn test_terminator_optional() {
        let counts = decode(b"{\"Failed password\":4}").unwrap();
        assert_eq!(counts.get("Failed password"), 4);
    }

    #[test]
    fn test_empty_object() {
        assert!(decode(b"{}\0").unwrap().is_empty());
    }

    #[test]
    fn test_order_independent() {
        let a = decode(b"{\"x\":1,\"y\":2}").unwrap();
        let b = decode(b"{\"y\":2,\"x\":1}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        assert_corrupt(b"{\"A\":1,\"A\":2}\0");
    }

    #[test]
    fn test_bad_values_rejected() {
        assert_corrupt(b"{\"A\":-1}");
        assert_corrupt(b"{\"A\":1.5}");
        assert_corrupt(b"{\"A\":\"3\"}");
        assert_corrupt(b"{\"A\":{\"B\":1}}");
        assert_corrupt(b"{\"A\":[1]}");
    }

    #[test]
    fn test_malformed_rejected() {
        assert_corrupt(b"");
        assert_corrupt(b"\0");
        assert_corrupt(b"[1,2]");
        assert_corrupt(b"{\"A\":1");
        assert_corrupt(b"{\"A\":1} trailing");
        assert_corrupt(b"{\"\":1}");
    }
}
