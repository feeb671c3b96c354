// src/record.rs
//! Record decoder: one JSON line from the producer -> `MessageRecord`.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::DecodeError;

/// A decoded input message. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub author: String,
    pub timestamp: String,
    pub category: String,
    pub sentiment: f64,
    pub message_length: u32,
    pub message: String,
}

/// Wire shape. `message_length` may be omitted by the producer; every other
/// field is required. Unknown keys (e.g. `keyword_mentioned`) are ignored.
#[derive(Debug, Deserialize)]
struct RawRecord {
    author: String,
    timestamp: String,
    category: String,
    sentiment: f64,
    #[serde(default)]
    message_length: Option<u32>,
    message: String,
}

/// Fixed-size fingerprint of a logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey([u8; 32]);

impl MessageRecord {
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }
        let raw: RawRecord = serde_json::from_str(line)?;
        let message_length = raw
            .message_length
            .unwrap_or_else(|| raw.message.chars().count() as u32);

        Ok(Self {
            author: raw.author,
            timestamp: raw.timestamp,
            category: raw.category,
            sentiment: raw.sentiment,
            message_length,
            message: raw.message,
        })
    }

    /// Identity over author, timestamp and message text.
    pub fn identity(&self) -> DedupKey {
        let mut hasher = Sha256::new();
        for part in [&self.author, &self.timestamp, &self.message] {
            // length prefix keeps ("ab","c") distinct from ("a","bc")
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        DedupKey(hasher.finalize().into())
    }

    /// First `max_chars` characters of the message, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        self.message.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = r#"{"message":"I just found Python! It was amazing.","author":"Alice","timestamp":"2025-01-29 14:35:20","category":"tech","sentiment":0.87,"keyword_mentioned":"Python","message_length":38}"#;

    #[test]
    fn decodes_producer_line_and_ignores_extra_keys() {
        let r = MessageRecord::decode(ALICE).unwrap();
        assert_eq!(r.author, "Alice");
        assert_eq!(r.category, "tech");
        assert_eq!(r.message_length, 38);
        assert!((r.sentiment - 0.87).abs() < 1e-12);
    }

    #[test]
    fn missing_length_is_derived_from_message() {
        let line = r#"{"message":"héllo","author":"A","timestamp":"t","category":"c","sentiment":0.5}"#;
        let r = MessageRecord::decode(line).unwrap();
        assert_eq!(r.message_length, 5);
    }

    #[test]
    fn rejects_missing_required_field() {
        let line = r#"{"message":"hi","timestamp":"t","category":"c","sentiment":0.5}"#;
        let err = MessageRecord::decode(line).unwrap_err();
        assert!(err.to_string().contains("author"), "{err}");
    }

    #[test]
    fn rejects_wrong_types_and_negative_length() {
        let wrong = r#"{"message":"hi","author":"A","timestamp":"t","category":"c","sentiment":"high"}"#;
        assert!(matches!(
            MessageRecord::decode(wrong),
            Err(DecodeError::Json(_))
        ));
        let negative = r#"{"message":"hi","author":"A","timestamp":"t","category":"c","sentiment":0.5,"message_length":-3}"#;
        assert!(MessageRecord::decode(negative).is_err());
    }

    #[test]
    fn rejects_blank_and_garbage() {
        assert!(matches!(MessageRecord::decode("   "), Err(DecodeError::Empty)));
        assert!(MessageRecord::decode("{not json").is_err());
    }

    #[test]
    fn identity_ignores_category_and_scores() {
        let a = MessageRecord::decode(ALICE).unwrap();
        let mut b = a.clone();
        b.category = "other".into();
        b.sentiment = 0.1;
        assert_eq!(a.identity(), b.identity());

        let mut c = a.clone();
        c.timestamp = "2025-01-29 14:35:22".into();
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn identity_fields_do_not_bleed_into_each_other() {
        let mut a = MessageRecord::decode(ALICE).unwrap();
        let mut b = a.clone();
        a.author = "ab".into();
        a.timestamp = "c".into();
        b.author = "a".into();
        b.timestamp = "bc".into();
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn preview_is_char_based() {
        let r = MessageRecord::decode(ALICE).unwrap();
        assert_eq!(r.preview(6), "I just");
        assert_eq!(r.preview(500), r.message);
    }
}
