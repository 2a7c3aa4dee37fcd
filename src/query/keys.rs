//! Query key definitions
//!
//! A key is an ordered tuple: the view name followed by zero or more filter
//! values. Two identical tuples address one cache entry; invalidation matches
//! on a segment-wise prefix.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// One element of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Text(String),
    Number(i64),
    Null,
    /// Structured parameters, stored as canonical JSON plus a short digest
    Params { canonical: String, digest: String },
}

impl KeySegment {
    /// Build a params segment from a JSON object.
    ///
    /// serde_json orders object keys, so equal maps always give the same
    /// canonical text.
    pub fn params(value: &Value) -> Self {
        let canonical = value.to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash = hasher.finalize();
        Self::Params {
            canonical,
            digest: hex::encode(&hash[..8]),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Text(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Text(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Number(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        KeySegment::Number(i64::from(value))
    }
}

impl<T: Into<KeySegment>> From<Option<T>> for KeySegment {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(KeySegment::Null)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Text(s) => f.write_str(s),
            KeySegment::Number(n) => write!(f, "{}", n),
            KeySegment::Null => f.write_str("null"),
            KeySegment::Params { digest, .. } => write!(f, "#{}", digest),
        }
    }
}

/// Deterministic identifier for a cached dashboard view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    segments: Vec<KeySegment>,
}

impl QueryKey {
    /// Start a key with its view name
    pub fn new(view: &str) -> Self {
        Self {
            segments: vec![KeySegment::Text(view.to_string())],
        }
    }

    /// Build a key from several plain segments (`["employee-dashboard", "overview"]`)
    pub fn from_parts(parts: &[&str]) -> Self {
        Self {
            segments: parts.iter().map(|p| KeySegment::from(*p)).collect(),
        }
    }

    /// Append a filter segment
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append a structured parameter segment
    pub fn with_params(mut self, params: &Value) -> Self {
        self.segments.push(KeySegment::params(params));
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// View name (first segment)
    pub fn view(&self) -> &str {
        match self.segments.first() {
            Some(KeySegment::Text(name)) => name,
            _ => "",
        }
    }

    /// Segment-wise prefix match used by invalidation
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Flat string form for logs and stats.
    /// Format: view:segment:segment
    pub fn to_storage_key(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.to_storage_key())
    }
}
