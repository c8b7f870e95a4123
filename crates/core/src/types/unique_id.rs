//! Hierarchical unique identifiers for test descriptors
//!
//! A [`UniqueId`] is an ordered list of `(type, value)` segments. Every
//! descriptor's id is its parent's id plus exactly one appended segment,
//! so ancestry is a plain prefix test. The platform never interprets
//! segment contents.
//!
//! The canonical string form is `[engine:alpha]/[class:Foo]/[method:bar()]`.
//! Characters that would break that form (`[`, `]`, `:`, `/`, `%`) are
//! percent-encoded inside segment types and values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Segment type used for engine roots
pub const ENGINE_SEGMENT_TYPE: &str = "engine";

/// A single `(type, value)` pair of a [`UniqueId`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    segment_type: String,
    value: String,
}

impl Segment {
    pub fn new(segment_type: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let segment_type = segment_type.into();
        if segment_type.trim().is_empty() {
            return Err(Error::InvalidUniqueId(
                "segment type must not be blank".to_string(),
            ));
        }
        Ok(Self {
            segment_type,
            value: value.into(),
        })
    }

    pub fn segment_type(&self) -> &str {
        &self.segment_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", encode(&self.segment_type), encode(&self.value))
    }
}

/// Immutable, hierarchical identifier of a test descriptor
///
/// Equality, hashing and ordering are defined purely on the segment
/// sequence, which makes ids stable across runs for the same logical test.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueId {
    segments: Vec<Segment>,
}

impl UniqueId {
    /// The empty platform root. Engines receive it as the parent id of
    /// their engine root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Id of an engine root: `[engine:<engine_id>]`
    pub fn for_engine(engine_id: &str) -> Result<Self> {
        Self::root().append(ENGINE_SEGMENT_TYPE, engine_id)
    }

    /// Return a new id with one more segment. `self` is left untouched.
    pub fn append(&self, segment_type: &str, value: &str) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.push(Segment::new(segment_type, value)?);
        Ok(Self { segments })
    }

    /// Parse the canonical string form
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::InvalidUniqueId("empty unique id".to_string()));
        }

        let mut segments = Vec::new();
        for raw in input.split('/') {
            let inner = raw
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(|| {
                    Error::InvalidUniqueId(format!(
                        "segment '{raw}' in '{input}' is not of the form [type:value]"
                    ))
                })?;
            let (segment_type, value) = inner.split_once(':').ok_or_else(|| {
                Error::InvalidUniqueId(format!("segment '{raw}' in '{input}' has no ':'"))
            })?;
            segments.push(Segment::new(decode(segment_type)?, decode(value)?)?);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// `true` for the empty platform root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The id this one was appended to. `None` for the platform root and
    /// for ids sitting directly under it (engine roots).
    pub fn parent(&self) -> Option<UniqueId> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Ancestry test: `true` if `prefix`'s segments are a leading slice of
    /// ours. Every id has itself as prefix.
    pub fn has_prefix(&self, prefix: &UniqueId) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether `self` is exactly one segment below `parent`
    pub fn is_direct_child_of(&self, parent: &UniqueId) -> bool {
        self.segments.len() == parent.segments.len() + 1 && self.has_prefix(parent)
    }

    /// Engine id from the first segment, if it is an engine segment
    pub fn engine_id(&self) -> Option<&str> {
        self.segments
            .first()
            .filter(|segment| segment.segment_type == ENGINE_SEGMENT_TYPE)
            .map(|segment| segment.value.as_str())
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for UniqueId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for UniqueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UniqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UniqueId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn encode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            ':' => encoded.push_str("%3A"),
            '[' => encoded.push_str("%5B"),
            ']' => encoded.push_str("%5D"),
            other => encoded.push(other),
        }
    }
    encoded
}

fn decode(raw: &str) -> Result<String> {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            decoded.push(c);
            continue;
        }
        let escape: String = chars.by_ref().take(2).collect();
        let replacement = match escape.to_ascii_uppercase().as_str() {
            "25" => '%',
            "2F" => '/',
            "3A" => ':',
            "5B" => '[',
            "5D" => ']',
            _ => {
                return Err(Error::InvalidUniqueId(format!(
                    "unsupported escape '%{escape}' in '{raw}'"
                )));
            }
        };
        decoded.push(replacement);
    }
    Ok(decoded)
}
