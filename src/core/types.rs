use serde::{Deserialize, Serialize};
use std::fmt;

/// Document identifier. `0` is reserved as the "unpositioned / exhausted"
/// sentinel for every iterator in `crate::search` — a real document never
/// carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct DocId(pub u32);

impl DocId {
    pub const NONE: DocId = DocId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

/// Opaque term identifier, assigned upstream by whatever analysis pipeline
/// resolved query keywords against the term dictionary. This crate never
/// constructs one from a surface string itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u64);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared type of a property's values, used to decide whether a property
/// is filtered through the numeric/date range machinery or the term
/// dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Integer,
    UnsignedInteger,
    Float,
    Str,
    Date,
}

/// A typed literal used on the right-hand side of a predicate, or as the
/// resolved value of a numeric KEYWORD leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropertyValue {
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Str(String),
    Date(chrono::DateTime<chrono::Utc>),
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::UnsignedInteger(a), Self::UnsignedInteger(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl std::hash::Hash for PropertyValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Integer(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Self::UnsignedInteger(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Self::Float(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Self::Str(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            Self::Date(v) => {
                4u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl PropertyValue {
    /// Parses a query-supplied surface form (the text a KEYWORD node carries)
    /// into a typed literal for a numeric-filter property, per the property's
    /// declared type.
    pub fn parse(surface: &str, property_type: PropertyType) -> Option<Self> {
        match property_type {
            PropertyType::Integer => surface.parse::<i64>().ok().map(Self::Integer),
            PropertyType::UnsignedInteger => surface.parse::<u64>().ok().map(Self::UnsignedInteger),
            PropertyType::Float => surface.parse::<f64>().ok().map(Self::Float),
            PropertyType::Str => Some(Self::Str(surface.to_string())),
            PropertyType::Date => surface
                .parse::<chrono::DateTime<chrono::Utc>>()
                .ok()
                .map(Self::Date),
        }
    }
}
