use crate::core::types::PropertyType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single indexed/filterable field. `property_id` is the stable numeric
/// handle collaborators (term dictionaries, forward index) key off of;
/// `name` is what predicates and query trees address it by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub property_id: u32,
    pub property_type: PropertyType,
    /// Indexed into the term dictionary / posting lists (string properties)
    /// or the numeric B-tree index (numeric/date properties).
    pub is_indexed: bool,
    /// Eligible as a filter predicate target (`IndexReader::make_range_query`).
    pub is_filter: bool,
}

impl Property {
    pub fn text(name: &str, property_id: u32) -> Self {
        Property {
            name: name.to_string(),
            property_id,
            property_type: PropertyType::Str,
            is_indexed: true,
            is_filter: false,
        }
    }

    pub fn numeric(name: &str, property_id: u32, property_type: PropertyType) -> Self {
        Property {
            name: name.to_string(),
            property_id,
            property_type,
            is_indexed: true,
            is_filter: true,
        }
    }
}

/// Name-keyed view of the schema; this is what `FilterBuilder` and
/// `IteratorBuilder` consult to resolve a predicate's or query node's
/// property name to its declared type and id.
pub type SchemaMap = HashMap<String, Property>;

pub fn schema_map(properties: impl IntoIterator<Item = Property>) -> SchemaMap {
    properties.into_iter().map(|p| (p.name.clone(), p)).collect()
}
