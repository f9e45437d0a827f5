use crate::core::types::PropertyValue;
use crate::index::reader::FilteringOperation;

/// A single filter clause: `property <operation> values`. This triple *is*
/// the `FilterCache` key — equality on it is exactly what a cache hit means,
/// so it derives `Hash`/`Eq` directly rather than going through a separate
/// fingerprint type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Predicate {
    pub operation: FilteringOperation,
    pub property: String,
    pub values: Vec<PropertyValue>,
}

impl Predicate {
    pub fn new(operation: FilteringOperation, property: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        Predicate {
            operation,
            property: property.into(),
            values,
        }
    }

    pub fn equal(property: impl Into<String>, value: PropertyValue) -> Self {
        Predicate::new(FilteringOperation::Equal, property, vec![value])
    }
}
