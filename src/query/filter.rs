use crate::core::error::Result;
use crate::index::bitmap::CompressedBitmap;
use crate::index::reader::IndexReader;
use crate::query::filter_cache::FilterCache;
use crate::query::predicate::Predicate;
use crate::schema::schema::SchemaMap;
use std::sync::Arc;

/// A resolved filter: the document set a list of predicates narrows down to.
pub struct Filter {
    pub bitmap: Arc<CompressedBitmap>,
}

/// Turns a list of `Predicate`s into a `Filter`, going through the
/// `FilterCache` one predicate at a time and intersecting. Grounded in
/// `QueryBuilder::prepareFilter` (`QueryBuilder.cpp`): a single predicate is
/// served straight from cache-or-build; two or more are intersected in
/// order, and a predicate that fails partway through does not fail the
/// whole filter — the accumulated intersection of the predicates evaluated
/// so far is returned instead (the original swallows the exception
/// entirely; this keeps that permissiveness but logs the predicate index
/// that failed rather than losing the failure silently).
pub struct FilterBuilder {
    cache: Arc<FilterCache>,
}

impl FilterBuilder {
    pub fn new(cache: Arc<FilterCache>) -> Self {
        FilterBuilder { cache }
    }

    pub fn prepare_filter(
        &self,
        index: &dyn IndexReader,
        schema: &SchemaMap,
        predicates: &[Predicate],
    ) -> Result<Filter> {
        if predicates.is_empty() {
            return Ok(Filter {
                bitmap: Arc::new(CompressedBitmap::identity_upto(index.max_doc())),
            });
        }

        if predicates.len() == 1 {
            let bitmap = self.build_or_get(index, schema, &predicates[0])?;
            return Ok(Filter { bitmap });
        }

        let mut accumulated = CompressedBitmap::identity_upto(index.max_doc());
        for (i, predicate) in predicates.iter().enumerate() {
            match self.build_or_get(index, schema, predicate) {
                Ok(bitmap) => accumulated.and_inplace(&bitmap),
                Err(err) => {
                    log::warn!(
                        "filter predicate #{i} on {:?} failed ({err}); returning the intersection of the {i} predicates evaluated so far",
                        predicate.property,
                    );
                    break;
                }
            }
        }
        Ok(Filter {
            bitmap: Arc::new(accumulated),
        })
    }

    /// Drops every cached predicate bitmap — callers invoke this after an
    /// index rebuild; a stale handle means stale bitmaps are otherwise
    /// indistinguishable from fresh ones.
    pub fn reset_cache(&self) {
        self.cache.reset_cache();
    }

    /// Exposes the underlying cache so `IteratorBuilder` can share it for
    /// numeric-filter KEYWORD leaves (§4.10) — the same cache a predicate
    /// filter and a numeric query term narrow down to is the same bitmap.
    pub fn cache(&self) -> &FilterCache {
        &self.cache
    }

    fn build_or_get(
        &self,
        index: &dyn IndexReader,
        schema: &SchemaMap,
        predicate: &Predicate,
    ) -> Result<Arc<CompressedBitmap>> {
        self.cache.get_or_build(predicate, || {
            let property = schema
                .get(&predicate.property)
                .ok_or_else(|| crate::core::error::Error::missing_property(&predicate.property))?;
            index.make_range_query(predicate.operation, property, &predicate.values)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PropertyType, PropertyValue};
    use crate::index::memory_reader::MemoryIndexReader;
    use crate::index::reader::FilteringOperation;
    use crate::schema::schema::{schema_map, Property};

    fn fixture() -> (MemoryIndexReader, SchemaMap) {
        let index = MemoryIndexReader::new(10);
        let price = Property::numeric("price", 1, PropertyType::Integer);
        let stock = Property::numeric("stock", 2, PropertyType::Integer);
        for doc in 1..=10u32 {
            index.add_numeric(&price.name, crate::core::types::DocId(doc), PropertyValue::Integer(doc as i64));
            index.add_numeric(&stock.name, crate::core::types::DocId(doc), PropertyValue::Integer((10 - doc) as i64));
        }
        (index, schema_map([price, stock]))
    }

    #[test]
    fn single_predicate_hits_make_range_query() {
        let (index, schema) = fixture();
        let builder = FilterBuilder::new(Arc::new(FilterCache::new(8)));
        let filter = builder
            .prepare_filter(
                &index,
                &schema,
                &[Predicate::new(
                    FilteringOperation::GreaterEqual,
                    "price",
                    vec![PropertyValue::Integer(8)],
                )],
            )
            .unwrap();
        assert_eq!(filter.bitmap.len(), 3);
    }

    #[test]
    fn multiple_predicates_intersect() {
        let (index, schema) = fixture();
        let builder = FilterBuilder::new(Arc::new(FilterCache::new(8)));
        let filter = builder
            .prepare_filter(
                &index,
                &schema,
                &[
                    Predicate::new(FilteringOperation::GreaterEqual, "price", vec![PropertyValue::Integer(5)]),
                    Predicate::new(FilteringOperation::LessEqual, "stock", vec![PropertyValue::Integer(3)]),
                ],
            )
            .unwrap();
        // price >= 5 => docs 5..=10; stock = 10-doc <= 3 => doc >= 7 => docs 7..=10
        assert_eq!(filter.bitmap.len(), 4);
    }

    #[test]
    fn reset_cache_drops_previously_cached_predicates() {
        let (index, schema) = fixture();
        let cache = Arc::new(FilterCache::new(8));
        let builder = FilterBuilder::new(cache.clone());
        let predicate = Predicate::new(FilteringOperation::GreaterEqual, "price", vec![PropertyValue::Integer(8)]);
        builder.prepare_filter(&index, &schema, &[predicate.clone()]).unwrap();
        assert!(cache.get(&predicate).is_some());
        builder.reset_cache();
        assert!(cache.get(&predicate).is_none());
    }

    #[test]
    fn a_failing_predicate_still_returns_the_prior_intersection() {
        let (index, schema) = fixture();
        let builder = FilterBuilder::new(Arc::new(FilterCache::new(8)));
        let filter = builder
            .prepare_filter(
                &index,
                &schema,
                &[
                    Predicate::new(FilteringOperation::GreaterEqual, "price", vec![PropertyValue::Integer(5)]),
                    Predicate::new(FilteringOperation::Equal, "nonexistent", vec![PropertyValue::Integer(1)]),
                ],
            )
            .unwrap();
        assert_eq!(filter.bitmap.len(), 6);
    }
}
