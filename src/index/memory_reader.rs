//! A reference `IndexReader` implementation backed by plain in-memory maps.
//!
//! Nothing in the query-evaluation core depends on this module; it exists so
//! `FilterBuilder`/`IteratorBuilder` and the iterator algebra in
//! `crate::search` can be exercised in tests without a real on-disk index,
//! the way the teacher's removed `InvertedIndex`/`PostingList` once let
//! `src/search/executor.rs`'s tests run against a plain `HashMap`.

#[cfg(test)]
use crate::core::error::ErrorKind;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, PropertyValue, TermId};
use crate::index::bitmap::CompressedBitmap;
use crate::index::reader::{FilteringOperation, IndexReader, PostingReader, TermReader};
use crate::schema::schema::Property;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryPosting {
    doc: DocId,
    term_freq: u32,
    positions: Vec<u32>,
}

#[derive(Default)]
struct MemoryIndexInner {
    // property name -> term id -> postings sorted ascending by doc id
    postings: RwLock<HashMap<String, HashMap<TermId, Vec<MemoryPosting>>>>,
    // property name -> (value, doc) pairs, unordered; scanned linearly
    numeric: RwLock<HashMap<String, Vec<(PropertyValue, DocId)>>>,
}

pub struct MemoryIndexReader {
    inner: Arc<MemoryIndexInner>,
    max_doc: u32,
    dirty: bool,
}

impl MemoryIndexReader {
    pub fn new(max_doc: u32) -> Self {
        MemoryIndexReader {
            inner: Arc::new(MemoryIndexInner::default()),
            max_doc,
            dirty: false,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Registers a term occurrence for a string property. `positions` may be
    /// empty for a reader that only ever needs doc-frequency iteration.
    pub fn add_posting(&self, property: &str, term_id: TermId, doc: DocId, positions: Vec<u32>) {
        let mut postings = self.inner.postings.write();
        let by_term = postings.entry(property.to_string()).or_default();
        let list = by_term.entry(term_id).or_default();
        list.push(MemoryPosting {
            doc,
            term_freq: positions.len().max(1) as u32,
            positions,
        });
        list.sort_by_key(|p| p.doc);
    }

    /// Registers a typed literal for a numeric/date property.
    pub fn add_numeric(&self, property: &str, doc: DocId, value: PropertyValue) {
        self.inner
            .numeric
            .write()
            .entry(property.to_string())
            .or_default()
            .push((value, doc));
    }
}

fn compare_values(a: &PropertyValue, b: &PropertyValue) -> Option<Ordering> {
    match (a, b) {
        (PropertyValue::Integer(x), PropertyValue::Integer(y)) => x.partial_cmp(y),
        (PropertyValue::UnsignedInteger(x), PropertyValue::UnsignedInteger(y)) => x.partial_cmp(y),
        (PropertyValue::Float(x), PropertyValue::Float(y)) => x.partial_cmp(y),
        (PropertyValue::Str(x), PropertyValue::Str(y)) => x.partial_cmp(y),
        (PropertyValue::Date(x), PropertyValue::Date(y)) => x.partial_cmp(y),
        _ => None,
    }
}

fn matches(operation: FilteringOperation, candidate: &PropertyValue, values: &[PropertyValue]) -> bool {
    match operation {
        FilteringOperation::Equal => values.first().is_some_and(|v| v == candidate),
        FilteringOperation::NotEqual => values.first().is_some_and(|v| v != candidate),
        FilteringOperation::Greater => values
            .first()
            .and_then(|v| compare_values(candidate, v))
            .is_some_and(|o| o == Ordering::Greater),
        FilteringOperation::GreaterEqual => values
            .first()
            .and_then(|v| compare_values(candidate, v))
            .is_some_and(|o| o != Ordering::Less),
        FilteringOperation::Less => values
            .first()
            .and_then(|v| compare_values(candidate, v))
            .is_some_and(|o| o == Ordering::Less),
        FilteringOperation::LessEqual => values
            .first()
            .and_then(|v| compare_values(candidate, v))
            .is_some_and(|o| o != Ordering::Greater),
        FilteringOperation::Between => {
            values.len() == 2
                && compare_values(candidate, &values[0]).is_some_and(|o| o != Ordering::Less)
                && compare_values(candidate, &values[1]).is_some_and(|o| o != Ordering::Greater)
        }
        FilteringOperation::In => values.iter().any(|v| v == candidate),
        FilteringOperation::NotIn => values.iter().all(|v| v != candidate),
        FilteringOperation::StartsWith => match (candidate, values.first()) {
            (PropertyValue::Str(c), Some(PropertyValue::Str(v))) => c.starts_with(v.as_str()),
            _ => false,
        },
        FilteringOperation::EndsWith => match (candidate, values.first()) {
            (PropertyValue::Str(c), Some(PropertyValue::Str(v))) => c.ends_with(v.as_str()),
            _ => false,
        },
        FilteringOperation::Contains => match (candidate, values.first()) {
            (PropertyValue::Str(c), Some(PropertyValue::Str(v))) => c.contains(v.as_str()),
            _ => false,
        },
    }
}

impl IndexReader for MemoryIndexReader {
    fn max_doc(&self) -> u32 {
        self.max_doc
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn get_term_reader(&self, _collection_id: u32) -> Option<Box<dyn TermReader>> {
        Some(Box::new(MemoryTermReader {
            inner: self.inner.clone(),
            current: None,
        }))
    }

    fn make_range_query(
        &self,
        operation: FilteringOperation,
        property: &Property,
        values: &[PropertyValue],
    ) -> Result<CompressedBitmap> {
        let numeric = self.inner.numeric.read();
        let entries = numeric
            .get(&property.name)
            .ok_or_else(|| Error::missing_property(&property.name))?;
        Ok(entries
            .iter()
            .filter(|(value, _)| matches(operation, value, values))
            .map(|(_, doc)| *doc)
            .collect())
    }

    fn get_docs_by_numeric_value(
        &self,
        _collection_id: u32,
        property: &Property,
        value: &PropertyValue,
    ) -> Result<CompressedBitmap> {
        self.make_range_query(FilteringOperation::Equal, property, std::slice::from_ref(value))
    }

    fn seek_term_from_btree_index(
        &self,
        _collection_id: u32,
        property: &Property,
        value: &PropertyValue,
    ) -> Result<bool> {
        let numeric = self.inner.numeric.read();
        let entries = numeric
            .get(&property.name)
            .ok_or_else(|| Error::missing_property(&property.name))?;
        Ok(entries.iter().any(|(v, _)| v == value))
    }
}

struct MemoryTermReader {
    inner: Arc<MemoryIndexInner>,
    current: Option<Vec<MemoryPosting>>,
}

impl TermReader for MemoryTermReader {
    fn seek(&mut self, property: &Property, term_id: TermId) -> bool {
        let postings = self.inner.postings.read();
        match postings.get(&property.name).and_then(|m| m.get(&term_id)) {
            Some(list) => {
                self.current = Some(list.clone());
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    fn term_doc_freqs(&self) -> Option<Box<dyn PostingReader>> {
        self.current.clone().map(|postings| -> Box<dyn PostingReader> {
            Box::new(MemoryPostingReader {
                postings,
                pos: None,
                with_positions: false,
            })
        })
    }

    fn term_positions(&self) -> Option<Box<dyn PostingReader>> {
        self.current.clone().map(|postings| -> Box<dyn PostingReader> {
            Box::new(MemoryPostingReader {
                postings,
                pos: None,
                with_positions: true,
            })
        })
    }
}

struct MemoryPostingReader {
    postings: Vec<MemoryPosting>,
    pos: Option<usize>,
    with_positions: bool,
}

impl PostingReader for MemoryPostingReader {
    fn doc(&self) -> DocId {
        match self.pos {
            Some(i) => self.postings.get(i).map(|p| p.doc).unwrap_or(DocId::NONE),
            None => DocId::NONE,
        }
    }

    fn next(&mut self) -> bool {
        let next_pos = self.pos.map(|i| i + 1).unwrap_or(0);
        if next_pos < self.postings.len() {
            self.pos = Some(next_pos);
            true
        } else {
            self.pos = Some(self.postings.len());
            false
        }
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        let start = self.pos.unwrap_or(0);
        let idx = self.postings[start..].partition_point(|p| p.doc < target) + start;
        if idx < self.postings.len() {
            self.pos = Some(idx);
            true
        } else {
            self.pos = Some(self.postings.len());
            false
        }
    }

    fn doc_freq(&self) -> u64 {
        self.postings.len() as u64
    }

    fn term_freq(&self) -> u32 {
        self.pos
            .and_then(|i| self.postings.get(i))
            .map(|p| p.term_freq)
            .unwrap_or(0)
    }

    fn positions(&self) -> &[u32] {
        if !self.with_positions {
            return &[];
        }
        self.pos
            .and_then(|i| self.postings.get(i))
            .map(|p| p.positions.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PropertyType;

    #[test]
    fn posting_reader_walks_sorted_docs() {
        let index = MemoryIndexReader::new(10);
        let prop = Property::text("title", 1);
        index.add_posting(&prop.name, TermId(1), DocId(5), vec![0]);
        index.add_posting(&prop.name, TermId(1), DocId(2), vec![0]);
        index.add_posting(&prop.name, TermId(1), DocId(8), vec![0]);

        let mut term_reader = index.get_term_reader(0).unwrap();
        assert!(term_reader.seek(&prop, TermId(1)));
        let mut postings = term_reader.term_doc_freqs().unwrap();
        assert_eq!(postings.doc_freq(), 3);
        assert!(postings.next());
        assert_eq!(postings.doc(), DocId(2));
        assert!(postings.skip_to(DocId(6)));
        assert_eq!(postings.doc(), DocId(8));
    }

    #[test]
    fn range_query_filters_numeric_property() {
        let index = MemoryIndexReader::new(10);
        let prop = Property::numeric("price", 2, PropertyType::Integer);
        index.add_numeric(&prop.name, DocId(1), PropertyValue::Integer(10));
        index.add_numeric(&prop.name, DocId(2), PropertyValue::Integer(20));
        index.add_numeric(&prop.name, DocId(3), PropertyValue::Integer(30));

        let bmp = index
            .make_range_query(FilteringOperation::GreaterEqual, &prop, &[PropertyValue::Integer(20)])
            .unwrap();
        assert_eq!(bmp.len(), 2);
        assert!(bmp.contains(DocId(2)));
        assert!(bmp.contains(DocId(3)));
    }

    #[test]
    fn missing_property_is_an_error() {
        let index = MemoryIndexReader::new(10);
        let prop = Property::numeric("missing", 9, PropertyType::Integer);
        let err = index
            .make_range_query(FilteringOperation::Equal, &prop, &[PropertyValue::Integer(1)])
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MissingProperty));
    }
}
