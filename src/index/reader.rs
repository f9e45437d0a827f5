use crate::core::error::Result;
use crate::core::types::{DocId, PropertyValue, TermId};
use crate::index::bitmap::CompressedBitmap;
use crate::schema::schema::Property;

/// Comparison a filter predicate applies against a property's stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FilteringOperation {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Between,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
}

/// The storage-engine seam. Everything this crate needs from a real index —
/// term postings, numeric range scans, liveness — is expressed through this
/// trait and its two companions (`TermReader`, `PostingReader`); no concrete
/// storage engine lives in this crate.
pub trait IndexReader: Send + Sync {
    /// Highest assigned document id; `CompressedBitmap::identity_upto` uses
    /// this to build the "no predicate at all" universe.
    fn max_doc(&self) -> u32;

    /// True once the reader's underlying segment snapshot has pending writes
    /// behind it — collaborators may choose to route around the `FilterCache`
    /// rather than serve a stale bitmap.
    fn is_dirty(&self) -> bool;

    /// Opens a term-by-term reader scoped to one collection (tenant/shard).
    /// `None` means the collection has no indexed properties at all.
    fn get_term_reader(&self, collection_id: u32) -> Option<Box<dyn TermReader>>;

    /// Evaluates a range/equality/membership predicate against a filterable
    /// property and returns the matching document set. This is the one path
    /// `FilterCache` misses fall through to.
    fn make_range_query(
        &self,
        operation: FilteringOperation,
        property: &Property,
        values: &[PropertyValue],
    ) -> Result<CompressedBitmap>;

    /// Direct equality lookup against the numeric B-tree index, bypassing
    /// `make_range_query`'s general comparison dispatch — used by numeric
    /// KEYWORD leaves, which are always equality.
    fn get_docs_by_numeric_value(
        &self,
        collection_id: u32,
        property: &Property,
        value: &PropertyValue,
    ) -> Result<CompressedBitmap>;

    /// True if a value is present at all in a property's sorted B-tree index
    /// — used to short-circuit a numeric KEYWORD whose literal can't possibly
    /// match anything.
    fn seek_term_from_btree_index(
        &self,
        collection_id: u32,
        property: &Property,
        value: &PropertyValue,
    ) -> Result<bool>;
}

/// Per-property cursor over the term dictionary, positioned one term at a
/// time via `seek`.
pub trait TermReader {
    /// Positions this reader at `term_id` within `property`. Returns `false`
    /// if the term doesn't exist for that property at all.
    fn seek(&mut self, property: &Property, term_id: TermId) -> bool;

    /// Document-frequency-only posting list for the term last `seek`ed to.
    fn term_doc_freqs(&self) -> Option<Box<dyn PostingReader>>;

    /// Position-carrying posting list for the term last `seek`ed to — used
    /// by phrase iterators and any leaf built under `read_positions = true`.
    fn term_positions(&self) -> Option<Box<dyn PostingReader>>;
}

/// A single term's posting list, walked the same way every
/// `DocumentIterator` is walked.
pub trait PostingReader: Send {
    fn doc(&self) -> DocId;
    fn next(&mut self) -> bool;
    fn skip_to(&mut self, target: DocId) -> bool;
    fn doc_freq(&self) -> u64;
    /// In-document term frequency at the current position. `1` for readers
    /// that don't track frequency (a bare bitmap-backed posting, say).
    fn term_freq(&self) -> u32;
    /// Term positions within the current document, empty unless this reader
    /// came from `TermReader::term_positions`.
    fn positions(&self) -> &[u32];
}

/// Per-document content/property access, used by `UnigramWildcardIterator`
/// to test a candidate document's raw content against a wildcard pattern,
/// and by the forward-index similarity reranker to fetch brand/model tokens.
pub trait DocumentManager: Send + Sync {
    fn get_property_value(&self, doc: DocId, property_name: &str) -> Option<String>;
}
