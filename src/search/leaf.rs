use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::bitmap::BitmapCursor;
use crate::index::reader::{IndexReader, PostingReader};
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use crate::search::iterator::DocumentIterator;

/// Leaf over one term's posting list in the ordinary (non unigram-search)
/// builder mode. Its posting reader is either handed in directly (the
/// prefetch path: `IteratorBuilder` already seeked and fetched it while
/// collecting every distinct term id in the tree) or fetched lazily via
/// `accept` when the term didn't survive prefetch (a numeric-filter
/// property, or a term the prefetch pass skipped).
pub struct TermDocumentIterator {
    posting: Option<Box<dyn PostingReader>>,
    df: u64,
    /// Slot this leaf's term occupies in a per-property term-index map,
    /// threaded through from `IteratorBuilder::prepare_iterator`'s
    /// `term_index_maps` argument. Not consulted by scoring in this crate;
    /// kept so the leaf carries the same addressable identity the external
    /// interface promises a caller-supplied scorer could route on.
    pub term_index: usize,
}

impl TermDocumentIterator {
    pub fn new(term_index: usize) -> Self {
        TermDocumentIterator {
            posting: None,
            df: 0,
            term_index,
        }
    }

    pub fn from_reader(term_index: usize, reader: Box<dyn PostingReader>) -> Self {
        let df = reader.doc_freq();
        TermDocumentIterator {
            posting: Some(reader),
            df,
            term_index,
        }
    }

    /// Seeks the term directly against the index when no prefetched reader
    /// was available. Returns `false` if the term has no postings for this
    /// property at all.
    pub fn accept(
        &mut self,
        index: &dyn IndexReader,
        collection_id: u32,
        read_positions: bool,
        property: &crate::schema::schema::Property,
        term_id: crate::core::types::TermId,
    ) -> Result<bool> {
        let Some(mut term_reader) = index.get_term_reader(collection_id) else {
            return Ok(false);
        };
        if !term_reader.seek(property, term_id) {
            return Ok(false);
        }
        let reader = if read_positions {
            term_reader.term_positions()
        } else {
            term_reader.term_doc_freqs()
        };
        match reader {
            Some(r) => {
                self.df = r.doc_freq();
                self.posting = Some(r);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl DocumentIterator for TermDocumentIterator {
    fn doc(&self) -> DocId {
        self.posting.as_ref().map(|p| p.doc()).unwrap_or(DocId::NONE)
    }

    fn next(&mut self) -> bool {
        self.posting.as_mut().map(|p| p.next()).unwrap_or(false)
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.posting.as_mut().map(|p| p.skip_to(target)).unwrap_or(false)
    }

    fn df(&self) -> u64 {
        self.df
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let tf = self.posting.as_ref().map(|p| p.term_freq()).unwrap_or(0);
        scorer.score(tf, self.df, stats)
    }
}

/// Unigram-search-mode counterpart for a plain `KEYWORD`: matches exactly
/// like `TermDocumentIterator` but never contributes to ranking — it's
/// there purely to constrain the candidate set.
pub struct SearchTermDocumentIterator {
    inner: TermDocumentIterator,
}

impl SearchTermDocumentIterator {
    pub fn new(inner: TermDocumentIterator) -> Self {
        SearchTermDocumentIterator { inner }
    }
}

impl DocumentIterator for SearchTermDocumentIterator {
    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn next(&mut self) -> bool {
        self.inner.next()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.inner.skip_to(target)
    }

    fn df(&self) -> u64 {
        self.inner.df()
    }

    fn score(&mut self, _scorer: &dyn PropertyScorer, _stats: &CollectionStats) -> f32 {
        0.0
    }
}

/// Unigram-search-mode counterpart for `RANK_KEYWORD`: the mirror image of
/// `SearchTermDocumentIterator` — contributes to ranking but, depending on
/// `parent_is_and`, does not have to match for its sibling subtree to match.
/// Under an `AND` parent its absence excludes the document exactly like any
/// other required term; under an `OR` parent a failed `accept()` just leaves
/// it permanently exhausted (the parent `OrIterator` silently skips an
/// always-exhausted child rather than letting it veto the union).
pub struct RankTermDocumentIterator {
    inner: TermDocumentIterator,
}

impl RankTermDocumentIterator {
    pub fn new(inner: TermDocumentIterator) -> Self {
        RankTermDocumentIterator { inner }
    }
}

impl DocumentIterator for RankTermDocumentIterator {
    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn next(&mut self) -> bool {
        self.inner.next()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.inner.skip_to(target)
    }

    fn df(&self) -> u64 {
        self.inner.df()
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        self.inner.score(scorer, stats)
    }
}

/// Leaf over a `CompressedBitmap`'s membership set rather than a term's
/// postings — backs numeric-filter `KEYWORD` leaves (the filter bitmap
/// stands in for a posting list with a constant term frequency of `1`) and
/// `TRIE_WILDCARD`'s individually-built expansion candidates when a
/// collaborator hands back bitmaps instead of posting readers.
pub struct BitmapIterator {
    cursor: BitmapCursor,
    df: u64,
}

impl BitmapIterator {
    pub fn new(bitmap: &crate::index::bitmap::CompressedBitmap) -> Self {
        BitmapIterator {
            cursor: bitmap.cursor(),
            df: bitmap.len(),
        }
    }
}

impl DocumentIterator for BitmapIterator {
    fn doc(&self) -> DocId {
        self.cursor.doc()
    }

    fn next(&mut self) -> bool {
        self.cursor.next()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.cursor.skip_to(target)
    }

    fn df(&self) -> u64 {
        self.df
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        if self.cursor.doc().is_none() {
            return 0.0;
        }
        scorer.score(1, self.df, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TermId;
    use crate::index::memory_reader::MemoryIndexReader;
    use crate::schema::schema::Property;
    use crate::scoring::scorer::Bm25PropertyScorer;

    #[test]
    fn accept_fetches_postings_on_demand() {
        let index = MemoryIndexReader::new(5);
        let prop = Property::text("title", 1);
        index.add_posting(&prop.name, TermId(7), DocId(2), vec![]);

        let mut leaf = TermDocumentIterator::new(0);
        assert!(leaf.accept(&index, 0, false, &prop, TermId(7)).unwrap());
        assert!(leaf.next());
        assert_eq!(leaf.doc(), DocId(2));
    }

    #[test]
    fn score_uses_current_position_term_frequency() {
        let index = MemoryIndexReader::new(5);
        let prop = Property::text("title", 1);
        index.add_posting(&prop.name, TermId(7), DocId(2), vec![0, 3]);

        let mut leaf = TermDocumentIterator::new(0);
        leaf.accept(&index, 0, true, &prop, TermId(7)).unwrap();
        leaf.next();
        let scorer = Bm25PropertyScorer::default();
        let stats = CollectionStats { total_docs: 10 };
        assert!(leaf.score(&scorer, &stats) > 0.0);
    }

    #[test]
    fn bitmap_iterator_walks_membership_set() {
        let mut bmp = crate::index::bitmap::CompressedBitmap::new();
        bmp.insert(DocId(3));
        bmp.insert(DocId(9));
        let mut iter = BitmapIterator::new(&bmp);
        assert!(iter.next());
        assert_eq!(iter.doc(), DocId(3));
        assert!(iter.skip_to(DocId(9)));
        assert_eq!(iter.doc(), DocId(9));
    }
}
