use crate::core::types::{PropertyType, PropertyValue, TermId};
use crate::index::reader::{FilteringOperation, IndexReader, PostingReader};
use crate::query::filter_cache::FilterCache;
use crate::query::predicate::Predicate;
use crate::query::tree::{Keyword, QueryTree, WildcardToken};
use crate::schema::schema::{Property, SchemaMap};
use crate::search::composite::{AndIterator, NotIterator, OrIterator};
use crate::search::iterator::DocumentIterator;
use crate::search::leaf::{BitmapIterator, RankTermDocumentIterator, SearchTermDocumentIterator, TermDocumentIterator};
use crate::search::multi_property_scorer::MultiPropertyScorer;
use crate::search::phrase::{ExactPhraseIterator, NearbyPhraseIterator, OrderedPhraseIterator};
use crate::search::wildcard::{TrieWildcardIterator, UnigramWildcardIterator};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of compiling one `QueryTree` node. Distinguishes a node that
/// built an iterator from a node that built *nothing but should not fail
/// its parent* (`Skip` — a `NOT` whose negated term doesn't exist; there is
/// nothing to exclude, which is not an error) from a node whose absence
/// genuinely invalidates a required sibling (`Fail` — a `KEYWORD` whose
/// term isn't in the dictionary at all). `AND` propagates `Fail` from any
/// child (a missing required term means the intersection is empty); `OR`
/// and the `*_PERSONAL` variants treat `Fail` the same as `Skip` and only
/// fail themselves if every child failed.
enum BuildOutcome {
    Iterator(Box<dyn DocumentIterator>),
    Skip,
    Fail,
}

/// Compiles a per-property `QueryTree` into a `DocumentIterator` tree, then
/// combines one tree per queried property into a `MultiPropertyScorer`.
/// Grounded in `QueryBuilder::prepareIterator` (`QueryBuilder.cpp`): each
/// `AND`/`OR`/personalized node builds its own local composite and recurses
/// its children into it before handing the finished composite to its
/// parent via the same `add()` seam a leaf uses — that's the one place the
/// original's per-node-type return-policy differences actually live, which
/// is why they're modeled here as `BuildOutcome` instead of a bare `bool`.
pub struct IteratorBuilder<'a> {
    index: &'a dyn IndexReader,
    collection_id: u32,
    doc_manager: Arc<dyn crate::index::reader::DocumentManager>,
    unigram_search_mode: bool,
    schema: Option<&'a SchemaMap>,
    filter_cache: Option<&'a FilterCache>,
}

impl<'a> IteratorBuilder<'a> {
    pub fn new(index: &'a dyn IndexReader, collection_id: u32, doc_manager: Arc<dyn crate::index::reader::DocumentManager>) -> Self {
        IteratorBuilder {
            index,
            collection_id,
            doc_manager,
            unigram_search_mode: false,
            schema: None,
            filter_cache: None,
        }
    }

    /// Routes numeric `KEYWORD` leaves (§4.10's "numeric property branch")
    /// through a `FilterCache`, registering a synthetic `EQUAL` predicate so
    /// a term repeated across properties/queries reuses the same bitmap
    /// instead of re-running `get_docs_by_numeric_value`. Without a cache,
    /// numeric leaves still build correctly — they just build fresh every
    /// time.
    pub fn with_filter_cache(mut self, cache: &'a FilterCache) -> Self {
        self.filter_cache = Some(cache);
        self
    }

    /// Enables the unigram-search leaf split (`SearchTermDocumentIterator` /
    /// `RankTermDocumentIterator` instead of a plain `TermDocumentIterator`)
    /// for `KEYWORD`/`RANK_KEYWORD` nodes.
    pub fn with_unigram_search_mode(mut self, enabled: bool) -> Self {
        self.unigram_search_mode = enabled;
        self
    }

    /// Supplies the schema so `EXACT` phrase nodes can retarget onto a
    /// `"<property>_unigram"` alias when the schema declares one — a finer
    /// grained position stream tokenized to single characters/units. Without
    /// a schema, `EXACT` always matches positions on the property as given.
    pub fn with_schema(mut self, schema: &'a SchemaMap) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Resolves the property an `EXACT` phrase should actually read
    /// positions from: its `"<name>_unigram"` alias if the schema declares
    /// one, else the property itself.
    fn unigram_alias_or_self<'p>(&self, property: &'p Property) -> std::borrow::Cow<'p, Property> {
        let alias_name = format!("{}_unigram", property.name);
        match self.schema.and_then(|schema| schema.get(&alias_name)) {
            Some(alias) => std::borrow::Cow::Owned(alias.clone()),
            None => std::borrow::Cow::Borrowed(property),
        }
    }

    /// Builds and combines one iterator per `(property, weight, tree)`
    /// triple. Properties whose tree produced nothing usable are dropped
    /// silently (an empty query against one property among several doesn't
    /// invalidate the others); returns `None` only if every property did.
    pub fn prepare_iterator(&self, queries: &[(Property, f32, QueryTree)]) -> Option<MultiPropertyScorer> {
        let mut scorer = MultiPropertyScorer::new();
        for (property, weight, tree) in queries {
            if let Some(iterator) = self.build_property(property, tree) {
                scorer.add(property.clone(), *weight, iterator);
            }
        }
        if scorer.is_empty() {
            None
        } else {
            Some(scorer)
        }
    }

    fn build_property(&self, property: &Property, tree: &QueryTree) -> Option<Box<dyn DocumentIterator>> {
        let mut term_ids = Vec::new();
        tree.collect_term_ids(&mut term_ids);
        term_ids.sort_unstable_by_key(|t| t.0);
        term_ids.dedup();

        let mut prefetched: HashMap<TermId, Box<dyn PostingReader>> = HashMap::new();
        if property.property_type == PropertyType::Str {
            if let Some(mut term_reader) = self.index.get_term_reader(self.collection_id) {
                for term_id in term_ids {
                    if term_reader.seek(property, term_id) {
                        if let Some(reader) = term_reader.term_doc_freqs() {
                            prefetched.insert(term_id, reader);
                        }
                    }
                }
            }
        }

        // A `NOT` has no independent doc-id sequence of its own — it only
        // ever excludes from an enclosing composite's candidates (see
        // `AndIterator::add`). As the root of a property's tree there is no
        // parent to exclude from, so it's rejected outright rather than
        // built and handed back as if it were a normal iterator.
        if matches!(tree, QueryTree::Not(_)) {
            return None;
        }

        let mut term_index_map: HashMap<TermId, usize> = HashMap::new();
        match self.build_node(property, tree, &mut prefetched, &mut term_index_map) {
            BuildOutcome::Iterator(iterator) => Some(iterator),
            BuildOutcome::Skip | BuildOutcome::Fail => None,
        }
    }

    fn build_node(
        &self,
        property: &Property,
        node: &QueryTree,
        prefetched: &mut HashMap<TermId, Box<dyn PostingReader>>,
        term_index_map: &mut HashMap<TermId, usize>,
    ) -> BuildOutcome {
        match node {
            QueryTree::Keyword(kw) => self.build_keyword(property, kw, prefetched, term_index_map, false),
            QueryTree::RankKeyword(kw) => self.build_keyword(property, kw, prefetched, term_index_map, true),
            QueryTree::Not(child) => match self.build_node(property, child, prefetched, term_index_map) {
                BuildOutcome::Iterator(inner) => BuildOutcome::Iterator(Box::new(NotIterator::new(inner))),
                BuildOutcome::Skip | BuildOutcome::Fail => BuildOutcome::Skip,
            },
            QueryTree::And(children) => self.build_conjunction(property, children, prefetched, term_index_map),
            QueryTree::Or(children) => self.build_disjunction(property, children, prefetched, term_index_map),
            QueryTree::AndPersonal(children) | QueryTree::OrPersonal(children) => {
                self.build_personal(property, children, prefetched, term_index_map)
            }
            QueryTree::Exact(terms) => {
                let term_ids: Vec<TermId> = terms.iter().map(|k| k.term_id).collect();
                let target = self.unigram_alias_or_self(property);
                match ExactPhraseIterator::build(&term_ids, &target, self.index, self.collection_id) {
                    Ok(Some(iter)) => BuildOutcome::Iterator(Box::new(iter)),
                    _ => BuildOutcome::Fail,
                }
            }
            QueryTree::Order(terms) => {
                let term_ids: Vec<TermId> = terms.iter().map(|k| k.term_id).collect();
                match OrderedPhraseIterator::build(&term_ids, property, self.index, self.collection_id) {
                    Ok(Some(iter)) => BuildOutcome::Iterator(Box::new(iter)),
                    _ => BuildOutcome::Fail,
                }
            }
            QueryTree::Nearby { distance, terms } => {
                let term_ids: Vec<TermId> = terms.iter().map(|k| k.term_id).collect();
                match NearbyPhraseIterator::build(&term_ids, *distance, property, self.index, self.collection_id) {
                    Ok(Some(iter)) => BuildOutcome::Iterator(Box::new(iter)),
                    _ => BuildOutcome::Fail,
                }
            }
            QueryTree::TrieWildcard(terms) => {
                let candidates: Vec<Box<dyn DocumentIterator>> = terms
                    .iter()
                    .filter_map(|kw| match self.build_keyword(property, kw, prefetched, term_index_map, false) {
                        BuildOutcome::Iterator(iter) => Some(iter),
                        _ => None,
                    })
                    .collect();
                match TrieWildcardIterator::build(candidates) {
                    Some(iter) => BuildOutcome::Iterator(Box::new(iter)),
                    None => BuildOutcome::Fail,
                }
            }
            QueryTree::UnigramWildcard(tokens) => {
                let keyword_leaves: Vec<Box<dyn DocumentIterator>> = tokens
                    .iter()
                    .filter_map(|t| match t {
                        WildcardToken::Keyword(kw) => {
                            match self.build_keyword(property, kw, prefetched, term_index_map, false) {
                                BuildOutcome::Iterator(iter) => Some(iter),
                                _ => None,
                            }
                        }
                        _ => None,
                    })
                    .collect();
                match UnigramWildcardIterator::build(
                    tokens,
                    keyword_leaves,
                    &property.name,
                    self.index.max_doc(),
                    self.doc_manager.clone(),
                ) {
                    Ok(iter) => BuildOutcome::Iterator(Box::new(iter)),
                    Err(_) => BuildOutcome::Fail,
                }
            }
        }
    }

    fn build_conjunction(
        &self,
        property: &Property,
        children: &[QueryTree],
        prefetched: &mut HashMap<TermId, Box<dyn PostingReader>>,
        term_index_map: &mut HashMap<TermId, usize>,
    ) -> BuildOutcome {
        let mut and = AndIterator::new();
        for child in children {
            match self.build_node(property, child, prefetched, term_index_map) {
                BuildOutcome::Iterator(iter) => and.add(iter),
                BuildOutcome::Skip => continue,
                BuildOutcome::Fail => return BuildOutcome::Fail,
            }
        }
        if and.is_empty_composite() {
            BuildOutcome::Skip
        } else {
            BuildOutcome::Iterator(Box::new(and))
        }
    }

    fn build_disjunction(
        &self,
        property: &Property,
        children: &[QueryTree],
        prefetched: &mut HashMap<TermId, Box<dyn PostingReader>>,
        term_index_map: &mut HashMap<TermId, usize>,
    ) -> BuildOutcome {
        let mut or = OrIterator::new();
        for child in children {
            if let BuildOutcome::Iterator(iter) = self.build_node(property, child, prefetched, term_index_map) {
                or.add(iter);
            }
        }
        if or.is_empty_composite() {
            BuildOutcome::Fail
        } else {
            BuildOutcome::Iterator(Box::new(or))
        }
    }

    /// `AND_PERSONAL`/`OR_PERSONAL`: same runtime algebra as `AND` (an
    /// `AndIterator`) but tolerant at build time — a failing child is
    /// dropped rather than failing the whole node, and the node only fails
    /// if literally none of its children survived.
    fn build_personal(
        &self,
        property: &Property,
        children: &[QueryTree],
        prefetched: &mut HashMap<TermId, Box<dyn PostingReader>>,
        term_index_map: &mut HashMap<TermId, usize>,
    ) -> BuildOutcome {
        let mut and = AndIterator::new();
        for child in children {
            if let BuildOutcome::Iterator(iter) = self.build_node(property, child, prefetched, term_index_map) {
                and.add(iter);
            }
        }
        if and.is_empty_composite() {
            BuildOutcome::Fail
        } else {
            BuildOutcome::Iterator(Box::new(and))
        }
    }

    fn build_keyword(
        &self,
        property: &Property,
        keyword: &Keyword,
        prefetched: &mut HashMap<TermId, Box<dyn PostingReader>>,
        term_index_map: &mut HashMap<TermId, usize>,
        is_rank: bool,
    ) -> BuildOutcome {
        if property.property_type != PropertyType::Str && property.is_filter {
            return self.build_numeric_keyword(property, keyword);
        }

        let term_index = Self::term_index_for(term_index_map, keyword.term_id);
        let leaf = match prefetched.remove(&keyword.term_id) {
            Some(reader) => TermDocumentIterator::from_reader(term_index, reader),
            None => {
                let mut leaf = TermDocumentIterator::new(term_index);
                match leaf.accept(self.index, self.collection_id, false, property, keyword.term_id) {
                    Ok(true) => leaf,
                    _ => return BuildOutcome::Fail,
                }
            }
        };

        let iterator: Box<dyn DocumentIterator> = if self.unigram_search_mode {
            if is_rank {
                Box::new(RankTermDocumentIterator::new(leaf))
            } else {
                Box::new(SearchTermDocumentIterator::new(leaf))
            }
        } else {
            Box::new(leaf)
        };
        BuildOutcome::Iterator(iterator)
    }

    fn build_numeric_keyword(&self, property: &Property, keyword: &Keyword) -> BuildOutcome {
        let Some(value) = PropertyValue::parse(&keyword.surface, property.property_type) else {
            return BuildOutcome::Fail;
        };

        let bitmap = match self.filter_cache {
            Some(cache) => {
                let synthetic = Predicate::new(FilteringOperation::Equal, property.name.as_str(), vec![value.clone()]);
                cache.get_or_build(&synthetic, || self.index.get_docs_by_numeric_value(self.collection_id, property, &value))
            }
            None => self.index.get_docs_by_numeric_value(self.collection_id, property, &value).map(Arc::new),
        };

        match bitmap {
            Ok(bitmap) if !bitmap.is_empty() => BuildOutcome::Iterator(Box::new(BitmapIterator::new(&bitmap))),
            _ => BuildOutcome::Fail,
        }
    }

    fn term_index_for(term_index_map: &mut HashMap<TermId, usize>, term_id: TermId) -> usize {
        let next = term_index_map.len();
        *term_index_map.entry(term_id).or_insert(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId;
    use crate::index::memory_reader::MemoryIndexReader;

    struct NoDocManager;
    impl crate::index::reader::DocumentManager for NoDocManager {
        fn get_property_value(&self, _doc: DocId, _property_name: &str) -> Option<String> {
            None
        }
    }

    fn kw(id: u64, surface: &str) -> Keyword {
        Keyword {
            term_id: TermId(id),
            surface: surface.to_string(),
        }
    }

    fn fixture() -> (MemoryIndexReader, Property) {
        let index = MemoryIndexReader::new(10);
        let body = Property::text("body", 1);
        index.add_posting(&body.name, TermId(1), DocId(1), vec![]);
        index.add_posting(&body.name, TermId(1), DocId(2), vec![]);
        index.add_posting(&body.name, TermId(2), DocId(2), vec![]);
        (index, body)
    }

    #[test]
    fn and_of_two_keywords_intersects() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::and(vec![QueryTree::Keyword(kw(1, "a")), QueryTree::Keyword(kw(2, "b"))]);
        let mut scorer = builder.prepare_iterator(&[(body, 1.0, tree)]).unwrap();
        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(2)]);
    }

    #[test]
    fn not_of_a_missing_term_does_not_kill_the_and() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::and(vec![
            QueryTree::Keyword(kw(1, "a")),
            QueryTree::not(QueryTree::Keyword(kw(999, "missing"))),
        ]);
        let mut scorer = builder.prepare_iterator(&[(body, 1.0, tree)]).unwrap();
        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(2)]);
    }

    #[test]
    fn and_with_missing_required_term_fails_entirely() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::and(vec![QueryTree::Keyword(kw(1, "a")), QueryTree::Keyword(kw(999, "missing"))]);
        assert!(builder.prepare_iterator(&[(body, 1.0, tree)]).is_none());
    }

    #[test]
    fn not_alone_at_the_root_is_rejected() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::not(QueryTree::Keyword(kw(1, "a")));
        assert!(builder.prepare_iterator(&[(body, 1.0, tree)]).is_none());
    }

    #[test]
    fn or_tolerates_a_missing_branch() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::or(vec![QueryTree::Keyword(kw(2, "b")), QueryTree::Keyword(kw(999, "missing"))]);
        let mut scorer = builder.prepare_iterator(&[(body, 1.0, tree)]).unwrap();
        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(2)]);
    }

    #[test]
    fn and_personal_keeps_surviving_children_only() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::AndPersonal(vec![QueryTree::Keyword(kw(1, "a")), QueryTree::Keyword(kw(999, "missing"))]);
        let mut scorer = builder.prepare_iterator(&[(body, 1.0, tree)]).unwrap();
        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(2)]);
    }

    #[test]
    fn numeric_keyword_leaf_uses_the_numeric_index() {
        let index = MemoryIndexReader::new(10);
        let price = Property::numeric("price", 2, PropertyType::Integer);
        index.add_numeric(&price.name, DocId(3), PropertyValue::Integer(42));
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::Keyword(kw(1, "42"));
        let mut scorer = builder.prepare_iterator(&[(price, 1.0, tree)]).unwrap();
        assert!(scorer.next());
        assert_eq!(scorer.doc(), DocId(3));
    }

    #[test]
    fn non_filter_numeric_property_does_not_use_the_numeric_branch() {
        let index = MemoryIndexReader::new(10);
        // Indexed and numeric, but not declared as a filter target — the
        // numeric-bitmap branch (`build_numeric_keyword`) must not fire for
        // it even though its type is non-`Str`.
        let score = Property {
            name: "internal_score".to_string(),
            property_id: 3,
            property_type: PropertyType::Integer,
            is_indexed: true,
            is_filter: false,
        };
        // A matching numeric literal exists in the B-tree index...
        index.add_numeric(&score.name, DocId(7), PropertyValue::Integer(42));
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager));
        let tree = QueryTree::Keyword(kw(1, "42"));
        // ...but since it's not a filter property, the builder must have
        // tried the ordinary term-posting path instead (no such posting
        // exists here), so the query yields nothing rather than doc 7.
        assert!(builder.prepare_iterator(&[(score, 1.0, tree)]).is_none());
    }

    #[test]
    fn numeric_keyword_registers_a_synthetic_equal_predicate_in_the_filter_cache() {
        let index = MemoryIndexReader::new(10);
        let price = Property::numeric("price", 2, PropertyType::Integer);
        index.add_numeric(&price.name, DocId(3), PropertyValue::Integer(42));
        let cache = FilterCache::new(8);
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager)).with_filter_cache(&cache);
        let tree = QueryTree::Keyword(kw(1, "42"));
        builder.prepare_iterator(&[(price.clone(), 1.0, tree)]).unwrap();

        let synthetic = Predicate::new(FilteringOperation::Equal, price.name.as_str(), vec![PropertyValue::Integer(42)]);
        let cached = cache.get(&synthetic).expect("numeric keyword should have populated the filter cache");
        assert!(cached.contains(DocId(3)));
    }

    #[test]
    fn exact_phrase_targets_the_unigram_alias_when_the_schema_declares_one() {
        let index = MemoryIndexReader::new(10);
        let title = Property::text("title", 1);
        let title_unigram = Property::text("title_unigram", 2);
        // "title" itself has no adjacent occurrence for these two terms...
        index.add_posting(&title.name, TermId(1), DocId(1), vec![0]);
        index.add_posting(&title.name, TermId(2), DocId(1), vec![5]);
        // ...but "title_unigram" does, so the builder must prefer the alias.
        index.add_posting(&title_unigram.name, TermId(1), DocId(1), vec![0]);
        index.add_posting(&title_unigram.name, TermId(2), DocId(1), vec![1]);

        let schema = crate::schema::schema::schema_map([title.clone(), title_unigram]);
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager)).with_schema(&schema);
        let tree = QueryTree::Exact(vec![kw(1, "quick"), kw(2, "brown")]);
        let mut scorer = builder.prepare_iterator(&[(title, 1.0, tree)]).unwrap();
        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(1)]);
    }

    #[test]
    fn unigram_search_mode_suppresses_keyword_scoring() {
        let (index, body) = fixture();
        let builder = IteratorBuilder::new(&index, 0, Arc::new(NoDocManager)).with_unigram_search_mode(true);
        let tree = QueryTree::Keyword(kw(1, "a"));
        let mut scorer = builder.prepare_iterator(&[(body, 1.0, tree)]).unwrap();
        scorer.next();
        let bm25 = crate::scoring::scorer::Bm25PropertyScorer::default();
        let stats = crate::scoring::scorer::CollectionStats { total_docs: 10 };
        assert_eq!(scorer.score(&bm25, &stats), 0.0);
    }
}
