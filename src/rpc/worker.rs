//! A thin remote-worker facade: the subset of interfaces a search node
//! would expose to an aggregator (in-process today; over an RPC transport
//! in a distributed deployment). No transport, serialization framing, or
//! cluster membership lives here — `SearchRequest`/`SearchResponse` just
//! derive `serde` so whatever transport is layered on top has something to
//! encode.

use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::reader::{DocumentManager, IndexReader};
use crate::query::builder::IteratorBuilder;
use crate::query::filter::FilterBuilder;
use crate::query::predicate::Predicate;
use crate::query::tree::QueryTree;
use crate::schema::schema::{Property, SchemaMap};
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub collection_id: u32,
    pub predicates: Vec<Predicate>,
    pub queries: Vec<(Property, f32, QueryTree)>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<ScoredDocument>,
    pub total_matched: u64,
}

/// Worker services an aggregator calls, in-process or remote. Grounded in
/// `SearchWorker.h`'s public surface, narrowed to the query-evaluation
/// subset (`doLocalSearch`/`getDocumentsByIds`) — everything else on the
/// original (similar-doc lists, click tracking, question answering) belongs
/// to other bundles this crate doesn't implement.
pub trait SearchWorker: Send + Sync {
    fn search(&self, request: SearchRequest) -> Result<SearchResponse>;
    fn get_documents_by_ids(&self, doc_ids: &[DocId], property_name: &str) -> Result<Vec<Option<String>>>;
}

/// In-procedure implementation: wires `FilterBuilder` + `IteratorBuilder`
/// straight to an `IndexReader`, with no aggregation across shards. Stands
/// in for what `SearchWorker` would be behind a real RPC transport in a
/// sharded deployment.
pub struct LocalSearchWorker {
    index: Arc<dyn IndexReader>,
    schema: SchemaMap,
    filter_builder: Arc<FilterBuilder>,
    doc_manager: Arc<dyn DocumentManager>,
    scorer: Arc<dyn PropertyScorer>,
}

impl LocalSearchWorker {
    pub fn new(
        index: Arc<dyn IndexReader>,
        schema: SchemaMap,
        filter_builder: Arc<FilterBuilder>,
        doc_manager: Arc<dyn DocumentManager>,
        scorer: Arc<dyn PropertyScorer>,
    ) -> Self {
        LocalSearchWorker {
            index,
            schema,
            filter_builder,
            doc_manager,
            scorer,
        }
    }
}

impl SearchWorker for LocalSearchWorker {
    fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let filter = self
            .filter_builder
            .prepare_filter(self.index.as_ref(), &self.schema, &request.predicates)?;

        let builder = IteratorBuilder::new(self.index.as_ref(), request.collection_id, self.doc_manager.clone())
            .with_schema(&self.schema)
            .with_filter_cache(self.filter_builder.cache());
        let Some(mut scorer_tree) = builder.prepare_iterator(&request.queries) else {
            return Ok(SearchResponse::default());
        };

        let stats = CollectionStats {
            total_docs: self.index.max_doc() as u64,
        };
        let mut hits = Vec::new();
        while scorer_tree.next() {
            let doc = scorer_tree.doc();
            if !filter.bitmap.contains(doc) {
                continue;
            }
            let score = scorer_tree.score(self.scorer.as_ref(), &stats);
            hits.push(ScoredDocument { doc_id: doc, score });
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let total_matched = hits.len() as u64;
        let page = hits.into_iter().skip(request.offset).take(request.limit).collect();
        Ok(SearchResponse { hits: page, total_matched })
    }

    fn get_documents_by_ids(&self, doc_ids: &[DocId], property_name: &str) -> Result<Vec<Option<String>>> {
        Ok(doc_ids
            .iter()
            .map(|&doc| self.doc_manager.get_property_value(doc, property_name))
            .collect())
    }
}
