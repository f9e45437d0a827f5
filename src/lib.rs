//! Query-evaluation core of a sharded full-text search engine: compiles
//! filter predicates into compressed-bitmap document sets (cached) and
//! query trees into scored, lazily-advanced document iterators.
//!
//! `crate::query::filter` and `crate::query::builder` are the two entry
//! points; everything else in `crate::search`/`crate::index` is plumbing
//! those two assemble. `crate::mining`, `crate::rpc`, and `crate::storage`
//! are peripheral collaborator seams (similarity reranking, the remote
//! worker facade, and the recommender's storage boundary) referenced only
//! by type, not exercised by the query-evaluation path itself.

pub mod core;
pub mod index;
pub mod mining;
pub mod query;
pub mod rpc;
pub mod schema;
pub mod scoring;
pub mod search;
pub mod storage;
