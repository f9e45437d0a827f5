pub mod builder;
pub mod filter;
pub mod filter_cache;
pub mod predicate;
pub mod tree;
