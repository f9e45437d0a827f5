/// Construction-time settings for the query-evaluation core. Loading these
/// from a file or environment is left to the embedder; this is a plain
/// `Default`-able value type.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity (entry count) of the `FilterCache` LRU.
    pub filter_cache_size: usize,
    /// Default capacity hint for a query's per-property weight map.
    pub property_weight_map_hint: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filter_cache_size: 4096,
            property_weight_map_hint: 8,
        }
    }
}
