//! Typed seam for the recommender subsystem's storage boundary. Grounded in
//! `CassandraAdaptor.cpp`'s actual surface (`remove`, `getColumns`,
//! single-column-family-per-instance) — no Cassandra/Thrift client, no
//! column-family DDL; a concrete adaptor implementing this trait owns that.

use crate::core::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: Vec<u8>,
}

pub trait WideColumnStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<Column>>;
    fn put(&self, key: &str, columns: Vec<Column>) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    struct InMemoryColumnFamily {
        rows: RwLock<HashMap<String, Vec<Column>>>,
    }

    impl WideColumnStore for InMemoryColumnFamily {
        fn get(&self, key: &str) -> Result<Vec<Column>> {
            Ok(self.rows.read().get(key).cloned().unwrap_or_default())
        }

        fn put(&self, key: &str, columns: Vec<Column>) -> Result<()> {
            self.rows.write().insert(key.to_string(), columns);
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.rows.write().remove(key);
            Ok(())
        }
    }

    #[test]
    fn trait_is_object_safe_and_round_trips() {
        let store: Box<dyn WideColumnStore> = Box::new(InMemoryColumnFamily {
            rows: RwLock::new(HashMap::new()),
        });
        store
            .put(
                "doc:1",
                vec![Column {
                    name: "title".to_string(),
                    value: b"shoes".to_vec(),
                }],
            )
            .unwrap();
        assert_eq!(store.get("doc:1").unwrap().len(), 1);
        store.remove("doc:1").unwrap();
        assert!(store.get("doc:1").unwrap().is_empty());
    }
}
