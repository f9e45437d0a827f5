use crate::core::types::DocId;
use crate::schema::schema::Property;
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use crate::search::iterator::DocumentIterator;

struct PropertyEntry {
    property: Property,
    weight: f32,
    iterator: Box<dyn DocumentIterator>,
}

/// Synchronizes the per-property iterator trees `IteratorBuilder` produced
/// (one per queried property) on a common candidate document id and
/// linearly combines their per-property scores, weighted. A document
/// matches the overall query if it matches under *any* property — different
/// properties can legitimately be satisfied by different documents (a
/// keyword matching in `title` vs. the same keyword matching in `body`), so
/// this runs union semantics across the property iterators themselves.
pub struct MultiPropertyScorer {
    properties: Vec<PropertyEntry>,
    current: DocId,
    started: bool,
}

impl MultiPropertyScorer {
    pub fn new() -> Self {
        MultiPropertyScorer {
            properties: Vec::new(),
            current: DocId::NONE,
            started: false,
        }
    }

    pub fn add(&mut self, property: Property, weight: f32, iterator: Box<dyn DocumentIterator>) {
        self.properties.push(PropertyEntry {
            property,
            weight,
            iterator,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn doc(&self) -> DocId {
        self.current
    }

    pub fn next(&mut self) -> bool {
        if self.properties.is_empty() {
            return false;
        }
        if !self.started {
            self.started = true;
            for entry in &mut self.properties {
                entry.iterator.next();
            }
        } else {
            let current = self.current;
            for entry in &mut self.properties {
                if entry.iterator.doc() == current {
                    entry.iterator.next();
                }
            }
        }
        self.recompute_min()
    }

    pub fn skip_to(&mut self, target: DocId) -> bool {
        self.started = true;
        for entry in &mut self.properties {
            if entry.iterator.doc() < target {
                entry.iterator.skip_to(target);
            }
        }
        self.recompute_min()
    }

    fn recompute_min(&mut self) -> bool {
        let min = self
            .properties
            .iter()
            .map(|e| e.iterator.doc())
            .filter(|d| !d.is_none())
            .min();
        match min {
            Some(d) => {
                self.current = d;
                true
            }
            None => {
                self.current = DocId::NONE;
                false
            }
        }
    }

    /// The property names that matched at the current document, for callers
    /// that want to explain a hit rather than just rank it.
    pub fn matching_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|e| e.iterator.doc() == self.current)
            .map(|e| e.property.name.as_str())
            .collect()
    }

    pub fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let current = self.current;
        self.properties
            .iter_mut()
            .filter(|e| e.iterator.doc() == current)
            .map(|e| e.weight * e.iterator.score(scorer, stats))
            .sum()
    }
}

impl Default for MultiPropertyScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PropertyType;
    use crate::index::bitmap::CompressedBitmap;
    use crate::scoring::scorer::Bm25PropertyScorer;
    use crate::search::leaf::BitmapIterator;

    fn bmp(docs: &[u32]) -> CompressedBitmap {
        docs.iter().map(|&d| DocId(d)).collect()
    }

    #[test]
    fn unions_across_properties() {
        let mut scorer = MultiPropertyScorer::new();
        scorer.add(
            Property::text("title", 1),
            2.0,
            Box::new(BitmapIterator::new(&bmp(&[1, 3]))),
        );
        scorer.add(
            Property::numeric("price", 2, PropertyType::Integer),
            1.0,
            Box::new(BitmapIterator::new(&bmp(&[2]))),
        );

        let mut hits = Vec::new();
        while scorer.next() {
            hits.push(scorer.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(2), DocId(3)]);
    }

    #[test]
    fn weight_scales_contribution() {
        let mut scorer = MultiPropertyScorer::new();
        scorer.add(Property::text("title", 1), 3.0, Box::new(BitmapIterator::new(&bmp(&[1]))));
        scorer.next();
        let bm25 = Bm25PropertyScorer::default();
        let stats = CollectionStats { total_docs: 10 };
        let weighted = scorer.score(&bm25, &stats);
        assert!(weighted > 0.0);
    }
}
