use crate::core::types::DocId;
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use crate::search::iterator::{align, DocumentIterator};

/// Intersection of its required children, with an optional set of
/// prohibited children excluded from the result. Also backs `AND_PERSONAL`
/// / `OR_PERSONAL` (both use plain AND semantics at the iterator level; the
/// distinction between them is purely a builder-time tolerance policy, not
/// a different runtime algebra — see `crate::query::builder`).
///
/// `add`ing a child whose `is_not()` is true routes it into the prohibited
/// set instead of the required set — this is how `NOT` attaches to its
/// enclosing conjunction (`NOT` has no independent doc-id sequence of its
/// own to intersect against; it only ever excludes from a sibling's).
#[derive(Default)]
pub struct AndIterator {
    required: Vec<Box<dyn DocumentIterator>>,
    prohibited: Vec<Box<dyn DocumentIterator>>,
    current: DocId,
    started: bool,
}

impl AndIterator {
    pub fn new() -> Self {
        AndIterator::default()
    }

    fn excluded(&mut self, target: DocId) -> bool {
        for p in &mut self.prohibited {
            if p.doc() < target {
                p.skip_to(target);
            }
            if p.doc() == target {
                return true;
            }
        }
        false
    }

    fn advance(&mut self) -> bool {
        loop {
            if !align(&mut self.required) {
                self.current = DocId::NONE;
                return false;
            }
            let candidate = self.required[0].doc();
            if self.excluded(candidate) {
                if !self.required[0].next() {
                    self.current = DocId::NONE;
                    return false;
                }
                continue;
            }
            self.current = candidate;
            return true;
        }
    }
}

impl DocumentIterator for AndIterator {
    fn doc(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> bool {
        if self.required.is_empty() {
            return false;
        }
        if !self.started {
            self.started = true;
            if self.required[0].doc().is_none() && !self.required[0].next() {
                self.current = DocId::NONE;
                return false;
            }
        } else if !self.required[0].next() {
            self.current = DocId::NONE;
            return false;
        }
        self.advance()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if self.required.is_empty() {
            return false;
        }
        self.started = true;
        if !self.required[0].skip_to(target) {
            self.current = DocId::NONE;
            return false;
        }
        self.advance()
    }

    fn df(&self) -> u64 {
        self.required.iter().map(|c| c.df()).min().unwrap_or(0)
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let current = self.current;
        self.required
            .iter_mut()
            .filter(|c| c.doc() == current)
            .map(|c| c.score(scorer, stats))
            .sum()
    }

    fn add(&mut self, child: Box<dyn DocumentIterator>) {
        if child.is_not() {
            self.prohibited.push(child);
        } else {
            self.required.push(child);
        }
    }

    fn is_empty_composite(&self) -> bool {
        self.required.is_empty()
    }
}

/// Union of its children: advances whichever children sat at the previous
/// candidate, then yields the new minimum doc id across all of them.
#[derive(Default)]
pub struct OrIterator {
    children: Vec<Box<dyn DocumentIterator>>,
    current: DocId,
    started: bool,
}

impl OrIterator {
    pub fn new() -> Self {
        OrIterator::default()
    }

    fn recompute_min(&mut self) -> bool {
        let min = self
            .children
            .iter()
            .map(|c| c.doc())
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
}

impl DocumentIterator for OrIterator {
    fn doc(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> bool {
        if self.children.is_empty() {
            return false;
        }
        if !self.started {
            self.started = true;
            for c in &mut self.children {
                c.next();
            }
        } else {
            let current = self.current;
            for c in &mut self.children {
                if c.doc() == current {
                    c.next();
                }
            }
        }
        self.recompute_min()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.started = true;
        for c in &mut self.children {
            if c.doc() < target {
                c.skip_to(target);
            }
        }
        self.recompute_min()
    }

    fn df(&self) -> u64 {
        self.children.iter().map(|c| c.df()).sum()
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let current = self.current;
        self.children
            .iter_mut()
            .filter(|c| c.doc() == current)
            .map(|c| c.score(scorer, stats))
            .sum()
    }

    fn add(&mut self, child: Box<dyn DocumentIterator>) {
        self.children.push(child);
    }

    fn is_empty_composite(&self) -> bool {
        self.children.is_empty()
    }
}

/// Negates a single child: delegates the cursor entirely (so an enclosing
/// `AndIterator` can walk its doc-id sequence to test exclusion) but never
/// contributes to ranking, and flags itself via `is_not()` so `add()` on the
/// parent routes it into the prohibited set instead of intersecting it.
pub struct NotIterator {
    inner: Box<dyn DocumentIterator>,
}

impl NotIterator {
    pub fn new(inner: Box<dyn DocumentIterator>) -> Self {
        NotIterator { inner }
    }
}

impl DocumentIterator for NotIterator {
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

    fn is_not(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bitmap::CompressedBitmap;
    use crate::scoring::scorer::Bm25PropertyScorer;
    use crate::search::leaf::BitmapIterator;

    fn bmp(docs: &[u32]) -> CompressedBitmap {
        docs.iter().map(|&d| DocId(d)).collect()
    }

    #[test]
    fn and_intersects_required_children() {
        let mut and = AndIterator::new();
        and.add(Box::new(BitmapIterator::new(&bmp(&[1, 2, 3, 4]))));
        and.add(Box::new(BitmapIterator::new(&bmp(&[2, 4, 6]))));

        let mut hits = Vec::new();
        while and.next() {
            hits.push(and.doc());
        }
        assert_eq!(hits, vec![DocId(2), DocId(4)]);
    }

    #[test]
    fn and_excludes_prohibited_children() {
        let mut and = AndIterator::new();
        and.add(Box::new(BitmapIterator::new(&bmp(&[1, 2, 3, 4]))));
        and.add(Box::new(NotIterator::new(Box::new(BitmapIterator::new(&bmp(&[2]))))));

        let mut hits = Vec::new();
        while and.next() {
            hits.push(and.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(3), DocId(4)]);
    }

    #[test]
    fn and_with_no_required_children_is_empty() {
        let and = AndIterator::new();
        assert!(and.is_empty_composite());
    }

    #[test]
    fn or_unions_children() {
        let mut or = OrIterator::new();
        or.add(Box::new(BitmapIterator::new(&bmp(&[1, 3]))));
        or.add(Box::new(BitmapIterator::new(&bmp(&[2, 3, 5]))));

        let mut hits = Vec::new();
        while or.next() {
            hits.push(or.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(2), DocId(3), DocId(5)]);
    }

    #[test]
    fn or_score_sums_matching_children_only() {
        let mut or = OrIterator::new();
        or.add(Box::new(BitmapIterator::new(&bmp(&[1]))));
        or.add(Box::new(BitmapIterator::new(&bmp(&[1, 2]))));
        let scorer = Bm25PropertyScorer::default();
        let stats = CollectionStats { total_docs: 100 };

        or.next();
        assert_eq!(or.doc(), DocId(1));
        let score_at_1 = or.score(&scorer, &stats);

        or.next();
        assert_eq!(or.doc(), DocId(2));
        let score_at_2 = or.score(&scorer, &stats);

        assert!(score_at_1 > score_at_2);
    }

    #[test]
    fn skip_to_aligns_and_composite() {
        let mut and = AndIterator::new();
        and.add(Box::new(BitmapIterator::new(&bmp(&[1, 5, 10]))));
        and.add(Box::new(BitmapIterator::new(&bmp(&[5, 7, 10]))));
        assert!(and.skip_to(DocId(3)));
        assert_eq!(and.doc(), DocId(5));
    }
}
