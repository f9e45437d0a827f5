use crate::core::types::DocId;
use crate::index::reader::PostingReader;
use crate::scoring::scorer::{CollectionStats, PropertyScorer};

/// The single contract every node in a compiled query tree implements,
/// leaf and composite alike. Positioning follows the usual postings-cursor
/// convention: a freshly built iterator is unpositioned (`doc()` returns
/// `DocId::NONE`); `next()`/`skip_to()` must be called at least once before
/// `doc()` is meaningful, and both return `false` once the iterator is
/// exhausted (at which point `doc()` goes back to `DocId::NONE`).
pub trait DocumentIterator: Send {
    fn doc(&self) -> DocId;
    fn next(&mut self) -> bool;
    fn skip_to(&mut self, target: DocId) -> bool;

    /// Document frequency: the term's df for a leaf, and for composites
    /// whatever their own combination implies (min for AND, sum for OR) —
    /// an upper-bound estimate used for cost ordering and ranking, not a
    /// promise of exact cardinality.
    fn df(&self) -> u64;

    /// Per-property contribution at the current position. Leaves score
    /// their own term occurrence; composites combine their matching
    /// children's scores. Exhausted/unpositioned iterators return `0.0`.
    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32;

    /// Attaches `child` as a contributing/excluding member of this
    /// iterator. Only composites override this; calling it on a leaf is a
    /// builder error and panics (leaves never receive children).
    fn add(&mut self, _child: Box<dyn DocumentIterator>) {
        unreachable!("add() called on a leaf DocumentIterator");
    }

    /// `true` if this node was built but ended up with no contributing
    /// children at all (an `AND`/`OR`/personalized composite with zero
    /// surviving members) — `IteratorBuilder` drops these rather than
    /// attaching them to their parent.
    fn is_empty_composite(&self) -> bool {
        false
    }

    /// `true` for a leaf built to negate, rather than match, its term —
    /// composites route these into their prohibited set instead of their
    /// required set when `add`ed.
    fn is_not(&self) -> bool {
        false
    }
}

/// Small internal seam so the doc/skip_to alignment loop (the textbook
/// "conjunction" merge) can run over either a `DocumentIterator` tree or a
/// bare `PostingReader` list without writing it twice — `AndIterator` aligns
/// children of the former; phrase iterators align readers of the latter.
pub(crate) trait Advance {
    fn cur_doc(&self) -> DocId;
    fn step_to(&mut self, target: DocId) -> bool;
}

impl Advance for Box<dyn DocumentIterator> {
    fn cur_doc(&self) -> DocId {
        self.doc()
    }

    fn step_to(&mut self, target: DocId) -> bool {
        self.skip_to(target)
    }
}

impl Advance for Box<dyn PostingReader> {
    fn cur_doc(&self) -> DocId {
        self.doc()
    }

    fn step_to(&mut self, target: DocId) -> bool {
        self.skip_to(target)
    }
}

/// Aligns every item in `items` onto the same document id, advancing
/// whichever lags behind. Returns `false` (leaving items misaligned, at
/// whatever doc each one happened to stop on) the moment any item is
/// exhausted — callers treat that as "no more matches".
pub(crate) fn align<T: Advance>(items: &mut [T]) -> bool {
    if items.is_empty() {
        return false;
    }
    let n = items.len();
    let mut target = items[0].cur_doc();
    if target.is_none() {
        return false;
    }
    let mut i = 1;
    while i < n {
        let d = items[i].cur_doc();
        if d.is_none() {
            return false;
        }
        if d < target {
            if !items[i].step_to(target) {
                return false;
            }
            i += 1;
        } else if d > target {
            target = d;
            if !items[0].step_to(target) {
                return false;
            }
            i = 1;
        } else {
            i += 1;
        }
    }
    true
}
