use crate::core::error::Result;
use crate::core::types::{DocId, TermId};
use crate::index::reader::{IndexReader, PostingReader};
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use crate::schema::schema::Property;
use crate::search::iterator::{align, DocumentIterator};

/// Shared plumbing for the three phrase iterators: seek every term's
/// position-carrying posting reader up front (a phrase with a missing term
/// can never match, so construction fails fast), then repeatedly align the
/// readers onto a common doc id and test the positions at that doc.
fn seek_all(
    term_ids: &[TermId],
    property: &Property,
    index: &dyn IndexReader,
    collection_id: u32,
) -> Result<Option<Vec<Box<dyn PostingReader>>>> {
    let Some(mut term_reader) = index.get_term_reader(collection_id) else {
        return Ok(None);
    };
    let mut readers = Vec::with_capacity(term_ids.len());
    for &term_id in term_ids {
        if !term_reader.seek(property, term_id) {
            return Ok(None);
        }
        match term_reader.term_positions() {
            Some(r) => readers.push(r),
            None => return Ok(None),
        }
    }
    Ok(Some(readers))
}

fn advance_to_match(
    readers: &mut [Box<dyn PostingReader>],
    positions_match: impl Fn(&[Box<dyn PostingReader>]) -> bool,
) -> Option<DocId> {
    loop {
        if !align(readers) {
            return None;
        }
        if positions_match(readers) {
            return Some(readers[0].doc());
        }
        if !readers[0].next() {
            return None;
        }
    }
}

/// Matches documents where the terms occur consecutively and in order
/// (`"red shoes"` matches only an exact adjacent occurrence).
pub struct ExactPhraseIterator {
    readers: Vec<Box<dyn PostingReader>>,
    current: DocId,
}

impl ExactPhraseIterator {
    pub fn build(
        term_ids: &[TermId],
        property: &Property,
        index: &dyn IndexReader,
        collection_id: u32,
    ) -> Result<Option<Self>> {
        Ok(seek_all(term_ids, property, index, collection_id)?.map(|readers| ExactPhraseIterator {
            readers,
            current: DocId::NONE,
        }))
    }

    fn matches(readers: &[Box<dyn PostingReader>]) -> bool {
        let Some(first) = readers.first() else { return false };
        'candidate: for &p0 in first.positions() {
            for (i, r) in readers.iter().enumerate().skip(1) {
                if !r.positions().contains(&(p0 + i as u32)) {
                    continue 'candidate;
                }
            }
            return true;
        }
        false
    }
}

impl DocumentIterator for ExactPhraseIterator {
    fn doc(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> bool {
        if !self.current.is_none() && !self.readers[0].next() {
            self.current = DocId::NONE;
            return false;
        }
        match advance_to_match(&mut self.readers, Self::matches) {
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

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.readers[0].skip_to(target) {
            self.current = DocId::NONE;
            return false;
        }
        match advance_to_match(&mut self.readers, Self::matches) {
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

    fn df(&self) -> u64 {
        self.readers.iter().map(|r| r.doc_freq()).min().unwrap_or(0)
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let tf = self.readers.first().map(|r| r.term_freq()).unwrap_or(0);
        let df = self.df();
        scorer.score(tf, df, stats)
    }
}

/// Matches documents where the terms occur in order but not necessarily
/// adjacent — each term's position only has to be strictly after the
/// previous one's.
pub struct OrderedPhraseIterator {
    readers: Vec<Box<dyn PostingReader>>,
    current: DocId,
}

impl OrderedPhraseIterator {
    pub fn build(
        term_ids: &[TermId],
        property: &Property,
        index: &dyn IndexReader,
        collection_id: u32,
    ) -> Result<Option<Self>> {
        Ok(seek_all(term_ids, property, index, collection_id)?.map(|readers| OrderedPhraseIterator {
            readers,
            current: DocId::NONE,
        }))
    }

    fn matches(readers: &[Box<dyn PostingReader>]) -> bool {
        let Some(first) = readers.first() else { return false };
        for &p0 in first.positions() {
            let mut cursor = p0;
            let mut ok = true;
            for r in readers.iter().skip(1) {
                match r.positions().iter().filter(|&&p| p > cursor).min() {
                    Some(&p) => cursor = p,
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                return true;
            }
        }
        false
    }
}

impl DocumentIterator for OrderedPhraseIterator {
    fn doc(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> bool {
        if !self.current.is_none() && !self.readers[0].next() {
            self.current = DocId::NONE;
            return false;
        }
        match advance_to_match(&mut self.readers, Self::matches) {
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

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.readers[0].skip_to(target) {
            self.current = DocId::NONE;
            return false;
        }
        match advance_to_match(&mut self.readers, Self::matches) {
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

    fn df(&self) -> u64 {
        self.readers.iter().map(|r| r.doc_freq()).min().unwrap_or(0)
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let tf = self.readers.first().map(|r| r.term_freq()).unwrap_or(0);
        let df = self.df();
        scorer.score(tf, df, stats)
    }
}

/// Matches documents where every term occurs somewhere within a window of
/// `distance + 1` consecutive positions, in any order — computed as the
/// classic smallest-window-containing-every-distinct-value sliding window
/// over all terms' tagged positions, merged and sorted.
pub struct NearbyPhraseIterator {
    readers: Vec<Box<dyn PostingReader>>,
    distance: u32,
    current: DocId,
}

impl NearbyPhraseIterator {
    pub fn build(
        term_ids: &[TermId],
        distance: u32,
        property: &Property,
        index: &dyn IndexReader,
        collection_id: u32,
    ) -> Result<Option<Self>> {
        Ok(seek_all(term_ids, property, index, collection_id)?.map(|readers| NearbyPhraseIterator {
            readers,
            distance,
            current: DocId::NONE,
        }))
    }

    fn matches(readers: &[Box<dyn PostingReader>], distance: u32) -> bool {
        let n_terms = readers.len();
        if n_terms == 0 {
            return false;
        }
        let mut tagged: Vec<(u32, usize)> = Vec::new();
        for (i, r) in readers.iter().enumerate() {
            tagged.extend(r.positions().iter().map(|&p| (p, i)));
        }
        if tagged.len() < n_terms {
            return false;
        }
        tagged.sort_unstable();

        let window = distance + 1;
        let mut counts = vec![0usize; n_terms];
        let mut distinct = 0usize;
        let mut left = 0usize;
        for right in 0..tagged.len() {
            let (_, term_r) = tagged[right];
            if counts[term_r] == 0 {
                distinct += 1;
            }
            counts[term_r] += 1;
            while tagged[right].0 - tagged[left].0 + 1 > window {
                let (_, term_l) = tagged[left];
                counts[term_l] -= 1;
                if counts[term_l] == 0 {
                    distinct -= 1;
                }
                left += 1;
            }
            if distinct == n_terms {
                return true;
            }
        }
        false
    }
}

impl DocumentIterator for NearbyPhraseIterator {
    fn doc(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> bool {
        if !self.current.is_none() && !self.readers[0].next() {
            self.current = DocId::NONE;
            return false;
        }
        let distance = self.distance;
        match advance_to_match(&mut self.readers, |r| Self::matches(r, distance)) {
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

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.readers[0].skip_to(target) {
            self.current = DocId::NONE;
            return false;
        }
        let distance = self.distance;
        match advance_to_match(&mut self.readers, |r| Self::matches(r, distance)) {
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

    fn df(&self) -> u64 {
        self.readers.iter().map(|r| r.doc_freq()).min().unwrap_or(0)
    }

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        let tf = self.readers.first().map(|r| r.term_freq()).unwrap_or(0);
        let df = self.df();
        scorer.score(tf, df, stats)
    }
}
