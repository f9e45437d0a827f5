use crate::core::types::DocId;
use roaring::RoaringBitmap;

/// Run-length compressed set of document ids, backing both filter results
/// and the `FilterCache`'s cached values. Wraps `roaring::RoaringBitmap`
/// rather than hand-rolling a word-aligned bitmap the way the original
/// EWAHBoolArray did — the run-length-compression tradeoff is the same,
/// roaring just gets it from a maintained crate the rest of the corpus
/// already depends on.
#[derive(Debug, Clone, Default)]
pub struct CompressedBitmap {
    bits: RoaringBitmap,
}

impl CompressedBitmap {
    pub fn new() -> Self {
        CompressedBitmap::default()
    }

    /// The identity filter over `[1, max_doc]` — used to seed the
    /// accumulator when `FilterBuilder::prepare_filter` intersects a run of
    /// predicates, and as the "no filter at all" result.
    pub fn identity_upto(max_doc: u32) -> Self {
        let mut bits = RoaringBitmap::new();
        if max_doc > 0 {
            bits.insert_range(1..=max_doc);
        }
        CompressedBitmap { bits }
    }

    pub fn insert(&mut self, doc: DocId) -> bool {
        self.bits.insert(doc.0)
    }

    pub fn contains(&self, doc: DocId) -> bool {
        self.bits.contains(doc.0)
    }

    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn and(&self, other: &Self) -> Self {
        CompressedBitmap {
            bits: &self.bits & &other.bits,
        }
    }

    pub fn or(&self, other: &Self) -> Self {
        CompressedBitmap {
            bits: &self.bits | &other.bits,
        }
    }

    pub fn and_inplace(&mut self, other: &Self) {
        self.bits &= &other.bits;
    }

    pub fn cursor(&self) -> BitmapCursor {
        BitmapCursor {
            docs: self.bits.iter().collect(),
            pos: None,
        }
    }
}

impl FromIterator<DocId> for CompressedBitmap {
    fn from_iter<T: IntoIterator<Item = DocId>>(iter: T) -> Self {
        let mut bmp = CompressedBitmap::new();
        for doc in iter {
            bmp.insert(doc);
        }
        bmp
    }
}

/// Ascending cursor over a `CompressedBitmap`, following the same
/// doc()/next()/skip_to() contract every `DocumentIterator` follows: freshly
/// constructed it is unpositioned (`doc()` returns `DocId::NONE`) and
/// `next()`/`skip_to()` must be called before `doc()` is meaningful.
pub struct BitmapCursor {
    docs: Vec<u32>,
    pos: Option<usize>,
}

impl BitmapCursor {
    pub fn doc(&self) -> DocId {
        match self.pos {
            Some(i) => self.docs.get(i).copied().map(DocId).unwrap_or(DocId::NONE),
            None => DocId::NONE,
        }
    }

    pub fn next(&mut self) -> bool {
        let next_pos = match self.pos {
            Some(i) => i + 1,
            None => 0,
        };
        if next_pos < self.docs.len() {
            self.pos = Some(next_pos);
            true
        } else {
            self.pos = Some(self.docs.len());
            false
        }
    }

    pub fn skip_to(&mut self, target: DocId) -> bool {
        let start = self.pos.map(|i| i).unwrap_or(0);
        let idx = self.docs[start..].partition_point(|&d| d < target.0) + start;
        if idx < self.docs.len() {
            self.pos = Some(idx);
            true
        } else {
            self.pos = Some(self.docs.len());
            false
        }
    }
}
