//! Title/brand/model similarity reranker over a product forward index —
//! a per-document title cache kept purely to support `forward_search`,
//! separate from (and much smaller than) the full index.

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::io::Write;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

struct ForwardIndexInner {
    /// Index 0 is an unused empty-string sentinel; document titles live at
    /// `entries[doc_id]`.
    entries: Vec<String>,
    last_doc_id: u32,
}

/// Append-only, watermark-tracked store of per-document title strings,
/// persisted as `forward.dict` (one line per doc) and `forward.size` (the
/// watermark). `save` only appends the suffix past the previous watermark,
/// matching the original's incremental-rebuild posture; unlike the original,
/// the watermark file is rewritten atomically (write-to-tempfile-then-rename)
/// rather than truncated in place, so a crash mid-save can't leave
/// `forward.size` pointing past a `forward.dict` that was never extended.
pub struct ForwardIndex {
    inner: RwLock<ForwardIndexInner>,
    dir: PathBuf,
}

impl ForwardIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ForwardIndex {
            inner: RwLock::new(ForwardIndexInner {
                entries: vec![String::new()],
                last_doc_id: 0,
            }),
            dir: dir.into(),
        }
    }

    fn dict_path(&self) -> PathBuf {
        self.dir.join("forward.dict")
    }

    fn size_path(&self) -> PathBuf {
        self.dir.join("forward.size")
    }

    /// Loads a previously saved index. Returns `false` (not an error) if
    /// either file is missing, or if the dictionary's line count doesn't
    /// match the watermark — a mismatch means a prior save was interrupted.
    pub fn load(&self) -> Result<bool> {
        let dict_path = self.dict_path();
        let size_path = self.size_path();
        if !dict_path.exists() || !size_path.exists() {
            return Ok(false);
        }

        let last_doc_id: u32 = std::fs::read_to_string(&size_path)?
            .trim()
            .parse()
            .map_err(|_| Error::new(ErrorKind::Parse, "forward.size does not contain a valid document count"))?;

        let mut entries = Vec::with_capacity(last_doc_id as usize + 1);
        entries.push(String::new());
        for line in std::fs::read_to_string(&dict_path)?.lines() {
            entries.push(line.to_string());
        }
        if entries.len() as u32 != last_doc_id + 1 {
            return Ok(false);
        }

        let mut inner = self.inner.write();
        inner.entries = entries;
        inner.last_doc_id = last_doc_id;
        Ok(true)
    }

    /// Appends every entry added since the last save, then advances the
    /// watermark to `last_doc`.
    pub fn save(&self, last_doc: u32) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut size_file = tempfile::NamedTempFile::new_in(&self.dir)?;
        write!(size_file, "{last_doc}")?;
        size_file
            .persist(self.size_path())
            .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?;

        let mut inner = self.inner.write();
        let mut dict_file = std::fs::OpenOptions::new().create(true).append(true).open(self.dict_path())?;
        for i in (inner.last_doc_id + 1) as usize..inner.entries.len() {
            writeln!(dict_file, "{}", inner.entries[i])?;
        }
        inner.last_doc_id = last_doc;
        Ok(())
    }

    pub fn resize(&self, size: usize) {
        self.inner.write().entries.resize(size, String::new());
    }

    pub fn set(&self, doc_id: DocId, title: String) {
        let mut inner = self.inner.write();
        let idx = doc_id.0 as usize;
        if idx >= inner.entries.len() {
            inner.entries.resize(idx + 1, String::new());
        }
        inner.entries[idx] = title;
    }

    pub fn get(&self, doc_id: DocId) -> String {
        let inner = self.inner.read();
        if (doc_id.0) < inner.last_doc_id && (doc_id.0 as usize) < inner.entries.len() {
            inner.entries[doc_id.0 as usize].clone()
        } else {
            String::new()
        }
    }

    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.entries = vec![String::new()];
        inner.last_doc_id = 0;
        for path in [self.dict_path(), self.size_path()] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Extracts brand id, model id, and a sorted list of feature term ids from a
/// product title. Term ids must come back sorted ascending — `compare`'s
/// merge-intersection relies on it, exactly as the two-pointer scan in
/// `ProductForwardManager::compare_` does. Tokenization itself (turning a
/// title string into ids) lives entirely with the caller.
pub trait BrandModelTokenizer: Send + Sync {
    fn feature_terms(&self, text: &str) -> (u32, u32, Vec<u32>);
}

/// Reranks candidate documents against a query string by brand/model/title
/// similarity. Not used by the core query-evaluation path; a caller sits it
/// downstream of `MultiPropertyScorer` to break ties among otherwise
/// similarly-scored results.
pub struct ForwardSimilarity {
    index: Arc<ForwardIndex>,
    tokenizer: Arc<dyn BrandModelTokenizer>,
}

impl ForwardSimilarity {
    pub fn new(index: Arc<ForwardIndex>, tokenizer: Arc<dyn BrandModelTokenizer>) -> Self {
        ForwardSimilarity { index, tokenizer }
    }

    /// Picks the single best-matching candidate for `query_text`, the way
    /// the original always returns exactly one result regardless of how
    /// many candidates it was given — this reranker answers "which of these
    /// is the match", not "rank all of these".
    pub fn forward_search(&self, query_text: &str, candidates: &[DocId]) -> Option<(DocId, f32)> {
        if query_text.is_empty() || candidates.is_empty() {
            return None;
        }
        let (q_brand, q_model, q_terms) = self.tokenizer.feature_terms(query_text);
        let q_score: f64 = (1..=q_terms.len()).map(|i| (i * i) as f64).sum();

        candidates
            .iter()
            .map(|&doc| (doc, self.compare(q_brand, q_model, &q_terms, q_score, doc)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    }

    fn compare(&self, q_brand: u32, q_model: u32, q_terms: &[u32], q_score: f64, doc: DocId) -> f32 {
        let title = self.index.get(doc);
        let (t_brand, t_model, t_terms) = self.tokenizer.feature_terms(&title);

        let mut score = 0.0f64;
        if q_brand == t_brand && q_brand > 0 {
            if q_model == t_model && q_model > 0 {
                return 2.0;
            }
            score += 0.5;
        }
        if q_terms.is_empty() || t_terms.is_empty() {
            return score as f32;
        }

        let t_score: f64 = (1..=t_terms.len()).map(|i| (i * i) as f64).sum();
        let mut same = 0.0f64;
        let (mut p, mut q) = (0usize, 0usize);
        while p < q_terms.len() && q < t_terms.len() {
            match q_terms[p].cmp(&t_terms[q]) {
                Ordering::Less => p += 1,
                Ordering::Greater => q += 1,
                Ordering::Equal => {
                    same += ((q_terms.len() - p + 1) * (t_terms.len() - q + 1)) as f64;
                    p += 1;
                    q += 1;
                }
            }
        }
        if t_score > 1e-7 && q_score > 1e-7 {
            score += same / (t_score * q_score).sqrt();
        }
        score as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTokenizer;
    impl BrandModelTokenizer for FixedTokenizer {
        fn feature_terms(&self, text: &str) -> (u32, u32, Vec<u32>) {
            match text {
                "nike air max size 10" => (1, 2, vec![10, 20, 30]),
                "nike air max size 9" => (1, 2, vec![10, 20, 40]),
                "adidas ultraboost" => (3, 4, vec![50, 60]),
                _ => (0, 0, vec![]),
            }
        }
    }

    #[test]
    fn brand_and_model_match_scores_maximally() {
        let index = Arc::new(ForwardIndex::new(Path::new("/tmp")));
        index.set(DocId(1), "nike air max size 10".to_string());
        index.resize(3);
        // fake last_doc_id high enough that get() serves the entry
        index.inner.write().last_doc_id = 5;

        let similarity = ForwardSimilarity::new(index, Arc::new(FixedTokenizer));
        let (doc, score) = similarity.forward_search("nike air max size 10", &[DocId(1)]).unwrap();
        assert_eq!(doc, DocId(1));
        assert_eq!(score, 2.0);
    }

    #[test]
    fn picks_the_closer_title_among_candidates() {
        let index = Arc::new(ForwardIndex::new(Path::new("/tmp")));
        index.resize(3);
        index.set(DocId(1), "nike air max size 9".to_string());
        index.set(DocId(2), "adidas ultraboost".to_string());
        index.inner.write().last_doc_id = 5;

        let similarity = ForwardSimilarity::new(index, Arc::new(FixedTokenizer));
        let (doc, _) = similarity.forward_search("nike air max size 10", &[DocId(1), DocId(2)]).unwrap();
        assert_eq!(doc, DocId(1));
    }

    #[test]
    fn save_then_load_round_trips_through_the_watermark() {
        let tmp = tempfile::tempdir().unwrap();
        let index = ForwardIndex::new(tmp.path());
        index.resize(1);
        index.set(DocId(1), "first title".to_string());
        index.save(1).unwrap();

        let reloaded = ForwardIndex::new(tmp.path());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get(DocId(1)), "first title");
    }
}
