use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::bitmap::CompressedBitmap;
use crate::index::reader::DocumentManager;
use crate::query::tree::WildcardToken;
use crate::scoring::scorer::{CollectionStats, PropertyScorer};
use crate::search::composite::{AndIterator, OrIterator};
use crate::search::iterator::DocumentIterator;
use regex::Regex;
use std::sync::Arc;

/// Unions the postings of a trie-prefix wildcard's expansion, capped to the
/// five most frequent candidate terms — a wide prefix like `"comp*"` can
/// expand to thousands of dictionary terms, and beyond the handful with real
/// document frequency the rest contribute noise, not recall.
pub struct TrieWildcardIterator {
    inner: OrIterator,
}

impl TrieWildcardIterator {
    /// Builds from already-constructed per-candidate leaf iterators, sorting
    /// by document frequency (descending) and keeping at most five. Returns
    /// `None` if every candidate failed to build (an empty expansion).
    pub fn build(mut candidates: Vec<Box<dyn DocumentIterator>>) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by_key(|c| std::cmp::Reverse(c.df()));
        candidates.truncate(5);
        let mut inner = OrIterator::new();
        for c in candidates {
            inner.add(c);
        }
        Some(TrieWildcardIterator { inner })
    }
}

impl DocumentIterator for TrieWildcardIterator {
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

    fn score(&mut self, scorer: &dyn PropertyScorer, stats: &CollectionStats) -> f32 {
        self.inner.score(scorer, stats)
    }

    fn is_empty_composite(&self) -> bool {
        self.inner.is_empty_composite()
    }
}

/// Matches a mixed sequence of literal keywords and `*`/`?` placeholders
/// against a document's raw content for one property, consulting the
/// `DocumentManager` collaborator. Candidate documents are narrowed first by
/// intersecting the postings of every literal keyword in the sequence (an
/// `AndIterator` over the resolved terms); each candidate is then tested
/// against a regex built from the pattern (`*` -> `.*`, `?` -> `.`, literals
/// escaped) the same way the ordinary single-string wildcard match works.
pub struct UnigramWildcardIterator {
    candidates: Box<dyn DocumentIterator>,
    pattern: Regex,
    property_name: String,
    doc_manager: Arc<dyn DocumentManager>,
}

impl UnigramWildcardIterator {
    pub fn build(
        tokens: &[WildcardToken],
        keyword_leaves: Vec<Box<dyn DocumentIterator>>,
        property_name: &str,
        max_doc: u32,
        doc_manager: Arc<dyn DocumentManager>,
    ) -> Result<Self> {
        let candidates: Box<dyn DocumentIterator> = if keyword_leaves.is_empty() {
            Box::new(crate::search::leaf::BitmapIterator::new(&CompressedBitmap::identity_upto(
                max_doc,
            )))
        } else {
            let mut and = AndIterator::new();
            for leaf in keyword_leaves {
                and.add(leaf);
            }
            Box::new(and)
        };

        let mut pattern = String::new();
        for token in tokens {
            match token {
                WildcardToken::Keyword(k) => pattern.push_str(&regex::escape(&k.surface)),
                WildcardToken::Asterisk => pattern.push_str(".*"),
                WildcardToken::QuestionMark => pattern.push('.'),
            }
        }
        let pattern = Regex::new(&format!("^{pattern}$"))
            .map_err(|e| crate::core::error::Error::new(crate::core::error::ErrorKind::Parse, e.to_string()))?;

        Ok(UnigramWildcardIterator {
            candidates,
            pattern,
            property_name: property_name.to_string(),
            doc_manager,
        })
    }

    fn current_matches(&self) -> bool {
        let doc = self.candidates.doc();
        if doc.is_none() {
            return false;
        }
        match self.doc_manager.get_property_value(doc, &self.property_name) {
            Some(content) => self.pattern.is_match(&content),
            None => false,
        }
    }

    fn advance_to_match(&mut self) -> bool {
        while !self.candidates.doc().is_none() {
            if self.current_matches() {
                return true;
            }
            if !self.candidates.next() {
                return false;
            }
        }
        false
    }
}

impl DocumentIterator for UnigramWildcardIterator {
    fn doc(&self) -> DocId {
        self.candidates.doc()
    }

    fn next(&mut self) -> bool {
        if !self.candidates.next() {
            return false;
        }
        self.advance_to_match()
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.candidates.skip_to(target) {
            return false;
        }
        self.advance_to_match()
    }

    fn df(&self) -> u64 {
        self.candidates.df()
    }

    fn score(&mut self, _scorer: &dyn PropertyScorer, _stats: &CollectionStats) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tree::Keyword;
    use std::collections::HashMap;

    struct FixedDocumentManager(HashMap<u32, String>);
    impl DocumentManager for FixedDocumentManager {
        fn get_property_value(&self, doc: DocId, _property_name: &str) -> Option<String> {
            self.0.get(&doc.0).cloned()
        }
    }

    fn bmp(docs: &[u32]) -> CompressedBitmap {
        docs.iter().map(|&d| DocId(d)).collect()
    }

    #[test]
    fn trie_wildcard_caps_to_five_most_frequent() {
        let candidates: Vec<Box<dyn DocumentIterator>> = (1..=8u32)
            .map(|i| Box::new(crate::search::leaf::BitmapIterator::new(&bmp(&(1..=i).collect::<Vec<_>>()))) as Box<dyn DocumentIterator>)
            .collect();
        let wildcard = TrieWildcardIterator::build(candidates).unwrap();
        // the 5 largest bitmaps have sizes 8,7,6,5,4 -> union df upper bound is their sum
        assert_eq!(wildcard.df(), 8 + 7 + 6 + 5 + 4);
    }

    #[test]
    fn empty_expansion_returns_none() {
        assert!(TrieWildcardIterator::build(Vec::new()).is_none());
    }

    #[test]
    fn unigram_wildcard_matches_candidate_content() {
        let mut docs = HashMap::new();
        docs.insert(1, "apple".to_string());
        docs.insert(2, "apricot".to_string());
        let manager: Arc<dyn DocumentManager> = Arc::new(FixedDocumentManager(docs));

        let candidates: Vec<Box<dyn DocumentIterator>> = vec![Box::new(crate::search::leaf::BitmapIterator::new(&bmp(&[1, 2])))];
        let tokens = vec![
            WildcardToken::Keyword(Keyword {
                term_id: crate::core::types::TermId(1),
                surface: "ap".to_string(),
            }),
            WildcardToken::Asterisk,
        ];
        let mut iter = UnigramWildcardIterator::build(&tokens, candidates, "name", 10, manager).unwrap();
        let mut hits = Vec::new();
        while iter.next() {
            hits.push(iter.doc());
        }
        assert_eq!(hits, vec![DocId(1), DocId(2)]);
    }
}
