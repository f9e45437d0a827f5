use crate::core::types::TermId;

/// A single leaf occurrence: the resolved term id plus the surface form the
/// analyzer produced it from (needed by numeric-filter KEYWORD leaves and by
/// `UnigramWildcardIterator`'s pattern reconstruction).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyword {
    pub term_id: TermId,
    pub surface: String,
}

/// One token of an `UNIGRAM_WILDCARD` pattern: either a resolved keyword or
/// a wildcard placeholder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum WildcardToken {
    Keyword(Keyword),
    Asterisk,
    QuestionMark,
}

/// The query tree a single property's search expression compiles to.
/// Mirrors the node set `IteratorBuilder` dispatches on; see
/// `crate::query::builder` for how each variant becomes a
/// `crate::search::iterator::DocumentIterator`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum QueryTree {
    Keyword(Keyword),
    RankKeyword(Keyword),
    Not(Box<QueryTree>),
    And(Vec<QueryTree>),
    Or(Vec<QueryTree>),
    AndPersonal(Vec<QueryTree>),
    OrPersonal(Vec<QueryTree>),
    /// Children are `Keyword` terms in sequence order; enforced at
    /// construction time by `exact`/`order`/`nearby`.
    Exact(Vec<Keyword>),
    Order(Vec<Keyword>),
    Nearby { distance: u32, terms: Vec<Keyword> },
    /// Already-expanded candidate terms for a trie-prefix wildcard (e.g.
    /// `"comput*"` expanded against the term dictionary upstream).
    TrieWildcard(Vec<Keyword>),
    UnigramWildcard(Vec<WildcardToken>),
}

impl QueryTree {
    pub fn and(children: Vec<QueryTree>) -> Self {
        QueryTree::And(children)
    }

    pub fn or(children: Vec<QueryTree>) -> Self {
        QueryTree::Or(children)
    }

    pub fn not(child: QueryTree) -> Self {
        QueryTree::Not(Box::new(child))
    }

    /// Collects every distinct `TermId` appearing anywhere in the tree —
    /// `IteratorBuilder` uses this for the sort-then-seek-once term
    /// prefetch pass before recursing into the tree proper.
    pub fn collect_term_ids(&self, out: &mut Vec<TermId>) {
        match self {
            QueryTree::Keyword(k) | QueryTree::RankKeyword(k) => out.push(k.term_id),
            QueryTree::Not(child) => child.collect_term_ids(out),
            QueryTree::And(children)
            | QueryTree::Or(children)
            | QueryTree::AndPersonal(children)
            | QueryTree::OrPersonal(children) => {
                for child in children {
                    child.collect_term_ids(out);
                }
            }
            QueryTree::Exact(terms) | QueryTree::Order(terms) | QueryTree::TrieWildcard(terms) => {
                out.extend(terms.iter().map(|k| k.term_id));
            }
            QueryTree::Nearby { terms, .. } => out.extend(terms.iter().map(|k| k.term_id)),
            QueryTree::UnigramWildcard(tokens) => {
                out.extend(tokens.iter().filter_map(|t| match t {
                    WildcardToken::Keyword(k) => Some(k.term_id),
                    _ => None,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(id: u64, surface: &str) -> Keyword {
        Keyword {
            term_id: TermId(id),
            surface: surface.to_string(),
        }
    }

    #[test]
    fn collects_term_ids_from_nested_tree() {
        let tree = QueryTree::and(vec![
            QueryTree::Keyword(kw(1, "a")),
            QueryTree::or(vec![QueryTree::RankKeyword(kw(2, "b")), QueryTree::not(QueryTree::Keyword(kw(3, "c")))]),
        ]);
        let mut ids = Vec::new();
        tree.collect_term_ids(&mut ids);
        ids.sort();
        assert_eq!(ids, vec![TermId(1), TermId(2), TermId(3)]);
    }
}
