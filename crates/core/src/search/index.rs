//! In-memory inverted index with BM25 ranking.

use super::query::{self, Clause, Presence};
use super::text;
use super::Field;
use crate::vocabulary::CodeVocabulary;
use fhir::Coding;
use rapidfuzz::distance::levenshtein;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// One ranked match, borrowing its coding from the vocabulary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchHit<'a> {
    pub coding: &'a Coding,
    /// Position of the coding in vocabulary order.
    pub position: usize,
    pub score: f32,
}

#[derive(Clone, Copy, Debug)]
struct Posting {
    doc: usize,
    tf: u32,
}

/// Postings and length statistics for a single field.
#[derive(Clone, Debug, Default)]
struct FieldIndex {
    postings: BTreeMap<String, Vec<Posting>>,
    doc_lengths: Vec<usize>,
    avg_doc_len: f32,
}

impl FieldIndex {
    fn build(documents: impl Iterator<Item = Vec<String>>) -> Self {
        let mut index = Self::default();

        for (doc, tokens) in documents.enumerate() {
            index.doc_lengths.push(tokens.len());

            let mut term_freqs: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_default() += 1;
            }
            for (term, tf) in term_freqs {
                index.postings.entry(term).or_default().push(Posting { doc, tf });
            }
        }

        let total: usize = index.doc_lengths.iter().sum();
        index.avg_doc_len = if index.doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / index.doc_lengths.len() as f32
        };
        index
    }

    /// Indexed terms a clause matches, each with its expansion weight.
    ///
    /// Exact and prefix matches weigh 1.0; a fuzzy match at distance `d` weighs `1 / (1 + d)`.
    fn expand<'a>(&'a self, clause: &Clause) -> Vec<(&'a str, f32)> {
        let mut matched: BTreeMap<&str, f32> = BTreeMap::new();

        if let Some((term, _)) = self.postings.get_key_value(clause.term.as_str()) {
            matched.insert(term, 1.0);
        }

        if clause.wildcard {
            let prefixed = self
                .postings
                .range::<str, _>((Bound::Included(clause.term.as_str()), Bound::Unbounded))
                .take_while(|(term, _)| term.starts_with(clause.term.as_str()));
            for (term, _) in prefixed {
                matched.insert(term, 1.0);
            }
        }

        if clause.edit_distance > 0 {
            let max = usize::from(clause.edit_distance);
            for term in self.postings.keys() {
                if matched.contains_key(term.as_str()) {
                    continue;
                }
                let distance = levenshtein::distance(clause.term.chars(), term.chars());
                if distance <= max {
                    matched.insert(term, 1.0 / (1.0 + distance as f32));
                }
            }
        }

        matched.into_iter().collect()
    }

    fn bm25(&self, tf: u32, doc: usize, doc_freq: usize) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let df = doc_freq as f32;
        let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p().max(0.0);

        let tf = tf as f32;
        let doc_len = self.doc_lengths.get(doc).copied().unwrap_or_default() as f32;
        let length_norm = BM25_B.mul_add(doc_len / self.avg_doc_len.max(1.0), 1.0 - BM25_B);
        let denom = BM25_K1.mul_add(length_norm, tf);

        if denom > 0.0 {
            idf * (tf * (BM25_K1 + 1.0) / denom)
        } else {
            0.0
        }
    }
}

/// A ranked full-text index over one vocabulary.
///
/// The index shares the vocabulary and stores document positions only, so results borrow from
/// the vocabulary it was built over.
#[derive(Clone, Debug)]
pub struct SearchIndex {
    vocabulary: Arc<CodeVocabulary>,
    fields: [FieldIndex; 2],
}

impl SearchIndex {
    /// Build the index. Deterministic: the same vocabulary always yields the same index.
    pub fn build(vocabulary: Arc<CodeVocabulary>) -> Self {
        let search = FieldIndex::build(
            vocabulary
                .codings()
                .iter()
                .map(|coding| text::tokens(&text::normalise_display(coding.display_text()))),
        );
        let code = FieldIndex::build(vocabulary.codings().iter().map(|c| text::tokens(&c.code)));

        tracing::debug!(
            vocabulary = %vocabulary.kind(),
            documents = vocabulary.len(),
            search_terms = search.postings.len(),
            code_terms = code.postings.len(),
            "built search index"
        );

        Self {
            vocabulary,
            fields: [search, code],
        }
    }

    pub fn vocabulary(&self) -> &Arc<CodeVocabulary> {
        &self.vocabulary
    }

    /// Ranked codings matching `query`. Never fails; an empty or unmatched query yields nothing.
    pub fn query(&self, query: &str) -> Vec<&Coding> {
        self.query_scored(query)
            .into_iter()
            .map(|hit| hit.coding)
            .collect()
    }

    /// Ranked matches with their scores, best first, ties in vocabulary order.
    pub fn query_scored(&self, query: &str) -> Vec<SearchHit<'_>> {
        let clauses = query::parse(query);
        if clauses.is_empty() {
            return Vec::new();
        }

        let doc_count = self.vocabulary.len();
        let mut scores = vec![0.0f32; doc_count];
        let mut any_optional = vec![false; doc_count];
        let mut all_required = vec![true; doc_count];
        let mut prohibited = vec![false; doc_count];

        let has_required = clauses.iter().any(|c| c.presence == Presence::Required);
        let has_optional = clauses.iter().any(|c| c.presence == Presence::Optional);

        for clause in &clauses {
            let matched = self.score_clause(clause, &mut scores);
            match clause.presence {
                Presence::Optional => {
                    for (flag, hit) in any_optional.iter_mut().zip(&matched) {
                        *flag |= *hit;
                    }
                }
                Presence::Required => {
                    for (flag, hit) in all_required.iter_mut().zip(&matched) {
                        *flag &= *hit;
                    }
                }
                Presence::Prohibited => {
                    for (flag, hit) in prohibited.iter_mut().zip(&matched) {
                        *flag |= *hit;
                    }
                }
            }
        }

        let mut hits: Vec<SearchHit<'_>> = (0..doc_count)
            .filter(|&doc| !prohibited[doc])
            .filter(|&doc| {
                if has_required {
                    all_required[doc]
                } else if has_optional {
                    any_optional[doc]
                } else {
                    true
                }
            })
            .filter_map(|doc| {
                self.vocabulary.get(doc).map(|coding| SearchHit {
                    coding,
                    position: doc,
                    score: scores[doc],
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        });
        hits
    }

    /// Add the clause's contribution to `scores`; returns which documents it matched.
    ///
    /// Prohibited clauses only mark matches.
    fn score_clause(&self, clause: &Clause, scores: &mut [f32]) -> Vec<bool> {
        let mut matched = vec![false; scores.len()];
        let fields: &[Field] = match &clause.field {
            Some(field) => std::slice::from_ref(field),
            None => &Field::ALL,
        };

        for field in fields {
            let index = &self.fields[field.slot()];
            for (term, weight) in index.expand(clause) {
                let Some(postings) = index.postings.get(term) else {
                    continue;
                };
                for posting in postings {
                    matched[posting.doc] = true;
                    if clause.presence != Presence::Prohibited {
                        scores[posting.doc] += clause.boost
                            * weight
                            * index.bm25(posting.tf, posting.doc, postings.len());
                    }
                }
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::VocabularyKind;
    use proptest::prelude::*;

    fn index_of(entries: &[(&str, &str)]) -> SearchIndex {
        let codings = entries
            .iter()
            .map(|(code, display)| Coding::new(*code, *display))
            .collect();
        let vocabulary =
            CodeVocabulary::new(VocabularyKind::Procedures, codings).expect("valid vocabulary");
        SearchIndex::build(Arc::new(vocabulary))
    }

    fn imaging() -> SearchIndex {
        index_of(&[
            (
                "70450",
                "Computed tomography, head or brain; without contrast material",
            ),
            (
                "71250",
                "Computed tomography, thorax; without contrast material",
            ),
            (
                "72148",
                "Magnetic resonance (eg, proton) imaging, spinal canal and contents, lumbar; without contrast material",
            ),
            ("71045", "Radiologic examination, chest; single view"),
        ])
    }

    fn codes(index: &SearchIndex, query: &str) -> Vec<String> {
        index
            .query(query)
            .into_iter()
            .map(|c| c.code.clone())
            .collect()
    }

    #[test]
    fn finds_entry_by_display_word() {
        let index = index_of(&[("71250", "CT chest (without contrast)")]);
        assert_eq!(codes(&index, "chest"), vec!["71250"]);
        assert!(codes(&index, "contrast ").is_empty());
    }

    #[test]
    fn empty_and_unmatched_queries_yield_nothing() {
        let index = imaging();
        assert!(index.query("").is_empty());
        assert!(index.query("   ").is_empty());
        assert!(index.query("the").is_empty());
        assert!(index.query("femur ").is_empty());
    }

    #[test]
    fn acronyms_match_expanded_modalities() {
        let index = imaging();
        let ct = codes(&index, "ct ");
        assert_eq!(ct.len(), 2);
        assert!(ct.contains(&"70450".to_string()));
        assert!(ct.contains(&"71250".to_string()));
        assert_eq!(codes(&index, "mri lumbar")[0], "72148");
    }

    #[test]
    fn matches_codes() {
        let index = imaging();
        assert_eq!(codes(&index, "71045"), vec!["71045"]);
        assert_eq!(codes(&index, "code:71250"), vec!["71250"]);
        assert!(codes(&index, "search:71250").is_empty());
    }

    #[test]
    fn matching_both_fields_ranks_higher() {
        let index = index_of(&[("B2", "scan a1 view"), ("A1", "scan a1 view")]);
        assert_eq!(codes(&index, "a1 "), vec!["A1", "B2"]);
    }

    #[test]
    fn ties_keep_vocabulary_order() {
        let index = index_of(&[("b", "CT chest"), ("a", "CT chest"), ("c", "CT chest")]);
        assert_eq!(codes(&index, "chest "), vec!["b", "a", "c"]);
    }

    #[test]
    fn presence_markers_filter_results() {
        let index = imaging();
        assert_eq!(codes(&index, "ct -head"), vec!["71250"]);
        assert_eq!(codes(&index, "+chest"), vec!["71045"]);
        assert_eq!(codes(&index, "-head"), vec!["71250", "72148", "71045"]);
        assert!(codes(&index, "+chest +lumbar").is_empty());
    }

    #[test]
    fn prefix_and_typeahead() {
        let index = imaging();
        assert_eq!(codes(&index, "thor*"), vec!["71250"]);
        assert_eq!(codes(&index, "thor"), vec!["71250"]);
        assert!(codes(&index, "thor ").is_empty());
    }

    #[test]
    fn fuzzy_terms_tolerate_typos() {
        let index = imaging();
        assert_eq!(codes(&index, "thorx~1"), vec!["71250"]);
        assert!(codes(&index, "thrx~1 ").is_empty());
        assert_eq!(codes(&index, "lumbar~9")[0], "72148");
    }

    #[test]
    fn boost_reorders_results() {
        let index = imaging();
        assert_eq!(codes(&index, "head thorax^10")[0], "71250");
        assert_eq!(codes(&index, "head^10 thorax")[0], "70450");
    }

    #[test]
    fn scores_are_descending() {
        let index = imaging();
        let hits = index.query_scored("contrast material chest");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn inflected_words_match_their_stem() {
        let index = index_of(&[
            ("1", "Headache (finding)"),
            ("2", "Injury of head (disorder)"),
            ("3", "Lesion of brain (disorder)"),
        ]);
        assert_eq!(codes(&index, "headaches "), vec!["1"]);
        assert_eq!(codes(&index, "headaches")[0], "1");
        assert_eq!(codes(&index, "brain lesions ")[0], "3");
    }

    #[test]
    fn dotted_codes_rank_exact_code_first() {
        let index = index_of(&[("M54.9", "Dorsalgia"), ("M54.5", "Low back pain")]);
        assert_eq!(codes(&index, "code:M54.5 "), vec!["M54.5", "M54.9"]);
    }

    #[test]
    fn bundled_reasons_find_headache_by_plural() {
        let vocabulary = CodeVocabulary::bundled(VocabularyKind::Reasons).expect("bundled");
        let index = SearchIndex::build(Arc::new(vocabulary));
        assert_eq!(codes(&index, "headaches ")[0], "25064002");
    }

    #[test]
    fn bundled_procedures_are_searchable() {
        let vocabulary = CodeVocabulary::bundled(VocabularyKind::Procedures).expect("bundled");
        let index = SearchIndex::build(Arc::new(vocabulary));
        let hits = codes(&index, "lumbar spine mri");
        assert!(!hits.is_empty());
        assert!(hits.len() <= index.vocabulary().len());
    }

    proptest! {
        #[test]
        fn query_never_fails(query in "\\PC{0,40}") {
            let index = imaging();
            let hits = index.query_scored(&query);
            prop_assert!(hits.len() <= index.vocabulary().len());

            let mut positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
            positions.sort_unstable();
            positions.dedup();
            prop_assert_eq!(positions.len(), hits.len());
        }

        #[test]
        fn query_syntax_never_fails(query in "[-+*~^: a-z0-9]{0,30}") {
            let index = imaging();
            let _ = index.query(&query);
        }
    }
}
