use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;

/// How many times a token counts towards a document's term frequency,
/// depending on the field it came from.
pub const TITLE_WEIGHT: u32 = 2;
pub const AUTHOR_WEIGHT: u32 = 1;
pub const ABSTRACT_WEIGHT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, alias = "profile_url")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub link: String,
    pub authors: Vec<Author>,
    pub published_date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

/// Term → postings mapping plus the per-document statistics the ranker needs.
///
/// Postings lists are sorted by `doc_id` and hold each document at most once.
/// Doc ids are positions in `docs`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    pub df: Vec<u32>,
    pub postings: Vec<Vec<Posting>>,
    pub docs: Vec<Publication>,
    pub doc_len: Vec<u32>,
    /// Euclidean norm of each document's tf·idf vector.
    pub doc_norms: Vec<f32>,
    pub num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Build a fresh index over `publications`; doc ids follow input order.
    pub fn build(publications: Vec<Publication>) -> Self {
        let mut dictionary: HashMap<String, TermId> = HashMap::new();
        let mut postings: Vec<Vec<Posting>> = Vec::new();
        let mut doc_len: Vec<u32> = Vec::with_capacity(publications.len());

        for (doc_id, publication) in publications.iter().enumerate() {
            let doc_id = doc_id as DocId;
            let tf_counts = weighted_term_counts(publication);
            doc_len.push(tf_counts.values().sum());

            // sorted so term ids are assigned deterministically
            let mut terms: Vec<(String, u32)> = tf_counts.into_iter().collect();
            terms.sort();
            for (term, tf) in terms {
                let next_id = dictionary.len() as TermId;
                let tid = *dictionary.entry(term).or_insert(next_id);
                if tid as usize == postings.len() {
                    postings.push(Vec::new());
                }
                postings[tid as usize].push(Posting { doc_id, tf });
            }
        }

        let df: Vec<u32> = postings.iter().map(|p| p.len() as u32).collect();
        let num_docs = publications.len() as u32;

        let mut doc_norms = vec![0.0f32; publications.len()];
        for (tid, plist) in postings.iter().enumerate() {
            let idf = idf(num_docs, df[tid]);
            for p in plist {
                let w = p.tf as f32 * idf;
                doc_norms[p.doc_id as usize] += w * w;
            }
        }
        for norm in doc_norms.iter_mut() {
            *norm = norm.sqrt();
        }

        tracing::debug!(num_docs, num_terms = dictionary.len(), "built inverted index");
        Self { dictionary, df, postings, docs: publications, doc_len, doc_norms, num_docs }
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.dictionary.get(term).copied()
    }

    pub fn postings_for(&self, tid: TermId) -> &[Posting] {
        self.postings.get(tid as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn idf(&self, tid: TermId) -> f32 {
        idf(self.num_docs, self.df.get(tid as usize).copied().unwrap_or(0))
    }

    pub fn num_terms(&self) -> usize { self.dictionary.len() }

    pub fn publication(&self, doc_id: DocId) -> Option<&Publication> {
        self.docs.get(doc_id as usize)
    }
}

/// Smoothed inverse document frequency: `ln(1 + N / df)`.
pub fn idf(num_docs: u32, df: u32) -> f32 {
    if df == 0 { return 0.0; }
    (1.0 + num_docs as f32 / df as f32).ln()
}

fn weighted_term_counts(publication: &Publication) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut add = |text: &str, weight: u32| {
        for term in tokenize(text) {
            *counts.entry(term).or_insert(0) += weight;
        }
    };
    add(&publication.title, TITLE_WEIGHT);
    for author in &publication.authors {
        add(&author.name, AUTHOR_WEIGHT);
    }
    add(&publication.abstract_text, ABSTRACT_WEIGHT);
    counts
}

#[cfg(test)]
pub(crate) fn publication(title: &str, abstract_text: &str) -> Publication {
    Publication {
        title: title.to_string(),
        link: String::new(),
        authors: Vec::new(),
        published_date: String::new(),
        abstract_text: abstract_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postings_have_unique_doc_ids() {
        let idx = InvertedIndex::build(vec![
            publication("graph graph graph", "graph theory"),
            publication("graph", ""),
        ]);
        let tid = idx.term_id("graph").unwrap();
        let plist = idx.postings_for(tid);
        assert_eq!(plist.len(), 2);
        assert_eq!(plist[0], Posting { doc_id: 0, tf: 3 * TITLE_WEIGHT + 1 });
        assert_eq!(plist[1].doc_id, 1);
        assert_eq!(idx.df[tid as usize], 2);
    }

    #[test]
    fn empty_document_is_indexed_but_unmatchable() {
        let idx = InvertedIndex::build(vec![publication("", ""), publication("quantum", "")]);
        assert_eq!(idx.num_docs, 2);
        assert_eq!(idx.doc_len[0], 0);
        assert_eq!(idx.doc_norms[0], 0.0);
        assert!(idx.postings.iter().flatten().all(|p| p.doc_id != 0));
    }

    #[test]
    fn author_names_are_indexed() {
        let mut p = publication("Untitled", "");
        p.authors.push(Author { name: "Ada Lovelace".into(), profile: None });
        let idx = InvertedIndex::build(vec![p]);
        let term = tokenize("Lovelace").remove(0);
        assert!(idx.term_id(&term).is_some());
    }

    #[test]
    fn rebuild_is_deterministic() {
        let docs = vec![publication("alpha beta", "gamma"), publication("beta", "delta")];
        let a = InvertedIndex::build(docs.clone());
        let b = InvertedIndex::build(docs);
        assert_eq!(a.dictionary, b.dictionary);
        assert_eq!(a.postings, b.postings);
    }
}
