use crate::index::{DocId, InvertedIndex, Publication, TermId};
use crate::tokenizer::tokenize;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

lazy_static! {
    static ref YEAR_RE: Regex = Regex::new(r"(19|20)\d{2}").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Score,
    Date,
    Title,
}

impl SortBy {
    /// Unknown values fall back to `Score`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => SortBy::Date,
            "title" => SortBy::Title,
            _ => SortBy::Score,
        }
    }
}

/// Fully validated search request. Construct through the builder methods,
/// which clamp every value into its accepted range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub author: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sort: SortBy,
    pub page: usize,
    pub size: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            author: None,
            year_from: None,
            year_to: None,
            sort: SortBy::Score,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn with_author(mut self, author: Option<&str>) -> Self {
        self.author = author.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string);
        self
    }

    /// A bound of 0 means "no bound".
    pub fn with_years(mut self, year_from: Option<i32>, year_to: Option<i32>) -> Self {
        self.year_from = year_from.filter(|y| *y > 0);
        self.year_to = year_to.filter(|y| *y > 0);
        self
    }

    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page.max(1) as usize;
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size.clamp(1, MAX_PAGE_SIZE as i64) as usize;
        self
    }

    pub fn has_year_filter(&self) -> bool {
        self.year_from.is_some() || self.year_to.is_some()
    }

    /// Key for this request against the index snapshot numbered `generation`.
    pub fn cache_key(&self, generation: u64) -> SearchKey {
        SearchKey {
            generation,
            query: tokenize(&self.query).join(" "),
            author: self.author.as_deref().unwrap_or("").to_lowercase(),
            year_from: self.year_from,
            year_to: self.year_to,
            sort: self.sort,
            page: self.page,
            size: self.size,
        }
    }
}

/// Canonical form of a search request; two requests with equal keys always
/// produce the same response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    /// Index snapshot the response was computed against.
    pub generation: u64,
    pub query: String,
    pub author: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub sort: SortBy,
    pub page: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub publication: Publication,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub total_pages: usize,
}

/// First plausible publication year in a free-form date string.
pub fn extract_year(date: &str) -> Option<i32> {
    YEAR_RE.find(date).and_then(|m| m.as_str().parse().ok())
}

fn matches_author(publication: &Publication, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    publication.authors.iter().any(|a| a.name.to_lowercase().contains(&needle))
}

fn matches_years(publication: &Publication, params: &SearchParams) -> bool {
    if !params.has_year_filter() { return true; }
    let Some(year) = extract_year(&publication.published_date) else { return false };
    params.year_from.map_or(true, |from| year >= from) && params.year_to.map_or(true, |to| year <= to)
}

/// Cosine similarity between the query and every candidate document,
/// both weighted by `tf · idf`. Returns candidates in score-descending,
/// doc-id-ascending order.
pub fn score_candidates(index: &InvertedIndex, query_terms: &[String]) -> Vec<(DocId, f32)> {
    let mut tf_q: HashMap<TermId, u32> = HashMap::new();
    for term in query_terms {
        if let Some(tid) = index.term_id(term) {
            *tf_q.entry(tid).or_insert(0) += 1;
        }
    }
    if tf_q.is_empty() { return Vec::new(); }

    let mut q_norm = 0.0f32;
    let mut dots: HashMap<DocId, f32> = HashMap::new();
    for (tid, tf_raw) in tf_q.iter() {
        let idf = index.idf(*tid);
        let q_w = *tf_raw as f32 * idf;
        q_norm += q_w * q_w;
        for p in index.postings_for(*tid) {
            *dots.entry(p.doc_id).or_insert(0.0) += q_w * p.tf as f32 * idf;
        }
    }
    let q_norm = q_norm.sqrt();

    let mut scored: Vec<(DocId, f32)> = dots
        .into_iter()
        .map(|(doc_id, dot)| {
            let d_norm = index.doc_norms[doc_id as usize];
            let denom = q_norm * d_norm;
            let score = if denom > 0.0 { (dot / denom).clamp(0.0, 1.0) } else { 0.0 };
            (doc_id, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    scored
}

/// Resolve a search against a built index: score, filter, sort, paginate.
pub fn search(index: &InvertedIndex, params: &SearchParams) -> SearchResponse {
    let terms = tokenize(&params.query);
    let ranked: Vec<(DocId, f32)> = if terms.is_empty() {
        (0..index.num_docs).map(|doc_id| (doc_id, 0.0)).collect()
    } else {
        score_candidates(index, &terms)
    };

    let mut hits: Vec<(DocId, f32, &Publication)> = ranked
        .into_iter()
        .filter_map(|(doc_id, score)| index.publication(doc_id).map(|p| (doc_id, score, p)))
        .filter(|(_, _, p)| params.author.as_deref().map_or(true, |a| matches_author(p, a)))
        .filter(|(_, _, p)| matches_years(p, params))
        .collect();

    // ranked order is already score desc / doc id asc; the other sorts are stable on top of it
    match params.sort {
        SortBy::Score => {}
        SortBy::Date => hits.sort_by_key(|(_, _, p)| std::cmp::Reverse(extract_year(&p.published_date).unwrap_or(i32::MIN))),
        SortBy::Title => hits.sort_by_cached_key(|(_, _, p)| p.title.to_lowercase()),
    }

    let total = hits.len();
    let total_pages = total.div_ceil(params.size).max(1);
    let start = (params.page - 1).saturating_mul(params.size);
    let results = hits
        .into_iter()
        .skip(start)
        .take(params.size)
        .map(|(_, score, p)| SearchResult { publication: p.clone(), score })
        .collect();

    SearchResponse { results, total, page: params.page, size: params.size, total_pages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{publication, Author};

    fn dated(title: &str, date: &str, author: &str) -> Publication {
        let mut p = publication(title, "");
        p.published_date = date.to_string();
        p.authors.push(Author { name: author.to_string(), profile: None });
        p
    }

    fn corpus() -> InvertedIndex {
        InvertedIndex::build(vec![
            dated("Neural networks for vision", "12 March 2019", "Jane Smith"),
            dated("Bayesian inference", "2021-05-01", "Ali Khan"),
            dated("Graph neural networks", "n/a", "John Smithson"),
            dated("Annealing schedules", "1998", "Maria Rossi"),
        ])
    }

    #[test]
    fn scores_are_bounded_and_ordered() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("neural networks"));
        assert_eq!(resp.total, 2);
        for r in &resp.results {
            assert!(r.score > 0.0 && r.score <= 1.0);
        }
        assert!(resp.results[0].score >= resp.results[1].score);
    }

    #[test]
    fn empty_query_matches_everything_in_doc_order() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("  "));
        assert_eq!(resp.total, 4);
        assert_eq!(resp.results[0].publication.title, "Neural networks for vision");
        assert!(resp.results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn stopword_only_query_is_treated_as_empty() {
        let idx = corpus();
        assert_eq!(search(&idx, &SearchParams::new("the of and")).total, 4);
    }

    #[test]
    fn unknown_terms_match_nothing() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("zymurgy"));
        assert_eq!(resp.total, 0);
        assert_eq!(resp.total_pages, 1);
        assert!(resp.results.is_empty());
    }

    #[test]
    fn author_filter_is_case_insensitive_substring() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("").with_author(Some(" SMITH ")));
        let titles: Vec<_> = resp.results.iter().map(|r| r.publication.title.as_str()).collect();
        assert_eq!(titles, vec!["Neural networks for vision", "Graph neural networks"]);
    }

    #[test]
    fn year_filter_excludes_unparsable_dates() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("").with_years(Some(2000), None));
        assert_eq!(resp.total, 2);
        let resp = search(&idx, &SearchParams::new("").with_years(Some(1998), Some(2019)));
        assert_eq!(resp.total, 2);
        let resp = search(&idx, &SearchParams::new("").with_years(Some(0), Some(0)));
        assert_eq!(resp.total, 4);
    }

    #[test]
    fn date_sort_puts_unparsed_last() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("").with_sort(SortBy::Date));
        let years: Vec<_> = resp.results.iter().map(|r| extract_year(&r.publication.published_date)).collect();
        assert_eq!(years, vec![Some(2021), Some(2019), Some(1998), None]);
    }

    #[test]
    fn title_sort_is_case_insensitive() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("").with_sort(SortBy::Title));
        assert_eq!(resp.results[0].publication.title, "Annealing schedules");
        assert_eq!(resp.results[3].publication.title, "Neural networks for vision");
    }

    #[test]
    fn pages_beyond_the_end_are_empty() {
        let idx = corpus();
        let resp = search(&idx, &SearchParams::new("").with_size(3).with_page(5));
        assert!(resp.results.is_empty());
        assert_eq!(resp.total, 4);
        assert_eq!(resp.total_pages, 2);
    }

    #[test]
    fn params_are_clamped() {
        let p = SearchParams::new("x").with_page(-3).with_size(0);
        assert_eq!((p.page, p.size), (1, 1));
        let p = SearchParams::new("x").with_size(10_000);
        assert_eq!(p.size, MAX_PAGE_SIZE);
        assert_eq!(SortBy::parse_lenient("bogus"), SortBy::Score);
        assert_eq!(SortBy::parse_lenient(" TITLE "), SortBy::Title);
    }

    #[test]
    fn cache_key_ignores_query_surface_form() {
        let a = SearchParams::new("Neural  NETWORKS!").cache_key(0);
        let b = SearchParams::new("neural networks").cache_key(0);
        assert_eq!(a, b);
        let c = SearchParams::new("neural networks").with_page(2).cache_key(0);
        assert_ne!(a, c);
        assert_ne!(a, SearchParams::new("neural networks").cache_key(1));
    }
}
