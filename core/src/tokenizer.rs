use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","will","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

const MIN_TOKEN_CHARS: usize = 2;

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Text normalisation pipeline shared by indexing, querying and classification.
///
/// Every step is deterministic, so the same text always produces the same
/// tokens in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    pub remove_stopwords: bool,
    pub stem: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self { remove_stopwords: true, stem: true }
    }
}

impl Analyzer {
    /// Lowercase + split only; no stop-word removal or stemming.
    pub fn plain() -> Self {
        Self { remove_stopwords: false, stem: false }
    }

    pub fn analyze(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if token.chars().count() < MIN_TOKEN_CHARS { continue; }
            if self.remove_stopwords && is_stopword(token) { continue; }
            if self.stem {
                tokens.push(STEMMER.stem(token).into_owned());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }
}

/// Tokenize with the default analyzer: NFKC, lowercase, stop words removed, English stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    Analyzer::default().analyze(text)
}
