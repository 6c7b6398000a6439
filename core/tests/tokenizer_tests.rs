use scholar_core::tokenizer::{tokenize, Analyzer};

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN!");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // NFKC folds fullwidth forms
    assert_eq!(tokenize("Ｆｕｌｌｗｉｄｔｈ Ｔｅｘｔ"), tokenize("fullwidth text"));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn stopwords_can_be_kept() {
    let analyzer = Analyzer { remove_stopwords: false, stem: false };
    assert_eq!(analyzer.analyze("The Cat"), vec!["the", "cat"]);
}

#[test]
fn is_deterministic() {
    let text = "Convolutional networks, 3D point-clouds & graph learning (2021).";
    assert_eq!(tokenize(text), tokenize(text));
}
