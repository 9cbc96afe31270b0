use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::tokenizer::{join_tokens, split_sentences, tokenize_sentence};
use crate::vocabulary::{TokenId, Vocabulary, END, START};

/// Default cap on emitted tokens per generated sentence.
pub const DEFAULT_MAX_SENTENCE_TOKENS: usize = 100;

/// Hash of a prefix of token ids.
///
/// `DefaultHasher::new()` uses fixed keys, so the same prefix hashes the
/// same way on every build of the table. Two different prefixes sharing a
/// hash would merge their candidate lists; with 64-bit hashes over a
/// non-adversarial corpus that risk is accepted.
fn prefix_hash(prefix: &[TokenId]) -> u64 {
    let mut hasher = DefaultHasher::new();
    prefix.hash(&mut hasher);
    hasher.finish()
}

/// Drop the oldest id and append `id`.
fn slide(prefix: &mut [TokenId], id: TokenId) {
    prefix.rotate_left(1);
    if let Some(last) = prefix.last_mut() {
        *last = id;
    }
}

/// N-gram model over word and punctuation tokens.
///
/// # Invariants
/// - Every candidate list holds at least one id.
/// - Candidate lists preserve duplicates in corpus order.
/// - After construction the model is only read; `&TextModel` is shared
///   between request tasks without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextModel {
    order: usize,
    max_sentence_tokens: usize,
    vocabulary: Vocabulary,
    transitions: HashMap<u64, Vec<TokenId>>,
}

impl TextModel {
    /// Create an untrained model of the given order.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            max_sentence_tokens: DEFAULT_MAX_SENTENCE_TOKENS,
            vocabulary: Vocabulary::new(),
            transitions: HashMap::new(),
        }
    }

    /// Build a model from `corpus`.
    ///
    /// An empty corpus, or `order == 0`, yields a model with an empty
    /// transition table.
    pub fn build(corpus: &str, order: usize) -> Self {
        let mut model = Self::new(order);
        model.train(corpus);
        model
    }

    pub fn with_max_sentence_tokens(mut self, max_sentence_tokens: usize) -> Self {
        self.max_sentence_tokens = max_sentence_tokens;
        self
    }

    /// Add the transitions of `corpus` to the table.
    pub fn train(&mut self, corpus: &str) {
        if self.order == 0 {
            return;
        }

        let mut prefix = vec![START; self.order];
        let mut sentences = 0usize;
        for sentence in split_sentences(corpus) {
            let tokens = tokenize_sentence(sentence);
            if tokens.is_empty() {
                continue;
            }

            prefix.fill(START);
            for token in &tokens {
                let id = self.vocabulary.intern(token);
                self.record(&prefix, id);
                slide(&mut prefix, id);
            }
            self.record(&prefix, END);
            sentences += 1;
        }

        debug!(
            sentences,
            vocabulary = self.vocabulary.len(),
            prefixes = self.transitions.len(),
            "trained text model"
        );
    }

    fn record(&mut self, prefix: &[TokenId], next: TokenId) {
        self.transitions
            .entry(prefix_hash(prefix))
            .or_default()
            .push(next);
    }

    /// Forget everything learned, keeping order and sentence cap.
    pub fn reset(&mut self) {
        self.vocabulary = Vocabulary::new();
        self.transitions.clear();
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Number of distinct prefixes in the transition table.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Recorded successors of `prefix`, duplicates included.
    ///
    /// Returns an empty slice for unknown prefixes or a prefix whose
    /// length differs from the model order.
    pub fn candidates(&self, prefix: &[TokenId]) -> &[TokenId] {
        if prefix.len() != self.order {
            return &[];
        }
        self.transitions
            .get(&prefix_hash(prefix))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Walk the table once from a `START` prefix and return the emitted ids.
    pub fn generate_ids_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<TokenId> {
        let mut emitted = Vec::new();
        if self.order == 0 || self.transitions.is_empty() {
            return emitted;
        }

        let mut prefix = vec![START; self.order];
        while emitted.len() < self.max_sentence_tokens {
            let Some(&next) = self.candidates(&prefix).choose(rng) else {
                break;
            };
            if Vocabulary::is_marker(next) {
                break;
            }
            emitted.push(next);
            slide(&mut prefix, next);
        }
        emitted
    }

    /// Generate one sentence. Returns `""` for an empty model.
    pub fn generate_sentence_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let ids = self.generate_ids_with(rng);
        let words: Vec<&str> = ids
            .iter()
            .filter_map(|&id| self.vocabulary.word(id))
            .collect();
        join_tokens(&words)
    }

    pub fn generate_sentence(&self) -> String {
        self.generate_sentence_with(&mut rand::thread_rng())
    }

    /// Generate `n` sentences, dropping empty ones, joined by spaces.
    pub fn generate_sentences_with<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> String {
        (0..n)
            .map(|_| self.generate_sentence_with(rng))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn generate_sentences(&self, n: usize) -> String {
        self.generate_sentences_with(n, &mut rand::thread_rng())
    }

    /// Like [`generate_sentences_with`](Self::generate_sentences_with), but each
    /// sentence is capitalised and closed with a period.
    pub fn generate_prose_with<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> String {
        (0..n)
            .map(|_| self.generate_sentence_with(rng))
            .filter(|s| !s.is_empty())
            .map(|s| finish_sentence(&s))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn generate_prose(&self, n: usize) -> String {
        self.generate_prose_with(n, &mut rand::thread_rng())
    }
}

fn finish_sentence(sentence: &str) -> String {
    let body = sentence.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '\'');
    let mut chars = body.chars();
    let mut out = String::with_capacity(body.len() + 1);
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TWO_SENTENCES: &str = "The cat sat. The dog ran.";

    fn ids(model: &TextModel, words: &[&str]) -> Vec<TokenId> {
        words
            .iter()
            .map(|w| model.vocabulary().id_of(w).unwrap())
            .collect()
    }

    #[test]
    fn test_bigram_vocabulary() {
        let model = TextModel::build(TWO_SENTENCES, 1);
        let vocab = model.vocabulary();
        assert_eq!(vocab.len(), 7);
        for word in ["the", "cat", "sat", "dog", "ran"] {
            assert!(vocab.id_of(word).is_some(), "missing {}", word);
        }
        assert!(vocab.id_of(".").is_none());
    }

    #[test]
    fn test_bigram_transitions() {
        let model = TextModel::build(TWO_SENTENCES, 1);
        let the = ids(&model, &["the"])[0];
        let [cat, sat, dog, ran] = ids(&model, &["cat", "sat", "dog", "ran"])[..] else {
            panic!("unexpected id count");
        };

        assert_eq!(model.candidates(&[START]), &[the, the]);
        assert_eq!(model.candidates(&[the]), &[cat, dog]);
        assert_eq!(model.candidates(&[cat]), &[sat]);
        assert_eq!(model.candidates(&[sat]), &[END]);
        assert_eq!(model.candidates(&[dog]), &[ran]);
        assert_eq!(model.candidates(&[ran]), &[END]);
    }

    #[test]
    fn test_bigram_generation_only_yields_corpus_paths() {
        let model = TextModel::build(TWO_SENTENCES, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_cat = false;
        let mut seen_dog = false;
        for _ in 0..200 {
            let sentence = model.generate_sentence_with(&mut rng);
            match sentence.as_str() {
                "the cat sat" => seen_cat = true,
                "the dog ran" => seen_dog = true,
                other => panic!("impossible sentence {:?}", other),
            }
        }
        assert!(seen_cat && seen_dog);
    }

    #[test]
    fn test_empty_corpus_is_empty_model() {
        let model = TextModel::build("", 2);
        assert!(model.is_empty());
        assert_eq!(model.transition_count(), 0);
        assert_eq!(model.generate_sentence(), "");
        assert_eq!(model.generate_sentences(5), "");
        assert_eq!(model.generate_prose(5), "");
    }

    #[test]
    fn test_order_zero_is_empty_model() {
        let model = TextModel::build(TWO_SENTENCES, 0);
        assert!(model.is_empty());
        assert_eq!(model.generate_sentence(), "");
    }

    #[test]
    fn test_candidates_wrong_prefix_length() {
        let model = TextModel::build(TWO_SENTENCES, 2);
        assert!(model.candidates(&[START]).is_empty());
        assert!(!model.candidates(&[START, START]).is_empty());
    }

    #[test]
    fn test_punctuation_is_learned_and_attached() {
        let model = TextModel::build("Yes, indeed.", 1);
        assert_eq!(model.generate_sentence(), "yes, indeed");
    }

    #[test]
    fn test_sentence_cap() {
        // "a a a ..." loops on itself through the a -> a transition.
        let corpus = "A a a a a a a a a a a a a a a a a a a a a a a a a.";
        let model = TextModel::build(corpus, 1).with_max_sentence_tokens(5);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(model.generate_ids_with(&mut rng).len() <= 5);
        }
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let corpus = "One fish, two fish. Red fish, blue fish! Old fish? New fish.";
        let a = TextModel::build(corpus, 2);
        let b = TextModel::build(corpus, 2);
        assert_eq!(a, b);

        // Generation must not disturb the table.
        let mut rng = StdRng::seed_from_u64(99);
        let _ = a.generate_sentences_with(20, &mut rng);
        assert_eq!(a, b);
    }

    #[test]
    fn test_train_extends_and_reset_clears() {
        let mut model = TextModel::build("The cat sat.", 1);
        let before = model.vocabulary().len();
        let cat = model.vocabulary().id_of("cat");
        model.train("The bird sang.");
        assert!(model.vocabulary().len() > before);
        assert_eq!(model.vocabulary().id_of("cat"), cat);

        model.reset();
        assert!(model.is_empty());
        assert!(model.vocabulary().is_empty());
        assert_eq!(model.order(), 1);
    }

    #[test]
    fn test_generate_sentences_count() {
        let model = TextModel::build(TWO_SENTENCES, 1);
        let mut rng = StdRng::seed_from_u64(3);
        let text = model.generate_sentences_with(4, &mut rng);
        assert_eq!(text.split_whitespace().count(), 12);
    }

    #[test]
    fn test_generate_prose_capitalises() {
        let model = TextModel::build(TWO_SENTENCES, 1);
        let mut rng = StdRng::seed_from_u64(5);
        let prose = model.generate_prose_with(2, &mut rng);
        for sentence in prose.split(". ") {
            assert!(sentence.starts_with("The "), "{:?}", sentence);
        }
        assert!(prose.ends_with('.'));
    }

    #[test]
    fn test_finish_sentence_strips_trailing_punctuation() {
        assert_eq!(finish_sentence("well, maybe ,"), "Well, maybe.");
        assert_eq!(finish_sentence("it's"), "It's.");
    }
}
