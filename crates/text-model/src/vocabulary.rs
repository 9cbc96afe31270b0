use std::collections::HashMap;

/// Dense integer id of an interned token.
pub type TokenId = u32;

/// Synthetic token seeding every sentence prefix.
pub const START: TokenId = 0;
/// Synthetic token recorded after the last token of every sentence.
pub const END: TokenId = 1;

// The tokenizer never yields a token mixing '<' with letters, so these
// spellings cannot collide with corpus tokens.
const START_TOKEN: &str = "<s>";
const END_TOKEN: &str = "</s>";

/// Bidirectional token <-> id mapping.
///
/// Ids are handed out from a monotonic counter in order of first sight and
/// are never reused; the vocabulary only grows until [`Vocabulary::new`] is
/// called again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    ids: HashMap<String, TokenId>,
    words: Vec<String>,
}

impl Vocabulary {
    /// Create a vocabulary holding only the `START` and `END` tokens.
    pub fn new() -> Self {
        let mut vocab = Self {
            ids: HashMap::new(),
            words: Vec::new(),
        };
        vocab.intern(START_TOKEN);
        vocab.intern(END_TOKEN);
        vocab
    }

    /// Return the id of `word`, assigning the next free id on first sight.
    pub fn intern(&mut self, word: &str) -> TokenId {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as TokenId;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    pub fn id_of(&self, word: &str) -> Option<TokenId> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, id: TokenId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// Whether `id` is one of the two synthetic sentence markers.
    pub fn is_marker(id: TokenId) -> bool {
        id == START || id == END
    }

    /// Number of tokens, synthetic markers included.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when nothing beyond the synthetic markers has been interned.
    pub fn is_empty(&self) -> bool {
        self.words.len() <= 2
    }

    /// Corpus tokens in id order, markers excluded.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().skip(2).map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
