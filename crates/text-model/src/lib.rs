//! Word-level n-gram text model for the tarpit.
//!
//! The model is trained once at startup from a static corpus and then
//! shared read-only between request handlers. It turns the corpus into:
//!
//! - a [`Vocabulary`] assigning each distinct token a dense id, with two
//!   synthetic tokens ([`START`] and [`END`]) bracketing every sentence;
//! - a transition table mapping the hash of the last `order` token ids to
//!   every token id that followed them in the corpus. Duplicates are kept,
//!   so uniform selection over a candidate list reproduces the corpus
//!   frequencies.
//!
//! Generation walks the table from a prefix of `START` ids until it reaches
//! `END`, a dead end, or the per-sentence token cap. Output costs a handful
//! of hash lookups per word, so pages can be produced indefinitely.

pub mod corpus;
pub mod model;
pub mod tokenizer;
pub mod vocabulary;

pub use corpus::{load_corpus, DEFAULT_CORPUS};
pub use model::{TextModel, DEFAULT_MAX_SENTENCE_TOKENS};
pub use tokenizer::{is_punctuation, join_tokens, split_sentences, tokenize_sentence};
pub use vocabulary::{TokenId, Vocabulary, END, START};
