/// Characters that can end a sentence.
const TERMINALS: &[char] = &['.', '!', '?'];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// A token is punctuation when it has no alphanumeric or apostrophe character.
pub fn is_punctuation(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(is_word_char)
}

/// Split text into sentences.
///
/// A boundary is a run of terminal punctuation followed by whitespace and
/// an uppercase letter, so abbreviations followed by lowercase text
/// ("e.g. this") stay inside one sentence. Returned slices are trimmed and
/// keep their terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !TERMINALS.contains(&c) {
            continue;
        }

        // Swallow the rest of the terminal run ("?!", "...").
        let mut end = text.len();
        while let Some(&(i, next)) = chars.peek() {
            if TERMINALS.contains(&next) {
                chars.next();
            } else {
                end = i;
                break;
            }
        }

        let mut saw_space = false;
        let mut next_start = None;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_whitespace() {
                saw_space = true;
                chars.next();
            } else {
                if saw_space && next.is_uppercase() {
                    next_start = Some(i);
                }
                break;
            }
        }

        if let Some(next_start) = next_start {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = next_start;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Tokenize one sentence into lowercase word tokens and punctuation tokens.
///
/// Words are runs of alphanumerics and apostrophes; punctuation tokens are
/// runs of any other non-whitespace characters. The sentence's terminal
/// punctuation is a boundary, not a token, and is dropped.
pub fn tokenize_sentence(sentence: &str) -> Vec<String> {
    let body = sentence.trim_end_matches(|c: char| TERMINALS.contains(&c) || c.is_whitespace());

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for c in body.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        let word_char = is_word_char(c);
        if !current.is_empty() && word_char != current_is_word {
            tokens.push(std::mem::take(&mut current));
        }
        current_is_word = word_char;
        if word_char {
            current.extend(c.to_lowercase());
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Join tokens with single spaces, attaching punctuation to the preceding word.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for token in tokens {
        let token = token.as_ref();
        if !out.is_empty() && !is_punctuation(token) {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_terminal_then_uppercase() {
        let sentences = split_sentences("The cat sat. The dog ran.");
        assert_eq!(sentences, vec!["The cat sat.", "The dog ran."]);
    }

    #[test]
    fn test_split_keeps_abbreviations() {
        let sentences = split_sentences("Bring tools, e.g. a hammer. Then leave!");
        assert_eq!(sentences, vec!["Bring tools, e.g. a hammer.", "Then leave!"]);
    }

    #[test]
    fn test_split_terminal_runs_and_newlines() {
        let sentences = split_sentences("Really?!\n\nYes... Quite so");
        assert_eq!(sentences, vec!["Really?!", "Yes...", "Quite so"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn test_tokenize_words_and_punctuation() {
        let tokens = tokenize_sentence("Well, it's over -- finally.");
        assert_eq!(tokens, vec!["well", ",", "it's", "over", "--", "finally"]);
    }

    #[test]
    fn test_tokenize_splits_glued_punctuation() {
        let tokens = tokenize_sentence("(maybe)");
        assert_eq!(tokens, vec!["(", "maybe", ")"]);
    }

    #[test]
    fn test_is_punctuation() {
        assert!(is_punctuation(","));
        assert!(is_punctuation("--"));
        assert!(!is_punctuation("it's"));
        assert!(!is_punctuation("'"));
        assert!(!is_punctuation("42"));
        assert!(!is_punctuation(""));
    }

    #[test]
    fn test_join_attaches_punctuation() {
        let joined = join_tokens(&["well", ",", "it's", "over", ";", "done"]);
        assert_eq!(joined, "well, it's over; done");
    }

    #[test]
    fn test_join_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(join_tokens(&empty), "");
    }
}
