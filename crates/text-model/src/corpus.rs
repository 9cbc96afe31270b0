use std::io;
use std::path::Path;

/// Corpus compiled into the binary, used when no corpus file is configured.
pub const DEFAULT_CORPUS: &str = include_str!("../corpus/default.txt");

/// Read a training corpus from disk, or fall back to [`DEFAULT_CORPUS`].
pub fn load_corpus<P: AsRef<Path>>(path: Option<P>) -> io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(DEFAULT_CORPUS.to_string()),
    }
}
