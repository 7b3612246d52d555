//! Sentence-aware text chunker.
//!
//! Splits document text into segments of at most `max_chars` characters
//! without cutting through a sentence, so each retrievable unit carries a
//! complete thought.
//!
//! # Algorithm
//!
//! 1. Split text into sentences. A sentence ends after a run of `.`, `!`
//!    or `?`; trailing text without a terminator is the last sentence.
//! 2. Greedily append sentences to a pending buffer.
//! 3. When appending the next sentence would push the buffer past
//!    `max_chars`, flush the buffer (trimmed) and start a new one with
//!    that sentence.
//! 4. A single sentence longer than `max_chars` is kept whole.
//! 5. Empty or whitespace-only input yields no chunks.
//!
//! Lengths are counted in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use context_ledger_core::chunk::chunk_sentences;
//!
//! let chunks = chunk_sentences("Hello world. Second sentence!", 500);
//! assert_eq!(chunks, vec!["Hello world. Second sentence!"]);
//! ```

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 500;

/// Split text into sentence-aligned chunks of at most `max_chars` characters.
///
/// # Guarantees
///
/// - Chunk order follows text order.
/// - Every chunk is trimmed and non-empty.
/// - No chunk exceeds `max_chars` unless it is a single oversized sentence.
/// - Concatenating the chunks reproduces the input modulo whitespace at
///   chunk boundaries.
pub fn chunk_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len > max_chars && current_len > 0 {
            flush(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }
    flush(&mut chunks, &current);

    chunks
}

/// Split text after every run of sentence terminators (`.`, `!`, `?`).
///
/// Leading whitespace stays attached to the sentence that follows it, so
/// the returned slices concatenate back to `text` exactly.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut in_terminators = false;

    for (i, c) in text.char_indices() {
        let is_terminator = matches!(c, '.' | '!' | '?');
        if in_terminators && !is_terminator {
            sentences.push(&text[start..i]);
            start = i;
        }
        in_terminators = is_terminator;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

fn flush(chunks: &mut Vec<String>, buf: &str) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
