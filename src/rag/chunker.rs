// src/rag/chunker.rs

//! Fixed-size sliding-window chunking for embedding input.
//! Character-based rather than token-based: rule documents are short
//! enough that the embedding model's token limit is never the binding
//! constraint.

use crate::error::{ReviewError, Result};

/// Splits `text` into chunks of at most `chunk_size` characters where
/// consecutive chunks share exactly `overlap` characters. The final
/// chunk is whatever remains and may be shorter than the overlap.
/// Requires `overlap < chunk_size`.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ReviewError::Configuration(format!(
            "invalid chunking: size {chunk_size}, overlap {overlap}"
        )));
    }

    // Indexing by chars keeps multi-byte text safe; collect once so
    // window slicing is O(1).
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = usize::min(start + chunk_size, chars.len());
        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}
