//! Character-bounded text chunking for inference requests.
//!
//! Sizes are counted in Unicode scalar values, so a segment never splits a
//! multi-byte character. Segments borrow from the input.

/// Default maximum characters per inference request.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Check if content needs more than one chunk.
pub fn needs_chunking(text: &str, max_chars: usize) -> bool {
    max_chars > 0 && text.len() > max_chars && text.chars().count() > max_chars
}

/// Split `text` into contiguous segments of exactly `max_chars` characters,
/// except the last which holds the remainder.
///
/// Text at or under the limit comes back as a single segment equal to the
/// input. A `max_chars` of zero disables chunking.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    if !needs_chunking(text, max_chars) {
        return vec![text];
    }

    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut start = 0;
    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count > 0 && count % max_chars == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }
    chunks.push(&text[start..]);
    chunks
}
