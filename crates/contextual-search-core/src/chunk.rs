//! Fixed-window text chunker with overlap.
//!
//! Splits a document into [`Chunk`]s of at most `chunk_size` bytes. Each
//! window that stops short of the end of the text is snapped back to just
//! past the last whitespace inside it, so words are not split. Consecutive
//! windows overlap by `overlap` bytes.
//!
//! # Algorithm
//!
//! 1. Start at offset 0 with a window of `chunk_size` bytes.
//! 2. If the window does not reach the end of the text, move its end back
//!    to just after the last whitespace in the window (if there is one).
//! 3. Emit the trimmed window text unless it is empty.
//! 4. Stop once the window end reaches the end of the text.
//! 5. Otherwise start the next window at `end - overlap`. If the overlap is
//!    so large that this would not move past `end - chunk_size` (or past the
//!    current start), start at `end` instead.
//!
//! All boundaries are moved onto `char` boundaries, so multi-byte UTF-8
//! characters are never split.
//!
//! # Example
//!
//! ```rust
//! use contextual_search_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("the quick brown fox jumps over the lazy dog", 20, 5);
//! assert_eq!(chunks[0].text, "the quick brown fox");
//! assert_eq!(chunks.last().unwrap().end_offset, 43);
//! ```

use crate::models::Chunk;

/// Split `text` into overlapping, whitespace-snapped chunks.
///
/// Never fails: empty or whitespace-only input yields an empty vector, and
/// degenerate parameters (`chunk_size == 0`, `overlap >= chunk_size`) are
/// clamped so the scan always makes forward progress.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if text.is_empty() {
        return chunks;
    }

    let chunk_size = chunk_size.max(1);
    let len = text.len();
    let mut start = 0usize;

    while start < len {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(len));
        if end <= start {
            // A single character wider than chunk_size.
            end = ceil_char_boundary(text, start + 1);
        }

        if end < len {
            end = snap_to_whitespace(text, start, end);
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(Chunk {
                text: piece.to_string(),
                sequence_id: chunks.len(),
                start_offset: start,
                end_offset: end,
            });
        }

        if end >= len {
            break;
        }

        let mut next = floor_char_boundary(text, end.saturating_sub(overlap));
        if end >= chunk_size && next <= end - chunk_size {
            next = end;
        }
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

/// Move `end` back to just past the last whitespace in `text[start..end]`.
/// Returns `end` unchanged when the window has no whitespace.
fn snap_to_whitespace(text: &str, start: usize, end: usize) -> usize {
    text[start..end]
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .last()
        .map(|(pos, c)| start + pos + c.len_utf8())
        .unwrap_or(end)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
