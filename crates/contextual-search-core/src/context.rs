//! Context-slice resolution for chunk enrichment.
//!
//! Before a situating summary is generated for a chunk, the document is
//! reduced to the slice the LLM gets to see: either the whole document
//! ([`ContextMethod::Full`]) or a window of `window_size` bytes on each side
//! of the chunk's first exact occurrence ([`ContextMethod::Window`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How much of the document to hand to context generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMethod {
    Full,
    Window,
}

impl FromStr for ContextMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ContextMethod::Full),
            "window" => Ok(ContextMethod::Window),
            other => Err(format!(
                "unknown context method '{}'. Use full or window.",
                other
            )),
        }
    }
}

impl fmt::Display for ContextMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextMethod::Full => f.write_str("full"),
            ContextMethod::Window => f.write_str("window"),
        }
    }
}

/// Derive the context slice for `chunk` from `full_document`.
///
/// With [`ContextMethod::Window`], a chunk that does not occur verbatim in
/// the document (for example after whitespace normalization upstream)
/// falls back to the whole document. The fallback is logged at debug level.
pub fn resolve_context<'a>(
    full_document: &'a str,
    chunk: &str,
    method: ContextMethod,
    window_size: usize,
) -> &'a str {
    match method {
        ContextMethod::Full => full_document,
        ContextMethod::Window => match full_document.find(chunk) {
            Some(pos) => {
                let start = floor_char_boundary(full_document, pos.saturating_sub(window_size));
                let end = ceil_char_boundary(
                    full_document,
                    pos.saturating_add(chunk.len()).saturating_add(window_size),
                );
                &full_document[start..end]
            }
            None => {
                tracing::debug!(
                    chunk_len = chunk.len(),
                    "chunk not found verbatim in document; using full document as context"
                );
                full_document
            }
        },
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
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

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "1. Overview\nThis document holds the system design.\n\n\
        2. Architecture\nThe system has three layers.\n- presentation\n- business\n- data\n";

    #[test]
    fn test_full_returns_document() {
        assert_eq!(
            resolve_context(DOC, "three layers", ContextMethod::Full, 10),
            DOC
        );
    }

    #[test]
    fn test_full_ignores_missing_chunk() {
        assert_eq!(
            resolve_context(DOC, "not in the document", ContextMethod::Full, 10),
            DOC
        );
    }

    #[test]
    fn test_window_contains_chunk() {
        let chunk = "The system has three layers.";
        let ctx = resolve_context(DOC, chunk, ContextMethod::Window, 12);
        assert!(ctx.contains(chunk));
        assert_eq!(ctx.len(), chunk.len() + 24);
    }

    #[test]
    fn test_window_clamped_at_edges() {
        let ctx = resolve_context(DOC, "1. Overview", ContextMethod::Window, 5);
        assert!(ctx.starts_with("1. Overview"));
        assert_eq!(ctx.len(), "1. Overview".len() + 5);

        let ctx = resolve_context(DOC, "- data\n", ContextMethod::Window, 1000);
        assert_eq!(ctx, DOC);
    }

    #[test]
    fn test_window_zero_is_chunk_itself() {
        let ctx = resolve_context(DOC, "three layers", ContextMethod::Window, 0);
        assert_eq!(ctx, "three layers");
    }

    #[test]
    fn test_window_missing_chunk_falls_back_to_document() {
        let ctx = resolve_context(DOC, "The  system has", ContextMethod::Window, 5);
        assert_eq!(ctx, DOC);
    }

    #[test]
    fn test_window_uses_first_occurrence() {
        let doc = "aaa key bbb ccc key ddd";
        let ctx = resolve_context(doc, "key", ContextMethod::Window, 4);
        assert_eq!(ctx, "aaa key bbb");
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let doc = "시스템은 3계층으로 구성됩니다.";
        let ctx = resolve_context(doc, "3계층", ContextMethod::Window, 1);
        assert!(ctx.contains("3계층"));
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("full".parse::<ContextMethod>(), Ok(ContextMethod::Full));
        assert_eq!("Window".parse::<ContextMethod>(), Ok(ContextMethod::Window));
        assert!("sliding".parse::<ContextMethod>().is_err());
    }
}
