//! Boundary-aware text chunker.
//!
//! Splits document text into overlapping segments of at most `chunk_size`
//! characters. Before each cut, the chunker scans backward within the
//! overlap window for a sentence-terminal character (`.`, `!`, `?`) or a
//! newline and snaps the cut to just after it, so chunks tend to end on
//! sentence boundaries. When no boundary exists in the window the cut is a
//! hard one at `chunk_size` and may split mid-word. The tradeoff buys a
//! predictable upper bound on chunk size over long unstructured stretches
//! such as tables.
//!
//! All offsets are measured in characters, not bytes, so multi-byte UTF-8
//! input never splits inside a code point.

/// Characters a chunk prefers to end just after.
const BOUNDARY_CHARS: [char; 4] = ['.', '!', '?', '\n'];

/// Split `text` into ordered chunks of at most `chunk_size` characters,
/// consecutive chunks sharing `overlap` characters.
///
/// Whitespace-only pieces are dropped after trimming, so the output can be
/// empty for a non-empty but blank input. `overlap` must be smaller than
/// `chunk_size`; callers get that guarantee from config validation.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let mut end = start + chunk_size;

        if end < total {
            // Scan backward from the candidate cut, inclusive window
            // [start + chunk_size - overlap, end], for the last boundary.
            let floor = start + chunk_size - overlap;
            let mut i = end;
            loop {
                if BOUNDARY_CHARS.contains(&chars[i]) {
                    end = i + 1;
                    break;
                }
                if i == floor {
                    break;
                }
                i -= 1;
            }
        }

        let piece: String = chars[start..end.min(total)].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        let next = end.saturating_sub(overlap);
        if next <= start {
            // Degenerate size/overlap pairing cannot advance.
            break;
        }
        start = next;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("Hello, world!", 700, 80);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn whitespace_only_input_yields_no_chunks() {
        assert!(chunk_text("   \n\t  ", 700, 80).is_empty());
        assert!(chunk_text("", 700, 80).is_empty());
    }

    #[test]
    fn cut_snaps_backward_to_sentence_boundary() {
        // Candidate cut is at offset 6; the '.' at offset 4 sits inside the
        // backward window [4, 6], so the cut lands right after it.
        let chunks = chunk_text("AAAA. BBBB", 6, 2);
        assert_eq!(chunks[0], "AAAA.");
    }

    #[test]
    fn newline_counts_as_a_boundary() {
        let text = "alpha\nbetabeta gamma";
        let chunks = chunk_text(text, 8, 4);
        assert_eq!(chunks[0], "alpha");
    }

    #[test]
    fn hard_cut_when_no_boundary_in_window() {
        let text = "x".repeat(260);
        let chunks = chunk_text(&text, 100, 20);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 100);
    }

    #[test]
    fn consecutive_chunks_share_exactly_overlap_without_snapping() {
        let text: String = ('a'..='z').cycle().take(300).collect();
        let chunks = chunk_text(&text, 100, 20);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 20).collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn non_overlapping_portions_reconstruct_the_input() {
        // No boundary characters and no whitespace, so trimming is a no-op
        // and every cut is a hard cut at exactly chunk_size.
        let text = "y".repeat(260);
        let chunks = chunk_text(&text, 100, 20);
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(20));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn snapped_cut_shrinks_the_window_into_new_text() {
        // First cut snaps to offset 5 ("AAAA."), so the second chunk starts
        // at 3 and still shares exactly `overlap` characters with the first.
        let chunks = chunk_text("AAAA. BBBB", 6, 2);
        assert_eq!(chunks[0], "AAAA.");
        assert!(chunks[1].starts_with("A."));
    }

    #[test]
    fn multibyte_input_never_splits_a_code_point() {
        let text = "é".repeat(250);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == 'é')));
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "The quick brown fox. Jumped over the lazy dog! Again and again? Yes.\n".repeat(40);
        assert_eq!(chunk_text(&text, 120, 30), chunk_text(&text, 120, 30));
    }
}
