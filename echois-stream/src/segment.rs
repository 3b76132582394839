//! Incremental sentence segmentation.
//!
//! Pure splitting of an append-only text buffer: the caller threads the
//! remainder back in as more deltas arrive and flushes whatever is left at
//! end of stream.

/// Sentence-ending punctuation: half-width and full-width terminators.
pub const DEFAULT_TERMINATORS: [char; 7] = ['.', '!', '?', '。', '．', '！', '？'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceSplit {
    /// Completed sentences, trimmed, in buffer order.
    pub sentences: Vec<String>,
    /// Text after the last terminator run. Never a completed sentence;
    /// the next delta may still extend it.
    pub remainder: String,
}

/// Split `buffer` after every maximal run of terminator characters.
///
/// Treating a run as one boundary keeps interrobang forms (`!?`) attached to
/// their sentence instead of yielding a blank fragment. Completed fragments
/// are whitespace-trimmed and empties discarded; the remainder is kept
/// verbatim so leading whitespace of the next sentence survives.
pub fn split_sentences(buffer: &str, terminators: &[char]) -> SentenceSplit {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = buffer.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if terminators.contains(&c) {
            let run_continues = chars.peek().is_some_and(|n| terminators.contains(n));
            if !run_continues {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    SentenceSplit {
        sentences,
        remainder: current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn split(buffer: &str) -> SentenceSplit {
        split_sentences(buffer, &DEFAULT_TERMINATORS)
    }

    #[test]
    fn test_no_terminator_all_remainder() {
        let result = split("Hello wor");
        assert!(result.sentences.is_empty());
        assert_eq!(result.remainder, "Hello wor");
    }

    #[test]
    fn test_terminator_at_end_completes_sentence() {
        let result = split("Hello world.");
        assert_eq!(result.sentences, vec!["Hello world."]);
        assert_eq!(result.remainder, "");
    }

    #[test]
    fn test_multiple_sentences_with_remainder() {
        let result = split("One. Two! Thr");
        assert_eq!(result.sentences, vec!["One.", "Two!"]);
        assert_eq!(result.remainder, " Thr");
    }

    #[test]
    fn test_full_width_terminators() {
        let result = split("こんにちは。元気ですか？まだ");
        assert_eq!(result.sentences, vec!["こんにちは。", "元気ですか？"]);
        assert_eq!(result.remainder, "まだ");
    }

    #[test]
    fn test_interrobang_stays_attached() {
        let result = split("Really!? Yes.");
        assert_eq!(result.sentences, vec!["Really!?", "Yes."]);
        assert_eq!(result.remainder, "");
    }

    #[test]
    fn test_whitespace_only_fragment_discarded() {
        let result = split(" . tail");
        assert_eq!(result.sentences, vec!["."]);
        assert_eq!(result.remainder, " tail");
    }

    #[test]
    fn test_pure_function_same_input_same_split() {
        let a = split("One. Two? Thr");
        let b = split("One. Two? Thr");
        assert_eq!(a, b);
    }

    #[test]
    fn test_spec_delta_sequence() {
        // Deltas: "Hello", " world.", " How", " are you?"
        let mut buffer = String::new();
        let mut sentences = Vec::new();
        for delta in ["Hello", " world.", " How", " are you?"] {
            buffer.push_str(delta);
            let result = split(&buffer);
            sentences.extend(result.sentences);
            buffer = result.remainder;
        }
        assert_eq!(sentences, vec!["Hello world.", "How are you?"]);
        assert_eq!(buffer, "");
    }

    proptest! {
        /// Feeding deltas incrementally with the remainder threaded back
        /// yields the same sentences as one batch split, as long as no
        /// chunk boundary falls inside a terminator run.
        #[test]
        fn prop_incremental_matches_batch(
            chunks in proptest::collection::vec("[a-z 。？!?.]{0,12}", 1..8)
        ) {
            let full: String = chunks.concat();
            // Skip splits that land inside a terminator run.
            let mut offset = 0usize;
            let mut valid = true;
            for chunk in &chunks[..chunks.len() - 1] {
                offset += chunk.len();
                let before = full[..offset].chars().next_back();
                let after = full[offset..].chars().next();
                if let (Some(b), Some(a)) = (before, after) {
                    if DEFAULT_TERMINATORS.contains(&b) && DEFAULT_TERMINATORS.contains(&a) {
                        valid = false;
                    }
                }
            }
            prop_assume!(valid);

            let batch = split_sentences(&full, &DEFAULT_TERMINATORS);

            let mut buffer = String::new();
            let mut incremental = Vec::new();
            for chunk in &chunks {
                buffer.push_str(chunk);
                let result = split_sentences(&buffer, &DEFAULT_TERMINATORS);
                incremental.extend(result.sentences);
                buffer = result.remainder;
            }

            prop_assert_eq!(incremental, batch.sentences);
            prop_assert_eq!(buffer, batch.remainder);
        }
    }
}
