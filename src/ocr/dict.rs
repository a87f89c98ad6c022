//! Character dictionary and CTC decoding
//!
//! The recognizer network emits per-timestep class probabilities; classes
//! map onto the character dictionary with index 0 reserved for the CTC
//! blank token and, when enabled, a trailing space class.

/// Greedy CTC decoder over a parsed character dictionary.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    labels: Vec<String>,
}

impl CtcDecoder {
    /// Parse the dictionary text, one label per line.
    pub fn from_dict(dict: &str, space: bool) -> Self {
        let mut labels = Vec::with_capacity(dict.lines().count() + 2);
        labels.push(String::new()); // blank
        for line in dict.lines() {
            labels.push(line.trim_end_matches('\r').to_string());
        }
        if space {
            labels.push(" ".to_string());
        }
        Self { labels }
    }

    /// Number of known classes including the blank token.
    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    /// Decode a `[seq_len, classes]` row-major probability matrix.
    ///
    /// Greedy argmax per timestep, collapsing repeats and dropping blanks.
    /// Returns the text and the mean probability of the kept timesteps.
    pub fn decode(&self, probs: &[f32], classes: usize) -> (String, f32) {
        let mut text = String::new();
        let mut kept = 0usize;
        let mut total = 0.0f32;
        let mut prev = 0usize;

        for step in probs.chunks_exact(classes) {
            let (index, prob) = argmax(step);
            if index != 0 && index != prev {
                // Classes beyond the dictionary happen when model and
                // dictionary versions disagree; skip them.
                if let Some(label) = self.labels.get(index) {
                    text.push_str(label);
                    kept += 1;
                    total += prob;
                }
            }
            prev = index;
        }

        let mean = if kept == 0 { 0.0 } else { total / kept as f32 };
        (text, mean)
    }
}

fn argmax(row: &[f32]) -> (usize, f32) {
    let mut best = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    (best, best_val)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> CtcDecoder {
        CtcDecoder::from_dict("a\nb\nc", false)
    }

    #[test]
    fn test_dictionary_layout() {
        let d = decoder();
        // blank + three characters
        assert_eq!(d.class_count(), 4);

        let with_space = CtcDecoder::from_dict("a\nb\nc", true);
        assert_eq!(with_space.class_count(), 5);
    }

    #[test]
    fn test_windows_line_endings() {
        let d = CtcDecoder::from_dict("a\r\nb\r\nc", false);
        assert_eq!(d.class_count(), 4);

        let probs = one_hot(&[1], 4);
        assert_eq!(d.decode(&probs, 4).0, "a");
    }

    #[test]
    fn test_decode_collapses_repeats_and_blanks() {
        let d = decoder();
        // timesteps: a a blank b b c -> "abc"
        let probs = one_hot(&[1, 1, 0, 2, 2, 3], 4);
        let (text, confidence) = d.decode(&probs, 4);
        assert_eq!(text, "abc");
        assert!((confidence - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_decode_blank_separated_repeats_survive() {
        let d = decoder();
        // a blank a -> "aa"
        let probs = one_hot(&[1, 0, 1], 4);
        assert_eq!(d.decode(&probs, 4).0, "aa");
    }

    #[test]
    fn test_decode_all_blank_is_empty() {
        let d = decoder();
        let probs = one_hot(&[0, 0, 0], 4);
        let (text, confidence) = d.decode(&probs, 4);
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_decode_space_class() {
        let d = CtcDecoder::from_dict("a\nb", true);
        // a space b -> "a b" (classes: blank, a, b, space)
        let probs = one_hot(&[1, 3, 2], 4);
        assert_eq!(d.decode(&probs, 4).0, "a b");
    }

    #[test]
    fn test_decode_out_of_range_class_is_skipped() {
        let d = decoder();
        // class 5 does not exist in a 4-class dictionary
        let probs = one_hot(&[1, 5, 2], 6);
        assert_eq!(d.decode(&probs, 6).0, "ab");
    }

    fn one_hot(indices: &[usize], classes: usize) -> Vec<f32> {
        let mut probs = vec![0.0f32; indices.len() * classes];
        for (t, &i) in indices.iter().enumerate() {
            probs[t * classes + i] = 1.0;
        }
        probs
    }
}
