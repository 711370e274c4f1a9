// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text accuracy metrics (word and character error rates) and a heuristic
// confidence score for extracted text.

use serde::Serialize;

/// Words whose presence suggests the extraction produced real prose.
const COMMON_WORDS: [&str; 12] = [
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Accuracy of extracted text against the expected text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TextComparison {
    /// Word edit distance over the expected word count.
    pub wer: f64,
    /// Character edit distance over the expected character count.
    pub cer: f64,
    /// `1 − cer`, clamped to [0, 1].
    pub match_score: f64,
}

/// Compare case-insensitively. An empty expected text yields zero error
/// rates.
pub fn compare_text(expected: &str, extracted: &str) -> TextComparison {
    let expected = expected.to_lowercase();
    let extracted = extracted.to_lowercase();

    let expected_words: Vec<&str> = expected.split_whitespace().collect();
    let extracted_words: Vec<&str> = extracted.split_whitespace().collect();
    let wer = if expected_words.is_empty() {
        0.0
    } else {
        edit_distance(&expected_words, &extracted_words) as f64 / expected_words.len() as f64
    };

    let expected_chars: Vec<char> = expected.chars().collect();
    let extracted_chars: Vec<char> = extracted.chars().collect();
    let cer = if expected_chars.is_empty() {
        0.0
    } else {
        edit_distance(&expected_chars, &extracted_chars) as f64 / expected_chars.len() as f64
    };

    TextComparison {
        wer,
        cer,
        match_score: (1.0 - cer).clamp(0.0, 1.0),
    }
}

/// Heuristic confidence (0–100) for text with no engine-reported score.
pub fn estimate_confidence(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    let mut confidence: f64 = 50.0;
    let length = text.chars().count();
    if length > 50 {
        confidence += 10.0;
    }

    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    if !words.is_empty() {
        let common = words.iter().filter(|w| COMMON_WORDS.contains(*w)).count();
        confidence += common as f64 / words.len() as f64 * 20.0;
    }

    let special = text
        .chars()
        .filter(|&c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | ',' | '!' | '?')))
        .count();
    if special as f64 / length as f64 > 0.3 {
        confidence -= 20.0;
    }

    confidence.clamp(0.0, 100.0)
}

/// Levenshtein distance over arbitrary tokens.
fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, left) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, right) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(left != right);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance::<char>(&[], &[]), 0);
        assert_eq!(edit_distance(&['a', 'b'], &[]), 2);
        let kitten: Vec<char> = "kitten".chars().collect();
        let sitting: Vec<char> = "sitting".chars().collect();
        assert_eq!(edit_distance(&kitten, &sitting), 3);
    }

    #[test]
    fn identical_text_matches_exactly() {
        let cmp = compare_text("Invoice Total 42", "invoice total 42");
        assert_eq!(cmp.wer, 0.0);
        assert_eq!(cmp.cer, 0.0);
        assert_eq!(cmp.match_score, 1.0);
    }

    #[test]
    fn one_wrong_word() {
        let cmp = compare_text("the quick brown fox", "the quick brown box");
        assert!((cmp.wer - 0.25).abs() < 1e-12);
        assert!((cmp.cer - 1.0 / 19.0).abs() < 1e-12);
        assert!(cmp.match_score > 0.9);
    }

    #[test]
    fn garbage_clamps_match_score() {
        let cmp = compare_text("ab", "completely different text");
        assert!(cmp.cer > 1.0);
        assert_eq!(cmp.match_score, 0.0);
    }

    #[test]
    fn empty_expected_text_has_no_error_rate() {
        let cmp = compare_text("", "anything");
        assert_eq!(cmp.wer, 0.0);
        assert_eq!(cmp.cer, 0.0);
        assert_eq!(cmp.match_score, 1.0);
    }

    #[test]
    fn confidence_heuristic() {
        assert_eq!(estimate_confidence("   "), 0.0);
        assert_eq!(estimate_confidence("hello world"), 50.0);
        // One of three words is common.
        assert!((estimate_confidence("bread and butter") - (50.0 + 20.0 / 3.0)).abs() < 1e-9);
        assert_eq!(estimate_confidence("the cat in hat"), 60.0);
        // Mostly symbols.
        assert_eq!(estimate_confidence("#$%^&*"), 30.0);

        let long = "The report was filed on time and signed by the manager of the branch office.";
        let score = estimate_confidence(long);
        assert!(score > 60.0 && score <= 80.0, "score {score}");
    }
}
