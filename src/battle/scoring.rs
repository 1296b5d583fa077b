//! Insult scoring.
//!
//! Points = base + per distinct word + per full ten characters, capped at the
//! per-turn maximum. Pure, so replaying a battle always yields the same damage.

use std::collections::HashSet;

const BASE_POINTS: u32 = 5;
const POINTS_PER_DISTINCT_WORD: u32 = 3;
const CHARS_PER_BONUS_POINT: u32 = 10;

/// Points an attack with `text` deals, never more than `max_points`.
pub fn score_insult(text: &str, max_points: u32) -> u32 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }

    let distinct: HashSet<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let words = u32::try_from(distinct.len()).unwrap_or(u32::MAX);
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);

    BASE_POINTS
        .saturating_add(words.saturating_mul(POINTS_PER_DISTINCT_WORD))
        .saturating_add(chars / CHARS_PER_BONUS_POINT)
        .min(max_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_insult_scores_nothing() {
        assert_eq!(score_insult("", 30), 0);
        assert_eq!(score_insult("   \n\t", 30), 0);
    }

    #[test]
    fn test_short_insult() {
        // 5 base + 2 words * 3 + 9 chars / 10
        assert_eq!(score_insult("you dolt!", 30), 11);
    }

    #[test]
    fn test_repeated_words_count_once() {
        assert_eq!(score_insult("bad bad BAD", 30), score_insult("bad", 30) + 1);
    }

    #[test]
    fn test_punctuation_only_words_ignored() {
        // "!!!" contributes characters but no word
        assert_eq!(score_insult("oaf !!!", 30), 5 + 3);
    }

    #[test]
    fn test_score_is_capped() {
        let long = "your code is so slow the heat death of the universe files a bug report";
        assert_eq!(score_insult(long, 30), 30);
        assert_eq!(score_insult(long, 12), 12);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let text = "Your commit history reads like a ransom note";
        assert_eq!(score_insult(text, 30), score_insult(text, 30));
    }
}
