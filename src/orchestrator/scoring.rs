//! Heuristic response quality score.
//!
//! The score is illustrative only. It rewards length, moderate sentence
//! length, on-topic vocabulary and visible structure, and says nothing about
//! whether a response is correct.

use crate::routing::TaskCategory;
use serde::{Deserialize, Serialize};

const CONNECTIVES: &[&str] = &["because", "therefore", "however", "first"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub length: f64,
    pub readability: f64,
    pub keywords: f64,
    pub structure: f64,
    /// Sum of the components, capped at 1.0
    pub total: f64,
}

fn length_score(words: usize) -> f64 {
    match words {
        w if w > 200 => 0.30,
        w if w > 100 => 0.25,
        w if w > 50 => 0.20,
        w if w > 20 => 0.10,
        _ => 0.05,
    }
}

fn readability_score(text: &str, words: usize) -> f64 {
    if words == 0 {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
        .max(1);
    let avg = words as f64 / sentences as f64;

    if (8.0..=25.0).contains(&avg) {
        0.20
    } else if (4.0..=35.0).contains(&avg) {
        0.10
    } else {
        0.05
    }
}

fn keyword_score(lowered: &str, category: TaskCategory) -> f64 {
    let hits = category.keywords().iter().filter(|kw| lowered.contains(*kw)).count();
    (hits as f64 * 0.05).min(0.20)
}

fn is_list_line(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

fn structure_score(text: &str, lowered: &str) -> f64 {
    let trimmed = text.trim_end();
    let mut score = 0.0;

    if trimmed.ends_with(['.', '!', '?']) || trimmed.ends_with("```") {
        score += 0.10;
    }
    if text.contains("\n\n") || text.lines().any(is_list_line) {
        score += 0.10;
    }
    let has_connective = lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| CONNECTIVES.contains(&token));
    if has_connective {
        score += 0.10;
    }

    f64::min(score, 0.30)
}

/// Score a response for the category it was classified under
pub fn score_response(text: &str, category: TaskCategory) -> QualityScore {
    let lowered = text.to_lowercase();
    let words = text.split_whitespace().count();

    let length = length_score(words);
    let readability = readability_score(text, words);
    let keywords = keyword_score(&lowered, category);
    let structure = structure_score(text, &lowered);

    QualityScore {
        length,
        readability,
        keywords,
        structure,
        total: f64::min(length + readability + keywords + structure, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_text() {
        let score = score_response("", TaskCategory::Creative);
        assert!(approx(score.total, 0.05));
        assert!(approx(score.readability, 0.0));
    }

    #[test]
    fn test_short_sentence() {
        // four words, one sentence, terminal punctuation
        let score = score_response("Dragons guard old gold.", TaskCategory::Creative);
        assert!(approx(score.length, 0.05));
        assert!(approx(score.readability, 0.10));
        assert!(approx(score.keywords, 0.0));
        assert!(approx(score.structure, 0.10));
    }

    #[test]
    fn test_structured_on_topic_response() {
        let text = "First, write the story outline so the content stays focused on one idea.\n\n\
                    - Generate a strong opening line for the blog because it sets the tone.\n\
                    - Compose each scene, however short, with a clear goal in mind.";
        let score = score_response(text, TaskCategory::Creative);

        // write, story, content, blog, generate, compose: capped at four hits
        assert!(approx(score.keywords, 0.20));
        assert!(approx(score.structure, 0.30));
        assert!(approx(score.readability, 0.20));
        assert!(score.total <= 1.0);
    }

    #[test]
    fn test_total_never_exceeds_one() {
        let sentence = "First we analyze the data because insights matter, however we also review and assess each study. ";
        let text = format!("{}\n\n1. done.", sentence.repeat(40));
        let score = score_response(&text, TaskCategory::Analytical);
        assert!(approx(score.total, 1.0));
    }

    #[test]
    fn test_list_detection() {
        assert!(is_list_line("  - item"));
        assert!(is_list_line("12. item"));
        assert!(!is_list_line("2024 was a year"));
    }
}
