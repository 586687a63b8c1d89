//! Keyword-weighted task classification

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matches http(s) URLs embedded in free text
pub static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'()]+"#).expect("static URL regex"));

const URL_BONUS: u32 = 2;
const NUMERIC_BONUS: u32 = 1;
const INTERROGATIVE_BONUS: u32 = 1;
const FIRST_TOKEN_BONUS: u32 = 1;

const INTERROGATIVES: &[&str] = &["what", "why", "how", "when", "where", "who", "which"];

/// Closed set of task-intent labels.
///
/// Declaration order doubles as the tie-break priority: when two categories
/// score equally, the one declared first wins. `FastResponse` is the fallback
/// for prompts that match nothing and never wins a scored comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Creative,
    Analytical,
    Coding,
    Conversational,
    WebRetrieval,
    DataVisualization,
    Multimodal,
    Reasoning,
    FastResponse,
}

impl TaskCategory {
    /// Scored categories in tie-break priority order
    pub const SCORED: [TaskCategory; 8] = [
        TaskCategory::Creative,
        TaskCategory::Analytical,
        TaskCategory::Coding,
        TaskCategory::Conversational,
        TaskCategory::WebRetrieval,
        TaskCategory::DataVisualization,
        TaskCategory::Multimodal,
        TaskCategory::Reasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Creative => "creative",
            TaskCategory::Analytical => "analytical",
            TaskCategory::Coding => "coding",
            TaskCategory::Conversational => "conversational",
            TaskCategory::WebRetrieval => "web_retrieval",
            TaskCategory::DataVisualization => "data_visualization",
            TaskCategory::Multimodal => "multimodal",
            TaskCategory::Reasoning => "reasoning",
            TaskCategory::FastResponse => "fast_response",
        }
    }

    /// Keywords matched as substrings of the lower-cased prompt.
    ///
    /// The sets are disjoint and no keyword contains another category's keyword.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            TaskCategory::Creative => &[
                "write", "create", "generate", "compose", "design", "brainstorm", "story",
                "content", "marketing", "blog",
            ],
            TaskCategory::Analytical => &[
                "analyze", "compare", "evaluate", "assess", "examine", "study", "research",
                "review", "summarize", "insights",
            ],
            TaskCategory::Coding => &[
                "code", "program", "develop", "build", "debug", "fix", "api", "function",
                "algorithm", "script",
            ],
            TaskCategory::Conversational => &[
                "chat", "talk", "discuss", "conversation", "explain", "help", "assist",
            ],
            TaskCategory::WebRetrieval => &[
                "scrape", "extract", "fetch", "crawl", "web", "website", "url", "html",
            ],
            TaskCategory::DataVisualization => &[
                "chart", "graph", "visualization", "plot", "statistics", "trends", "data",
                "metrics",
            ],
            TaskCategory::Multimodal => &[
                "image", "photo", "picture", "diagram", "screenshot", "audio", "video",
            ],
            TaskCategory::Reasoning => &[
                "reason", "logic", "deduce", "prove", "infer", "solve", "puzzle", "hypothesis",
            ],
            TaskCategory::FastResponse => &[],
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        TaskCategory::SCORED
            .into_iter()
            .chain(std::iter::once(TaskCategory::FastResponse))
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown task category: {s}"))
    }
}

/// Outcome of classifying one prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: TaskCategory,
    /// Winning score over the sum of all scores, in [0, 1]
    pub confidence: f64,
    /// Raw per-category scores in priority order
    pub scores: Vec<(TaskCategory, u32)>,
}

impl Classification {
    fn fallback(scores: Vec<(TaskCategory, u32)>) -> Self {
        Self {
            category: TaskCategory::FastResponse,
            confidence: 0.0,
            scores,
        }
    }
}

/// Maps free text to a [`TaskCategory`] via weighted keyword matching
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, prompt: &str) -> Classification {
        let lowered = prompt.trim().to_lowercase();
        if lowered.is_empty() {
            return Classification::fallback(Vec::new());
        }

        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();
        let first_token = tokens.first().copied();

        let mut scores: Vec<(TaskCategory, u32)> = TaskCategory::SCORED
            .iter()
            .map(|category| {
                let keywords = category.keywords();
                let mut score = keywords.iter().filter(|kw| lowered.contains(*kw)).count() as u32;
                if first_token.is_some_and(|first| keywords.contains(&first)) {
                    score += FIRST_TOKEN_BONUS;
                }
                (*category, score)
            })
            .collect();

        if URL_PATTERN.is_match(&lowered) {
            add_bonus(&mut scores, TaskCategory::WebRetrieval, URL_BONUS);
        }

        let numeric_tokens = lowered
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '%' | '(' | ')')))
            // f64 parsing also accepts "inf" and "nan"
            .filter(|t| t.bytes().any(|b| b.is_ascii_digit()) && t.parse::<f64>().is_ok())
            .count();
        if numeric_tokens >= 2 {
            add_bonus(&mut scores, TaskCategory::DataVisualization, NUMERIC_BONUS);
        }

        let interrogative = tokens.iter().any(|t| INTERROGATIVES.contains(t)) || lowered.ends_with('?');
        if interrogative {
            add_bonus(&mut scores, TaskCategory::Conversational, INTERROGATIVE_BONUS);
        }

        let total: u32 = scores.iter().map(|(_, s)| s).sum();

        // Strictly-greater comparison keeps the earliest category on ties
        let mut winner: Option<(TaskCategory, u32)> = None;
        for &(category, score) in &scores {
            if winner.map_or(true, |(_, best)| score > best) {
                winner = Some((category, score));
            }
        }

        match winner {
            Some((category, score)) if score > 0 => Classification {
                category,
                confidence: f64::from(score) / f64::from(total),
                scores,
            },
            _ => Classification::fallback(scores),
        }
    }
}

fn add_bonus(scores: &mut [(TaskCategory, u32)], category: TaskCategory, bonus: u32) {
    if let Some(entry) = scores.iter_mut().find(|(c, _)| *c == category) {
        entry.1 += bonus;
    }
}
