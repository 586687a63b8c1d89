//! Category-driven model selection with tiered escalation

use super::TaskCategory;
use crate::config::RoutingSettings;
use serde::{Deserialize, Serialize};

/// Model preference value that defers to the selector
pub const AUTO_MODEL: &str = "auto";

/// The model resolved for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub model: String,
    pub category: TaskCategory,
    pub complexity: usize,
    /// Whether the base model was bumped one tier up
    pub escalated: bool,
    /// False when the agent pinned an explicit model
    pub auto_selected: bool,
}

/// Maps (category, complexity) to a concrete upstream model identifier
#[derive(Debug, Clone)]
pub struct ModelSelector {
    settings: RoutingSettings,
}

impl ModelSelector {
    pub fn new(settings: RoutingSettings) -> Self {
        Self { settings }
    }

    /// Crude difficulty proxy: word count divided by a fixed step.
    ///
    /// This is a heuristic, not a measured cost model.
    pub fn complexity(&self, prompt: &str) -> usize {
        prompt.split_whitespace().count() / self.settings.words_per_complexity_point.max(1)
    }

    /// Base model for a category, or the default entry
    pub fn base_model(&self, category: TaskCategory) -> &str {
        self.settings
            .models
            .get(category.as_str())
            .map(String::as_str)
            .unwrap_or(&self.settings.default_model)
    }

    /// Next tier up the escalation chain. The top tier, and any model outside
    /// the chain, map to themselves.
    pub fn escalate<'a>(&'a self, model: &'a str) -> &'a str {
        let chain = &self.settings.escalation_chain;
        match chain.iter().position(|m| m == model) {
            Some(idx) if idx + 1 < chain.len() => &chain[idx + 1],
            _ => model,
        }
    }

    pub fn is_complex(&self, complexity: usize) -> bool {
        complexity > self.settings.complexity_threshold
    }

    /// Base model for the category, escalated one tier when complexity exceeds the threshold
    pub fn select(&self, category: TaskCategory, complexity: usize) -> String {
        let base = self.base_model(category);
        if self.is_complex(complexity) {
            self.escalate(base).to_string()
        } else {
            base.to_string()
        }
    }

    /// Resolve the model for a task.
    ///
    /// An explicit (non-`auto`) agent preference bypasses selection entirely.
    /// `force_escalation` treats the prompt as complex regardless of length.
    pub fn resolve(
        &self,
        preference: &str,
        category: TaskCategory,
        complexity: usize,
        force_escalation: bool,
    ) -> ModelChoice {
        if !preference.trim().is_empty() && !preference.eq_ignore_ascii_case(AUTO_MODEL) {
            return ModelChoice {
                model: preference.to_string(),
                category,
                complexity,
                escalated: false,
                auto_selected: false,
            };
        }

        let base = self.base_model(category);
        let model = if force_escalation || self.is_complex(complexity) {
            self.escalate(base)
        } else {
            base
        };

        ModelChoice {
            escalated: model != base,
            model: model.to_string(),
            category,
            complexity,
            auto_selected: true,
        }
    }
}
