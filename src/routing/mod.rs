//! Task routing: intent classification and model selection

mod classifier;
mod selector;

pub use classifier::{Classification, KeywordClassifier, TaskCategory, URL_PATTERN};
pub use selector::{ModelChoice, ModelSelector, AUTO_MODEL};
