//! Built-in agent templates

use crate::routing::TaskCategory;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub category: TaskCategory,
    pub suggested_model: &'static str,
}

impl AgentTemplate {
    /// Lookup key: the name lower-cased with spaces removed
    pub fn key(&self) -> String {
        template_key(self.name)
    }
}

pub fn template_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "")
}

pub static TEMPLATES: &[AgentTemplate] = &[
    AgentTemplate {
        name: "Content Writer",
        description: "Drafts blog posts, articles and marketing copy",
        system_prompt: "You are an expert content writer. Write clear, engaging, search-friendly \
                        content in a conversational tone and close with actionable takeaways.",
        category: TaskCategory::Creative,
        suggested_model: "llama3-70b-8192",
    },
    AgentTemplate {
        name: "Data Analyst",
        description: "Analyzes data and turns it into recommendations",
        system_prompt: "You are a data analyst. Give data-driven insights with concrete \
                        recommendations and explain any statistics you rely on.",
        category: TaskCategory::Analytical,
        suggested_model: "llama-3.3-70b-versatile",
    },
    AgentTemplate {
        name: "Code Assistant",
        description: "Helps with programming and debugging",
        system_prompt: "You are an expert programmer. Provide clean, efficient code with short \
                        explanations and favour maintainable solutions.",
        category: TaskCategory::Coding,
        suggested_model: "llama3-70b-8192",
    },
    AgentTemplate {
        name: "Web Researcher",
        description: "Reads web pages and summarizes what they say",
        system_prompt: "You are a web research specialist. Pull the key facts out of the pages \
                        you are given and summarize them with the source URL.",
        category: TaskCategory::WebRetrieval,
        suggested_model: "llama3-70b-8192",
    },
    AgentTemplate {
        name: "Data Visualizer",
        description: "Suggests charts and graphs for a dataset",
        system_prompt: "You are a data visualization expert. Propose charts that make the data \
                        easy to read and describe the patterns and trends they reveal.",
        category: TaskCategory::DataVisualization,
        suggested_model: "llama-3.3-70b-versatile",
    },
    AgentTemplate {
        name: "Customer Support",
        description: "Answers customer questions with empathy",
        system_prompt: "You are a friendly customer support representative. Be helpful, \
                        empathetic and solution-focused, and keep a warm professional tone.",
        category: TaskCategory::Conversational,
        suggested_model: "llama-3.1-8b-instant",
    },
];

pub fn find_template(key: &str) -> Option<&'static AgentTemplate> {
    let wanted = template_key(key);
    TEMPLATES.iter().find(|t| t.key() == wanted)
}
