//! Prompt augmentation from web pages and uploaded files
//!
//! Augmentation never fails a task. A page that cannot be fetched, or a file
//! that cannot be read, becomes an inline note in the prompt and an entry in
//! the [`AugmentationReport`].

mod files;
mod scrape;

pub use files::{describe_file, sniff_image, ImageFormat, ImageInfo};
pub use scrape::{extract_visible_text, HttpPageFetcher, PageFetcher};

#[cfg(test)]
pub(crate) use files::fixtures;

use crate::config::AugmentationSettings;
use crate::context::truncate_chars;
use crate::models::{AugmentationMeta, UploadedFile};
use crate::routing::URL_PATTERN;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AugmentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("{0} has no visible text")]
    Empty(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A degraded augmentation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentationNote {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AugmentationReport {
    pub urls_fetched: Vec<String>,
    pub urls_failed: Vec<String>,
    pub files_described: usize,
    pub notes: Vec<AugmentationNote>,
}

impl From<&AugmentationReport> for AugmentationMeta {
    fn from(report: &AugmentationReport) -> Self {
        Self {
            urls_fetched: report.urls_fetched.len(),
            urls_failed: report.urls_failed.len(),
            files_described: report.files_described,
            notes: report
                .notes
                .iter()
                .map(|n| format!("{}: {}", n.source, n.reason))
                .collect(),
        }
    }
}

/// The user turn after augmentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Augmented {
    pub prompt: String,
    pub report: AugmentationReport,
}

/// URLs in the order they appear, trailing punctuation trimmed, deduplicated, at most `max`
pub fn extract_urls(text: &str, max: usize) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_PATTERN.find_iter(text) {
        let url = found.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if url.is_empty() || urls.iter().any(|u| u == url) {
            continue;
        }
        urls.push(url.to_string());
        if urls.len() == max {
            break;
        }
    }
    urls
}

/// Merges scraped page text and file descriptions into a prompt
pub struct Augmenter {
    fetcher: Arc<dyn PageFetcher>,
    settings: AugmentationSettings,
}

impl Augmenter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: AugmentationSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Fetch one page and return its visible text, capped at `max_page_chars`
    pub async fn fetch_text(&self, url: &str) -> Result<String, AugmentError> {
        let html = self.fetcher.fetch(url).await?;
        let text = extract_visible_text(&html);
        if text.is_empty() {
            return Err(AugmentError::Empty(url.to_string()));
        }
        Ok(truncate_chars(&text, self.settings.max_page_chars).to_string())
    }

    pub async fn augment(&self, prompt: &str, web: bool, files: &[UploadedFile]) -> Augmented {
        let mut out = prompt.to_string();
        let mut report = AugmentationReport::default();

        if web {
            for url in extract_urls(prompt, self.settings.max_urls) {
                match self.fetch_text(&url).await {
                    Ok(text) => {
                        debug!("Scraped {} chars from {}", text.chars().count(), url);
                        out.push_str(&format!("\n\nScraped content from {url}:\n{text}"));
                        report.urls_fetched.push(url);
                    }
                    Err(e) => {
                        warn!("Could not retrieve {}: {}", url, e);
                        out.push_str(&format!("\n\nNote: Could not retrieve content from {url}"));
                        report.notes.push(AugmentationNote {
                            source: url.clone(),
                            reason: e.to_string(),
                        });
                        report.urls_failed.push(url);
                    }
                }
            }
        }

        for file in files {
            match tokio::fs::read(&file.path).await {
                Ok(bytes) => {
                    let description = describe_file(file, &bytes, self.settings.preview_chars);
                    out.push_str("\n\n");
                    out.push_str(&description);
                    report.files_described += 1;
                }
                Err(e) => {
                    warn!("Could not read file {}: {}", file.path.display(), e);
                    out.push_str(&format!("\n\nNote: Could not read file {}", file.filename));
                    report.notes.push(AugmentationNote {
                        source: file.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Augmented { prompt: out, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;

    fn augmenter(fetcher: StaticFetcher) -> Augmenter {
        Augmenter::new(Arc::new(fetcher), AugmentationSettings::default())
    }

    #[test]
    fn test_extract_urls_trims_and_dedupes() {
        let text = "see https://a.example/x, then https://a.example/x. and http://b.example/y?";
        assert_eq!(
            extract_urls(text, 3),
            vec!["https://a.example/x".to_string(), "http://b.example/y".to_string()]
        );
    }

    #[test]
    fn test_extract_urls_bounded() {
        let text = "https://1.test https://2.test https://3.test https://4.test";
        assert_eq!(extract_urls(text, 3).len(), 3);
    }

    #[tokio::test]
    async fn test_web_augmentation_appends_blocks() {
        let fetcher = StaticFetcher::new().with_page("https://ok.test/a", "<p>Page text</p>");
        let result = augmenter(fetcher)
            .augment("summarize https://ok.test/a and https://down.test/b", true, &[])
            .await;

        assert!(result
            .prompt
            .contains("\n\nScraped content from https://ok.test/a:\nPage text"));
        assert!(result
            .prompt
            .ends_with("\n\nNote: Could not retrieve content from https://down.test/b"));
        assert_eq!(result.report.urls_fetched, vec!["https://ok.test/a"]);
        assert_eq!(result.report.urls_failed, vec!["https://down.test/b"]);
        assert_eq!(result.report.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_web_disabled_leaves_prompt() {
        let fetcher = StaticFetcher::new().with_page("https://ok.test/a", "text");
        let result = augmenter(fetcher).augment("read https://ok.test/a", false, &[]).await;
        assert_eq!(result.prompt, "read https://ok.test/a");
        assert_eq!(result.report, AugmentationReport::default());
    }

    #[tokio::test]
    async fn test_page_text_is_capped() {
        let long = "x".repeat(6000);
        let fetcher = StaticFetcher::new().with_page("https://big.test", &long);
        let text = augmenter(fetcher).fetch_text("https://big.test").await.unwrap();
        assert_eq!(text.chars().count(), 5000);
    }

    #[tokio::test]
    async fn test_file_augmentation() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"three little words";
        let file = UploadedFile::new("notes.txt", "text/plain", bytes, dir.path());
        std::fs::write(&file.path, bytes).unwrap();

        let missing = UploadedFile::new("gone.txt", "text/plain", b"x", dir.path());

        let result = augmenter(StaticFetcher::new())
            .augment("describe these", false, &[file, missing])
            .await;

        assert!(result
            .prompt
            .contains("[Document notes.txt: 3 words. Preview: three little words]"));
        assert!(result.prompt.ends_with("Note: Could not read file gone.txt"));
        assert_eq!(result.report.files_described, 1);
        assert_eq!(result.report.notes.len(), 1);

        let meta = AugmentationMeta::from(&result.report);
        assert_eq!(meta.files_described, 1);
        assert_eq!(meta.notes.len(), 1);
    }
}
