use crate::augment::ImageFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Text,
    Binary,
}

impl FileKind {
    /// Image when the magic bytes match a known format, Text when valid UTF-8
    pub fn detect(bytes: &[u8]) -> Self {
        if ImageFormat::from_magic(bytes).is_some() {
            FileKind::Image
        } else if std::str::from_utf8(bytes).is_ok() {
            FileKind::Text
        } else {
            FileKind::Binary
        }
    }
}

/// Record of a file written to the upload directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub kind: FileKind,
    pub path: PathBuf,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
        upload_dir: &std::path::Path,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let filename = sanitize_filename(&filename.into());
        let path = upload_dir.join(format!("{id}_{filename}"));

        Self {
            id,
            filename,
            content_type: content_type.into(),
            size_bytes: bytes.len() as u64,
            kind: FileKind::detect(bytes),
            path,
            uploaded_at: Utc::now(),
        }
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(FileKind::detect(b"GIF89a\x01\x00\x01\x00"), FileKind::Image);
        assert_eq!(FileKind::detect("plain notes".as_bytes()), FileKind::Text);
        assert_eq!(FileKind::detect(&[0xff, 0xfe, 0x00, 0x9f]), FileKind::Binary);
    }

    #[test]
    fn test_upload_path_is_prefixed_with_id() {
        let file = UploadedFile::new("a b.txt", "text/plain", b"hello", std::path::Path::new("/tmp/u"));
        assert_eq!(file.filename, "a_b.txt");
        assert_eq!(file.size_bytes, 5);
        assert!(file.path.ends_with(format!("{}_a_b.txt", file.id)));
    }
}
