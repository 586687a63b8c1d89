//! Structural descriptions of uploaded files
//!
//! Images are described from their headers only (dimensions, format, color
//! mode). Text files get a word count and a short preview. Nothing here looks
//! at what the content means.

use crate::context::truncate_chars;
use crate::models::{FileKind, UploadedFile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.starts_with(b"BM") && bytes.len() >= 26 {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_mode: &'static str,
}

/// Read dimensions and color mode from an image header
pub fn sniff_image(bytes: &[u8]) -> Option<ImageInfo> {
    match ImageFormat::from_magic(bytes)? {
        ImageFormat::Png => sniff_png(bytes),
        ImageFormat::Jpeg => sniff_jpeg(bytes),
        ImageFormat::Gif => sniff_gif(bytes),
        ImageFormat::Bmp => sniff_bmp(bytes),
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn le_i32(bytes: &[u8], at: usize) -> Option<i32> {
    let slice = bytes.get(at..at + 4)?;
    Some(i32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn sniff_png(bytes: &[u8]) -> Option<ImageInfo> {
    // IHDR is always the first chunk
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    let color_mode = match *bytes.get(25)? {
        0 => "L",
        2 => "RGB",
        3 => "P",
        4 => "LA",
        6 => "RGBA",
        _ => "unknown",
    };
    Some(ImageInfo {
        format: ImageFormat::Png,
        width: be_u32(bytes, 16)?,
        height: be_u32(bytes, 20)?,
        color_mode,
    })
}

fn sniff_gif(bytes: &[u8]) -> Option<ImageInfo> {
    Some(ImageInfo {
        format: ImageFormat::Gif,
        width: u32::from(le_u16(bytes, 6)?),
        height: u32::from(le_u16(bytes, 8)?),
        color_mode: "P",
    })
}

fn sniff_bmp(bytes: &[u8]) -> Option<ImageInfo> {
    let color_mode = match le_u16(bytes, 28).unwrap_or(24) {
        32 => "RGBA",
        1..=8 => "P",
        _ => "RGB",
    };
    Some(ImageInfo {
        format: ImageFormat::Bmp,
        width: le_i32(bytes, 18)?.unsigned_abs(),
        // negative height marks a top-down bitmap
        height: le_i32(bytes, 22)?.unsigned_abs(),
        color_mode,
    })
}

fn sniff_jpeg(bytes: &[u8]) -> Option<ImageInfo> {
    let mut pos = 2;
    while pos + 1 < bytes.len() {
        if bytes[pos] != 0xff {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            0xff => {
                pos += 1;
                continue;
            }
            // standalone markers carry no length
            0x01 | 0xd0..=0xd7 => {
                pos += 2;
                continue;
            }
            0xd9 | 0xda => return None,
            _ => {}
        }

        let length = usize::from(be_u16(bytes, pos + 2)?);
        let is_frame = matches!(marker, 0xc0..=0xcf) && !matches!(marker, 0xc4 | 0xc8 | 0xcc);
        if is_frame {
            let color_mode = match *bytes.get(pos + 9)? {
                1 => "L",
                3 => "RGB",
                4 => "CMYK",
                _ => "unknown",
            };
            return Some(ImageInfo {
                format: ImageFormat::Jpeg,
                height: u32::from(be_u16(bytes, pos + 5)?),
                width: u32::from(be_u16(bytes, pos + 7)?),
                color_mode,
            });
        }
        pos += 2 + length;
    }
    None
}

/// One-line description of an uploaded file, given its bytes
pub fn describe_file(file: &UploadedFile, bytes: &[u8], preview_chars: usize) -> String {
    if file.kind == FileKind::Image {
        if let Some(info) = sniff_image(bytes) {
            return format!(
                "[Image {}: {}x{} pixels, format {}, color mode {}]",
                file.filename,
                info.width,
                info.height,
                info.format.as_str(),
                info.color_mode
            );
        }
    }

    if file.kind == FileKind::Text {
        if let Ok(text) = std::str::from_utf8(bytes) {
            let words = text.split_whitespace().count();
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let preview = truncate_chars(&normalized, preview_chars);
            let ellipsis = if preview.len() < normalized.len() { "..." } else { "" };
            return format!("[Document {}: {} words. Preview: {}{}]", file.filename, words, preview, ellipsis);
        }
    }

    format!(
        "[File {}: {} bytes ({}); no preview available]",
        file.filename,
        bytes.len(),
        file.content_type
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(name: &str, content_type: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile::new(name, content_type, bytes, Path::new("/tmp"))
    }

    #[test]
    fn test_png_header() {
        let info = sniff_image(&fixtures::png(640, 480, 6)).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (640, 480));
        assert_eq!(info.color_mode, "RGBA");
    }

    #[test]
    fn test_gif_header() {
        let bytes = b"GIF89a\x20\x03\x58\x02\x00\x00\x00";
        let info = sniff_image(bytes).unwrap();
        assert_eq!((info.width, info.height), (800, 600));
        assert_eq!(info.color_mode, "P");
    }

    #[test]
    fn test_jpeg_frame_after_app0() {
        let mut bytes = vec![0xff, 0xd8];
        // APP0 segment of length 16
        bytes.extend_from_slice(&[0xff, 0xe0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0: length 17, precision 8, height 120, width 160, 3 components
        bytes.extend_from_slice(&[0xff, 0xc0, 0x00, 0x11, 0x08, 0x00, 0x78, 0x00, 0xa0, 0x03]);
        bytes.extend_from_slice(&[0u8; 9]);

        let info = sniff_image(&bytes).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!((info.width, info.height), (160, 120));
        assert_eq!(info.color_mode, "RGB");
    }

    #[test]
    fn test_bmp_header() {
        let mut bytes = vec![0u8; 30];
        bytes[0..2].copy_from_slice(b"BM");
        bytes[18..22].copy_from_slice(&32i32.to_le_bytes());
        bytes[22..26].copy_from_slice(&(-16i32).to_le_bytes());
        bytes[28..30].copy_from_slice(&24u16.to_le_bytes());

        let info = sniff_image(&bytes).unwrap();
        assert_eq!((info.width, info.height), (32, 16));
        assert_eq!(info.color_mode, "RGB");
    }

    #[test]
    fn test_truncated_header_is_none() {
        assert!(sniff_image(b"\x89PNG\r\n\x1a\n").is_none());
        assert!(sniff_image(b"not an image").is_none());
    }

    #[test]
    fn test_describe_image() {
        let bytes = fixtures::png(2, 3, 2);
        let file = record("dot.png", "image/png", &bytes);
        assert_eq!(
            describe_file(&file, &bytes, 200),
            "[Image dot.png: 2x3 pixels, format PNG, color mode RGB]"
        );
    }

    #[test]
    fn test_describe_document_with_preview() {
        let bytes = b"alpha beta\ngamma delta epsilon";
        let file = record("notes.txt", "text/plain", bytes);
        assert_eq!(
            describe_file(&file, bytes, 10),
            "[Document notes.txt: 5 words. Preview: alpha beta...]"
        );
    }

    #[test]
    fn test_describe_binary() {
        let bytes = [0xffu8, 0x00, 0xfe, 0x01];
        let file = record("blob.bin", "application/octet-stream", &bytes);
        assert_eq!(
            describe_file(&file, &bytes, 200),
            "[File blob.bin: 4 bytes (application/octet-stream); no preview available]"
        );
    }
}
