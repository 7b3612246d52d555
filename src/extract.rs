//! Modality detection and content extraction.
//!
//! Callers supply raw bytes plus a MIME type or file name; this module
//! decides the [`Modality`] and produces the string stored as
//! `Document::content`: plain UTF-8 text for text and PDF, a standard
//! base64 payload for image and audio.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

use context_ledger_core::models::Modality;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Extraction failure. The document is marked `error`; other ingestions
/// are unaffected.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Pick a modality from a MIME type or a file name.
///
/// MIME types win (`image/*`, `audio/*`, any subtype containing `pdf`);
/// otherwise the file extension decides. Everything else is text.
pub fn detect_modality(mime_or_name: &str) -> Modality {
    let lower = mime_or_name.to_ascii_lowercase();
    if let Some((top, sub)) = lower.split_once('/') {
        match top {
            "image" => return Modality::Image,
            "audio" => return Modality::Audio,
            _ if sub.contains("pdf") && !sub.contains('/') => return Modality::Pdf,
            // Not a MIME type; "some/dir/file.png" resolves by extension.
            _ => {}
        }
    }
    detect_from_mime(guess_mime(&lower))
}

fn detect_from_mime(mime: &str) -> Modality {
    if mime.starts_with("image/") {
        Modality::Image
    } else if mime.starts_with("audio/") {
        Modality::Audio
    } else if mime == MIME_PDF {
        Modality::Pdf
    } else {
        Modality::Text
    }
}

/// Guess a MIME type from the file extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => MIME_PDF,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "md" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => MIME_TEXT,
    }
}

/// Turn raw bytes into stored document content.
pub fn extract(bytes: &[u8], modality: Modality) -> Result<String, ExtractError> {
    match modality {
        Modality::Text => Ok(std::str::from_utf8(bytes)?.to_string()),
        Modality::Pdf => extract_pdf(bytes),
        Modality::Image | Modality::Audio => Ok(BASE64.encode(bytes)),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_modality_from_mime() {
        assert_eq!(detect_modality("image/png"), Modality::Image);
        assert_eq!(detect_modality("audio/mpeg"), Modality::Audio);
        assert_eq!(detect_modality("application/pdf"), Modality::Pdf);
        assert_eq!(detect_modality("text/plain"), Modality::Text);
        assert_eq!(detect_modality("application/json"), Modality::Text);
    }

    #[test]
    fn test_detect_modality_from_name() {
        assert_eq!(detect_modality("cat.PNG"), Modality::Image);
        assert_eq!(detect_modality("talk.mp3"), Modality::Audio);
        assert_eq!(detect_modality("report.pdf"), Modality::Pdf);
        assert_eq!(detect_modality("notes.md"), Modality::Text);
        assert_eq!(detect_modality("README"), Modality::Text);
        assert_eq!(detect_modality("docs/photos/cat.jpg"), Modality::Image);
        assert_eq!(detect_modality("images/notes.txt"), Modality::Text);
    }

    #[test]
    fn test_extract_text_strict_utf8() {
        assert_eq!(extract(b"hello", Modality::Text).unwrap(), "hello");
        let err = extract(&[0x66, 0xff, 0xfe], Modality::Text).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUtf8(_)));
    }

    #[test]
    fn test_extract_binary_as_base64() {
        assert_eq!(extract(&[1, 2, 3], Modality::Image).unwrap(), "AQID");
        assert_eq!(extract(&[], Modality::Audio).unwrap(), "");
    }

    #[test]
    fn test_extract_pdf_invalid() {
        let result = extract(b"not a pdf", Modality::Pdf);
        assert!(matches!(result, Err(ExtractError::Pdf(_))));
    }
}
