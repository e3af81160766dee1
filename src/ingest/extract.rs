//! Text extraction from raw document bytes

use crate::document::DocumentKind;
use crate::{Error, Result};

/// Extract plain text from a document of the given kind
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| Error::Extract(format!("Failed to read PDF: {}", e))),
        DocumentKind::Text | DocumentKind::Markdown => String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Extract(format!("Document is not valid UTF-8: {}", e))),
    }
}

/// Extract text for an object key, or `None` if the key's type is unsupported
pub fn extract_for_key(key: &str, bytes: &[u8]) -> Option<Result<String>> {
    DocumentKind::from_key(key).map(|kind| extract_text(kind, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let text = extract_text(DocumentKind::Text, "Supervised learning".as_bytes()).unwrap();
        assert_eq!(text, "Supervised learning");
    }

    #[test]
    fn test_markdown_is_verbatim() {
        let text = extract_text(DocumentKind::Markdown, b"# AWS\n\n- Lambda").unwrap();
        assert_eq!(text, "# AWS\n\n- Lambda");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = extract_text(DocumentKind::Text, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn test_invalid_pdf() {
        assert!(extract_text(DocumentKind::Pdf, b"not a pdf").is_err());
    }

    #[test]
    fn test_unsupported_key() {
        assert!(extract_for_key("deck.pptx", b"...").is_none());
        assert!(extract_for_key("notes.md", b"hi").unwrap().is_ok());
    }
}
