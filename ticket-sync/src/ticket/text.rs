//! PDF text extraction.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use super::error::TicketError;

/// Reads the text of a ticket's first page.
pub trait TextExtractor: Send + Sync {
    fn first_page_text(&self, path: &Path) -> Result<String, TicketError>;
}

/// Text extraction with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfText;

impl TextExtractor for PdfText {
    fn first_page_text(&self, path: &Path) -> Result<String, TicketError> {
        let doc = Document::load(path).map_err(|e| TicketError::Pdf {
            message: e.to_string(),
        })?;

        let Some(&first) = doc.get_pages().keys().next() else {
            return Err(TicketError::Pdf {
                message: "document has no pages".to_string(),
            });
        };

        let text = doc.extract_text(&[first]).map_err(|e| TicketError::Pdf {
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), chars = text.len(), "extracted first page text");
        Ok(text)
    }
}
