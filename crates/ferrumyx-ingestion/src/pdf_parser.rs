//! Minimal lopdf-based text extraction. Good enough to drive the chunker;
//! no layout analysis, so tables/figures are detected from text heuristics
//! rather than structural markup.

use std::path::Path;

use ferrumyx_common::error::{RagError, Result};

#[derive(Debug, Clone)]
pub struct ParsedPdf {
    pub title: Option<String>,
    pub pages: Vec<(u32, String)>,
    pub page_count: usize,
}

pub fn parse_pdf(pdf_path: &Path) -> Result<ParsedPdf> {
    let doc = lopdf::Document::load(pdf_path)
        .map_err(|e| RagError::InvalidArgument(format!("failed to load PDF {}: {e}", pdf_path.display())))?;

    let mut pages = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        let text = doc.extract_text(&[page_num]).unwrap_or_default();
        pages.push((page_num, text));
        let _ = page_id;
    }
    pages.sort_by_key(|(n, _)| *n);

    let full_text_head = pages.first().map(|(_, t)| t.clone()).unwrap_or_default();
    let title = full_text_head.lines().find(|l| l.trim().len() > 10).map(|l| l.trim().to_string());

    let page_count = pages.len();
    Ok(ParsedPdf { title, pages, page_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_invalid_argument() {
        let result = parse_pdf(Path::new("/nonexistent/does-not-exist.pdf"));
        assert!(matches!(result, Err(RagError::InvalidArgument(_))));
    }
}
