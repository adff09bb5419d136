//! Page-aware sliding-window chunker for parsed PDF text.

use crate::pdf_parser::ParsedPdf;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk (BiomedBERT limit: 512 including special tokens).
    pub max_tokens: usize,
    /// Token overlap between consecutive chunks.
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 510, // 512 - 2 for [CLS] and [SEP]
            overlap_tokens: 64,
        }
    }
}

/// One chunk destined for `pdf_chunks`, before a row id is assigned.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub chunk_index: i32,
    pub text: String,
    pub page_start: i32,
    pub page_end: i32,
    pub section_path: Option<String>,
    pub is_table: bool,
    pub is_figure: bool,
}

const SECTION_MARKERS: &[&str] =
    &["abstract", "introduction", "methods", "materials and methods", "results", "discussion", "conclusion", "references"];

/// Split a parsed PDF's pages into overlapping, token-bounded chunks,
/// tracking the page range each chunk spans and the section heading
/// (if any) the text falls under.
pub fn chunk_pdf(parsed: &ParsedPdf, config: &ChunkerConfig) -> Vec<ChunkDraft> {
    let words_per_chunk = ((config.max_tokens as f32) * 0.75).max(1.0) as usize;
    let overlap_words = ((config.overlap_tokens as f32) * 0.75) as usize;

    // Flatten pages into a single word stream, remembering which page each
    // word came from so page_start/page_end can be recovered per chunk.
    let mut words: Vec<(&str, u32)> = Vec::new();
    let mut section_at: Vec<Option<&str>> = Vec::new();
    let mut current_section: Option<&str> = None;

    for (page_num, text) in &parsed.pages {
        for line in text.lines() {
            let lower = line.trim().to_lowercase();
            if let Some(marker) = SECTION_MARKERS.iter().find(|m| lower == **m || lower.starts_with(&format!("{} ", m))) {
                current_section = Some(marker);
            }
            for word in line.split_whitespace() {
                words.push((word, *page_num));
                section_at.push(current_section);
            }
        }
    }

    if words.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut chunk_index = 0i32;
    let mut start = 0usize;

    while start < words.len() {
        let end = (start + words_per_chunk).min(words.len());
        let slice = &words[start..end];
        let text = slice.iter().map(|(w, _)| *w).collect::<Vec<_>>().join(" ");
        let page_start = slice.first().map(|(_, p)| *p as i32).unwrap_or(0);
        let page_end = slice.last().map(|(_, p)| *p as i32).unwrap_or(page_start);
        let section_path = section_at[start..end].iter().flatten().next().map(|s| s.to_string());
        let lower_text = text.to_lowercase();

        chunks.push(ChunkDraft {
            chunk_index,
            is_table: lower_text.trim_start().starts_with("table"),
            is_figure: lower_text.trim_start().starts_with("figure") || lower_text.trim_start().starts_with("fig."),
            text,
            page_start,
            page_end,
            section_path,
        });
        chunk_index += 1;

        if end == words.len() {
            break;
        }
        start += words_per_chunk.saturating_sub(overlap_words).max(1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_parser::ParsedPdf;

    fn parsed(pages: Vec<(u32, String)>) -> ParsedPdf {
        ParsedPdf { title: None, pages, page_count: 0 }
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunks = chunk_pdf(&parsed(vec![]), &ChunkerConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_document_is_a_single_chunk() {
        let chunks = chunk_pdf(
            &parsed(vec![(1, "Abstract\nA short study about photosynthesis.".to_string())]),
            &ChunkerConfig::default(),
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_start, 1);
        assert_eq!(chunks[0].section_path.as_deref(), Some("abstract"));
    }

    #[test]
    fn long_document_splits_into_multiple_chunks_spanning_pages() {
        let text = "word ".repeat(2000);
        let chunks = chunk_pdf(
            &parsed(vec![(1, text.clone()), (2, text)]),
            &ChunkerConfig { max_tokens: 100, overlap_tokens: 10 },
        );
        assert!(chunks.len() > 1);
        assert!(chunks.iter().any(|c| c.page_end > c.page_start) || chunks.last().unwrap().page_start == 2);
    }

    #[test]
    fn table_caption_is_flagged() {
        let chunks = chunk_pdf(&parsed(vec![(1, "Table 1. Summary of results.".to_string())]), &ChunkerConfig::default());
        assert!(chunks[0].is_table);
    }
}
