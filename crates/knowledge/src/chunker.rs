//! Paragraph-first chunking of knowledge source documents.

pub const SECTION_SEPARATOR: &str = "\n\n";
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Splits `content` on blank lines and greedily packs the sections into chunks.
///
/// A section joins the current chunk while `current + section < chunk_size`
/// (character counts, separators included); otherwise the current chunk is
/// flushed and the section starts a new one. A single section longer than the
/// limit becomes its own oversize chunk. Whitespace-only sections are dropped.
pub fn chunk_document(content: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for section in content.split(SECTION_SEPARATOR) {
        if section.trim().is_empty() {
            continue;
        }

        let section_len = section.chars().count();
        if current_len + section_len >= chunk_size {
            flush(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }

        current.push_str(section);
        current.push_str(SECTION_SEPARATOR);
        current_len += section_len + SECTION_SEPARATOR.len();
    }

    flush(&mut chunks, &current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &str) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::{chunk_document, SECTION_SEPARATOR};

    fn sections(content: &str) -> Vec<String> {
        content
            .split(SECTION_SEPARATOR)
            .map(str::trim)
            .filter(|section| !section.is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn small_sections_are_packed_together() {
        let content = "Expense policy.\n\nReceipts are required.\n\nCards are corporate.";
        let chunks = chunk_document(content, 500);

        assert_eq!(chunks, vec![content.to_owned()]);
    }

    #[test]
    fn chunks_reproduce_sections_in_order() {
        let paragraphs: Vec<String> = (0..12)
            .map(|i| format!("Section {i}: {}", "policy text ".repeat(i % 5 + 3)).trim().to_owned())
            .collect();
        let content = paragraphs.join("\n\n");

        let chunks = chunk_document(&content, 120);
        let rebuilt: Vec<String> = chunks.iter().flat_map(|chunk| sections(chunk)).collect();

        assert!(chunks.len() > 1);
        assert_eq!(rebuilt, paragraphs);
    }

    #[test]
    fn chunks_respect_limit_unless_single_section_is_oversize() {
        let long = "x".repeat(300);
        let content = format!("short one\n\n{long}\n\nshort two\n\nshort three");

        let chunks = chunk_document(&content, 100);

        for chunk in &chunks {
            let oversize_single = sections(chunk).len() == 1;
            assert!(chunk.chars().count() < 100 || oversize_single, "chunk too large: {chunk}");
        }
        assert_eq!(chunks, vec!["short one".to_owned(), long, "short two\n\nshort three".to_owned()]);
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        let section = "é".repeat(40);
        let content = format!("{section}\n\n{section}");

        // 80 characters fit under 100 even though the byte length is 160.
        assert_eq!(chunk_document(&content, 100).len(), 1);
    }

    #[test]
    fn blank_sections_never_produce_empty_chunks() {
        let content = "\n\n\n\n  \n\nfirst\n\n\n\n\n\nsecond\n\n";
        let chunks = chunk_document(content, 8);

        assert_eq!(chunks, vec!["first".to_owned(), "second".to_owned()]);
        assert!(chunk_document("   \n\n \n\n", 500).is_empty());
        assert!(chunk_document("", 500).is_empty());
    }
}
