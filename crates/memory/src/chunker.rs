//! Plain-text chunking for the document indexes.
//!
//! Windows of at most `size` characters, each starting `overlap`
//! characters before the previous one ended. Breaks land on whitespace
//! whenever the window contains any, so words are never cut in half
//! unless a single word is longer than the window.

/// Split `text` into overlapping chunks. Empty or blank input yields none.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());

        if end < chars.len() && !chars[end].is_whitespace() {
            if let Some(ws) = chars[start + 1..end].iter().rposition(|c| c.is_whitespace()) {
                end = start + 1 + ws;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }

        // Step back by the overlap, then forward to the next word start.
        let mut next = end.saturating_sub(overlap).max(start + 1);
        while next < end && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next;
    }

    chunks
}
