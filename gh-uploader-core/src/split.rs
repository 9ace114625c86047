//! Newline-aligned splitting of oversized files into chunk units.

use tracing::{debug, info};

use crate::contract::LocalFileUnit;

pub const LINE_TERMINATOR: u8 = b'\n';

/// Split `content` into ordered chunks of at most `max_chunk_bytes` bytes.
///
/// Each cut is placed right after the last line terminator inside the current
/// window. A window without any terminator is cut at the size limit, so a
/// single overlong line is broken mid-line. The final chunk takes whatever is
/// left and need not end on a terminator. Concatenating the chunks yields
/// `content` again.
pub fn split(content: &[u8], max_chunk_bytes: usize) -> Vec<&[u8]> {
    let max = max_chunk_bytes.max(1);
    let mut chunks = Vec::with_capacity(content.len() / max + 1);
    let mut start = 0;

    while content.len() - start > max {
        let window = &content[start..start + max];
        let cut = match window.iter().rposition(|&b| b == LINE_TERMINATOR) {
            Some(pos) => start + pos + 1,
            None => {
                debug!(offset = start, max, "[SPLIT] No line terminator in window, cutting at limit");
                start + max
            }
        };
        chunks.push(&content[start..cut]);
        start = cut;
    }
    if start < content.len() {
        chunks.push(&content[start..]);
    }
    chunks
}

/// Name of the 1-based `index`-th chunk of `original`.
pub fn chunk_name(original: &str, index: usize) -> String {
    format!("{original}.part{index}")
}

/// Split `file` into independently uploadable chunk units named
/// `<name>.part1`, `<name>.part2`, ...
pub fn chunk_units(file: &LocalFileUnit, max_chunk_bytes: usize) -> Vec<LocalFileUnit> {
    let units: Vec<LocalFileUnit> = split(file.content(), max_chunk_bytes)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| LocalFileUnit::new(chunk_name(file.name(), i + 1), chunk.to_vec()))
        .collect();
    info!(
        file = %file.name(),
        size = file.size(),
        chunk_size = max_chunk_bytes,
        chunks = units.len(),
        "[SPLIT] Split oversized file into chunks"
    );
    units
}
