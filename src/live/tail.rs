//! Bounded tail reads of growing transcript files

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Read at most the last `max_bytes` of `path` and return its complete lines,
/// newest first.
///
/// A line cut by the window start is dropped, as are lines that are not valid
/// UTF-8 and blank lines.
pub fn tail_lines(path: &Path, max_bytes: u64) -> Result<Vec<String>> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    // One byte before the window tells whether its first line is complete
    let start = len.saturating_sub(max_bytes);
    let read_from = start.saturating_sub(1);
    file.seek(SeekFrom::Start(read_from))
        .with_context(|| format!("Failed to seek {}", path.display()))?;

    let mut buf = Vec::with_capacity((len - read_from) as usize);
    file.take(len - read_from)
        .read_to_end(&mut buf)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(split_window(&buf, start > 0))
}

fn split_window(buf: &[u8], starts_mid_file: bool) -> Vec<String> {
    let mut segments = buf.split(|b| *b == b'\n');
    if starts_mid_file {
        segments.next();
    }

    let mut lines: Vec<String> = segments
        .filter_map(|seg| std::str::from_utf8(seg).ok())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    lines.reverse();
    lines
}
