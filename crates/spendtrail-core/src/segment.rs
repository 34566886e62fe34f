//! Document segmentation
//!
//! Finds the line range holding a statement's itemised transactions, bounded
//! by a literal start anchor and the nearest end anchor after it.

use std::ops::Range;

use crate::error::{Error, Result};

/// Literal header/footer anchors for one statement layout.
///
/// Matching is a case-insensitive substring test against each line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentAnchors {
    pub start: Vec<String>,
    pub end: Vec<String>,
}

impl SegmentAnchors {
    pub fn new<S: AsRef<str>>(start: &[S], end: &[S]) -> Self {
        Self {
            start: start.iter().map(|s| s.as_ref().to_lowercase()).collect(),
            end: end.iter().map(|s| s.as_ref().to_lowercase()).collect(),
        }
    }

    fn is_start(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.start.iter().any(|a| lower.contains(&a.to_lowercase()))
    }

    fn is_end(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.end.iter().any(|a| lower.contains(&a.to_lowercase()))
    }
}

/// Locate the first transaction section.
///
/// The range starts on the line after the start anchor and stops before the
/// nearest end anchor, or at the end of the document when none follows.
pub fn find_segment<S: AsRef<str>>(
    lines: &[S],
    anchors: &SegmentAnchors,
    strategy: &str,
) -> Result<Range<usize>> {
    find_segment_from(lines, anchors, 0)
        .ok_or_else(|| Error::SegmentNotFound(strategy.to_string()))
}

/// Locate every transaction section, in document order.
///
/// Used by layouts that split activity into several anchored sections
/// (domestic and international, for example).
pub fn find_all_segments<S: AsRef<str>>(
    lines: &[S],
    anchors: &SegmentAnchors,
    strategy: &str,
) -> Result<Vec<Range<usize>>> {
    let mut segments = Vec::new();
    let mut from = 0;
    while let Some(range) = find_segment_from(lines, anchors, from) {
        from = range.end;
        segments.push(range);
        if from >= lines.len() {
            break;
        }
    }

    if segments.is_empty() {
        return Err(Error::SegmentNotFound(strategy.to_string()));
    }
    Ok(segments)
}

fn find_segment_from<S: AsRef<str>>(
    lines: &[S],
    anchors: &SegmentAnchors,
    from: usize,
) -> Option<Range<usize>> {
    let start_line = (from..lines.len()).find(|&i| anchors.is_start(lines[i].as_ref()))?;
    let start = start_line + 1;

    // A second start anchor also closes the section
    let end = (start..lines.len())
        .find(|&i| anchors.is_end(lines[i].as_ref()) || anchors.is_start(lines[i].as_ref()))
        .unwrap_or(lines.len());

    Some(start..end)
}
