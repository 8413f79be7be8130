//! Turning a [`DiffResult`] into aligned side-by-side display rows.
//!
//! Every chunk line becomes one row. Inserted and deleted lines are paired
//! with a filler on the other side and highlighted whole; replaced lines are
//! paired with their counterpart and carry the intra-line highlights.
//! `hunk_starts` records where each run of changed rows begins, for
//! "jump to next change" navigation.

use crate::differ::{Chunk, ChunkTag, DiffResult, HighlightRegion, Highlights, LineHighlights};
use crate::patch::FileChange;
use serde::Serialize;

/// One side (left or right) of a diff row for display.
///
/// Contains the line content, its position in the file, whether it's a
/// filler (placeholder) line, and the regions to highlight within the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Side {
    /// The text content of this line.
    ///
    /// Empty string for filler lines.
    pub content: String,

    /// 1-based line number in its file; `None` for fillers.
    pub line_number: Option<u32>,

    /// Whether this is a filler (placeholder) line.
    ///
    /// Filler lines are inserted to keep rows aligned when one side has
    /// content but the other doesn't (pure insertions and deletions).
    pub is_filler: bool,

    /// Regions within the line to highlight as changed.
    ///
    /// Empty for unchanged lines and filler lines; a single full-line region
    /// for inserted and deleted lines.
    pub highlights: Highlights,
}

impl Side {
    /// Creates a side for line `index` (0-based) of its file.
    #[inline]
    fn line(content: &str, index: usize, highlights: Highlights) -> Self {
        Self {
            content: content.to_string(),
            line_number: u32::try_from(index + 1).ok(),
            is_filler: false,
            highlights,
        }
    }

    /// Creates a filler (placeholder) side.
    ///
    /// Filler sides have no content, no line number and no highlights.
    #[inline]
    #[must_use]
    fn filler() -> Self {
        Self {
            content: String::new(),
            line_number: None,
            is_filler: true,
            highlights: Highlights::new(),
        }
    }

    /// Creates a side with content and full-line highlighting, for a line
    /// that exists only on this side.
    #[inline]
    #[must_use]
    fn with_full_highlight(content: &str, index: usize) -> Self {
        Self::line(
            content,
            index,
            smallvec::smallvec![HighlightRegion::full_line()],
        )
    }
}

/// A single row in the diff display.
///
/// Each row pairs a left (old) and a right (new) side, which may be:
/// - Both with content and highlights: a replaced line
/// - Left with content, right filler: a deleted line
/// - Left filler, right with content: an inserted line
/// - Both without highlights: an unchanged line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub left: Side,
    pub right: Side,

    /// Move group of the chunk this row belongs to.
    pub moved: Option<u32>,
}

/// A file's diff ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFile {
    pub path: String,
    pub change: FileChange,

    /// Lines shown on the right as new, including replaced lines.
    pub additions: u32,

    /// Lines shown on the left as removed, including replaced lines.
    pub deletions: u32,

    pub rows: Vec<Row>,

    /// Row indices (0-indexed) where hunks start.
    pub hunk_starts: Vec<u32>,
}

/// Builds the display rows for one file.
#[must_use]
pub fn build_rows(path: impl Into<String>, change: FileChange, result: &DiffResult) -> DisplayFile {
    let capacity = result.chunks.iter().map(|c| c.old.len().max(c.new.len())).sum();
    let mut rows = Vec::with_capacity(capacity);
    let mut hunk_starts = Vec::new();
    let mut additions = 0u32;
    let mut deletions = 0u32;

    for chunk in &result.chunks {
        if chunk.is_change() {
            hunk_starts.push(rows.len() as u32);
        }
        let moved = chunk.moved.as_ref().map(|m| m.group);

        match chunk.tag {
            ChunkTag::Equal => {
                for (o, n) in chunk.old.clone().zip(chunk.new.clone()) {
                    rows.push(Row {
                        left: Side::line(&result.old_lines[o], o, Highlights::new()),
                        right: Side::line(&result.new_lines[n], n, Highlights::new()),
                        moved,
                    });
                }
            }
            ChunkTag::Delete => {
                for o in chunk.old.clone() {
                    rows.push(Row {
                        left: Side::with_full_highlight(&result.old_lines[o], o),
                        right: Side::filler(),
                        moved,
                    });
                }
                deletions += chunk.old.len() as u32;
            }
            ChunkTag::Insert => {
                for n in chunk.new.clone() {
                    rows.push(Row {
                        left: Side::filler(),
                        right: Side::with_full_highlight(&result.new_lines[n], n),
                        moved,
                    });
                }
                additions += chunk.new.len() as u32;
            }
            ChunkTag::Replace => {
                push_replace_rows(&mut rows, chunk, result, moved);
                deletions += chunk.old.len() as u32;
                additions += chunk.new.len() as u32;
            }
        }
    }

    // Adjacent change chunks (a split delete + insert) form one hunk.
    let mut merged_starts: Vec<u32> = Vec::with_capacity(hunk_starts.len());
    for start in hunk_starts {
        let continues = start > 0 && is_changed_row(&rows[start as usize - 1]);
        if !continues {
            merged_starts.push(start);
        }
    }

    DisplayFile {
        path: path.into(),
        change,
        additions,
        deletions,
        rows,
        hunk_starts: merged_starts,
    }
}

fn push_replace_rows(rows: &mut Vec<Row>, chunk: &Chunk, result: &DiffResult, moved: Option<u32>) {
    for (i, (o, n)) in chunk.old.clone().zip(chunk.new.clone()).enumerate() {
        let LineHighlights { old, new } = chunk.highlights.get(i).cloned().unwrap_or_else(|| {
            LineHighlights {
                old: smallvec::smallvec![HighlightRegion::full_line()],
                new: smallvec::smallvec![HighlightRegion::full_line()],
            }
        });
        rows.push(Row {
            left: Side::line(&result.old_lines[o], o, old),
            right: Side::line(&result.new_lines[n], n, new),
            moved,
        });
    }
}

#[inline]
fn is_changed_row(row: &Row) -> bool {
    row.left.is_filler
        || row.right.is_filler
        || !row.left.highlights.is_empty()
        || !row.right.highlights.is_empty()
}
