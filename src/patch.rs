//! In-memory model of a parsed diff file.
//!
//! A raw diff is decoded by [`crate::parser`] into one [`FilePatch`] per file
//! section. Patches keep the raw bytes of every hunk line so that
//! [`crate::normalize`] can re-decode them with a caller-supplied encoding.

use crate::error::Warning;
use serde::{Deserialize, Serialize};

/// Raw diff bytes as uploaded, plus the encoding the uploader declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDiffFile {
    pub bytes: Vec<u8>,
    pub encoding: Option<String>,
}

impl RawDiffFile {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            encoding: None,
        }
    }

    /// Declares the charset the diff was written in (any WHATWG label).
    #[must_use]
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }
}

/// Diff dialect of a file section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffFormat {
    Unified,
    Context,
}

/// What happened to the file as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChange {
    #[default]
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
}

impl FileChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
        }
    }
}

/// Tag of a single hunk line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTag {
    Context,
    Insert,
    Delete,
}

/// One line of hunk content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub tag: LineTag,

    /// Decoded text, without the diff prefix or line terminator.
    pub text: String,

    /// The undecoded bytes `text` was produced from.
    pub raw: Vec<u8>,

    /// Set when the diff marks this line with `\ No newline at end of file`.
    pub no_newline_at_eof: bool,
}

impl Line {
    /// Builds a line from raw bytes, decoding them as UTF-8 (lossily).
    pub fn from_raw(tag: LineTag, raw: &[u8]) -> Self {
        Self {
            tag,
            text: String::from_utf8_lossy(raw).into_owned(),
            raw: raw.to_vec(),
            no_newline_at_eof: false,
        }
    }

    pub fn new(tag: LineTag, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            tag,
            raw: text.as_bytes().to_vec(),
            text,
            no_newline_at_eof: false,
        }
    }

    /// Whether the line exists in the source file.
    #[inline]
    pub fn in_source(&self) -> bool {
        matches!(self.tag, LineTag::Context | LineTag::Delete)
    }

    /// Whether the line exists in the destination file.
    #[inline]
    pub fn in_destination(&self) -> bool {
        matches!(self.tag, LineTag::Context | LineTag::Insert)
    }
}

/// A contiguous region of change.
///
/// Start lines are 1-based. An empty range (count 0) names the line *after
/// which* the change applies, so `-0,0` means "before the first line".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub source_start: usize,
    pub source_count: usize,
    pub dest_start: usize,
    pub dest_count: usize,
    pub lines: Vec<Line>,
}

impl Hunk {
    /// Number of context + delete lines actually present.
    pub fn source_tally(&self) -> usize {
        self.lines.iter().filter(|l| l.in_source()).count()
    }

    /// Number of context + insert lines actually present.
    pub fn dest_tally(&self) -> usize {
        self.lines.iter().filter(|l| l.in_destination()).count()
    }

    /// 0-based index of the first source line the hunk touches.
    pub fn source_offset(&self) -> usize {
        if self.source_count == 0 {
            self.source_start
        } else {
            self.source_start.saturating_sub(1)
        }
    }
}

/// One file's change within a diff.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilePatch {
    pub source_path: String,
    pub dest_path: String,

    /// Opaque revision markers (timestamps, `(revision 12)`, blob hashes).
    pub source_revision: String,
    pub dest_revision: String,

    pub format: Option<DiffFormat>,
    pub change: FileChange,

    /// File mode before/after, when the diff records them.
    pub old_mode: Option<String>,
    pub new_mode: Option<String>,

    /// Binary patches carry no hunks.
    pub is_binary: bool,

    pub hunks: Vec<Hunk>,

    /// Filled in by the normalizer.
    pub warnings: Vec<Warning>,
}

impl FilePatch {
    /// The path a viewer should show: the destination, unless the file was deleted.
    pub fn display_path(&self) -> &str {
        if self.change == FileChange::Deleted || self.dest_path == "/dev/null" {
            &self.source_path
        } else {
            &self.dest_path
        }
    }

    /// Whether the file mode changed between the two revisions.
    pub fn has_mode_change(&self) -> bool {
        matches!((&self.old_mode, &self.new_mode), (Some(old), Some(new)) if old != new)
    }

    pub fn insert_count(&self) -> usize {
        self.count_tag(LineTag::Insert)
    }

    pub fn delete_count(&self) -> usize {
        self.count_tag(LineTag::Delete)
    }

    fn count_tag(&self, tag: LineTag) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.tag == tag)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(lines: Vec<Line>) -> Hunk {
        Hunk {
            source_start: 3,
            source_count: 2,
            dest_start: 3,
            dest_count: 2,
            lines,
        }
    }

    #[test]
    fn tallies_split_by_side() {
        let h = hunk(vec![
            Line::new(LineTag::Context, "a"),
            Line::new(LineTag::Delete, "b"),
            Line::new(LineTag::Insert, "c"),
        ]);
        assert_eq!(h.source_tally(), 2);
        assert_eq!(h.dest_tally(), 2);
        assert_eq!(h.source_offset(), 2);
    }

    #[test]
    fn empty_range_offset_is_insertion_point() {
        let h = Hunk {
            source_start: 0,
            source_count: 0,
            dest_start: 1,
            dest_count: 1,
            lines: vec![Line::new(LineTag::Insert, "x")],
        };
        assert_eq!(h.source_offset(), 0);
    }

    #[test]
    fn display_path_prefers_surviving_side() {
        let deleted = FilePatch {
            source_path: "old.rs".into(),
            dest_path: "/dev/null".into(),
            change: FileChange::Deleted,
            ..FilePatch::default()
        };
        assert_eq!(deleted.display_path(), "old.rs");

        let renamed = FilePatch {
            source_path: "a.rs".into(),
            dest_path: "b.rs".into(),
            change: FileChange::Renamed,
            ..FilePatch::default()
        };
        assert_eq!(renamed.display_path(), "b.rs");
    }

    #[test]
    fn from_raw_keeps_bytes() {
        let line = Line::from_raw(LineTag::Insert, b"caf\xe9");
        assert_eq!(line.raw, b"caf\xe9");
        assert!(line.text.starts_with("caf"));
    }
}
