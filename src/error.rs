//! Error and warning types shared by every stage of the diff core.
//!
//! Errors are scoped to a single unit of work (one file section, one file
//! diff, one interdiff pair). Nothing here aborts a whole multi-file diff.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A file section of a raw diff that could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParseError {
    #[error("malformed hunk header in file section {file_index} at byte {offset}: {header:?}")]
    MalformedHunkHeader {
        file_index: usize,
        offset: usize,
        header: String,
    },

    #[error("malformed hunk in file section {file_index} at byte {offset}: {reason}")]
    MalformedHunk {
        file_index: usize,
        offset: usize,
        reason: String,
    },

    #[error("unsupported diff format in file section {file_index} at byte {offset}: {reason}")]
    UnsupportedFormat {
        file_index: usize,
        offset: usize,
        reason: String,
    },
}

impl ParseError {
    /// Index of the file section the error belongs to.
    pub fn file_index(&self) -> usize {
        match self {
            Self::MalformedHunkHeader { file_index, .. }
            | Self::MalformedHunk { file_index, .. }
            | Self::UnsupportedFormat { file_index, .. } => *file_index,
        }
    }

    /// Byte offset into the raw diff where the problem was found.
    pub fn offset(&self) -> usize {
        match self {
            Self::MalformedHunkHeader { offset, .. }
            | Self::MalformedHunk { offset, .. }
            | Self::UnsupportedFormat { offset, .. } => *offset,
        }
    }
}

/// Which side of a hunk a line tally refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkSide {
    Source,
    Destination,
}

impl fmt::Display for HunkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// A parsed file patch whose hunks are internally inconsistent.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationError {
    #[error("hunk {hunk_index} declares {expected} {side} lines but contains {actual}")]
    HunkLineCountMismatch {
        hunk_index: usize,
        side: HunkSide,
        expected: usize,
        actual: usize,
    },

    #[error("hunk {hunk_index} overlaps or precedes the hunk before it")]
    OverlappingHunks { hunk_index: usize },
}

/// Why a hunk failed to apply against the supplied original.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MismatchReason {
    #[error("source range starting at line {start} ({count} lines) is outside a {file_len}-line file")]
    OutOfBounds {
        start: usize,
        count: usize,
        file_len: usize,
    },

    #[error("line {line} is {found:?} in the original but the hunk expects {expected:?}")]
    ContentMismatch {
        line: usize,
        expected: String,
        found: String,
    },
}

/// A hunk that does not apply cleanly to the original file.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("hunk {hunk_index} of {path} does not apply: {reason}")]
pub struct PatchMismatchError {
    pub path: String,
    pub hunk_index: usize,
    pub reason: MismatchReason,
}

/// Umbrella error for one unit of work in the diff core.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiffError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    PatchMismatch(#[from] PatchMismatchError),

    #[error("results were computed against different originals ({old} vs {new})")]
    IncompatibleOriginals { old: String, new: String },

    #[error("diff computation cancelled")]
    Cancelled,

    #[error("no original content supplied for {path}")]
    MissingOriginal { path: String },
}

/// Non-fatal problems recorded while normalizing a file patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The caller named an encoding that is not a known label.
    UnknownEncoding { label: String },
    /// Some lines were not valid in the chosen encoding and were decoded lossily.
    LossyDecode { encoding: String, lines: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEncoding { label } => {
                write!(f, "unknown encoding {label:?}, falling back to lossy UTF-8")
            }
            Self::LossyDecode { encoding, lines } => {
                write!(f, "{lines} line(s) were not valid {encoding} and were decoded lossily")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_accessors() {
        let err = ParseError::MalformedHunkHeader {
            file_index: 2,
            offset: 120,
            header: "@@ -a +b @@".into(),
        };
        assert_eq!(err.file_index(), 2);
        assert_eq!(err.offset(), 120);
        assert!(err.to_string().contains("file section 2"));
    }

    #[test]
    fn mismatch_message_names_hunk() {
        let err = ValidationError::HunkLineCountMismatch {
            hunk_index: 3,
            side: HunkSide::Source,
            expected: 5,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "hunk 3 declares 5 source lines but contains 4"
        );
    }

    #[test]
    fn diff_error_wraps_transparently() {
        let err: DiffError = PatchMismatchError {
            path: "src/lib.rs".into(),
            hunk_index: 1,
            reason: MismatchReason::OutOfBounds {
                start: 40,
                count: 3,
                file_len: 10,
            },
        }
        .into();
        let message = err.to_string();
        assert!(message.starts_with("hunk 1 of src/lib.rs does not apply"));
        assert!(message.contains("10-line file"));
    }
}
