//! # review_diff
//!
//! The diff-processing core of a code review viewer.
//!
//! This crate turns an uploaded diff (unified or context format, optionally
//! with git extended headers) plus the original contents of the files it
//! touches into display-ready results: aligned line-level diffs with
//! intra-line highlights, detected code moves, interdiffs between two
//! revisions of a patch, and a rough complexity bucket per file.
//!
//! ## Architecture
//!
//! - `parser` - Splits raw diff bytes into per-file [`FilePatch`]es
//! - `normalize` - Decodes line bytes and validates hunk line counts
//! - `differ` - Applies a patch to its original and aligns the two line by line
//! - `moves` - Pairs deleted and inserted blocks that are the same code moved
//! - `interdiff` - Compares two diffs of one original
//! - `complexity` - Buckets a file change by size
//! - `rows` - Side-by-side display rows for a [`DiffResult`]
//! - `processor` - Runs a whole diff through the above, one file per rayon task
//!
//! Files are independent: a malformed section or a missing original fails
//! only that file's [`FileOutcome`].
//!
//! ## Usage
//!
//! ```no_run
//! use review_diff::{CancellationToken, DiffOptions, RawDiffFile, process_diff};
//! use std::collections::HashMap;
//!
//! let raw = RawDiffFile::new(std::fs::read("change.diff").unwrap());
//! let originals = HashMap::from([(
//!     "src/main.rs".to_string(),
//!     std::fs::read_to_string("src/main.rs").unwrap(),
//! )]);
//!
//! for outcome in process_diff(&raw, &originals, &DiffOptions::default(), &CancellationToken::new()) {
//!     match outcome.result {
//!         Ok(file) => println!("{}: {:?}", file.patch.display_path(), file.complexity),
//!         Err(err) => eprintln!("file {}: {err}", outcome.index),
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - `lua` - Builds the crate as a Lua module (`require("review_diff")`)

pub mod cancel;
pub mod complexity;
pub mod config;
pub mod differ;
pub mod error;
pub mod interdiff;
pub mod moves;
pub mod normalize;
pub mod parser;
pub mod patch;
pub mod processor;
pub mod rows;

#[cfg(feature = "lua")]
mod lua;

pub use cancel::CancellationToken;
pub use complexity::{ComplexityBucket, ComplexityScore, classify, classify_result};
pub use config::{ComplexityThresholds, DiffOptions, MoveOptions, NormalizeOptions};
pub use differ::{Chunk, ChunkTag, DiffResult, apply_patch, diff, diff_content, diff_lines};
pub use error::{DiffError, ParseError, PatchMismatchError, ValidationError, Warning};
pub use interdiff::{InterdiffResult, Provenance, interdiff, interdiff_patches};
pub use moves::detect_moves;
pub use normalize::normalize;
pub use parser::{ParsedDiff, parse};
pub use patch::{FileChange, FilePatch, Hunk, Line, LineTag, RawDiffFile};
pub use processor::{FileOutcome, OriginalProvider, ProcessedFile, process_diff};
pub use rows::{DisplayFile, build_rows};
