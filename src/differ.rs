//! Line-level diffing of an original file against its patched version.
//!
//! [`diff`] applies a [`FilePatch`] to the original lines, then aligns the
//! original with the result. Lines are interned to integer ids first so the
//! alignment compares `u32`s instead of strings, which keeps files with tens
//! of thousands of lines cheap.
//!
//! ## Chunking
//!
//! The alignment comes from `similar`, whose captured ops are already
//! compacted: equal runs are extended greedily so the script has as few
//! chunks as possible, and an adjacent delete/insert pair arrives as one
//! replace op. A replace op whose two sides have the same length becomes a
//! [`ChunkTag::Replace`] chunk with intra-line highlights for each line pair;
//! otherwise it is split into a delete chunk followed by an insert chunk.
//!
//! ## Highlight Strategy
//!
//! - Full-line highlight: the line is too long to diff, or the changed tokens
//!   cover all of its non-whitespace content
//! - Partial highlight: only the changed byte columns
//! - Merged regions: changed regions separated only by whitespace are merged

use crate::cancel::CancellationToken;
use crate::config::{DiffOptions, IntralineGranularity};
use crate::error::{DiffError, MismatchReason, PatchMismatchError};
use crate::patch::{FilePatch, LineTag};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::{Algorithm, DiffOp, DiffTag};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;
use tracing::debug;

/// Most lines have 0-2 highlight regions; inline storage avoids heap allocation.
pub type Highlights = SmallVec<[HighlightRegion; 2]>;

/// A highlight region within a line, specified by byte column range.
///
/// Marks a contiguous span that changed between the two versions of a
/// replaced line, or the whole line for pure insertions and deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRegion {
    /// Start column (0-indexed, inclusive).
    pub start: u32,

    /// End column (exclusive), or -1 to indicate full-line highlight.
    ///
    /// The -1 sentinel lets a renderer highlight the entire line without
    /// knowing its length.
    pub end: i32,
}

impl HighlightRegion {
    /// Creates a highlight region that spans the entire line.
    ///
    /// Used for inserted and deleted lines, and for replaced lines whose
    /// changes cover all of their non-whitespace content.
    #[inline]
    #[must_use]
    pub fn full_line() -> Self {
        Self { start: 0, end: -1 }
    }

    /// Creates a highlight region for a specific column range.
    ///
    /// Columns past `i32::MAX` are clamped.
    #[inline]
    #[must_use]
    pub fn columns(start: u32, end: u32) -> Self {
        Self {
            start,
            end: i32::try_from(end).unwrap_or(i32::MAX),
        }
    }

    /// Whether this is the full-line sentinel.
    #[inline]
    pub fn is_full_line(&self) -> bool {
        self.end < 0
    }
}

/// Classification of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

impl ChunkTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }
}

/// Highlights for one old/new line pair of a replace chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineHighlights {
    pub old: Highlights,
    pub new: Highlights,
}

impl LineHighlights {
    fn full() -> Self {
        Self {
            old: smallvec::smallvec![HighlightRegion::full_line()],
            new: smallvec::smallvec![HighlightRegion::full_line()],
        }
    }
}

/// Annotation on a chunk that is one half of a detected move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInfo {
    /// Shared by the delete chunk and the insert chunk of one move.
    pub group: u32,

    /// Line range of the paired chunk, on the paired chunk's own side:
    /// new-file lines for a delete chunk, old-file lines for an insert chunk.
    pub counterpart: Range<usize>,
}

/// A contiguous region of the alignment.
///
/// `old` and `new` are 0-based line ranges into the two files. One of them
/// is empty for insert and delete chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub tag: ChunkTag,
    pub old: Range<usize>,
    pub new: Range<usize>,

    /// One entry per line pair; only replace chunks have any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<LineHighlights>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved: Option<MoveInfo>,
}

impl Chunk {
    fn new(tag: ChunkTag, old: Range<usize>, new: Range<usize>) -> Self {
        Self {
            tag,
            old,
            new,
            highlights: Vec::new(),
            moved: None,
        }
    }

    #[inline]
    pub fn is_change(&self) -> bool {
        self.tag != ChunkTag::Equal
    }
}

/// Line totals by chunk tag. Replace lines are counted as pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub inserts: usize,
    pub deletes: usize,
    pub replaces: usize,
}

/// The aligned comparison of one file's original and patched versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// SHA-256 of the original lines; results are only comparable when equal.
    pub original_digest: String,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
    pub chunks: Vec<Chunk>,
}

impl DiffResult {
    pub fn old_side(&self, chunk: &Chunk) -> &[String] {
        &self.old_lines[chunk.old.clone()]
    }

    pub fn new_side(&self, chunk: &Chunk) -> &[String] {
        &self.new_lines[chunk.new.clone()]
    }

    /// Concatenates the old-side lines of every chunk.
    pub fn reconstruct_old(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .flat_map(|c| self.old_side(c))
            .map(String::as_str)
            .collect()
    }

    /// Concatenates the new-side lines of every chunk.
    pub fn reconstruct_new(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .flat_map(|c| self.new_side(c))
            .map(String::as_str)
            .collect()
    }

    pub fn counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        for chunk in &self.chunks {
            match chunk.tag {
                ChunkTag::Equal => {}
                ChunkTag::Insert => counts.inserts += chunk.new.len(),
                ChunkTag::Delete => counts.deletes += chunk.old.len(),
                ChunkTag::Replace => counts.replaces += chunk.old.len(),
            }
        }
        counts
    }

    pub fn has_changes(&self) -> bool {
        self.chunks.iter().any(Chunk::is_change)
    }
}

/// Splits file content on `\n`.
///
/// A trailing `\r` is kept unless `strip_carriage_returns` is set, so the
/// lines compare equal to hunk text normalized with the same option.
pub fn split_lines(content: &str, strip_carriage_returns: bool) -> Vec<String> {
    content
        .split_terminator('\n')
        .map(|line| match line.strip_suffix('\r') {
            Some(stripped) if strip_carriage_returns => stripped,
            _ => line,
        })
        .map(String::from)
        .collect()
}

/// Hex SHA-256 of the file the lines came from: lines joined by `\n`, with
/// a final `\n` when `final_newline` is set.
pub fn original_digest(lines: &[String], final_newline: bool) -> String {
    let mut hasher = Sha256::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(line.as_bytes());
    }
    if final_newline && !lines.is_empty() {
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Applies `patch` to `original_lines` and diffs the two versions.
///
/// The original is taken to end in a newline unless one of the patch's
/// source lines carries the no-newline-at-eof marker. Use [`diff_content`]
/// when the original content is at hand.
pub fn diff(
    original_lines: &[String],
    patch: &FilePatch,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    let missing_newline = patch
        .hunks
        .iter()
        .flat_map(|h| &h.lines)
        .any(|l| l.no_newline_at_eof && l.in_source());
    diff_with_digest(
        original_lines,
        original_digest(original_lines, !missing_newline),
        patch,
        options,
        cancel,
    )
}

/// Like [`diff`], but splits the original content itself, using the
/// normalizer's carriage-return policy, and records whether it ends in a
/// newline.
pub fn diff_content(
    original: &str,
    patch: &FilePatch,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    let lines = split_lines(original, options.normalize.strip_carriage_returns);
    let final_newline = original.is_empty() || original.ends_with('\n');
    let digest = original_digest(&lines, final_newline);
    diff_with_digest(&lines, digest, patch, options, cancel)
}

fn diff_with_digest(
    original_lines: &[String],
    original_digest: String,
    patch: &FilePatch,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    cancel.check()?;
    let new_lines = apply_patch(original_lines, patch)?;
    build_result(original_lines.to_vec(), new_lines, original_digest, options, cancel)
}

/// Rebuilds the destination file from the original and the patch's hunks.
///
/// Context and delete lines must match the original exactly.
pub fn apply_patch(
    original: &[String],
    patch: &FilePatch,
) -> Result<Vec<String>, PatchMismatchError> {
    let mismatch = |hunk_index: usize, reason: MismatchReason| PatchMismatchError {
        path: patch.display_path().to_string(),
        hunk_index,
        reason,
    };

    let mut out = Vec::with_capacity(original.len() + patch.insert_count());
    let mut cursor = 0;

    for (hunk_index, hunk) in patch.hunks.iter().enumerate() {
        let start = hunk.source_offset();
        let end = start + hunk.source_tally();
        if start < cursor || end > original.len() {
            return Err(mismatch(
                hunk_index,
                MismatchReason::OutOfBounds {
                    start: hunk.source_start,
                    count: hunk.source_count,
                    file_len: original.len(),
                },
            ));
        }

        out.extend_from_slice(&original[cursor..start]);
        let mut line_no = start;
        for line in &hunk.lines {
            if line.tag == LineTag::Insert {
                out.push(line.text.clone());
                continue;
            }
            let found = &original[line_no];
            if *found != line.text {
                return Err(mismatch(
                    hunk_index,
                    MismatchReason::ContentMismatch {
                        line: line_no + 1,
                        expected: line.text.clone(),
                        found: found.clone(),
                    },
                ));
            }
            if line.tag == LineTag::Context {
                out.push(found.clone());
            }
            line_no += 1;
        }
        cursor = end;
    }

    out.extend_from_slice(&original[cursor..]);
    Ok(out)
}

/// Aligns two line sequences and builds the chunk list.
///
/// The old side is digested as a newline-terminated file.
pub fn diff_lines(
    old_lines: Vec<String>,
    new_lines: Vec<String>,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    let digest = original_digest(&old_lines, true);
    build_result(old_lines, new_lines, digest, options, cancel)
}

fn build_result(
    old_lines: Vec<String>,
    new_lines: Vec<String>,
    original_digest: String,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    cancel.check()?;
    let chunks = align(&old_lines, &new_lines, options, cancel)?;

    debug!(
        old_lines = old_lines.len(),
        new_lines = new_lines.len(),
        chunks = chunks.len(),
        "diffed file"
    );

    Ok(DiffResult {
        original_digest,
        old_lines,
        new_lines,
        chunks,
    })
}

/// Runs the line alignment and converts it to chunks.
pub(crate) fn align(
    old: &[String],
    new: &[String],
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<Vec<Chunk>, DiffError> {
    let (old_ids, new_ids) = intern_lines(old, new, options.ignore_whitespace);
    let ops = similar::capture_diff_slices_deadline(
        options.algorithm.to_similar(),
        &old_ids,
        &new_ids,
        cancel.deadline(),
    );
    cancel.check()?;
    build_chunks(&ops, old, new, options, cancel)
}

/// Maps every distinct line to a small integer id shared by both sides.
fn intern_lines<'a>(
    old: &'a [String],
    new: &'a [String],
    ignore_whitespace: bool,
) -> (Vec<u32>, Vec<u32>) {
    let mut ids: HashMap<Cow<'a, str>, u32> = HashMap::with_capacity(old.len() + new.len());
    let mut intern = |lines: &'a [String]| -> Vec<u32> {
        lines
            .iter()
            .map(|line| {
                let next = ids.len() as u32;
                *ids.entry(line_key(line, ignore_whitespace)).or_insert(next)
            })
            .collect()
    };
    let old_ids = intern(old);
    let new_ids = intern(new);
    (old_ids, new_ids)
}

#[inline]
fn line_key(line: &str, ignore_whitespace: bool) -> Cow<'_, str> {
    if ignore_whitespace {
        Cow::Owned(line.chars().filter(|c| !c.is_whitespace()).collect())
    } else {
        Cow::Borrowed(line)
    }
}

fn build_chunks(
    ops: &[DiffOp],
    old: &[String],
    new: &[String],
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<Vec<Chunk>, DiffError> {
    let mut chunks: Vec<Chunk> = Vec::with_capacity(ops.len());

    for op in ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => push_chunk(&mut chunks, ChunkTag::Equal, old_range, new_range),
            DiffTag::Delete => push_chunk(&mut chunks, ChunkTag::Delete, old_range, new_range),
            DiffTag::Insert => push_chunk(&mut chunks, ChunkTag::Insert, old_range, new_range),
            DiffTag::Replace if old_range.len() == new_range.len() => {
                cancel.check()?;
                let highlights = old_range
                    .clone()
                    .zip(new_range.clone())
                    .map(|(o, n)| intraline_highlights(&old[o], &new[n], options))
                    .collect();
                chunks.push(Chunk {
                    highlights,
                    ..Chunk::new(ChunkTag::Replace, old_range, new_range)
                });
            }
            DiffTag::Replace => {
                let split_new = new_range.start..new_range.start;
                let split_old = old_range.end..old_range.end;
                push_chunk(&mut chunks, ChunkTag::Delete, old_range, split_new);
                push_chunk(&mut chunks, ChunkTag::Insert, split_old, new_range);
            }
        }
    }

    Ok(chunks)
}

/// Appends a chunk, extending the previous one when the tags match.
fn push_chunk(chunks: &mut Vec<Chunk>, tag: ChunkTag, old: Range<usize>, new: Range<usize>) {
    if old.is_empty() && new.is_empty() {
        return;
    }
    if let Some(last) = chunks.last_mut() {
        if last.tag == tag
            && tag != ChunkTag::Replace
            && last.old.end == old.start
            && last.new.end == new.start
        {
            last.old.end = old.end;
            last.new.end = new.end;
            return;
        }
    }
    chunks.push(Chunk::new(tag, old, new));
}

/// Diffs one replaced line pair token by token.
fn intraline_highlights(old: &str, new: &str, options: &DiffOptions) -> LineHighlights {
    if old.len() > options.max_intraline_line_len || new.len() > options.max_intraline_line_len {
        return LineHighlights::full();
    }

    let old_tokens = tokenize(old, options.intraline);
    let new_tokens = tokenize(new, options.intraline);
    let old_words: Vec<&str> = old_tokens.iter().map(|r| &old[r.clone()]).collect();
    let new_words: Vec<&str> = new_tokens.iter().map(|r| &new[r.clone()]).collect();

    let mut old_regions: SmallVec<[(u32, u32); 4]> = SmallVec::new();
    let mut new_regions: SmallVec<[(u32, u32); 4]> = SmallVec::new();
    for op in similar::capture_diff_slices(Algorithm::Myers, &old_words, &new_words) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        if let Some(span) = token_span(&old_tokens, old_range) {
            old_regions.push(span);
        }
        if let Some(span) = token_span(&new_tokens, new_range) {
            new_regions.push(span);
        }
    }

    LineHighlights {
        old: compute_highlights(old, &old_regions),
        new: compute_highlights(new, &new_regions),
    }
}

/// Byte span covered by a run of tokens.
fn token_span(tokens: &[Range<usize>], range: Range<usize>) -> Option<(u32, u32)> {
    let first = tokens.get(range.start)?;
    let last = tokens.get(range.end.checked_sub(1)?)?;
    Some((first.start as u32, last.end as u32))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Whitespace,
    Punctuation,
}

fn char_class(c: char) -> CharClass {
    if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else if c.is_whitespace() {
        CharClass::Whitespace
    } else {
        CharClass::Punctuation
    }
}

/// Splits a line into byte ranges of identifier runs, whitespace runs and
/// single punctuation characters, or into single characters.
fn tokenize(line: &str, granularity: IntralineGranularity) -> Vec<Range<usize>> {
    let mut tokens: Vec<Range<usize>> = Vec::new();
    let mut prev: Option<CharClass> = None;

    for (i, c) in line.char_indices() {
        let end = i + c.len_utf8();
        let class = char_class(c);
        let extends = granularity == IntralineGranularity::Word
            && class != CharClass::Punctuation
            && prev == Some(class);
        match tokens.last_mut() {
            Some(last) if extends => last.end = end,
            _ => tokens.push(i..end),
        }
        prev = Some(class);
    }

    tokens
}

/// Turns changed byte regions of a line into display highlights.
pub(crate) fn compute_highlights(content: &str, regions: &[(u32, u32)]) -> Highlights {
    if regions.is_empty() {
        return Highlights::new();
    }

    // If a single change covers the entire line, use full-line highlight
    let len = content.len() as u32;
    if regions.len() == 1 && regions[0].0 == 0 && regions[0].1 >= len {
        return smallvec::smallvec![HighlightRegion::full_line()];
    }

    let mut sorted: SmallVec<[(u32, u32); 4]> = regions.iter().copied().collect();
    sorted.sort_unstable_by_key(|r| r.0);
    let merged = merge_regions(&sorted, content.as_bytes());

    if covers_all_non_whitespace(content, &merged) {
        return smallvec::smallvec![HighlightRegion::full_line()];
    }

    merged
        .into_iter()
        .map(|(start, end)| HighlightRegion::columns(start, end))
        .collect()
}

/// Merges adjacent change regions, bridging gaps that contain only whitespace.
fn merge_regions(regions: &[(u32, u32)], bytes: &[u8]) -> SmallVec<[(u32, u32); 4]> {
    let mut merged: SmallVec<[(u32, u32); 4]> = SmallVec::with_capacity(regions.len());

    for &(start, end) in regions {
        if let Some((_, last_end)) = merged.last_mut() {
            let gap_start = *last_end as usize;
            let gap_end = start as usize;

            if gap_start >= gap_end || is_whitespace_only(bytes, gap_start, gap_end) {
                *last_end = (*last_end).max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
}

#[inline]
fn is_whitespace_only(bytes: &[u8], start: usize, end: usize) -> bool {
    bytes
        .get(start..end)
        .is_some_and(|slice| slice.iter().all(u8::is_ascii_whitespace))
}

/// Whether the regions cover every non-whitespace character of the line.
fn covers_all_non_whitespace(line: &str, regions: &[(u32, u32)]) -> bool {
    let mut has_non_ws = false;

    for (i, c) in line.char_indices() {
        if !c.is_whitespace() {
            has_non_ws = true;
            let pos = i as u32;
            if !regions
                .iter()
                .any(|(start, end)| pos >= *start && pos < *end)
            {
                return false;
            }
        }
    }

    has_non_ws
}
