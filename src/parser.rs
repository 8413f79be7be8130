//! Decoding raw diff bytes into per-file patches.
//!
//! Understands unified diffs (`---`/`+++`, `@@ -l,s +l,s @@`) and context
//! diffs (`***`/`---`, `***************` hunks), with the git, Mercurial,
//! Subversion and plain `diff` section headers that wrap them.
//!
//! ## Parsing Flow
//!
//! 1. The input is split into byte lines, keeping each line's byte offset
//! 2. Text before the first section header (commit messages, mail headers) is skipped
//! 3. Each file section is sniffed for its dialect from its first header lines,
//!    then its hunks are read count-driven
//! 4. A section that fails is recorded as an error and parsing resumes at the
//!    next section header
//!
//! No semantic checks happen here: declared hunk sizes are trusted only to
//! find where a hunk ends. [`crate::normalize`] validates them.

use crate::error::ParseError;
use crate::patch::{DiffFormat, FileChange, FilePatch, Hunk, Line, LineTag, RawDiffFile};
use regex::bytes::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static UNIFIED_HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hardcoded unified hunk regex")
});

static CONTEXT_OLD_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*\* (\d+)(?:,(\d+))? \*\*\*\*").expect("hardcoded context range regex")
});

static CONTEXT_NEW_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--- (\d+)(?:,(\d+))? ----").expect("hardcoded context range regex")
});

/// `diff` without `-u`/`-c` prints ed-style commands like `12,14c12`.
static NORMAL_DIFF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:,\d+)?[acd]\d+(?:,\d+)?$").expect("hardcoded normal diff regex")
});

/// Every file section of a diff, each parsed or failed on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDiff {
    pub files: Vec<Result<FilePatch, ParseError>>,
}

impl ParsedDiff {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The sections that parsed successfully.
    pub fn patches(&self) -> impl Iterator<Item = &FilePatch> {
        self.files.iter().filter_map(|f| f.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ParseError> {
        self.files.iter().filter_map(|f| f.as_ref().err())
    }

    /// All patches, or the first section error.
    pub fn into_patches(self) -> Result<Vec<FilePatch>, ParseError> {
        self.files.into_iter().collect()
    }
}

/// Parses an uploaded diff. See [`parse_bytes`].
pub fn parse(raw: &RawDiffFile, hint: Option<DiffFormat>) -> ParsedDiff {
    parse_bytes(&raw.bytes, hint)
}

/// Parses raw diff bytes into one result per file section.
///
/// With `hint`, every section must be in that dialect; without it each
/// section is sniffed independently.
pub fn parse_bytes(bytes: &[u8], hint: Option<DiffFormat>) -> ParsedDiff {
    let mut parser = Parser::new(bytes, hint);
    let mut files = Vec::new();

    while parser.seek_section_start() {
        let file_index = files.len();
        let section_start = parser.pos;

        match parser.parse_section(file_index) {
            Ok(patch) => {
                debug!(
                    file_index,
                    source = %patch.source_path,
                    dest = %patch.dest_path,
                    hunks = patch.hunks.len(),
                    binary = patch.is_binary,
                    "parsed file section"
                );
                files.push(Ok(patch));
            }
            Err(err) => {
                warn!(file_index, error = %err, "skipping unparseable file section");
                parser.pos = parser.pos.max(section_start + 1);
                files.push(Err(err));
            }
        }
    }

    if files.is_empty() {
        if let Some(line) = parser.lines.iter().find(|l| !l.trimmed().trim_ascii().is_empty()) {
            files.push(Err(ParseError::UnsupportedFormat {
                file_index: 0,
                offset: line.offset,
                reason: "no diff headers found".to_string(),
            }));
        }
    }

    ParsedDiff { files }
}

/// One input line, without its `\n`.
#[derive(Debug, Clone, Copy)]
struct RawLine<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> RawLine<'a> {
    /// The line without a trailing `\r`, for header matching.
    #[inline]
    fn trimmed(&self) -> &'a [u8] {
        self.bytes.strip_suffix(b"\r").unwrap_or(self.bytes)
    }
}

fn split_raw_lines(bytes: &[u8]) -> Vec<RawLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            lines.push(RawLine {
                offset: start,
                bytes: &bytes[start..i],
            });
            start = i + 1;
        }
    }
    if start < bytes.len() {
        lines.push(RawLine {
            offset: start,
            bytes: &bytes[start..],
        });
    }
    lines
}

#[inline]
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_number(bytes: Option<regex::bytes::Match<'_>>) -> Option<usize> {
    std::str::from_utf8(bytes?.as_bytes()).ok()?.parse().ok()
}

fn format_name(format: DiffFormat) -> &'static str {
    match format {
        DiffFormat::Unified => "unified",
        DiffFormat::Context => "context",
    }
}

struct Parser<'a> {
    lines: Vec<RawLine<'a>>,
    pos: usize,
    end_offset: usize,
    hint: Option<DiffFormat>,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8], hint: Option<DiffFormat>) -> Self {
        Self {
            lines: split_raw_lines(bytes),
            pos: 0,
            end_offset: bytes.len(),
            hint,
        }
    }

    #[inline]
    fn peek(&self) -> Option<RawLine<'a>> {
        self.lines.get(self.pos).copied()
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end_offset, |l| l.offset)
    }

    fn line_starts_with(&self, index: usize, prefix: &[u8]) -> bool {
        self.lines
            .get(index)
            .is_some_and(|l| l.trimmed().starts_with(prefix))
    }

    fn is_context_header_pair(&self, index: usize) -> bool {
        self.lines.get(index).is_some_and(|l| {
            let t = l.trimmed();
            t.starts_with(b"*** ")
                && !t.starts_with(b"****")
                && !CONTEXT_OLD_RANGE_RE.is_match(t)
        }) && self.line_starts_with(index + 1, b"--- ")
    }

    fn is_unified_header_pair(&self, index: usize) -> bool {
        self.line_starts_with(index, b"--- ") && self.line_starts_with(index + 1, b"+++ ")
    }

    fn is_section_start(&self, index: usize) -> bool {
        self.line_starts_with(index, b"diff ")
            || self.line_starts_with(index, b"Index: ")
            || self.is_unified_header_pair(index)
            || self.is_context_header_pair(index)
    }

    /// Advances to the next section header; false at end of input.
    fn seek_section_start(&mut self) -> bool {
        while self.pos < self.lines.len() {
            if self.is_section_start(self.pos) {
                return true;
            }
            self.pos += 1;
        }
        false
    }

    fn check_hint(&self, found: DiffFormat, file_index: usize) -> Result<(), ParseError> {
        match self.hint {
            Some(expected) if expected != found => Err(ParseError::UnsupportedFormat {
                file_index,
                offset: self.offset(),
                reason: format!(
                    "expected a {} diff, found a {} diff",
                    format_name(expected),
                    format_name(found)
                ),
            }),
            _ => Ok(()),
        }
    }

    fn parse_section(&mut self, file_index: usize) -> Result<FilePatch, ParseError> {
        let mut patch = FilePatch::default();
        let mut git = false;
        let mut saw_command = false;
        let mut saw_index = false;

        if let Some(line) = self.peek() {
            let t = line.trimmed();
            if let Some(rest) = t.strip_prefix(b"diff --git ") {
                git = true;
                saw_command = true;
                if let Some((old, new)) = split_git_paths(&lossy(rest)) {
                    patch.source_path = old;
                    patch.dest_path = new;
                }
                self.pos += 1;
            } else if t.starts_with(b"diff ") {
                saw_command = true;
                self.pos += 1;
            } else if let Some(rest) = t.strip_prefix(b"Index: ") {
                saw_index = true;
                let path = lossy(rest).trim().to_string();
                patch.source_path = path.clone();
                patch.dest_path = path;
                self.pos += 1;
            }
        }

        while let Some(line) = self.peek() {
            let t = line.trimmed();

            if t.starts_with(b"Index: ") || (saw_command && t.starts_with(b"diff ")) {
                break;
            }
            if let Some(rest) = t.strip_prefix(b"diff ") {
                // CVS nests its `diff -u -r1.1 path` line inside the Index section.
                saw_command = true;
                git |= rest.starts_with(b"--git ");
                self.pos += 1;
                continue;
            }
            if self.is_unified_header_pair(self.pos) {
                return self.parse_unified_file(patch, git, file_index);
            }
            if self.is_context_header_pair(self.pos) {
                return self.parse_context_file(patch, git, file_index);
            }
            if t.starts_with(b"@@") {
                self.check_hint(DiffFormat::Unified, file_index)?;
                return self.parse_unified_hunks(patch, file_index);
            }
            if t.starts_with(b"***************") {
                self.check_hint(DiffFormat::Context, file_index)?;
                return self.parse_context_hunks(patch, file_index);
            }

            if let Some(mode) = t.strip_prefix(b"new file mode ") {
                patch.change = FileChange::Added;
                patch.new_mode = Some(lossy(mode));
            } else if let Some(mode) = t.strip_prefix(b"deleted file mode ") {
                patch.change = FileChange::Deleted;
                patch.old_mode = Some(lossy(mode));
            } else if let Some(mode) = t.strip_prefix(b"old mode ") {
                patch.old_mode = Some(lossy(mode));
            } else if let Some(mode) = t.strip_prefix(b"new mode ") {
                patch.new_mode = Some(lossy(mode));
            } else if let Some(path) = t.strip_prefix(b"rename from ") {
                patch.change = FileChange::Renamed;
                patch.source_path = unquote(&lossy(path));
            } else if let Some(path) = t.strip_prefix(b"rename to ") {
                patch.change = FileChange::Renamed;
                patch.dest_path = unquote(&lossy(path));
            } else if let Some(path) = t.strip_prefix(b"copy from ") {
                patch.change = FileChange::Copied;
                patch.source_path = unquote(&lossy(path));
            } else if let Some(path) = t.strip_prefix(b"copy to ") {
                patch.change = FileChange::Copied;
                patch.dest_path = unquote(&lossy(path));
            } else if let Some(rest) = t.strip_prefix(b"index ") {
                apply_index_line(&mut patch, &lossy(rest));
            } else if t.starts_with(b"Binary files ") && t.ends_with(b" differ") {
                apply_binary_line(&mut patch, &lossy(t), git);
                self.pos += 1;
                return Ok(patch);
            } else if t == b"GIT binary patch" {
                patch.is_binary = true;
                self.pos += 1;
                while self.pos < self.lines.len() && !self.is_section_start(self.pos) {
                    self.pos += 1;
                }
                return Ok(patch);
            } else if NORMAL_DIFF_RE.is_match(t) {
                return Err(ParseError::UnsupportedFormat {
                    file_index,
                    offset: line.offset,
                    reason: "normal (ed-style) diffs are not supported".to_string(),
                });
            }
            self.pos += 1;
        }

        // Mode-only changes, pure renames and property-only changes carry no hunks.
        if git || saw_index {
            return Ok(patch);
        }
        Err(ParseError::UnsupportedFormat {
            file_index,
            offset: self.offset(),
            reason: "file section has no recognizable file header".to_string(),
        })
    }

    fn parse_unified_file(
        &mut self,
        mut patch: FilePatch,
        git: bool,
        file_index: usize,
    ) -> Result<FilePatch, ParseError> {
        self.check_hint(DiffFormat::Unified, file_index)?;
        let old = self.lines[self.pos].trimmed();
        let new = self.lines[self.pos + 1].trimmed();
        apply_file_headers(&mut patch, &old[4..], &new[4..], git);
        self.pos += 2;
        self.parse_unified_hunks(patch, file_index)
    }

    fn parse_unified_hunks(
        &mut self,
        mut patch: FilePatch,
        file_index: usize,
    ) -> Result<FilePatch, ParseError> {
        patch.format = Some(DiffFormat::Unified);

        while let Some(line) = self.peek() {
            let t = line.trimmed();
            if !t.starts_with(b"@@") {
                break;
            }
            let caps = UNIFIED_HUNK_RE
                .captures(t)
                .ok_or_else(|| ParseError::MalformedHunkHeader {
                    file_index,
                    offset: line.offset,
                    header: lossy(t),
                })?;
            let parsed = (
                parse_number(caps.get(1)),
                caps.get(2).map_or(Some(1), |m| parse_number(Some(m))),
                parse_number(caps.get(3)),
                caps.get(4).map_or(Some(1), |m| parse_number(Some(m))),
            );
            let (Some(source_start), Some(source_count), Some(dest_start), Some(dest_count)) =
                parsed
            else {
                return Err(ParseError::MalformedHunkHeader {
                    file_index,
                    offset: line.offset,
                    header: lossy(t),
                });
            };
            self.pos += 1;

            let lines = self.read_unified_body(source_count, dest_count);
            patch.hunks.push(Hunk {
                source_start,
                source_count,
                dest_start,
                dest_count,
                lines,
            });
        }

        Ok(patch)
    }

    /// Reads hunk lines until the declared counts are used up or a line
    /// cannot belong to the hunk.
    fn read_unified_body(&mut self, mut old_left: usize, mut new_left: usize) -> Vec<Line> {
        let mut lines: Vec<Line> = Vec::new();

        while let Some(line) = self.peek() {
            let bytes = line.bytes;
            if bytes.first() == Some(&b'\\') {
                if let Some(last) = lines.last_mut() {
                    last.no_newline_at_eof = true;
                }
                self.pos += 1;
                continue;
            }
            if old_left == 0 && new_left == 0 {
                break;
            }

            let t = line.trimmed();
            if t.starts_with(b"@@") || t.starts_with(b"diff ") || t.starts_with(b"Index: ") {
                break;
            }
            // `--- x` / `+++ y` is content only while both sides still expect lines.
            if self.is_unified_header_pair(self.pos) && (old_left == 0 || new_left == 0) {
                break;
            }

            let (tag, content) = match bytes.first() {
                Some(b' ') => (LineTag::Context, &bytes[1..]),
                Some(b'-') => (LineTag::Delete, &bytes[1..]),
                Some(b'+') => (LineTag::Insert, &bytes[1..]),
                // Editors strip the lone space of blank context lines.
                _ if t.is_empty() => (LineTag::Context, &bytes[t.len()..]),
                _ => break,
            };
            match tag {
                LineTag::Context => {
                    old_left = old_left.saturating_sub(1);
                    new_left = new_left.saturating_sub(1);
                }
                LineTag::Delete => old_left = old_left.saturating_sub(1),
                LineTag::Insert => new_left = new_left.saturating_sub(1),
            }
            lines.push(Line::from_raw(tag, content));
            self.pos += 1;
        }

        lines
    }

    fn parse_context_file(
        &mut self,
        mut patch: FilePatch,
        git: bool,
        file_index: usize,
    ) -> Result<FilePatch, ParseError> {
        self.check_hint(DiffFormat::Context, file_index)?;
        let old = self.lines[self.pos].trimmed();
        let new = self.lines[self.pos + 1].trimmed();
        apply_file_headers(&mut patch, &old[4..], &new[4..], git);
        self.pos += 2;
        self.parse_context_hunks(patch, file_index)
    }

    fn parse_context_hunks(
        &mut self,
        mut patch: FilePatch,
        file_index: usize,
    ) -> Result<FilePatch, ParseError> {
        patch.format = Some(DiffFormat::Context);

        while let Some(line) = self.peek() {
            if !line.trimmed().starts_with(b"***************") {
                break;
            }
            self.pos += 1;
            let hunk = self.read_context_hunk(file_index)?;
            patch.hunks.push(hunk);
        }

        Ok(patch)
    }

    fn read_context_hunk(&mut self, file_index: usize) -> Result<Hunk, ParseError> {
        let (old_start, old_end) = self.read_context_range(&CONTEXT_OLD_RANGE_RE, file_index)?;
        let old_body = self.read_context_section(b'-');
        let (new_start, new_end) = self.read_context_range(&CONTEXT_NEW_RANGE_RE, file_index)?;
        let new_body = self.read_context_section(b'+');

        let lines = merge_context_sections(old_body, new_body);
        let source_tally = lines.iter().filter(|l| l.in_source()).count();
        let dest_tally = lines.iter().filter(|l| l.in_destination()).count();
        let malformed = |reason: &str| ParseError::MalformedHunk {
            file_index,
            offset: self.offset(),
            reason: reason.to_string(),
        };

        Ok(Hunk {
            source_start: old_start,
            source_count: context_count(old_start, old_end, source_tally)
                .ok_or_else(|| malformed("old range ends before it starts"))?,
            dest_start: new_start,
            dest_count: context_count(new_start, new_end, dest_tally)
                .ok_or_else(|| malformed("new range ends before it starts"))?,
            lines,
        })
    }

    fn read_context_range(
        &mut self,
        re: &Regex,
        file_index: usize,
    ) -> Result<(usize, Option<usize>), ParseError> {
        let Some(line) = self.peek() else {
            return Err(ParseError::MalformedHunk {
                file_index,
                offset: self.end_offset,
                reason: "diff ends inside a context hunk".to_string(),
            });
        };
        let t = line.trimmed();
        let malformed_header = || ParseError::MalformedHunkHeader {
            file_index,
            offset: line.offset,
            header: lossy(t),
        };
        let caps = re.captures(t).ok_or_else(malformed_header)?;
        let start = parse_number(caps.get(1)).ok_or_else(malformed_header)?;
        let end = match caps.get(2) {
            Some(m) => Some(parse_number(Some(m)).ok_or_else(malformed_header)?),
            None => None,
        };
        self.pos += 1;
        Ok((start, end))
    }

    /// Reads one half of a context hunk; `change` is `-` for the old half
    /// and `+` for the new one.
    fn read_context_section(&mut self, change: u8) -> Vec<(u8, Line)> {
        let mut body: Vec<(u8, Line)> = Vec::new();

        while let Some(line) = self.peek() {
            let bytes = line.bytes;
            let marker = match bytes.first() {
                Some(b'\\') => {
                    if let Some((_, last)) = body.last_mut() {
                        last.no_newline_at_eof = true;
                    }
                    self.pos += 1;
                    continue;
                }
                Some(&c) if c == b' ' || c == b'!' || c == change => c,
                _ => break,
            };
            let content = match bytes.get(1) {
                None => &bytes[1..],
                Some(b' ') => &bytes[2..],
                Some(b'\r') if bytes.len() == 2 => &bytes[1..],
                _ => break,
            };
            let tag = match marker {
                b' ' => LineTag::Context,
                _ if change == b'-' => LineTag::Delete,
                _ => LineTag::Insert,
            };
            body.push((marker, Line::from_raw(tag, content)));
            self.pos += 1;
        }

        body
    }
}

/// Line count of a context-diff range.
///
/// `a,b` is inclusive. A bare number is either one line or, when the hunk
/// has no lines on that side, the empty range after that line.
fn context_count(start: usize, end: Option<usize>, tally: usize) -> Option<usize> {
    match end {
        Some(end) => (end + 1).checked_sub(start),
        None if tally == 0 => Some(0),
        None => Some(1),
    }
}

/// Interleaves the two halves of a context hunk into one tagged sequence.
///
/// A half with no body contributes its context through the other half.
/// Runs of `!` lines become deletes followed by inserts.
fn merge_context_sections(old: Vec<(u8, Line)>, new: Vec<(u8, Line)>) -> Vec<Line> {
    if old.is_empty() {
        return new.into_iter().map(|(_, line)| line).collect();
    }
    if new.is_empty() {
        return old.into_iter().map(|(_, line)| line).collect();
    }

    let mut merged = Vec::with_capacity(old.len() + new.len());
    let mut old = old.into_iter().peekable();
    let mut new = new.into_iter().peekable();

    loop {
        if let Some((_, line)) = old.next_if(|(m, _)| *m == b'-') {
            merged.push(line);
            continue;
        }
        if let Some((_, line)) = new.next_if(|(m, _)| *m == b'+') {
            merged.push(line);
            continue;
        }
        let old_changed = old.peek().is_some_and(|(m, _)| *m == b'!');
        let new_changed = new.peek().is_some_and(|(m, _)| *m == b'!');
        if old_changed || new_changed {
            while let Some((_, line)) = old.next_if(|(m, _)| *m == b'!') {
                merged.push(line);
            }
            while let Some((_, line)) = new.next_if(|(m, _)| *m == b'!') {
                merged.push(line);
            }
            continue;
        }
        match (old.next(), new.next()) {
            (Some((_, line)), _) | (None, Some((_, line))) => merged.push(line),
            (None, None) => break,
        }
    }

    merged
}

/// Applies a `---`/`+++` (or `***`/`---`) header pair to the patch.
fn apply_file_headers(patch: &mut FilePatch, old: &[u8], new: &[u8], git: bool) {
    let (old_path, old_rev) = split_header(&lossy(old));
    let (new_path, new_rev) = split_header(&lossy(new));

    let strip = git || (old_path.starts_with("a/") && new_path.starts_with("b/"));
    let strip_prefix = |path: String, prefix: &str| -> String {
        match path.strip_prefix(prefix) {
            Some(rest) if strip => rest.to_string(),
            _ => path,
        }
    };

    if old_path == "/dev/null" {
        patch.change = FileChange::Added;
    }
    if new_path == "/dev/null" {
        patch.change = FileChange::Deleted;
    }

    // Rename and copy headers already named the paths.
    if !matches!(patch.change, FileChange::Renamed | FileChange::Copied) {
        patch.source_path = strip_prefix(old_path, "a/");
        patch.dest_path = strip_prefix(new_path, "b/");
    }
    if patch.source_revision.is_empty() {
        patch.source_revision = old_rev;
    }
    if patch.dest_revision.is_empty() {
        patch.dest_revision = new_rev;
    }
}

/// Splits `path\trevision` into its parts.
fn split_header(header: &str) -> (String, String) {
    match header.split_once('\t') {
        Some((path, rev)) => (unquote(path.trim_end()), rev.trim().to_string()),
        None => (unquote(header.trim_end()), String::new()),
    }
}

/// `index 1a2b3c..4d5e6f 100644` carries the blob hashes of both sides.
fn apply_index_line(patch: &mut FilePatch, rest: &str) {
    let Some(range) = rest.split_whitespace().next() else {
        return;
    };
    if let Some((old, new)) = range.split_once("..") {
        patch.source_revision = old.to_string();
        patch.dest_revision = new.to_string();
    }
}

/// `Binary files a/x and b/x differ`
fn apply_binary_line(patch: &mut FilePatch, line: &str, git: bool) {
    patch.is_binary = true;
    let inner = line
        .strip_prefix("Binary files ")
        .and_then(|rest| rest.strip_suffix(" differ"));
    let Some((old, new)) = inner.and_then(|s| s.split_once(" and ")) else {
        return;
    };
    let trim = |path: &str, prefix: &str| -> String {
        let path = unquote(path);
        match path.strip_prefix(prefix) {
            Some(rest) if git => rest.to_string(),
            _ => path,
        }
    };
    if old == "/dev/null" {
        patch.change = FileChange::Added;
    } else if new == "/dev/null" {
        patch.change = FileChange::Deleted;
    }
    if patch.source_path.is_empty() {
        patch.source_path = trim(old, "a/");
    }
    if patch.dest_path.is_empty() {
        patch.dest_path = trim(new, "b/");
    }
}

/// Splits the `a/x b/y` tail of a `diff --git` line.
fn split_git_paths(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_end();
    let (old, new) = if rest.starts_with('"') {
        let close = rest[1..].find("\" ")? + 1;
        (&rest[..=close], &rest[close + 2..])
    } else {
        let split = rest.find(" b/")?;
        (&rest[..split], &rest[split + 1..])
    };
    let old = unquote(old);
    let new = unquote(new);
    Some((
        old.strip_prefix("a/").unwrap_or(&old).to_string(),
        new.strip_prefix("b/").unwrap_or(&new).to_string(),
    ))
}

/// Removes git's C-style quoting from a path, if present.
fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
