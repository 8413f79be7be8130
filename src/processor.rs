//! Running a whole uploaded diff through the diff core.
//!
//! ## Processing Flow
//!
//! 1. [`process_diff`] parses the raw bytes into file sections
//! 2. Sections are processed in parallel on the rayon pool, order preserved
//! 3. Each section is normalized, then binary patches are passed through
//! 4. The original content is looked up through an [`OriginalProvider`]
//! 5. The patch is applied and diffed, moves are detected, and the change
//!    is classified
//!
//! Every section carries its own `Result`, so one failing file never hides
//! the others.

use crate::cancel::CancellationToken;
use crate::complexity::{ComplexityScore, classify_result};
use crate::config::DiffOptions;
use crate::differ::{DiffResult, diff_content};
use crate::error::DiffError;
use crate::moves::detect_moves;
use crate::normalize::normalize;
use crate::parser::parse;
use crate::patch::{FileChange, FilePatch, RawDiffFile};
use crate::rows::{DisplayFile, build_rows};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Supplies original file content, keyed by a patch's source path.
///
/// The core never reads files itself; callers fetch content from their
/// repository and hand it in through this trait.
pub trait OriginalProvider: Sync {
    fn original(&self, path: &str) -> Option<&str>;
}

impl OriginalProvider for HashMap<String, String> {
    fn original(&self, path: &str) -> Option<&str> {
        self.get(path).map(String::as_str)
    }
}

impl OriginalProvider for BTreeMap<String, String> {
    fn original(&self, path: &str) -> Option<&str> {
        self.get(path).map(String::as_str)
    }
}

/// A file section that made it through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFile {
    /// The normalized patch.
    pub patch: FilePatch,

    /// `None` for binary patches, and for hunk-less patches (renames, mode
    /// changes) whose original was not supplied.
    pub diff: Option<DiffResult>,

    pub complexity: Option<ComplexityScore>,
}

impl ProcessedFile {
    /// Side-by-side rows for the file, when it has a text diff.
    pub fn display(&self) -> Option<DisplayFile> {
        self.diff
            .as_ref()
            .map(|d| build_rows(self.patch.display_path(), self.patch.change, d))
    }
}

/// The outcome for the file section at `index` of the raw diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub index: usize,
    pub result: Result<ProcessedFile, DiffError>,
}

/// Parses `raw` and processes every file section.
///
/// The raw diff's declared encoding applies when the options name none.
pub fn process_diff<P>(
    raw: &RawDiffFile,
    originals: &P,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Vec<FileOutcome>
where
    P: OriginalProvider + ?Sized,
{
    let mut options = options.clone();
    if options.normalize.encoding.is_none() {
        options.normalize.encoding = raw.encoding.clone();
    }

    let parsed = parse(raw, None);
    let outcomes: Vec<FileOutcome> = parsed
        .files
        .into_par_iter()
        .enumerate()
        .map(|(index, section)| FileOutcome {
            index,
            result: section
                .map_err(DiffError::from)
                .and_then(|patch| process_patch(&patch, originals, &options, cancel)),
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    debug!(files = outcomes.len(), failed, "processed diff");
    outcomes
}

/// Runs one parsed file patch through normalize, diff, moves and complexity.
pub fn process_patch<P>(
    patch: &FilePatch,
    originals: &P,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<ProcessedFile, DiffError>
where
    P: OriginalProvider + ?Sized,
{
    cancel.check()?;
    let patch = normalize(patch, &options.normalize)?;

    if patch.is_binary {
        debug!(path = %patch.display_path(), "passing binary patch through");
        return Ok(ProcessedFile {
            patch,
            diff: None,
            complexity: None,
        });
    }

    let original = match originals.original(&patch.source_path) {
        Some(content) => content,
        None if patch.change == FileChange::Added => "",
        None if patch.hunks.is_empty() => {
            return Ok(ProcessedFile {
                patch,
                diff: None,
                complexity: None,
            });
        }
        None => {
            warn!(path = %patch.source_path, "no original content for patched file");
            return Err(DiffError::MissingOriginal {
                path: patch.source_path.clone(),
            });
        }
    };

    let result = diff_content(original, &patch, options, cancel)?;
    let result = detect_moves(result, &options.moves, cancel)?;
    let complexity = classify_result(&result, &options.complexity);

    Ok(ProcessedFile {
        patch,
        diff: Some(result),
        complexity: Some(complexity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::ComplexityBucket;
    use crate::differ::ChunkTag;
    use crate::error::{ParseError, ValidationError, Warning};

    const MULTI: &str = "diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 fn a() {}
-fn b() {}
+fn b() -> u8 { 0 }
 fn c() {}
diff --git a/broken.rs b/broken.rs
--- a/broken.rs
+++ b/broken.rs
@@ -1,two +1 @@
-x
+y
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,2 @@
+fn new() {}
+fn newer() {}
diff --git a/logo.png b/logo.png
Binary files a/logo.png and b/logo.png differ
diff --git a/missing.rs b/missing.rs
--- a/missing.rs
+++ b/missing.rs
@@ -1 +1 @@
-old
+new
";

    fn originals() -> HashMap<String, String> {
        HashMap::from([(
            "src/lib.rs".to_string(),
            "fn a() {}\nfn b() {}\nfn c() {}\n".to_string(),
        )])
    }

    fn run(input: &str) -> Vec<FileOutcome> {
        process_diff(
            &RawDiffFile::new(input),
            &originals(),
            &DiffOptions::default(),
            &CancellationToken::new(),
        )
    }

    #[test]
    fn every_section_gets_its_own_outcome() {
        let outcomes = run(MULTI);
        assert_eq!(outcomes.len(), 5);
        assert_eq!(
            outcomes.iter().map(|o| o.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );

        let lib = outcomes[0].result.as_ref().unwrap();
        let diff = lib.diff.as_ref().unwrap();
        assert_eq!(
            diff.chunks.iter().map(|c| c.tag).collect::<Vec<_>>(),
            vec![ChunkTag::Equal, ChunkTag::Replace, ChunkTag::Equal]
        );
        assert_eq!(lib.complexity.unwrap().bucket, ComplexityBucket::Minimum);

        assert!(matches!(
            outcomes[1].result,
            Err(DiffError::Parse(ParseError::MalformedHunkHeader { file_index: 1, .. }))
        ));

        let new = outcomes[2].result.as_ref().unwrap();
        assert_eq!(new.complexity.unwrap().bucket, ComplexityBucket::NewFile);

        let binary = outcomes[3].result.as_ref().unwrap();
        assert!(binary.patch.is_binary);
        assert!(binary.diff.is_none());

        assert_eq!(
            outcomes[4].result,
            Err(DiffError::MissingOriginal {
                path: "missing.rs".into()
            })
        );
    }

    #[test]
    fn empty_diff_has_no_outcomes() {
        assert!(run("").is_empty());
    }

    #[test]
    fn count_mismatch_fails_only_that_file() {
        let outcomes = run("diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,5 +1,0 @@
-fn a() {}
-fn b() {}
-fn c() {}
-fn d() {}
diff --git a/new.rs b/new.rs
--- /dev/null
+++ b/new.rs
@@ -0,0 +1 @@
+x
");
        assert_eq!(
            outcomes[0].result,
            Err(DiffError::Validation(
                ValidationError::HunkLineCountMismatch {
                    hunk_index: 0,
                    side: crate::error::HunkSide::Source,
                    expected: 5,
                    actual: 4,
                }
            ))
        );
        assert!(outcomes[1].result.is_ok());
    }

    #[test]
    fn cancellation_is_per_file() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = process_diff(
            &RawDiffFile::new(MULTI),
            &originals(),
            &DiffOptions::default(),
            &cancel,
        );
        assert_eq!(outcomes[0].result, Err(DiffError::Cancelled));
        // Parse failures are reported as such even after cancellation.
        assert!(matches!(outcomes[1].result, Err(DiffError::Parse(_))));
    }

    #[test]
    fn declared_encoding_is_applied() {
        let mut bytes = b"--- a/f.txt\n+++ b/f.txt\n@@ -1 +1 @@\n-caf".to_vec();
        bytes.extend_from_slice(b"\xe9\n+cafe\n");
        let raw = RawDiffFile::new(bytes).with_encoding("latin1");
        let originals = BTreeMap::from([("f.txt".to_string(), "caf\u{e9}\n".to_string())]);

        let outcomes = process_diff(
            &raw,
            &originals,
            &DiffOptions::default(),
            &CancellationToken::new(),
        );
        let file = outcomes[0].result.as_ref().unwrap();
        assert!(file.patch.warnings.is_empty());
        assert_eq!(file.diff.as_ref().unwrap().new_lines, vec!["cafe"]);
    }

    #[test]
    fn invalid_bytes_degrade_with_warning() {
        let mut bytes = b"--- /dev/null\n+++ b/f.txt\n@@ -0,0 +1 @@\n+".to_vec();
        bytes.extend_from_slice(b"\xff\n");
        let outcomes = process_diff(
            &RawDiffFile::new(bytes),
            &HashMap::<String, String>::new(),
            &DiffOptions::default(),
            &CancellationToken::new(),
        );
        let file = outcomes[0].result.as_ref().unwrap();
        assert!(matches!(
            file.patch.warnings[..],
            [Warning::LossyDecode { lines: 1, .. }]
        ));
        assert!(file.diff.is_some());
    }

    #[test]
    fn carriage_returns_kept_on_both_sides() {
        let raw = RawDiffFile::new("--- a/f.txt\r\n+++ b/f.txt\r\n@@ -1,2 +1,2 @@\r\n a\r\n-b\r\n+B\r\n");
        let originals = HashMap::from([("f.txt".to_string(), "a\r\nb\r\n".to_string())]);
        let mut options = DiffOptions::default();
        options.normalize.strip_carriage_returns = false;

        let outcomes = process_diff(&raw, &originals, &options, &CancellationToken::new());
        let file = outcomes[0].result.as_ref().unwrap();
        let diff = file.diff.as_ref().unwrap();
        assert_eq!(diff.old_lines, vec!["a\r", "b\r"]);
        assert_eq!(diff.new_lines, vec!["a\r", "B\r"]);
    }

    #[test]
    fn carriage_returns_stripped_by_default() {
        let raw = RawDiffFile::new("--- a/f.txt\r\n+++ b/f.txt\r\n@@ -1,2 +1,2 @@\r\n a\r\n-b\r\n+B\r\n");
        let originals = HashMap::from([("f.txt".to_string(), "a\r\nb\r\n".to_string())]);
        let outcomes = process_diff(
            &raw,
            &originals,
            &DiffOptions::default(),
            &CancellationToken::new(),
        );
        let diff = outcomes[0].result.as_ref().unwrap().diff.as_ref().unwrap();
        assert_eq!(diff.new_lines, vec!["a", "B"]);
    }

    #[test]
    fn rename_without_original_has_no_diff() {
        let outcomes = run("diff --git a/a.rs b/b.rs
similarity index 100%
rename from a.rs
rename to b.rs
");
        let file = outcomes[0].result.as_ref().unwrap();
        assert_eq!(file.patch.change, FileChange::Renamed);
        assert!(file.diff.is_none());
        assert!(file.display().is_none());
    }

    #[test]
    fn display_rows_for_processed_file() {
        let outcomes = run(MULTI);
        let display = outcomes[0].result.as_ref().unwrap().display().unwrap();
        assert_eq!(display.path, "src/lib.rs");
        assert_eq!(display.rows.len(), 3);
        assert_eq!(display.hunk_starts, vec![1]);
    }

    #[test]
    fn processing_is_deterministic() {
        let first = serde_json::to_string(&run(MULTI)).unwrap();
        let second = serde_json::to_string(&run(MULTI)).unwrap();
        assert_eq!(first, second);
    }
}
