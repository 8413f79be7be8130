//! Diffs between two diffs of the same original file.
//!
//! Both inputs are [`DiffResult`]s computed against one original. Their
//! patched versions are aligned with the same line differ, and every chunk
//! is tagged with where its content came from. Swapping the inputs mirrors
//! the result exactly: the pair is always aligned in one canonical order and
//! flipped afterwards when needed.

use crate::cancel::CancellationToken;
use crate::config::DiffOptions;
use crate::differ::{self, ChunkTag, DiffResult, LineHighlights};
use crate::error::DiffError;
use crate::patch::FilePatch;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Where an interdiff chunk's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Only the older patch has this content.
    OnlyInOld,
    /// Only the newer patch has this content.
    OnlyInNew,
    InBothUnchanged,
    /// Both patches changed this region of the original, differently.
    InBothChanged,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnlyInOld => "only_in_old",
            Self::OnlyInNew => "only_in_new",
            Self::InBothUnchanged => "in_both_unchanged",
            Self::InBothChanged => "in_both_changed",
        }
    }

    /// The provenance seen with the two patches swapped.
    pub fn mirrored(self) -> Self {
        match self {
            Self::OnlyInOld => Self::OnlyInNew,
            Self::OnlyInNew => Self::OnlyInOld,
            other => other,
        }
    }
}

/// A chunk of the alignment between the two patched files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterdiffChunk {
    pub tag: ChunkTag,
    /// Lines of the older patch's result.
    pub old: Range<usize>,
    /// Lines of the newer patch's result.
    pub new: Range<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<LineHighlights>,
    pub provenance: Provenance,
}

impl InterdiffChunk {
    fn mirrored(self) -> Self {
        let tag = match self.tag {
            ChunkTag::Insert => ChunkTag::Delete,
            ChunkTag::Delete => ChunkTag::Insert,
            other => other,
        };
        Self {
            tag,
            old: self.new,
            new: self.old,
            highlights: self
                .highlights
                .into_iter()
                .map(|h| LineHighlights {
                    old: h.new,
                    new: h.old,
                })
                .collect(),
            provenance: self.provenance.mirrored(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterdiffResult {
    pub original_digest: String,
    /// The older patch applied to the original.
    pub old_lines: Vec<String>,
    /// The newer patch applied to the original.
    pub new_lines: Vec<String>,
    pub chunks: Vec<InterdiffChunk>,
}

impl InterdiffResult {
    /// The result of interdiffing the same pair in the opposite order.
    #[must_use]
    pub fn mirrored(self) -> Self {
        Self {
            original_digest: self.original_digest,
            old_lines: self.new_lines,
            new_lines: self.old_lines,
            chunks: self
                .chunks
                .into_iter()
                .map(InterdiffChunk::mirrored)
                .collect(),
        }
    }

    pub fn reconstruct_old(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .flat_map(|c| &self.old_lines[c.old.clone()])
            .map(String::as_str)
            .collect()
    }

    pub fn reconstruct_new(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .flat_map(|c| &self.new_lines[c.new.clone()])
            .map(String::as_str)
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        self.chunks
            .iter()
            .any(|c| c.provenance != Provenance::InBothUnchanged)
    }
}

/// Compares the patched files of two results that share an original.
pub fn interdiff(
    old: &DiffResult,
    new: &DiffResult,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<InterdiffResult, DiffError> {
    if old.original_digest != new.original_digest {
        return Err(DiffError::IncompatibleOriginals {
            old: old.original_digest.clone(),
            new: new.original_digest.clone(),
        });
    }
    cancel.check()?;

    let swapped = old.new_lines > new.new_lines;
    let (first, second) = if swapped { (new, old) } else { (old, new) };

    let first_changed = changed_lines(first);
    let second_changed = changed_lines(second);
    let touched = |old: &Range<usize>, new: &Range<usize>| {
        region_provenance(
            first_changed[old.clone()].iter().any(|c| *c),
            second_changed[new.clone()].iter().any(|c| *c),
        )
    };

    let aligned = differ::align(&first.new_lines, &second.new_lines, options, cancel)?;
    let mut provenances = Vec::with_capacity(aligned.len());
    let mut i = 0;
    while i < aligned.len() {
        let chunk = &aligned[i];
        match (chunk.tag, aligned.get(i + 1)) {
            // A replacement of unequal length, split by the differ.
            (ChunkTag::Delete, Some(next))
                if next.tag == ChunkTag::Insert && next.old.start == chunk.old.end =>
            {
                let provenance = touched(&chunk.old, &next.new);
                provenances.extend([provenance, provenance]);
                i += 2;
                continue;
            }
            (ChunkTag::Equal, _) => provenances.push(Provenance::InBothUnchanged),
            (ChunkTag::Delete, _) => provenances.push(Provenance::OnlyInOld),
            (ChunkTag::Insert, _) => provenances.push(Provenance::OnlyInNew),
            (ChunkTag::Replace, _) => provenances.push(touched(&chunk.old, &chunk.new)),
        }
        i += 1;
    }

    let chunks: Vec<InterdiffChunk> = aligned
        .into_iter()
        .zip(provenances)
        .map(|(chunk, provenance)| InterdiffChunk {
            tag: chunk.tag,
            old: chunk.old,
            new: chunk.new,
            highlights: chunk.highlights,
            provenance,
        })
        .collect();

    let result = InterdiffResult {
        original_digest: old.original_digest.clone(),
        old_lines: first.new_lines.clone(),
        new_lines: second.new_lines.clone(),
        chunks,
    };

    debug!(
        chunks = result.chunks.len(),
        swapped, "computed interdiff"
    );

    Ok(if swapped { result.mirrored() } else { result })
}

/// Diffs two revisions of a patch against one original, then interdiffs them.
pub fn interdiff_patches(
    original: &[String],
    old: &FilePatch,
    new: &FilePatch,
    options: &DiffOptions,
    cancel: &CancellationToken,
) -> Result<InterdiffResult, DiffError> {
    let old_result = differ::diff(original, old, options, cancel)?;
    let new_result = differ::diff(original, new, options, cancel)?;
    interdiff(&old_result, &new_result, options, cancel)
}

/// Attributes a region both revisions replaced to whichever one changed it
/// relative to the original.
fn region_provenance(first_touched: bool, second_touched: bool) -> Provenance {
    match (first_touched, second_touched) {
        (true, false) => Provenance::OnlyInOld,
        (false, true) => Provenance::OnlyInNew,
        _ => Provenance::InBothChanged,
    }
}

/// Marks the lines of a result's patched file that differ from the original.
fn changed_lines(result: &DiffResult) -> Vec<bool> {
    let mut changed = vec![false; result.new_lines.len()];
    for chunk in &result.chunks {
        if matches!(chunk.tag, ChunkTag::Insert | ChunkTag::Replace) {
            changed[chunk.new.clone()].fill(true);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::diff_lines;
    use crate::parser::parse_bytes;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn original() -> Vec<String> {
        lines(&["one", "two", "three", "four", "five"])
    }

    fn result_for(new: &[&str]) -> DiffResult {
        diff_lines(
            original(),
            lines(new),
            &DiffOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    }

    fn run(old: &DiffResult, new: &DiffResult) -> InterdiffResult {
        interdiff(old, new, &DiffOptions::default(), &CancellationToken::new()).unwrap()
    }

    fn provenances(result: &InterdiffResult) -> Vec<(ChunkTag, Provenance)> {
        result.chunks.iter().map(|c| (c.tag, c.provenance)).collect()
    }

    #[test]
    fn different_originals_are_rejected() {
        let a = result_for(&["one"]);
        let b = diff_lines(
            lines(&["other"]),
            lines(&["one"]),
            &DiffOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        let err = interdiff(&a, &b, &DiffOptions::default(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, DiffError::IncompatibleOriginals { .. }));
    }

    #[test]
    fn identical_revisions_are_unchanged() {
        let a = result_for(&["one", "TWO", "three", "four", "five"]);
        let result = run(&a, &a.clone());
        assert!(!result.has_changes());
        assert_eq!(
            provenances(&result),
            vec![(ChunkTag::Equal, Provenance::InBothUnchanged)]
        );
    }

    #[test]
    fn provenance_of_each_region() {
        let a = result_for(&["one", "TWO", "three", "four", "five"]);
        let b = result_for(&["one", "Two", "three", "four", "FIVE"]);
        let result = run(&a, &b);
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Replace, Provenance::InBothChanged),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Replace, Provenance::OnlyInNew),
            ]
        );
    }

    #[test]
    fn change_dropped_by_newer_revision() {
        let a = result_for(&["one", "two", "THREE", "four", "five"]);
        let b = result_for(&["one", "two", "three", "four", "five", "six"]);
        let result = run(&a, &b);
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Replace, Provenance::OnlyInOld),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Insert, Provenance::OnlyInNew),
            ]
        );
    }

    #[test]
    fn swapping_inputs_mirrors_result() {
        let a = result_for(&["one", "TWO", "three", "extra", "five"]);
        let b = result_for(&["zero", "one", "Two", "three", "four", "FIVE"]);
        let forward = run(&a, &b);
        let backward = run(&b, &a);
        assert_eq!(forward, backward.clone().mirrored());
        assert_eq!(backward, forward.mirrored());
    }

    #[test]
    fn chunks_cover_both_revisions() {
        let a = result_for(&["one", "TWO", "three", "five"]);
        let b = result_for(&["one", "two", "2.5", "three", "four", "five"]);
        let result = run(&a, &b);
        assert_eq!(result.reconstruct_old(), a.new_lines);
        assert_eq!(result.reconstruct_new(), b.new_lines);
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Delete, Provenance::InBothChanged),
                (ChunkTag::Insert, Provenance::InBothChanged),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Insert, Provenance::OnlyInNew),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
            ]
        );
    }

    #[test]
    fn rewrites_of_different_length_are_in_both() {
        let original = lines(&["one", "two", "three"]);
        let revision = |new: &[&str]| {
            diff_lines(
                original.clone(),
                lines(new),
                &DiffOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap()
        };
        let a = revision(&["one", "TWO", "three"]);
        let b = revision(&["one", "Two", "2.5", "three"]);

        let result = run(&a, &b);
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Delete, Provenance::InBothChanged),
                (ChunkTag::Insert, Provenance::InBothChanged),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
            ]
        );
        assert_eq!(run(&b, &a), result.mirrored());
    }

    #[test]
    fn split_region_changed_by_one_revision() {
        let a = result_for(&["one", "two", "three", "four", "five"]);
        let b = result_for(&["one", "two a", "two b", "three", "four", "five"]);
        let result = run(&a, &b);
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Delete, Provenance::OnlyInNew),
                (ChunkTag::Insert, Provenance::OnlyInNew),
                (ChunkTag::Equal, Provenance::InBothUnchanged),
            ]
        );
    }

    #[test]
    fn interdiff_of_two_patch_revisions() {
        let parse = |input: &str| {
            parse_bytes(input.as_bytes(), None)
                .into_patches()
                .unwrap()
                .remove(0)
        };
        let rev1 = parse("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n one\n-two\n+TWO\n");
        let rev2 = parse("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n one\n-two\n+TWO\n@@ -5 +5,2 @@\n five\n+six\n");
        let result = interdiff_patches(
            &original(),
            &rev1,
            &rev2,
            &DiffOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            provenances(&result),
            vec![
                (ChunkTag::Equal, Provenance::InBothUnchanged),
                (ChunkTag::Insert, Provenance::OnlyInNew),
            ]
        );
    }
}
