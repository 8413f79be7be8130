//! Pairing deleted blocks with near-identical inserted blocks.
//!
//! Candidate blocks are the old side of delete and replace chunks, and the
//! new side of insert and replace chunks. Lines are compared with all
//! whitespace removed. The similarity of two blocks is one minus their
//! line-level edit distance divided by the longer block's length, and a pair
//! is a move when it exceeds `min_similarity` (identical blocks always are).
//!
//! Delete blocks are matched in order. Each takes the unpaired insert block
//! with the highest similarity, then the one nearest in the original file,
//! then the earliest. Only blocks sharing lines are ever compared: an
//! inverted index over line hashes yields the candidates, and the shared
//! line count bounds the edit distance before any diff runs.
//!
//! Matched delete and insert chunks keep their tags and gain a [`MoveInfo`].
//! A replace chunk with a matched side is split into a delete chunk and an
//! insert chunk first, so each half carries its own annotation.

use crate::cancel::CancellationToken;
use crate::config::MoveOptions;
use crate::differ::{Chunk, ChunkTag, DiffResult, MoveInfo};
use crate::error::DiffError;
use similar::{Algorithm, DiffTag};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::ops::Range;
use tracing::debug;

/// One side of a chunk, prepared for comparison.
struct Block {
    chunk: usize,
    /// Shared by the two halves of a replaced region; such halves never pair.
    region: usize,
    /// Lines on the block's own side.
    range: Range<usize>,
    /// Position in the original file, for the nearest-candidate tie-break.
    anchor: usize,
    lines: Vec<String>,
    /// Distinct line hashes with their multiplicities, sorted by hash.
    line_counts: Vec<(u64, usize)>,
}

impl Block {
    fn new(
        chunk: usize,
        region: usize,
        range: Range<usize>,
        anchor: usize,
        lines: &[String],
    ) -> Option<Self> {
        let lines: Vec<String> = lines.iter().map(|l| normalize_line(l)).collect();
        if lines.iter().all(String::is_empty) {
            return None;
        }

        let mut hashes: Vec<u64> = lines.iter().map(|l| line_hash(l)).collect();
        hashes.sort_unstable();
        let mut line_counts: Vec<(u64, usize)> = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match line_counts.last_mut() {
                Some((last, count)) if *last == hash => *count += 1,
                _ => line_counts.push((hash, 1)),
            }
        }

        Some(Self {
            chunk,
            region,
            range,
            anchor,
            lines,
            line_counts,
        })
    }
}

#[inline]
fn normalize_line(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

#[inline]
fn line_hash(line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}

/// Annotates move pairs in `result`. Earlier annotations are discarded.
pub fn detect_moves(
    mut result: DiffResult,
    options: &MoveOptions,
    cancel: &CancellationToken,
) -> Result<DiffResult, DiffError> {
    for chunk in &mut result.chunks {
        chunk.moved = None;
    }
    if !options.enabled {
        return Ok(result);
    }
    cancel.check()?;

    let regions = replaced_regions(&result.chunks);
    let min_lines = options.min_block_lines.max(1);
    let mut deletes = Vec::new();
    let mut inserts = Vec::new();
    for (index, chunk) in result.chunks.iter().enumerate() {
        if matches!(chunk.tag, ChunkTag::Delete | ChunkTag::Replace) && chunk.old.len() >= min_lines
        {
            let lines = result.old_side(chunk);
            let region = regions[index];
            deletes.extend(Block::new(index, region, chunk.old.clone(), chunk.old.start, lines));
        }
        if matches!(chunk.tag, ChunkTag::Insert | ChunkTag::Replace) && chunk.new.len() >= min_lines
        {
            // `old.end` is where the lines land, and survives splitting a replace.
            let lines = result.new_side(chunk);
            let region = regions[index];
            inserts.extend(Block::new(index, region, chunk.new.clone(), chunk.old.end, lines));
        }
    }

    // Line hash -> (insert position, occurrences).
    let mut by_line: HashMap<u64, Vec<(usize, usize)>> = HashMap::new();
    for (pos, ins) in inserts.iter().enumerate() {
        for &(hash, count) in &ins.line_counts {
            by_line.entry(hash).or_default().push((pos, count));
        }
    }

    let mut paired = vec![false; inserts.len()];
    let mut old_moves: HashMap<usize, MoveInfo> = HashMap::new();
    let mut new_moves: HashMap<usize, MoveInfo> = HashMap::new();
    let mut next_group = 0u32;

    for del in &deletes {
        cancel.check()?;

        // Insert position -> lines shared with `del`, counted as a multiset.
        let mut shared: BTreeMap<usize, usize> = BTreeMap::new();
        for (hash, count) in &del.line_counts {
            for &(pos, ins_count) in by_line.get(hash).into_iter().flatten() {
                if !paired[pos] && inserts[pos].region != del.region {
                    *shared.entry(pos).or_default() += (*count).min(ins_count);
                }
            }
        }

        // (similarity, distance from `del`, insert position)
        let mut best: Option<(f64, usize, usize)> = None;
        for (pos, common) in shared {
            let ins = &inserts[pos];
            let longest = del.lines.len().max(ins.lines.len());
            if !accepts(longest - common, longest, options.min_similarity) {
                continue;
            }
            let distance = edit_distance(&del.lines, &ins.lines, cancel);
            if !accepts(distance, longest, options.min_similarity) {
                continue;
            }

            let similarity = 1.0 - distance as f64 / longest as f64;
            let gap = del.anchor.abs_diff(ins.anchor);
            let better = match best {
                None => true,
                Some((best_sim, best_gap, best_pos)) => {
                    similarity > best_sim
                        || (similarity == best_sim
                            && (gap < best_gap || (gap == best_gap && pos < best_pos)))
                }
            };
            if better {
                best = Some((similarity, gap, pos));
            }
        }

        let Some((similarity, _, pos)) = best else {
            continue;
        };
        paired[pos] = true;

        let group = next_group;
        next_group += 1;
        let ins = &inserts[pos];

        debug!(
            group,
            similarity,
            old = ?del.range,
            new = ?ins.range,
            "detected moved block"
        );

        old_moves.insert(
            del.chunk,
            MoveInfo {
                group,
                counterpart: ins.range.clone(),
            },
        );
        new_moves.insert(
            ins.chunk,
            MoveInfo {
                group,
                counterpart: del.range.clone(),
            },
        );
    }

    let chunks = std::mem::take(&mut result.chunks);
    result.chunks = Vec::with_capacity(chunks.len() + old_moves.len());
    for (index, mut chunk) in chunks.into_iter().enumerate() {
        let old_move = old_moves.remove(&index);
        let new_move = new_moves.remove(&index);
        if chunk.tag == ChunkTag::Replace && (old_move.is_some() || new_move.is_some()) {
            let (delete, insert) = split_replace(chunk);
            result.chunks.push(Chunk {
                moved: old_move,
                ..delete
            });
            result.chunks.push(Chunk {
                moved: new_move,
                ..insert
            });
        } else {
            chunk.moved = old_move.or(new_move);
            result.chunks.push(chunk);
        }
    }

    Ok(result)
}

/// Region id per chunk: its own index, or its predecessor's when it is the
/// insert half of a delete/insert pair covering one replaced region.
fn replaced_regions(chunks: &[Chunk]) -> Vec<usize> {
    let mut regions: Vec<usize> = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let region = match index.checked_sub(1).map(|prev| (prev, &chunks[prev])) {
            Some((prev, before))
                if chunk.tag == ChunkTag::Insert
                    && before.tag == ChunkTag::Delete
                    && before.old.end == chunk.old.start
                    && before.new.end == chunk.new.start =>
            {
                regions[prev]
            }
            _ => index,
        };
        regions.push(region);
    }
    regions
}

/// Whether an edit distance is small enough for a move. Identical blocks
/// always qualify; otherwise the distance must stay strictly under the
/// allowed share of the longer block.
#[inline]
fn accepts(distance: usize, longest: usize, min_similarity: f64) -> bool {
    distance == 0 || (distance as f64) < (1.0 - min_similarity) * longest as f64
}

/// Line-level edit distance; a replaced run costs its longer side.
fn edit_distance(a: &[String], b: &[String], cancel: &CancellationToken) -> usize {
    if a == b {
        return 0;
    }
    similar::capture_diff_slices_deadline(Algorithm::Myers, a, b, cancel.deadline())
        .iter()
        .map(|op| {
            let (tag, old, new) = op.as_tag_tuple();
            if tag == DiffTag::Equal {
                0
            } else {
                old.len().max(new.len())
            }
        })
        .sum()
}

/// Splits a replace chunk into a delete chunk followed by an insert chunk.
fn split_replace(chunk: Chunk) -> (Chunk, Chunk) {
    let delete = Chunk {
        tag: ChunkTag::Delete,
        old: chunk.old.clone(),
        new: chunk.new.start..chunk.new.start,
        highlights: Vec::new(),
        moved: None,
    };
    let insert = Chunk {
        tag: ChunkTag::Insert,
        old: chunk.old.end..chunk.old.end,
        new: chunk.new,
        highlights: Vec::new(),
        moved: None,
    };
    (delete, insert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffOptions;
    use crate::differ::diff_lines;
    use std::time::Instant;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn filler(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("filler line {i}")).collect()
    }

    fn block() -> Vec<String> {
        lines(&[
            "fn helper(a: u32) -> u32 {",
            "    let b = a * 2;",
            "    let c = b + 1;",
            "    c * c",
            "}",
        ])
    }

    fn aligned(old: Vec<String>, new: Vec<String>) -> DiffResult {
        diff_lines(
            old,
            new,
            &DiffOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    }

    fn detect(result: DiffResult, options: &MoveOptions) -> DiffResult {
        detect_moves(result, options, &CancellationToken::new()).unwrap()
    }

    fn moved(old: Vec<String>, new: Vec<String>) -> DiffResult {
        detect(aligned(old, new), &MoveOptions::default())
    }

    fn move_chunks(result: &DiffResult) -> Vec<(ChunkTag, u32)> {
        result
            .chunks
            .iter()
            .filter_map(|c| c.moved.as_ref().map(|m| (c.tag, m.group)))
            .collect()
    }

    #[test]
    fn verbatim_block_is_a_move() {
        let old = [block(), filler(8)].concat();
        let new = [filler(8), block()].concat();
        let result = moved(old, new);

        assert_eq!(
            move_chunks(&result),
            vec![(ChunkTag::Delete, 0), (ChunkTag::Insert, 0)]
        );
        let delete = &result.chunks[0];
        assert_eq!(delete.moved.as_ref().unwrap().counterpart, 8..13);
        let insert = result.chunks.last().unwrap();
        assert_eq!(insert.moved.as_ref().unwrap().counterpart, 0..5);
    }

    #[test]
    fn block_moved_out_of_replaced_slot() {
        let replacement: Vec<String> = (0..5).map(|i| format!("replacement {i}")).collect();
        let old = [block(), filler(8)].concat();
        let new = [replacement, filler(8), block()].concat();

        let before = aligned(old.clone(), new.clone());
        assert_eq!(before.chunks[0].tag, ChunkTag::Replace);

        let result = detect(before, &MoveOptions::default());
        assert_eq!(
            result.chunks.iter().map(|c| c.tag).collect::<Vec<_>>(),
            vec![
                ChunkTag::Delete,
                ChunkTag::Insert,
                ChunkTag::Equal,
                ChunkTag::Insert
            ]
        );
        assert_eq!(
            move_chunks(&result),
            vec![(ChunkTag::Delete, 0), (ChunkTag::Insert, 0)]
        );
        assert_eq!(result.chunks[0].moved.as_ref().unwrap().counterpart, 13..18);
        assert_eq!(result.chunks[3].moved.as_ref().unwrap().counterpart, 0..5);
        assert_eq!(result.reconstruct_old(), old);
        assert_eq!(result.reconstruct_new(), new);
    }

    #[test]
    fn block_moved_into_replaced_slot() {
        let displaced: Vec<String> = (0..5).map(|i| format!("displaced {i}")).collect();
        let old = [block(), filler(8), displaced].concat();
        let new = [filler(8), block()].concat();
        let result = moved(old.clone(), new.clone());

        assert_eq!(
            result.chunks.iter().map(|c| c.tag).collect::<Vec<_>>(),
            vec![
                ChunkTag::Delete,
                ChunkTag::Equal,
                ChunkTag::Delete,
                ChunkTag::Insert
            ]
        );
        assert_eq!(
            move_chunks(&result),
            vec![(ChunkTag::Delete, 0), (ChunkTag::Insert, 0)]
        );
        assert!(result.chunks[2].moved.is_none());
        assert_eq!(result.reconstruct_old(), old);
        assert_eq!(result.reconstruct_new(), new);
    }

    #[test]
    fn reindented_replace_is_not_its_own_move() {
        let reindented: Vec<String> = block().iter().map(|l| format!("    {l}")).collect();
        let old = [block(), filler(8)].concat();
        let new = [reindented, filler(8)].concat();
        let result = moved(old, new);
        assert_eq!(result.chunks[0].tag, ChunkTag::Replace);
        assert!(move_chunks(&result).is_empty());
    }

    #[test]
    fn lengthened_rewrite_is_not_its_own_move() {
        let mut rewritten: Vec<String> = block().iter().map(|l| format!("  {l}")).collect();
        rewritten.push("// helper".into());
        let old = [block(), filler(8)].concat();
        let new = [rewritten, filler(8)].concat();
        let loose = MoveOptions {
            min_similarity: 0.75,
            ..MoveOptions::default()
        };
        let result = detect(aligned(old, new), &loose);
        assert_eq!(result.chunks[0].tag, ChunkTag::Delete);
        assert_eq!(result.chunks[1].tag, ChunkTag::Insert);
        assert!(move_chunks(&result).is_empty());
    }

    #[test]
    fn whitespace_changes_still_match() {
        let reindented: Vec<String> = block()
            .iter()
            .map(|l| format!("\t{}  ", l.replace(' ', "  ")))
            .collect();
        let old = [block(), filler(8)].concat();
        let new = [filler(8), reindented].concat();
        let result = moved(old, new);
        assert_eq!(move_chunks(&result).len(), 2);
    }

    #[test]
    fn one_changed_line_in_five_is_not_a_move() {
        let mut edited = block();
        edited[2] = "    let c = b - 1;".into();
        let old = [block(), filler(8)].concat();
        let new = [filler(8), edited].concat();
        let result = moved(old, new);
        assert!(move_chunks(&result).is_empty());
    }

    #[test]
    fn lower_threshold_accepts_edited_block() {
        let mut edited = block();
        edited[2] = "    let c = b - 1;".into();
        let old = [block(), filler(8)].concat();
        let new = [filler(8), edited].concat();
        let loose = MoveOptions {
            min_similarity: 0.75,
            ..MoveOptions::default()
        };
        let result = detect(aligned(old, new), &loose);
        assert_eq!(move_chunks(&result).len(), 2);
    }

    #[test]
    fn threshold_is_exclusive() {
        let long: Vec<String> = (0..10).map(|i| format!("let v{i} = compute({i});")).collect();
        let mut edited = long.clone();
        edited[4] = "let v4 = other(4);".into();
        let old = [long, filler(20)].concat();
        let new = [filler(20), edited].concat();

        // Exactly 10% of the lines differ.
        let at_bound = moved(old.clone(), new.clone());
        assert!(move_chunks(&at_bound).is_empty());

        let looser = MoveOptions {
            min_similarity: 0.85,
            ..MoveOptions::default()
        };
        let result = detect(aligned(old, new), &looser);
        assert_eq!(move_chunks(&result).len(), 2);
    }

    #[test]
    fn nearest_candidate_wins_ties() {
        let block = lines(&["m1", "m2", "m3"]);
        let fill = filler(10);
        let old = [block.clone(), fill.clone()].concat();
        let new = [
            fill[..5].to_vec(),
            block.clone(),
            fill[5..].to_vec(),
            block.clone(),
        ]
        .concat();
        let result = moved(old, new);

        let inserts: Vec<_> = result
            .chunks
            .iter()
            .filter(|c| c.tag == ChunkTag::Insert)
            .collect();
        assert_eq!(inserts.len(), 2);
        assert_eq!(inserts[0].moved.as_ref().map(|m| m.group), Some(0));
        assert!(inserts[1].moved.is_none());
    }

    #[test]
    fn blank_blocks_are_ignored() {
        let old = [lines(&["", ""]), filler(6)].concat();
        let new = [filler(6), lines(&["", ""])].concat();
        let result = moved(old, new);
        assert!(move_chunks(&result).is_empty());
    }

    #[test]
    fn disabled_detection_clears_annotations() {
        let old = [block(), filler(8)].concat();
        let new = [filler(8), block()].concat();
        let detected = moved(old, new);
        let off = MoveOptions {
            enabled: false,
            ..MoveOptions::default()
        };
        let cleared = detect(detected, &off);
        assert!(move_chunks(&cleared).is_empty());
    }

    #[test]
    fn moves_do_not_change_content() {
        let old = [block(), filler(8)].concat();
        let new = [filler(8), block()].concat();
        let result = moved(old.clone(), new.clone());
        assert_eq!(result.reconstruct_old(), old);
        assert_eq!(result.reconstruct_new(), new);
    }

    #[test]
    fn detection_is_repeatable() {
        let replacement: Vec<String> = (0..5).map(|i| format!("replacement {i}")).collect();
        let old = [block(), filler(8), block()].concat();
        let new = [replacement, filler(4), block(), filler(4)].concat();
        let once = moved(old, new);
        let twice = detect(once.clone(), &MoveOptions::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn cancelled_token_stops_detection() {
        let old = [block(), filler(8)].concat();
        let new = [filler(8), block()].concat();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = detect_moves(aligned(old, new), &MoveOptions::default(), &cancel).unwrap_err();
        assert_eq!(err, DiffError::Cancelled);
    }

    #[test]
    fn many_unrelated_blocks_stay_cheap() {
        let old_lines: Vec<String> = (0..2000 * 11).map(|i| format!("old {i}")).collect();
        let new_lines: Vec<String> = (0..2000 * 10).map(|i| format!("new {i}")).collect();
        let mut chunks = Vec::new();
        for k in 0..2000 {
            chunks.push(Chunk {
                tag: ChunkTag::Delete,
                old: k * 11..(k + 1) * 11,
                new: k * 10..k * 10,
                highlights: Vec::new(),
                moved: None,
            });
            chunks.push(Chunk {
                tag: ChunkTag::Insert,
                old: (k + 1) * 11..(k + 1) * 11,
                new: k * 10..(k + 1) * 10,
                highlights: Vec::new(),
                moved: None,
            });
        }
        let result = DiffResult {
            original_digest: String::new(),
            old_lines,
            new_lines,
            chunks,
        };

        let started = Instant::now();
        let result = detect(result, &MoveOptions::default());
        assert!(move_chunks(&result).is_empty());
        assert!(started.elapsed().as_secs() < 5);
    }
}
