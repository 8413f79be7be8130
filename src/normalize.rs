//! Canonicalizing parsed patches before they are diffed.
//!
//! Normalizing re-decodes every hunk line from its raw bytes, optionally
//! strips carriage returns, and checks that each hunk's body agrees with its
//! header and that hunks are ordered. Running it twice gives the same patch.

use crate::config::NormalizeOptions;
use crate::error::{HunkSide, ValidationError, Warning};
use crate::patch::{FilePatch, Hunk};
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, warn};

/// Returns a canonical copy of `patch`, or the first inconsistency found.
pub fn normalize(
    patch: &FilePatch,
    options: &NormalizeOptions,
) -> Result<FilePatch, ValidationError> {
    let mut out = patch.clone();
    out.warnings.clear();

    if !out.is_binary {
        decode_lines(&mut out, options);
    }
    validate(&out)?;

    debug!(
        path = %out.display_path(),
        hunks = out.hunks.len(),
        warnings = out.warnings.len(),
        "normalized file patch"
    );
    Ok(out)
}

/// Checks hunk tallies against their headers and hunk ordering.
pub fn validate(patch: &FilePatch) -> Result<(), ValidationError> {
    let mut previous_end: Option<usize> = None;

    for (hunk_index, hunk) in patch.hunks.iter().enumerate() {
        check_tally(hunk_index, HunkSide::Source, hunk.source_count, hunk.source_tally())?;
        check_tally(
            hunk_index,
            HunkSide::Destination,
            hunk.dest_count,
            hunk.dest_tally(),
        )?;

        let (first, end) = source_span(hunk);
        if previous_end.is_some_and(|prev| first < prev) {
            return Err(ValidationError::OverlappingHunks { hunk_index });
        }
        previous_end = Some(end);
    }

    Ok(())
}

fn check_tally(
    hunk_index: usize,
    side: HunkSide,
    expected: usize,
    actual: usize,
) -> Result<(), ValidationError> {
    if expected == actual {
        return Ok(());
    }
    warn!(hunk_index, %side, expected, actual, "hunk line count mismatch");
    Err(ValidationError::HunkLineCountMismatch {
        hunk_index,
        side,
        expected,
        actual,
    })
}

/// 1-based first source line touched and the line after the last one.
///
/// An empty range sits after `source_start`, so it touches nothing and
/// begins at the following line.
fn source_span(hunk: &Hunk) -> (usize, usize) {
    let first = if hunk.source_count == 0 {
        hunk.source_start + 1
    } else {
        hunk.source_start
    };
    (first, first + hunk.source_count)
}

fn decode_lines(patch: &mut FilePatch, options: &NormalizeOptions) {
    let encoding = match options.encoding.as_deref() {
        None => UTF_8,
        Some(label) => match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => encoding,
            None => {
                warn!(label, "unknown encoding label");
                patch.warnings.push(Warning::UnknownEncoding {
                    label: label.to_string(),
                });
                UTF_8
            }
        },
    };

    let mut lossy_lines = 0;
    for line in patch.hunks.iter_mut().flat_map(|h| h.lines.iter_mut()) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&line.raw);
        if had_errors {
            lossy_lines += 1;
        }
        let mut text = text.into_owned();
        if options.strip_carriage_returns && text.ends_with('\r') {
            text.pop();
        }
        line.text = text;
    }

    if lossy_lines > 0 {
        warn!(
            encoding = encoding.name(),
            lines = lossy_lines,
            "lines decoded lossily"
        );
        patch.warnings.push(Warning::LossyDecode {
            encoding: encoding.name().to_string(),
            lines: lossy_lines,
        });
    }
}
