//! Bucketing a file's change magnitude for summary icons.

use crate::config::ComplexityThresholds;
use crate::differ::DiffResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    NewFile,
    DeletedFile,
    Minimum,
    Low,
    Medium,
    High,
    /// A large file with a proportionally tiny change.
    Donut,
}

impl ComplexityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFile => "new_file",
            Self::DeletedFile => "deleted_file",
            Self::Minimum => "minimum",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Donut => "donut",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub inserts: usize,
    pub deletes: usize,
    pub replaces: usize,
    pub total_lines: usize,
    pub bucket: ComplexityBucket,
}

/// Shares of the changed lines, for drawing the donut chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChangeRatios {
    pub inserts: f64,
    pub deletes: f64,
    pub replaces: f64,
}

impl ComplexityScore {
    pub fn changed_lines(&self) -> usize {
        self.inserts
            .saturating_add(self.deletes)
            .saturating_add(self.replaces)
    }

    /// Changed lines over total lines, capped at 1.
    pub fn change_ratio(&self) -> f64 {
        if self.total_lines == 0 {
            return if self.changed_lines() == 0 { 0.0 } else { 1.0 };
        }
        (self.changed_lines() as f64 / self.total_lines as f64).min(1.0)
    }

    pub fn ratios(&self) -> ChangeRatios {
        let changed = self.changed_lines();
        if changed == 0 {
            return ChangeRatios {
                inserts: 0.0,
                deletes: 0.0,
                replaces: 0.0,
            };
        }
        let share = |n: usize| n as f64 / changed as f64;
        ChangeRatios {
            inserts: share(self.inserts),
            deletes: share(self.deletes),
            replaces: share(self.replaces),
        }
    }
}

/// Buckets a change. Total over all inputs.
///
/// Rules, first match wins:
/// 1. only inserts, covering the whole file: new file
/// 2. only deletes, covering the whole file: deleted file
/// 3. nothing changed: minimum
/// 4. at least `donut_min_total_lines` lines with at most
///    `donut_max_change_ratio` of them changed: donut
/// 5. otherwise by changed-line count against `low`, `medium` and `high`
pub fn classify(
    inserts: usize,
    deletes: usize,
    replaces: usize,
    total_lines: usize,
    thresholds: &ComplexityThresholds,
) -> ComplexityScore {
    let changed = inserts.saturating_add(deletes).saturating_add(replaces);

    let bucket = if inserts > 0 && deletes == 0 && replaces == 0 && inserts >= total_lines {
        ComplexityBucket::NewFile
    } else if deletes > 0 && inserts == 0 && replaces == 0 && deletes >= total_lines {
        ComplexityBucket::DeletedFile
    } else if changed == 0 {
        ComplexityBucket::Minimum
    } else if total_lines >= thresholds.donut_min_total_lines
        && changed as f64 <= total_lines as f64 * thresholds.donut_max_change_ratio
    {
        ComplexityBucket::Donut
    } else if changed < thresholds.low {
        ComplexityBucket::Minimum
    } else if changed < thresholds.medium {
        ComplexityBucket::Low
    } else if changed < thresholds.high {
        ComplexityBucket::Medium
    } else {
        ComplexityBucket::High
    };

    ComplexityScore {
        inserts,
        deletes,
        replaces,
        total_lines,
        bucket,
    }
}

/// Classifies a diff result; the total is the longer of the two files.
pub fn classify_result(result: &DiffResult, thresholds: &ComplexityThresholds) -> ComplexityScore {
    let counts = result.counts();
    let total = result.old_lines.len().max(result.new_lines.len());
    classify(
        counts.inserts,
        counts.deletes,
        counts.replaces,
        total,
        thresholds,
    )
}
