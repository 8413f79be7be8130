//! Caller-supplied tuning knobs.
//!
//! Every option is passed explicitly to the function that uses it; nothing is
//! read from files or the environment. Options can be built in code or parsed
//! from a TOML document the caller already holds:
//!
//! ```toml
//! ignore_whitespace = true
//!
//! [moves]
//! min_similarity = 0.85
//!
//! [complexity]
//! high = 250
//! ```

use serde::{Deserialize, Serialize};

/// Line alignment algorithm handed to `similar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAlgorithm {
    #[default]
    Myers,
    Patience,
}

impl DiffAlgorithm {
    pub(crate) fn to_similar(self) -> similar::Algorithm {
        match self {
            Self::Myers => similar::Algorithm::Myers,
            Self::Patience => similar::Algorithm::Patience,
        }
    }
}

/// Token size used for intra-line highlights of replaced lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntralineGranularity {
    /// Identifier runs, whitespace runs and single punctuation characters.
    #[default]
    Word,
    Char,
}

/// Options for the whole diff core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Compare lines with all whitespace removed.
    #[serde(default)]
    pub ignore_whitespace: bool,

    #[serde(default)]
    pub algorithm: DiffAlgorithm,

    #[serde(default)]
    pub intraline: IntralineGranularity,

    /// Replaced lines longer than this (in bytes) are highlighted whole.
    #[serde(default = "default_max_intraline_line_len")]
    pub max_intraline_line_len: usize,

    #[serde(default)]
    pub normalize: NormalizeOptions,

    #[serde(default)]
    pub moves: MoveOptions,

    #[serde(default)]
    pub complexity: ComplexityThresholds,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignore_whitespace: false,
            algorithm: DiffAlgorithm::default(),
            intraline: IntralineGranularity::default(),
            max_intraline_line_len: default_max_intraline_line_len(),
            normalize: NormalizeOptions::default(),
            moves: MoveOptions::default(),
            complexity: ComplexityThresholds::default(),
        }
    }
}

impl DiffOptions {
    /// Parses options from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

/// Options for the hunk normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Encoding label used to re-decode hunk lines. `None` means UTF-8.
    #[serde(default)]
    pub encoding: Option<String>,

    /// Drop a trailing `\r` from every decoded line.
    #[serde(default = "default_true")]
    pub strip_carriage_returns: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            strip_carriage_returns: true,
        }
    }
}

/// Options for the move detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Similarity (1 minus the line-level edit distance ratio) a
    /// delete/insert pair must exceed to count as a move. The bound is
    /// exclusive: at 0.9 a 10-line block with one changed line is rejected.
    /// Identical blocks always qualify.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Blocks shorter than this are never considered.
    #[serde(default = "default_min_block_lines")]
    pub min_block_lines: usize,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_similarity: default_min_similarity(),
            min_block_lines: default_min_block_lines(),
        }
    }
}

/// Bucket thresholds for the complexity classifier.
///
/// `low`, `medium` and `high` are changed-line counts at which the bucket
/// steps up. A file of at least `donut_min_total_lines` lines whose changed
/// share is at most `donut_max_change_ratio` is a "donut".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityThresholds {
    #[serde(default = "default_low")]
    pub low: usize,

    #[serde(default = "default_medium")]
    pub medium: usize,

    #[serde(default = "default_high")]
    pub high: usize,

    #[serde(default = "default_donut_min_total_lines")]
    pub donut_min_total_lines: usize,

    #[serde(default = "default_donut_max_change_ratio")]
    pub donut_max_change_ratio: f64,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            low: default_low(),
            medium: default_medium(),
            high: default_high(),
            donut_min_total_lines: default_donut_min_total_lines(),
            donut_max_change_ratio: default_donut_max_change_ratio(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_intraline_line_len() -> usize {
    4096
}

fn default_min_similarity() -> f64 {
    0.9
}

fn default_min_block_lines() -> usize {
    1
}

fn default_low() -> usize {
    5
}

fn default_medium() -> usize {
    25
}

fn default_high() -> usize {
    100
}

fn default_donut_min_total_lines() -> usize {
    2000
}

fn default_donut_max_change_ratio() -> f64 {
    0.02
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let options = DiffOptions::from_toml_str("").unwrap();
        assert_eq!(options, DiffOptions::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let options = DiffOptions::from_toml_str(
            r#"
            ignore_whitespace = true
            algorithm = "patience"

            [moves]
            min_similarity = 0.75

            [complexity]
            high = 250
            "#,
        )
        .unwrap();

        assert!(options.ignore_whitespace);
        assert_eq!(options.algorithm, DiffAlgorithm::Patience);
        assert_eq!(options.moves.min_similarity, 0.75);
        assert!(options.moves.enabled);
        assert_eq!(options.complexity.high, 250);
        assert_eq!(options.complexity.low, 5);
        assert!(options.normalize.strip_carriage_returns);
    }

    #[test]
    fn encoding_label_round_trips() {
        let options = DiffOptions::from_toml_str(
            r#"
            [normalize]
            encoding = "latin1"
            "#,
        )
        .unwrap();
        assert_eq!(options.normalize.encoding.as_deref(), Some("latin1"));
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(DiffOptions::from_toml_str(r#"algorithm = "histogram""#).is_err());
    }
}
