use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::config::ConfigError;
use crate::error::{RetroError, RetroResult};

/// Acquisition order of generated slice patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOrder {
    /// Even slices first, then odd ones
    Alternating,
    Sequential,
}

/// How per-slice offsets are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SlicePattern {
    /// `alt+z`, `alt-z`, `seq+z`, `seq-z`; a `-` in the fourth position reverses
    Generated { order: SliceOrder, reversed: bool },
    /// Offsets listed explicitly in the configuration
    Custom,
    /// One offset per line in a text file
    File(PathBuf),
}

impl FromStr for SlicePattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::Validation(
                "slice pattern must not be empty".to_string(),
            ));
        }
        let reversed = s.chars().nth(3) == Some('-');
        if s.starts_with("alt") {
            Ok(Self::Generated {
                order: SliceOrder::Alternating,
                reversed,
            })
        } else if s.starts_with("seq") {
            Ok(Self::Generated {
                order: SliceOrder::Sequential,
                reversed,
            })
        } else if s.eq_ignore_ascii_case("custom") {
            Ok(Self::Custom)
        } else {
            Ok(Self::File(PathBuf::from(s)))
        }
    }
}

/// Parse a custom offset list: `[0, 1.5, 0.5]` or whitespace/comma separated.
pub fn parse_offsets(text: &str) -> Result<Vec<f64>, ConfigError> {
    let inner = text
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| {
                ConfigError::Validation(format!("invalid slice offset '{tok}'"))
            })
        })
        .collect()
}

/// Per-slice acquisition offsets (seconds) within one volume.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceTiming {
    offsets: Vec<f64>,
}

impl SliceTiming {
    /// Evenly spaced offsets `k * TR / N` placed in the given order.
    pub fn generated(order: SliceOrder, reversed: bool, slices: usize, tr: f64) -> Self {
        let dtt = tr / slices as f64;
        let sequence: Vec<usize> = match order {
            SliceOrder::Sequential => (0..slices).collect(),
            SliceOrder::Alternating => (0..slices).step_by(2).chain((1..slices).step_by(2)).collect(),
        };

        let mut offsets = vec![0.0; slices];
        for (rank, &slice) in sequence.iter().enumerate() {
            offsets[slice] = rank as f64 * dtt;
        }
        if reversed {
            offsets.reverse();
        }
        Self { offsets }
    }

    /// Use explicit offsets; their count must match the slice count.
    pub fn custom(offsets: Vec<f64>, slices: usize) -> RetroResult<Self> {
        if offsets.len() != slices {
            return Err(RetroError::SliceCountMismatch {
                expected: slices,
                got: offsets.len(),
            });
        }
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(ConfigError::Validation("slice offsets must be finite".to_string()).into());
        }
        Ok(Self { offsets })
    }

    /// Read one offset per line; blank lines are skipped.
    pub fn from_file(path: &Path, slices: usize) -> RetroResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| RetroError::io(path, e))?;
        let mut offsets = Vec::with_capacity(slices);
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = line.parse::<f64>().map_err(|_| {
                RetroError::input(path, format!("line {}: '{line}' is not a number", lineno + 1))
            })?;
            offsets.push(value);
        }
        Self::custom(offsets, slices)
    }

    /// Resolve a pattern into offsets for `slices` slices of a `tr` second volume.
    pub fn resolve(
        pattern: &SlicePattern,
        custom: Option<&[f64]>,
        slices: usize,
        tr: f64,
    ) -> RetroResult<Self> {
        let timing = match pattern {
            SlicePattern::Generated { order, reversed } => {
                Self::generated(*order, *reversed, slices, tr)
            }
            SlicePattern::Custom => {
                let offsets = custom.ok_or_else(|| {
                    ConfigError::Validation("custom slice pattern needs slice_offsets".to_string())
                })?;
                Self::custom(offsets.to_vec(), slices)?
            }
            SlicePattern::File(path) => Self::from_file(path, slices)?,
        };

        let (min, max) = timing
            .offsets
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &o| (lo.min(o), hi.max(o)));
        info!(slices, min, max, "slice timing resolved");
        Ok(timing)
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
