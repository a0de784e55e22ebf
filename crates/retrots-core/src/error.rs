//! Error taxonomy for a RetroTS run.
//!
//! Configuration and input-format errors abort the run. Signal-quality errors
//! are scoped to one [`SignalKind`]: the driver drops that signal type and
//! keeps going with the other one.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::signal::SignalKind;

#[derive(Error, Debug)]
pub enum RetroError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{kind} signal rejected at stage '{stage}': {reason}")]
    SignalQuality {
        kind: SignalKind,
        stage: &'static str,
        reason: String,
    },

    #[error("malformed input in {path}: {reason}")]
    InputFormat { path: PathBuf, reason: String },

    #[error("slice offset count mismatch: got {got} offsets for {expected} slices")]
    SliceCountMismatch { expected: usize, got: usize },

    #[error("no usable physiological signal: every signal type was rejected")]
    NoUsableSignal,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RetroResult<T> = Result<T, RetroError>;

impl RetroError {
    pub fn quality(kind: SignalKind, stage: &'static str, reason: impl Into<String>) -> Self {
        Self::SignalQuality {
            kind,
            stage,
            reason: reason.into(),
        }
    }

    pub fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure only invalidates one signal type.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SignalQuality { .. })
    }
}
