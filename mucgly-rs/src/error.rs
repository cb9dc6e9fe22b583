//! Error taxonomy.
//!
//! | Error                      | Raised by                        | Scope of abort |
//! |----------------------------|----------------------------------|----------------|
//! | [`ConfigError`]            | registry / CLI configuration     | whole run      |
//! | [`Error::UnterminatedHook`]| scanner at end of input          | current file   |
//! | [`Error::Eval`]            | evaluator or directive           | current file   |
//! | [`Error::Io`]              | reading input / writing output   | current file   |
//! | [`Error::Setup`]           | evaluator construction           | whole run      |

use std::io;

use crate::scan::Location;

// ── ConfigError ───────────────────────────────────────────────────────────────

/// Malformed delimiter or multi-hook configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} separator must not be empty")]
    EmptySeparator(&'static str),

    #[error("must have even number of multi hook args, had {0}")]
    OddMultiHook(usize),

    #[error("no hook pair named {0:?}")]
    UnknownPair(String),
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// Any failure surfaced while processing input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{location}: hook opened with {begin:?} is not terminated")]
    UnterminatedHook { location: Location, begin: String },

    #[error("{location}: {message}")]
    Eval { location: Location, message: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("evaluator setup failed: {0}")]
    Setup(String),
}

impl Error {
    pub fn eval(location: &Location, message: impl Into<String>) -> Self {
        Error::Eval { location: location.clone(), message: message.into() }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// `true` for errors that end the whole run rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Setup(_))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
