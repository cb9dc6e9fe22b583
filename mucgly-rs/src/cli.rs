//! Command-line argument parsing.
//!
//! Usage:
//!   mucgly [-f FILE…] [-c SCRIPT]… [-l CMD]… [-o FILE] [-g TAG]
//!          [-b SEP] [-e SEP] [-s SEP] [-a SEP] [-u SEP]… [-i] [-m] [-n] [-v]
//!
//! Separator values may start with `-` (the default begin is `-<`), so the
//! separator options take exactly one value per occurrence.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Parsed command-line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "mucgly")]
#[command(version)]
#[command(about = "Inline macro processor", long_about = None)]
pub struct CliArgs {
    /// Input files (default: stdin).
    #[arg(short = 'f', long = "files", value_name = "FILE", num_args = 1.., action = ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Configuration scripts, run before any input.
    #[arg(short = 'c', long = "configs", value_name = "FILE", action = ArgAction::Append)]
    pub configs: Vec<PathBuf>,

    /// Output file (default: stdout).
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Derive each output name by removing TAG from the input name.  Inputs
    /// whose name lacks TAG go to the process output.
    #[arg(short = 'g', long = "genout", value_name = "TAG")]
    pub genout: Option<String>,

    /// Inline configuration commands.
    #[arg(short = 'l', long = "cli-cmds", value_name = "CMD", allow_hyphen_values = true, action = ArgAction::Append)]
    pub cli_cmds: Vec<String>,

    /// Hook begin separator.
    #[arg(short = 'b', long = "beg-sep", value_name = "SEP", allow_hyphen_values = true)]
    pub beg_sep: Option<String>,

    /// Hook end separator.
    #[arg(short = 'e', long = "end-sep", value_name = "SEP", allow_hyphen_values = true)]
    pub end_sep: Option<String>,

    /// Hook escape separator.
    #[arg(short = 's', long = "esc-sep", value_name = "SEP", allow_hyphen_values = true)]
    pub esc_sep: Option<String>,

    /// Set begin, end and escape separators to the same string.
    #[arg(short = 'a', long = "all-sep", value_name = "SEP", allow_hyphen_values = true)]
    pub all_sep: Option<String>,

    /// Additional begin/end separators, given in pairs.
    #[arg(short = 'u', long = "multi-sep", value_name = "SEP", allow_hyphen_values = true, action = ArgAction::Append)]
    pub multi_sep: Vec<String>,

    /// Flush output after every substitution.
    #[arg(short = 'i', long = "interact")]
    pub interact: bool,

    /// Accepted for compatibility with older invocations; has no effect.
    #[arg(short = 'm', long = "module")]
    pub module: bool,

    /// Skip the init script named by the MUCGLY environment variable.
    #[arg(short = 'n', long = "no-init")]
    pub no_init: bool,

    /// Debug logging.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Evaluate hook bodies as Lua.
    #[cfg(feature = "lua")]
    #[arg(long = "lua")]
    pub lua: bool,
}

impl CliArgs {
    /// Parse a full argument vector (program name first).
    pub fn parse_from_argv<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(argv)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
