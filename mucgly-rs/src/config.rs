//! Validated run configuration.
//!
//! [`Config::from_args`] turns parsed [`CliArgs`] into everything a run
//! needs, checking the separator options before any input is opened:
//!
//! | Option | Applied as |
//! |--------|------------|
//! | `-b SEP` | default begin |
//! | `-e SEP` | default end |
//! | `-s SEP` | default escape |
//! | `-a SEP` | begin, end and escape all set to SEP |
//! | `-u SEP…` | unnamed pairs, taken two at a time |
//!
//! They are applied in that order, after the init script, configuration
//! scripts and inline commands have run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;
use crate::error::ConfigError;
use crate::hook::Registry;

/// Environment variable naming the init script.
pub const INIT_ENV: &str = "MUCGLY";

/// Which macro language evaluates hook bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluatorKind {
    #[default]
    Script,
    #[cfg(feature = "lua")]
    Lua,
}

// ── Separators ────────────────────────────────────────────────────────────────

/// Separator overrides from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Separators {
    pub begin: Option<String>,
    pub end: Option<String>,
    pub escape: Option<String>,
    pub all: Option<String>,
    pub multi: Vec<String>,
}

impl Separators {
    /// Reject empty begin/end values and odd multi-hook lists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.begin.as_deref() == Some("") {
            return Err(ConfigError::EmptySeparator("hookbeg"));
        }
        if self.end.as_deref() == Some("") {
            return Err(ConfigError::EmptySeparator("hookend"));
        }
        if self.all.as_deref() == Some("") {
            return Err(ConfigError::EmptySeparator("hookall"));
        }
        if self.multi.len() % 2 != 0 {
            return Err(ConfigError::OddMultiHook(self.multi.len()));
        }
        if self.multi.iter().any(String::is_empty) {
            return Err(ConfigError::EmptySeparator("multihook"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Separators::default()
    }

    pub fn apply(&self, reg: &mut Registry) -> Result<(), ConfigError> {
        if let Some(b) = &self.begin {
            reg.set_begin(b)?;
        }
        if let Some(e) = &self.end {
            reg.set_end(e)?;
        }
        if let Some(s) = &self.escape {
            reg.set_escape(s);
        }
        if let Some(a) = &self.all {
            reg.set_default(a, a, Some(a))?;
        }
        reg.register_multi(&self.multi)
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub files: Vec<PathBuf>,
    pub configs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub genout: Option<String>,
    pub cli_cmds: Vec<String>,
    pub separators: Separators,
    pub interactive: bool,
    /// `None` when `-n` was given or the environment variable is unset.
    pub init_script: Option<PathBuf>,
    pub evaluator: EvaluatorKind,
    pub verbose: bool,
}

impl Config {
    /// Build a config from parsed arguments and the value of [`INIT_ENV`].
    pub fn from_args(args: CliArgs, init_env: Option<OsString>) -> Result<Self, ConfigError> {
        let separators = Separators {
            begin: args.beg_sep,
            end: args.end_sep,
            escape: args.esc_sep,
            all: args.all_sep,
            multi: args.multi_sep,
        };
        separators.validate()?;

        let init_script = if args.no_init {
            None
        } else {
            init_env.filter(|v| !v.is_empty()).map(PathBuf::from)
        };

        #[cfg(feature = "lua")]
        let evaluator = if args.lua { EvaluatorKind::Lua } else { EvaluatorKind::Script };
        #[cfg(not(feature = "lua"))]
        let evaluator = EvaluatorKind::Script;

        Ok(Config {
            files: args.files,
            configs: args.configs,
            output: args.output,
            genout: args.genout,
            cli_cmds: args.cli_cmds,
            separators,
            interactive: args.interact,
            init_script,
            evaluator,
            verbose: args.verbose,
        })
    }

    /// Output file for `input` under `-g`; `None` means the process output.
    pub fn output_for(&self, input: &Path) -> Option<PathBuf> {
        let tag = self.genout.as_deref()?;
        infile_to_outfile(&input.to_string_lossy(), tag).map(PathBuf::from)
    }
}

/// Remove the last occurrence of `tag` from `infile`.
pub fn infile_to_outfile(infile: &str, tag: &str) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    let at = infile.rfind(tag)?;
    let mut out = String::with_capacity(infile.len() - tag.len());
    out.push_str(&infile[..at]);
    out.push_str(&infile[at + tag.len()..]);
    Some(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::parse_from_argv(std::iter::once("mucgly").chain(argv.iter().copied())).unwrap()
    }

    // -- genout ---------------------------------------------------------------

    #[test]
    fn genout_removes_last_occurrence() {
        assert_eq!(infile_to_outfile("test_multihook.rx.c", ".rx").as_deref(), Some("test_multihook.c"));
        assert_eq!(infile_to_outfile("a.rx/b.rx.c", ".rx").as_deref(), Some("a.rx/b.c"));
        assert_eq!(infile_to_outfile("plain.c", ".rx"), None);
        assert_eq!(infile_to_outfile("plain.c", ""), None);
    }

    #[test]
    fn output_for_without_genout() {
        let cfg = Config::from_args(args(&["-f", "x.rx.c"]), None).unwrap();
        assert_eq!(cfg.output_for(Path::new("x.rx.c")), None);
        let cfg = Config::from_args(args(&["-g", ".rx"]), None).unwrap();
        assert_eq!(cfg.output_for(Path::new("x.rx.c")), Some(PathBuf::from("x.c")));
    }

    // -- separators -----------------------------------------------------------

    #[test]
    fn odd_multi_sep_rejected() {
        let err = Config::from_args(args(&["-u", "a", "-u", "b", "-u", "c"]), None).unwrap_err();
        assert_eq!(err, ConfigError::OddMultiHook(3));
    }

    #[test]
    fn empty_begin_rejected() {
        let err = Config::from_args(args(&["-b", ""]), None).unwrap_err();
        assert_eq!(err, ConfigError::EmptySeparator("hookbeg"));
    }

    #[test]
    fn separators_apply_in_order() {
        let seps = Separators {
            begin: Some("{{".into()),
            escape: Some("%".into()),
            multi: vec!["/*..".into(), "..*/".into()],
            ..Separators::default()
        };
        let mut reg = Registry::new();
        seps.apply(&mut reg).unwrap();
        let d = reg.default_pair();
        assert_eq!((d.begin.as_str(), d.end.as_str(), d.escape.as_str()), ("{{", ">-", "%"));
        // Multi-hook pairs inherit the escape set just before them.
        assert_eq!(reg.get("/*..").unwrap().escape, "%");
    }

    #[test]
    fn all_sep_overrides_individual() {
        let seps = Separators { begin: Some("{{".into()), all: Some("@".into()), ..Separators::default() };
        let mut reg = Registry::new();
        seps.apply(&mut reg).unwrap();
        assert!(reg.default_pair().is_symmetric());
        assert_eq!(reg.default_pair().escape, "@");
    }

    // -- init script ----------------------------------------------------------

    #[test]
    fn init_script_from_env() {
        let cfg = Config::from_args(args(&[]), Some("init.mcg".into())).unwrap();
        assert_eq!(cfg.init_script, Some(PathBuf::from("init.mcg")));
        let cfg = Config::from_args(args(&["-n"]), Some("init.mcg".into())).unwrap();
        assert_eq!(cfg.init_script, None);
        let cfg = Config::from_args(args(&[]), Some(OsString::new())).unwrap();
        assert_eq!(cfg.init_script, None);
    }

    #[test]
    fn defaults() {
        let cfg = Config::from_args(args(&[]), None).unwrap();
        assert!(cfg.separators.is_empty());
        assert_eq!(cfg.evaluator, EvaluatorKind::Script);
        assert!(!cfg.interactive);
    }
}
