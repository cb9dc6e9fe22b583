//! Mucgly: an inline macro processor.
//!
//! Text is copied from input to output unchanged except for *hooks*:
//! spans opened by a begin separator (default `-<`) and closed by an end
//! separator (default `>-`).  The body of each hook is evaluated by a macro
//! language and replaced with whatever the evaluation writes.
//!
//! | Module | Role |
//! |--------|------|
//! | [`hook`] | separator pairs and the registry that matches them |
//! | [`scan`] | splits input into text runs and hooks |
//! | [`eater`] | marker characters dropped next to hooks |
//! | [`frame`] / [`stack`] | per-input scan and output contexts |
//! | [`eval`] | the evaluator trait and the mutations it returns |
//! | [`directive`] | `:` directives handled by the engine |
//! | [`script`] | the built-in macro language |
//! | [`process`] | the expansion driver and batch runner |
//! | [`cli`] / [`config`] | command line and validated run settings |

pub mod cli;
pub mod config;
pub mod directive;
pub mod eater;
pub mod error;
pub mod eval;
pub mod frame;
pub mod hook;
#[cfg(feature = "lua")]
pub mod lua;
pub mod process;
pub mod scan;
pub mod script;
pub mod stack;
pub mod var;

pub use error::{ConfigError, Error};
pub use eval::{EvalOutcome, Evaluator, HookContext, Mutation};
pub use hook::{HookPair, Registry};
pub use process::ProcessState;
pub use script::ScriptEvaluator;
