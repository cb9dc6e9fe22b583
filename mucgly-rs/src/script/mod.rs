//! Built-in macro language.
//!
//! A small expression language for hook bodies:
//!
//! - Integer, real and string values with numeric-string coercion
//! - Arithmetic, comparison, logic, ternary, glob (`=~`) and regex (`=/`) match
//! - Variables with `=` and compound assignment
//! - Pure built-in functions (string, math, conversion)
//! - Host functions that write output or change hooks, eater and frames
//!
//! # Quick start
//!
//! ```rust
//! use mucgly::process::ProcessState;
//! use mucgly::script::ScriptEvaluator;
//!
//! let mut ps = ProcessState::new(Box::new(ScriptEvaluator::new()));
//! let out = ps.expand("doc", b"-<x = 6>-x*7 = -<x * 7>-").unwrap();
//! assert_eq!(out, b"x*7 = 42");
//! ```

pub mod builtins;
pub mod expr;
pub mod interp;
pub mod value;

pub use expr::EvalContext;
pub use interp::ScriptEvaluator;
pub use value::Value;
