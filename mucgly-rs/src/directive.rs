//! Built-in `:` directives.
//!
//! A hook body whose first non-blank character is `:` is handled by the
//! engine itself, whichever evaluator is configured:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `:block` / `:unblock` | disable / re-enable hook recognition |
//! | `:eater [c [before\|after\|both]]` | set or clear the eater |
//! | `:hookbeg s` `:hookend s` `:hookesc [s]` `:hookall s` | change the default pair |
//! | `:hook name beg end [esc]` | register or overwrite a named pair |
//! | `:multihook b e [b e …]` | register unnamed pairs |
//! | `:unhook name` `:suppress name` `:enable name` | remove / disable / enable a pair |
//! | `:include path` | expand another file at the hook site |
//! | `:source path` | run a script file through the evaluator |
//! | `:output path` / `:close` | redirect this frame's output / stop redirecting |
//!
//! Arguments are whitespace separated; `"…"` quotes a single argument and
//! `\"` escapes a quote inside it.

use std::path::PathBuf;

use crate::eater::{Eater, EaterSide};
use crate::eval::{multihook_ops, EaterOp, Mutation, RegistryOp, StackOp};

/// A parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Plain state changes.
    Apply(Vec<Mutation>),
    /// Needs the evaluator: run a script file.
    Source(PathBuf),
}

/// `true` if `body` is a directive rather than evaluator input.
pub fn is_directive(body: &str) -> bool {
    body.trim_start().starts_with(':')
}

/// `true` if `body` is exactly the unblock directive.  Used while scanning
/// is disabled, when every other hook is copied verbatim.
pub fn is_unblock(body: &str) -> bool {
    body.trim() == ":unblock"
}

/// Parse a directive body.  Returns `None` if `body` is not a directive.
pub fn parse(body: &str) -> Option<Result<Directive, String>> {
    let rest = body.trim_start().strip_prefix(':')?;
    let (cmd, args_str) = rest
        .trim()
        .split_once(|c: char| c.is_whitespace())
        .unwrap_or((rest.trim(), ""));
    let args = split_args(args_str.trim());
    Some(command(cmd, &args))
}

/// Names accepted by [`command`].
pub const COMMANDS: &[&str] = &[
    "block", "unblock", "eater", "hookbeg", "hookend", "hookesc", "hookall", "hook", "multihook",
    "unhook", "suppress", "enable", "include", "source", "output", "close",
];

pub fn is_command(name: &str) -> bool {
    COMMANDS.contains(&name)
}

/// Build the directive `cmd` from already split arguments.  Evaluators use
/// this for their function forms of the directives.
pub fn command(cmd: &str, args: &[String]) -> Result<Directive, String> {
    let one = |op: Mutation| -> Result<Directive, String> { Ok(Directive::Apply(vec![op])) };

    match cmd {
        "block" => {
            arity(cmd, args, 0, 0)?;
            one(StackOp::Block.into())
        }
        "unblock" => {
            arity(cmd, args, 0, 0)?;
            one(StackOp::Unblock.into())
        }
        "eater" => {
            arity(cmd, args, 0, 2)?;
            match args {
                [] => one(EaterOp::Clear.into()),
                [ch, rest @ ..] => {
                    let side = match rest.first() {
                        Some(s) => s.parse::<EaterSide>()?,
                        None => EaterSide::default(),
                    };
                    let e = Eater::parse(ch, side)?;
                    one(EaterOp::Set { ch: e.ch, side: e.side }.into())
                }
            }
        }
        "hookbeg" => {
            arity(cmd, args, 1, 1)?;
            one(RegistryOp::SetBegin(args[0].clone()).into())
        }
        "hookend" => {
            arity(cmd, args, 1, 1)?;
            one(RegistryOp::SetEnd(args[0].clone()).into())
        }
        "hookesc" => {
            arity(cmd, args, 0, 1)?;
            one(RegistryOp::SetEscape(args.first().cloned().unwrap_or_default()).into())
        }
        "hookall" => {
            arity(cmd, args, 1, 1)?;
            let s = args[0].clone();
            one(RegistryOp::SetDefault { begin: s.clone(), end: s.clone(), escape: Some(s) }.into())
        }
        "hook" => {
            arity(cmd, args, 3, 4)?;
            one(RegistryOp::Register {
                name: Some(args[0].clone()),
                begin: args[1].clone(),
                end: args[2].clone(),
                escape: args.get(3).cloned(),
            }
            .into())
        }
        "multihook" => {
            if args.is_empty() {
                return Err("multihook: expected begin/end pairs".into());
            }
            Ok(Directive::Apply(multihook_ops(args)?))
        }
        "unhook" => {
            arity(cmd, args, 1, 1)?;
            one(RegistryOp::Remove(args[0].clone()).into())
        }
        "suppress" => {
            arity(cmd, args, 1, 1)?;
            one(RegistryOp::Suppress(args[0].clone()).into())
        }
        "enable" => {
            arity(cmd, args, 1, 1)?;
            one(RegistryOp::Enable(args[0].clone()).into())
        }
        "include" => {
            arity(cmd, args, 1, 1)?;
            one(StackOp::Include(PathBuf::from(&args[0])).into())
        }
        "source" => {
            arity(cmd, args, 1, 1)?;
            Ok(Directive::Source(PathBuf::from(&args[0])))
        }
        "output" => {
            arity(cmd, args, 1, 1)?;
            one(StackOp::Redirect(Some(PathBuf::from(&args[0]))).into())
        }
        "close" => {
            arity(cmd, args, 0, 0)?;
            one(StackOp::Redirect(None).into())
        }
        "" => Err("empty directive".into()),
        other => Err(format!("unknown directive :{other}")),
    }
}

fn arity(cmd: &str, args: &[String], min: usize, max: usize) -> Result<(), String> {
    let n = args.len();
    if n < min || n > max {
        let want = if min == max { min.to_string() } else { format!("{min} to {max}") };
        return Err(format!("{cmd}: expected {want} argument(s), got {n}"));
    }
    Ok(())
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.  `""` yields an empty token.
pub fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if !in_quotes => {
                in_quotes = true;
                quoted = true;
            }
            '"' if in_quotes => in_quotes = false,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !cur.is_empty() || quoted {
                    args.push(std::mem::take(&mut cur));
                }
                quoted = false;
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() || quoted {
        args.push(cur);
    }
    args
}

// ── Tests ─────────────────────────────────────────────────────────────────────
