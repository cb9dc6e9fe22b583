//! Built-in macro language evaluator.
//!
//! [`ScriptEvaluator`] owns the variable table.  Each call opens a short
//! [`Session`] that implements [`EvalContext`], so the expression evaluator
//! can call back for variables and host functions, and collects the
//! resulting [`EvalOutcome`].
//!
//! A hook body is one expression.  Its value is written to the output unless
//! the expression is an assignment; an empty body or one starting with `#`
//! writes nothing.  Script files run one statement per line (a trailing `\`
//! continues the line); statement values are discarded, and lines starting
//! with `:` are directives.
//!
//! Host functions, besides the pure ones in [`super::builtins`]:
//!
//! | Function | Effect |
//! |----------|--------|
//! | `write(v…)` | append to the substitution |
//! | `hook(name, beg, end[, esc])` `multihook(b, e, …)` `unhook(name)` | register / remove pairs |
//! | `suppress(name)` `enable(name)` | disable / re-enable a pair |
//! | `hookbeg(s)` `hookend(s)` `hookesc([s])` `hookall(s)` | change the default pair |
//! | `eater([c[, side]])` `seteater(…)` | set or clear the eater |
//! | `block()` `unblock()` | disable / re-enable hook recognition |
//! | `include(path)` `source(path)` | expand a file here / run a script file |
//! | `output(path)` `close()` | redirect this frame's output / stop |
//! | `file()` `line()` `column()` `depth()` | where the hook is |
//! | `defined(name)` `unset(name)` `getenv(name)` | variable helpers |

use std::fs;
use std::path::{Path, PathBuf};

use crate::directive::{self, Directive};
use crate::eval::{EvalOutcome, Evaluator, HookContext};
use crate::var::VarStore;

use super::{
    builtins::call_builtin,
    expr::{eval_expr, eval_str, parse_expr, EvalContext},
    value::Value,
};

// ── ScriptEvaluator ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ScriptEvaluator {
    vars: VarStore,
}

impl ScriptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarStore {
        &mut self.vars
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&mut self, body: &str, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        let mut session = Session::new(&mut self.vars, ctx);
        session.body(body)?;
        Ok(session.outcome)
    }

    fn load_file(&mut self, path: &Path, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        let mut session = Session::new(&mut self.vars, ctx);
        session.source(path)?;
        Ok(session.outcome)
    }

    fn reset(&mut self) {
        self.vars.clear();
    }

    fn name(&self) -> &str {
        "script"
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// State for one `evaluate` or `load_file` call.
struct Session<'a> {
    vars: &'a mut VarStore,
    ctx: &'a HookContext<'a>,
    outcome: EvalOutcome,
    /// Script files being sourced, outermost first.
    sourcing: Vec<PathBuf>,
}

impl<'a> Session<'a> {
    fn new(vars: &'a mut VarStore, ctx: &'a HookContext<'a>) -> Self {
        Session { vars, ctx, outcome: EvalOutcome::default(), sourcing: Vec::new() }
    }

    fn body(&mut self, body: &str) -> Result<(), String> {
        let text = body.trim();
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }
        let expr = parse_expr(text)?;
        let value = eval_expr(&expr, self)?;
        if !expr.is_assignment() {
            self.outcome.write(value.as_str());
        }
        Ok(())
    }

    fn source(&mut self, path: &Path) -> Result<(), String> {
        if self.sourcing.iter().any(|p| p == path) {
            return Err(format!("recursive source of {}", path.display()));
        }
        let text = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
        log::debug!("sourcing {}", path.display());

        self.sourcing.push(path.to_path_buf());
        let result = self.run_lines(&text, path);
        self.sourcing.pop();
        result
    }

    fn run_lines(&mut self, text: &str, path: &Path) -> Result<(), String> {
        let mut pending = String::new();
        let mut start = 1;
        for (i, line) in text.lines().enumerate() {
            if pending.is_empty() {
                start = i + 1;
            }
            if let Some(head) = line.strip_suffix('\\') {
                pending.push_str(head);
                pending.push('\n');
                continue;
            }
            pending.push_str(line);
            let stmt = std::mem::take(&mut pending);
            self.statement(&stmt).map_err(|m| format!("{}:{start}: {m}", path.display()))?;
        }
        if !pending.is_empty() {
            self.statement(&pending).map_err(|m| format!("{}:{start}: {m}", path.display()))?;
        }
        Ok(())
    }

    fn statement(&mut self, line: &str) -> Result<(), String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        match directive::parse(line) {
            Some(Ok(Directive::Apply(mutations))) => {
                self.outcome.extend(mutations);
                Ok(())
            }
            Some(Ok(Directive::Source(path))) => self.source(&path),
            Some(Err(msg)) => Err(msg),
            None => eval_str(line, self).map(|_| ()),
        }
    }

    /// `write` and the function forms of the directives.
    fn host_fn(&mut self, name: &str, args: &[Value]) -> Option<Result<(), String>> {
        if name == "write" {
            args.iter().for_each(|a| self.outcome.write(a.as_str()));
            return Some(Ok(()));
        }
        let name = if name == "seteater" { "eater" } else { name };
        if !directive::is_command(name) {
            return None;
        }
        let args: Vec<String> = args.iter().map(Value::as_str).collect();
        Some(directive::command(name, &args).and_then(|d| match d {
            Directive::Apply(mutations) => {
                self.outcome.extend(mutations);
                Ok(())
            }
            Directive::Source(path) => self.source(&path),
        }))
    }
}

impl EvalContext for Session<'_> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    fn set_var(&mut self, name: &str, value: Value) {
        self.vars.set(name, value);
    }

    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value, String> {
        if let Some(result) = self.host_fn(name, &args) {
            return result.map(|()| Value::default());
        }
        // Queries that read engine or variable state.
        match name {
            "file" => return Ok(Value::from(self.ctx.location.source.to_string())),
            "line" => return Ok(Value::Int(self.ctx.location.line as i64)),
            "column" => return Ok(Value::Int(self.ctx.location.column as i64)),
            "depth" => return Ok(Value::Int(self.ctx.depth as i64)),
            "defined" => {
                arity(name, &args, 1, 1)?;
                return Ok(Value::from(self.vars.contains(&arg(&args, 0))));
            }
            "unset" => {
                arity(name, &args, 1, 1)?;
                return Ok(Value::from(self.vars.unset(&arg(&args, 0))));
            }
            "getenv" => {
                arity(name, &args, 1, 1)?;
                return Ok(Value::from(std::env::var(arg(&args, 0)).unwrap_or_default()));
            }
            _ => {}
        }
        call_builtin(name, args).unwrap_or_else(|| Err(format!("unknown function {name}")))
    }
}

fn arg(args: &[Value], idx: usize) -> String {
    args.get(idx).map(Value::as_str).unwrap_or_default()
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), String> {
    let n = args.len();
    if n < min {
        Err(format!("{name}: too few arguments ({n}, expected at least {min})"))
    } else if n > max {
        Err(format!("{name}: too many arguments ({n}, expected at most {max})"))
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
