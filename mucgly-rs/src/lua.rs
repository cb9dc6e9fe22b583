//! Optional Lua 5.4 macro language via the `mlua` crate.
//!
//! Enabled with the `lua` Cargo feature and selected with `--lua`:
//! ```text
//! cargo build --features lua
//! mucgly --lua -f page.html.in
//! ```
//!
//! Hook bodies are Lua chunks.  A chunk that is an expression writes its
//! value (unless `nil`); any other chunk writes only through `mucgly.write`.
//! Globals persist across hooks and files until the evaluator is reset.
//!
//! # Lua API
//!
//! The `mucgly` table is pre-registered in every state:
//!
//! | Lua                                   | Effect                          |
//! |---------------------------------------|---------------------------------|
//! | `mucgly.write(v, …)`                  | append to the substitution      |
//! | `mucgly.hook(name, beg, end [,esc])`  | register or overwrite a pair    |
//! | `mucgly.multihook(b, e, …)`           | register unnamed pairs          |
//! | `mucgly.unhook(name)` `suppress` `enable` | remove / disable / enable   |
//! | `mucgly.hookbeg(s)` `hookend` `hookesc` `hookall` | change the default pair |
//! | `mucgly.eater([c [,side]])` `seteater` | set or clear the eater         |
//! | `mucgly.block()` `unblock()`          | toggle hook recognition         |
//! | `mucgly.include(path)`                | expand a file at the hook site  |
//! | `mucgly.source(path)`                 | run a Lua file                  |
//! | `mucgly.output(path)` `close()`       | redirect / restore frame output |
//! | `mucgly.file` `mucgly.line` `mucgly.depth` | where the current hook is  |

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use mlua::prelude::*;
use mlua::{FromLuaMulti, Variadic};

use crate::directive::{self, Directive};
use crate::eval::{EvalOutcome, Evaluator, HookContext, Mutation};

// ── LuaCommand ────────────────────────────────────────────────────────────────

/// Effect requested by a `mucgly.*` call, drained after each chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LuaCommand {
    Write(String),
    Mutate(Mutation),
}

// ── LuaEvaluator ──────────────────────────────────────────────────────────────

pub struct LuaEvaluator {
    lua: Lua,
    rx: Receiver<LuaCommand>,
}

impl LuaEvaluator {
    /// Create a fresh Lua state with the `mucgly` table registered.
    pub fn new() -> LuaResult<Self> {
        let lua = Lua::new();
        let (tx, rx) = mpsc::channel();
        register_api(&lua, tx)?;
        Ok(LuaEvaluator { lua, rx })
    }

    /// Execute a chunk outside any hook (tests, embedding).
    pub fn exec(&self, chunk: &str) -> LuaResult<()> {
        self.lua.load(chunk).exec()
    }

    pub fn eval<R: FromLuaMulti>(&self, expr: &str) -> LuaResult<R> {
        self.lua.load(expr).eval()
    }

    /// Expose the hook location to Lua as `mucgly.file` / `line` / `depth`.
    fn set_location(&self, ctx: &HookContext<'_>) -> LuaResult<()> {
        let api: LuaTable = self.lua.globals().get("mucgly")?;
        api.set("file", &*ctx.location.source)?;
        api.set("line", ctx.location.line as i64)?;
        api.set("depth", ctx.depth as i64)?;
        Ok(())
    }

    /// Turn the queued commands into an outcome.
    fn drain(&self, mut outcome: EvalOutcome) -> EvalOutcome {
        for cmd in self.rx.try_iter() {
            match cmd {
                LuaCommand::Write(s) => outcome.write(s),
                LuaCommand::Mutate(m) => outcome.push(m),
            }
        }
        outcome
    }

    fn run<F>(&mut self, ctx: &HookContext<'_>, chunk: F) -> Result<EvalOutcome, String>
    where
        F: FnOnce(&Lua) -> LuaResult<Option<String>>,
    {
        let result = self.set_location(ctx).and_then(|()| chunk(&self.lua));
        // Drain even on failure so nothing leaks into the next hook.
        let mut outcome = self.drain(EvalOutcome::default());
        match result {
            Ok(value) => {
                if let Some(v) = value {
                    outcome.write(v);
                }
                Ok(outcome)
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Evaluator for LuaEvaluator {
    fn evaluate(&mut self, body: &str, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        if body.trim().is_empty() {
            return Ok(EvalOutcome::default());
        }
        let name = ctx.location.to_string();
        self.run(ctx, |lua| {
            let value: LuaValue = lua.load(body).set_name(name).eval()?;
            display(&value)
        })
    }

    fn load_file(&mut self, path: &Path, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        log::debug!("loading lua {}", path.display());
        self.run(ctx, |lua| lua.load(path).exec().map(|()| None))
    }

    fn reset(&mut self) {
        match LuaEvaluator::new() {
            Ok(fresh) => *self = fresh,
            Err(e) => log::error!("cannot reset lua state: {e}"),
        }
    }

    fn name(&self) -> &str {
        "lua"
    }
}

// ── API registration ──────────────────────────────────────────────────────────

fn register_api(lua: &Lua, tx: Sender<LuaCommand>) -> LuaResult<()> {
    let api = lua.create_table()?;

    // mucgly.write(v, …)
    {
        let tx = tx.clone();
        api.set(
            "write",
            lua.create_function(move |_, args: Variadic<LuaValue>| {
                for v in args.iter() {
                    tx.send(LuaCommand::Write(display(v)?.unwrap_or_default()))
                        .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
                }
                Ok(())
            })?,
        )?;
    }

    // mucgly.source(path): run a Lua file in this state.
    api.set(
        "source",
        lua.create_function(|lua, path: String| lua.load(Path::new(&path)).exec())?,
    )?;

    // Function forms of the directives.
    let commands = directive::COMMANDS.iter().map(|&n| (n, n)).chain([("seteater", "eater")]);
    for (lua_name, cmd) in commands.filter(|&(n, _)| n != "source") {
        let tx = tx.clone();
        api.set(
            lua_name,
            lua.create_function(move |_, args: Variadic<String>| {
                match directive::command(cmd, &args).map_err(LuaError::RuntimeError)? {
                    Directive::Apply(mutations) => {
                        for m in mutations {
                            tx.send(LuaCommand::Mutate(m))
                                .map_err(|e| LuaError::RuntimeError(e.to_string()))?;
                        }
                    }
                    Directive::Source(_) => {}
                }
                Ok(())
            })?,
        )?;
    }

    lua.globals().set("mucgly", api)
}

/// Text written for a chunk's value; `nil` writes nothing.
fn display(value: &LuaValue) -> LuaResult<Option<String>> {
    Ok(Some(match value {
        LuaValue::Nil => return Ok(None),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(f) => f.to_string(),
        LuaValue::String(s) => s.to_str()?.to_string(),
        other => {
            return Err(LuaError::RuntimeError(format!(
                "cannot write a {} value",
                other.type_name()
            )))
        }
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
