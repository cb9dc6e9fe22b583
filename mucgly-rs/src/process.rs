//! Process state and the expansion driver.
//!
//! [`ProcessState`] owns everything that lives for one invocation: the frame
//! stack, the evaluator and the process output.  The driver loop pulls
//! [`Event`]s from a [`Scanner`] over one frame's input and, for each hook:
//!
//! 1. eats the marker before the hook (eater side `before`/`both`);
//! 2. evaluates the body (directive or evaluator);
//! 3. splices the writes and applies the mutations in the order they were
//!    issued, so an include lands between the writes around it;
//! 4. eats the marker after the hook (eater side `after`/`both`);
//! 5. flushes, in interactive mode.
//!
//! Substitution text is never scanned again.
//!
//! Output is buffered per frame and only reaches its sink when the frame
//! finishes, so a failing input produces no output (unless interactive).

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, EvaluatorKind};
use crate::directive::{self, Directive};
use crate::eater::Eater;
use crate::error::{ConfigError, Error};
use crate::eval::{EaterOp, EvalOutcome, Evaluator, HookContext, Mutation, RegistryOp, StackOp, Step};
use crate::frame::{FileSink, Frame, Sink};
use crate::hook::{HookPair, Registry};
use crate::scan::{Event, Hook, Location, Position, Scanner};
use crate::stack::Stack;

/// Label of standard input in diagnostics.
pub const STDIN_LABEL: &str = "<stdin>";
/// Label of inline configuration commands.
pub const CLI_LABEL: &str = "<cli>";

// ── ProcessState ──────────────────────────────────────────────────────────────

pub struct ProcessState {
    stack: Stack,
    evaluator: Box<dyn Evaluator>,
    output: Box<dyn Write>,
    output_label: String,
    interactive: bool,
}

impl ProcessState {
    /// Fresh state writing to stdout.  The evaluator is reset so nothing
    /// leaks from an earlier run.
    pub fn new(evaluator: Box<dyn Evaluator>) -> Self {
        Self::with_output(evaluator, Box::new(io::stdout()), "<stdout>")
    }

    pub fn with_output(
        mut evaluator: Box<dyn Evaluator>,
        output: Box<dyn Write>,
        output_label: impl Into<String>,
    ) -> Self {
        evaluator.reset();
        log::debug!("using {} evaluator", evaluator.name());
        ProcessState {
            stack: Stack::new(Frame::new("<root>", Registry::new(), Sink::Capture)),
            evaluator,
            output,
            output_label: output_label.into(),
            interactive: false,
        }
    }

    pub fn set_interactive(&mut self, on: bool) {
        self.interactive = on;
    }

    /// The process-wide registry inherited by every input.
    pub fn registry(&self) -> &Registry {
        &self.stack.root().registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.stack.root_mut().registry
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    // ── configuration ─────────────────────────────────────────────────────

    /// Run a configuration script against the root frame.  Writes are
    /// discarded.
    pub fn run_script(&mut self, path: &Path) -> Result<(), Error> {
        log::info!("loading {}", path.display());
        let location = Location::new(&Arc::from(path.display().to_string()), Position::default());
        let outcome = {
            let ctx = HookContext {
                location: &location,
                depth: self.stack.depth(),
                pair: None,
                registry: &self.stack.current().registry,
            };
            self.evaluator.load_file(path, &ctx).map_err(|m| Error::eval(&location, m))?
        };
        self.apply_config(outcome, &location)
    }

    /// Evaluate one inline command (a hook body without separators) against
    /// the root frame.  Writes are discarded.
    pub fn run_command(&mut self, text: &str) -> Result<(), Error> {
        let location = Location::new(&Arc::from(CLI_LABEL), Position::default());
        let outcome = self.evaluate_body(text, None, &location)?;
        self.apply_config(outcome, &location)
    }

    fn apply_config(&mut self, outcome: EvalOutcome, location: &Location) -> Result<(), Error> {
        for m in outcome.mutations {
            self.apply(m, location)?;
        }
        let root = self.stack.root_mut();
        root.close_redirect().map_err(|(p, e)| Error::io(p.display().to_string(), e))?;
        root.take_output();
        Ok(())
    }

    // ── processing ────────────────────────────────────────────────────────

    /// Expand one input.  `None` reads stdin; output goes to `output` or, if
    /// `None`, to the process output.
    pub fn process_file(&mut self, input: Option<&Path>, output: Option<&Path>) -> Result<(), Error> {
        let (label, src) = match input {
            Some(path) => {
                let label = path.display().to_string();
                let src = fs::read(path).map_err(|e| Error::io(&label, e))?;
                (label, src)
            }
            None => {
                let mut src = Vec::new();
                io::stdin().read_to_end(&mut src).map_err(|e| Error::io(STDIN_LABEL, e))?;
                (STDIN_LABEL.to_owned(), src)
            }
        };
        log::info!("processing {label}");

        let sink = match output {
            Some(path) => Sink::File(FileSink::new(path)),
            None => Sink::Process,
        };
        let frame = self.stack.root().child(label, sink);
        self.run_frame(frame, &src).map(|_| ())
    }

    /// Expand an in-memory input and return the result.
    pub fn expand(&mut self, label: &str, input: &[u8]) -> Result<Vec<u8>, Error> {
        let frame = self.stack.root().child(label, Sink::Capture);
        Ok(self.run_frame(frame, input)?.unwrap_or_default())
    }

    /// Push `frame`, drive it over `src` and deliver its output.  On failure
    /// the stack is unwound to where it was and the output is dropped.
    fn run_frame(&mut self, frame: Frame, src: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let depth = self.stack.depth();
        self.stack.push(frame);
        let result = self.drive(src).and_then(|()| self.finish_frame());
        if result.is_err() {
            self.stack.unwind(depth);
        }
        result
    }

    fn drive(&mut self, src: &[u8]) -> Result<(), Error> {
        let mut scanner = Scanner::new(src);
        // End offset of the last text run, for before-side eating.
        let mut text_end: Option<usize> = None;

        loop {
            let event = {
                let frame = self.stack.current();
                scanner.next_event(&frame.registry, frame.scan_enabled)
            };
            match event {
                Ok(Event::Eof) => return Ok(()),
                Ok(Event::Text(range)) => {
                    self.stack.current_mut().emit(&src[range.clone()]);
                    text_end = Some(range.end);
                }
                Ok(Event::Hook(hook)) => {
                    self.on_hook(&mut scanner, hook, text_end)?;
                    text_end = None;
                }
                Err(u) => {
                    let location = Location::new(&self.stack.current().label, u.start);
                    return Err(Error::UnterminatedHook { location, begin: u.begin });
                }
            }
        }
    }

    fn on_hook(&mut self, scanner: &mut Scanner<'_>, hook: Hook, text_end: Option<usize>) -> Result<(), Error> {
        let src = scanner.source();

        let frame = self.stack.current_mut();
        frame.position = hook.start;
        let location = frame.location();

        // Blocked: the scanner only yields unblock directives.
        if !frame.scan_enabled {
            if directive::is_unblock(&String::from_utf8_lossy(&hook.body)) {
                log::debug!("{location}: unblock");
                frame.scan_enabled = true;
            } else {
                frame.emit(&src[hook.span.clone()]);
            }
            return Ok(());
        }

        let body = std::str::from_utf8(&hook.body)
            .map_err(|e| Error::eval(&location, format!("hook body is not valid UTF-8: {e}")))?;

        // The eater in force when the hook opened applies.
        let eater = frame.eater;

        if let Some(e) = eater.filter(|e| e.side.eats_before()) {
            let bytes = e.bytes();
            let start = hook.span.start;
            if text_end == Some(start) && src[..start].ends_with(&bytes) {
                frame.retract(&bytes);
            }
        }

        let outcome = self.evaluate_body(body, Some(&hook.pair), &location)?;
        for step in outcome.into_steps() {
            match step {
                Step::Write(text) => self.stack.current_mut().emit(text.as_bytes()),
                Step::Mutate(m) => self.apply(m, &location)?,
            }
        }

        if let Some(e) = eater.filter(|e| e.side.eats_after()) {
            scanner.skip_prefix(&e.bytes());
        }

        if self.interactive {
            self.flush_current()?;
        }
        Ok(())
    }

    /// Dispatch a body to the directive parser or the evaluator.
    fn evaluate_body(
        &mut self,
        body: &str,
        pair: Option<&HookPair>,
        location: &Location,
    ) -> Result<EvalOutcome, Error> {
        let frame = self.stack.current();
        let ctx = HookContext { location, depth: self.stack.depth(), pair, registry: &frame.registry };

        let result = match directive::parse(body) {
            Some(Ok(Directive::Apply(mutations))) => {
                log::debug!("{location}: directive {}", body.trim());
                Ok(EvalOutcome::from_mutations(mutations))
            }
            Some(Ok(Directive::Source(path))) => {
                log::debug!("{location}: source {}", path.display());
                self.evaluator.load_file(&path, &ctx)
            }
            Some(Err(msg)) => Err(msg),
            None => {
                log::debug!("{location}: eval {:?}", body);
                self.evaluator.evaluate(body, &ctx)
            }
        };
        result.map_err(|m| Error::eval(location, m))
    }

    /// Apply one mutation to the current frame.
    fn apply(&mut self, mutation: Mutation, location: &Location) -> Result<(), Error> {
        let frame = self.stack.current_mut();
        match mutation {
            Mutation::Registry(op) => {
                apply_registry(&mut frame.registry, op).map_err(|e| Error::eval(location, e.to_string()))?
            }
            Mutation::Eater(EaterOp::Set { ch, side }) => frame.eater = Some(Eater::new(ch, side)),
            Mutation::Eater(EaterOp::Clear) => frame.eater = None,
            Mutation::Stack(StackOp::Block) => frame.scan_enabled = false,
            Mutation::Stack(StackOp::Unblock) => frame.scan_enabled = true,
            Mutation::Stack(StackOp::Redirect(Some(path))) => {
                log::debug!("{location}: output to {}", path.display());
                frame.redirect_to(path).map_err(io_error)?
            }
            Mutation::Stack(StackOp::Redirect(None)) => frame.close_redirect().map_err(io_error)?,
            Mutation::Stack(StackOp::Include(path)) => self.include(&path, location)?,
        }
        Ok(())
    }

    fn include(&mut self, path: &Path, location: &Location) -> Result<(), Error> {
        let label = path.display().to_string();
        if self.stack.contains_label(&label) {
            return Err(Error::eval(location, format!("recursive include of {label}")));
        }
        let src = fs::read(path).map_err(|e| Error::io(&label, e))?;
        let frame = self.stack.current().child(label, Sink::Parent);
        self.run_frame(frame, &src)?;
        Ok(())
    }

    /// Pop the current frame and deliver its output to its sink.
    fn finish_frame(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let Some(mut frame) = self.stack.pop() else {
            return Ok(None);
        };
        frame.close_redirect().map_err(io_error)?;
        let out = frame.take_output();

        match frame.sink {
            Sink::Parent => {
                self.stack.current_mut().emit(&out);
                Ok(None)
            }
            Sink::Process => {
                self.write_process(&out)?;
                Ok(None)
            }
            Sink::File(mut file) => {
                let label = file.path().display().to_string();
                file.write_all(&out)
                    .and_then(|()| file.finish())
                    .map_err(|e| Error::io(label, e))?;
                Ok(None)
            }
            Sink::Capture => Ok(Some(out)),
        }
    }

    /// Push what the current frame has produced so far to its sink.
    fn flush_current(&mut self) -> Result<(), Error> {
        let frame = self.stack.current_mut();
        frame.flush_redirect().map_err(io_error)?;
        let out = match frame.sink {
            Sink::Process | Sink::File(_) => frame.take_output(),
            Sink::Parent | Sink::Capture => return Ok(()),
        };
        if let Sink::File(file) = &mut frame.sink {
            let label = file.path().display().to_string();
            return file.write_all(&out).and_then(|()| file.flush()).map_err(|e| Error::io(label, e));
        }
        self.write_process(&out)
    }

    fn write_process(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.output
            .write_all(bytes)
            .and_then(|()| self.output.flush())
            .map_err(|e| Error::io(self.output_label.clone(), e))
    }
}

fn io_error((path, e): (PathBuf, io::Error)) -> Error {
    Error::io(path.display().to_string(), e)
}

/// Apply one registry operation.
pub fn apply_registry(reg: &mut Registry, op: RegistryOp) -> Result<(), ConfigError> {
    match op {
        RegistryOp::SetDefault { begin, end, escape } => reg.set_default(&begin, &end, escape.as_deref()),
        RegistryOp::SetBegin(s) => reg.set_begin(&s),
        RegistryOp::SetEnd(s) => reg.set_end(&s),
        RegistryOp::SetEscape(s) => {
            reg.set_escape(&s);
            Ok(())
        }
        RegistryOp::Register { name, begin, end, escape } => {
            reg.register(name.as_deref(), &begin, &end, escape.as_deref())
        }
        RegistryOp::Remove(name) => reg.remove(&name).map(|_| ()),
        RegistryOp::Suppress(name) => reg.suppress(&name),
        RegistryOp::Enable(name) => reg.enable(&name),
    }
}

// ── Batch driver ──────────────────────────────────────────────────────────────

/// Outcome of a batch run that got past configuration.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub failed: Vec<Error>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the evaluator selected by `config`.
pub fn make_evaluator(kind: EvaluatorKind) -> Result<Box<dyn Evaluator>, Error> {
    match kind {
        EvaluatorKind::Script => Ok(Box::new(crate::script::ScriptEvaluator::new())),
        #[cfg(feature = "lua")]
        EvaluatorKind::Lua => crate::lua::LuaEvaluator::new()
            .map(|ev| Box::new(ev) as Box<dyn Evaluator>)
            .map_err(|e| Error::Setup(e.to_string())),
    }
}

/// Run a whole invocation: configure, then expand every input.
///
/// Configuration failures abort the run (`Err`).  A failing input is
/// recorded in the report and the remaining inputs are still processed.
pub fn run(config: &Config) -> Result<RunReport, Error> {
    let evaluator = make_evaluator(config.evaluator)?;
    let mut ps = match &config.output {
        Some(path) => {
            let label = path.display().to_string();
            let file = fs::File::create(path).map_err(|e| Error::io(&label, e))?;
            ProcessState::with_output(evaluator, Box::new(io::BufWriter::new(file)), label)
        }
        None => ProcessState::new(evaluator),
    };
    ps.set_interactive(config.interactive);
    configure(&mut ps, config)?;

    let mut report = RunReport::default();
    if config.files.is_empty() {
        record(&mut report, ps.process_file(None, None))?;
    } else {
        for file in &config.files {
            let out = config.output_for(file);
            record(&mut report, ps.process_file(Some(file), out.as_deref()))?;
        }
    }
    Ok(report)
}

/// Count one input.  A per-file failure is logged and kept; a fatal one
/// ends the run.
fn record(report: &mut RunReport, result: Result<(), Error>) -> Result<(), Error> {
    report.processed += 1;
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::error!("{e}");
            report.failed.push(e);
            Ok(())
        }
    }
}

/// Apply the setup steps of `config` in order: init script, configuration
/// scripts, inline commands, then separator options.
pub fn configure(ps: &mut ProcessState, config: &Config) -> Result<(), Error> {
    if let Some(init) = &config.init_script {
        if init.exists() {
            ps.run_script(init)?;
        } else {
            log::warn!("MUCGLY env set, but the file {:?} does not exist", init.display().to_string());
        }
    }
    for script in &config.configs {
        ps.run_script(script)?;
    }
    for cmd in &config.cli_cmds {
        ps.run_command(cmd)?;
    }
    config.separators.apply(ps.registry_mut())?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    /// Writes the body upper-cased; `!` fails.
    struct Upper;

    impl Evaluator for Upper {
        fn evaluate(&mut self, body: &str, _ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
            if body.trim() == "!" {
                return Err("bang".into());
            }
            Ok(EvalOutcome::text(body.trim().to_uppercase()))
        }

        fn load_file(&mut self, _path: &Path, _ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
            Ok(EvalOutcome::default())
        }

        fn reset(&mut self) {}

        fn name(&self) -> &str {
            "upper"
        }
    }

    fn expand(src: &str) -> Result<String, Error> {
        let mut ps = ProcessState::new(Box::new(Upper));
        ps.expand("t", src.as_bytes()).map(|b| String::from_utf8(b).unwrap())
    }

    #[test]
    fn substitutes_hooks() {
        assert_eq!(expand("a -< x >- b").unwrap(), "a X b");
        assert_eq!(expand("no hooks").unwrap(), "no hooks");
    }

    #[test]
    fn eval_error_has_hook_location() {
        let err = expand("ok\n  -< ! >-").unwrap_err();
        assert_eq!(err.to_string(), "t:2:3: bang");
        let mut ps = ProcessState::new(Box::new(Upper));
        assert!(ps.expand("t", b"-< ! >-").is_err());
        assert_eq!(ps.depth(), 1);
    }

    #[test]
    fn directives_bypass_evaluator() {
        assert_eq!(expand("-<:hookbeg {{>-a {{b>- c").unwrap(), "a B c");
        assert!(matches!(expand("-<:nope>-"), Err(Error::Eval { .. })));
    }

    #[test]
    fn registry_errors_become_eval_errors() {
        let err = expand("-<:unhook ghost>-").unwrap_err();
        assert!(matches!(err, Error::Eval { .. }), "{err:?}");
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn hook_changes_do_not_leak_between_inputs() {
        let mut ps = ProcessState::new(Box::new(Upper));
        ps.expand("one", b"-<:hookbeg {{>-").unwrap();
        assert_eq!(ps.expand("two", b"-<x>-").unwrap(), b"X");
    }

    #[test]
    fn commands_configure_root() {
        let mut ps = ProcessState::new(Box::new(Upper));
        ps.run_command(":hookall @").unwrap();
        assert_eq!(ps.registry().default_pair().begin, "@");
        assert_eq!(ps.expand("t", b"a @b@ c").unwrap(), b"a B c");
        assert!(ps.run_command(":hookbeg \"\"").is_err());
    }

    #[test]
    fn record_keeps_file_errors_and_stops_on_fatal() {
        let mut report = RunReport::default();
        let loc = Location::new(&Arc::from("t"), Position::default());
        record(&mut report, Err(Error::eval(&loc, "bad"))).unwrap();
        record(&mut report, Ok(())).unwrap();
        assert!(record(&mut report, Err(Error::Setup("no lua".into()))).is_err());
        assert_eq!(report.processed, 3);
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn invalid_utf8_body_is_eval_error() {
        let mut ps = ProcessState::new(Box::new(Upper));
        let err = ps.expand("t", b"ok -<\xff>-").unwrap_err();
        assert!(matches!(err, Error::Eval { .. }), "{err:?}");
        assert!(err.to_string().starts_with("t:1:"), "{err}");
        assert!(err.to_string().contains("hook body is not valid UTF-8"), "{err}");
    }

    #[test]
    fn apply_registry_ops() {
        let mut reg = Registry::new();
        apply_registry(&mut reg, RegistryOp::SetEscape(String::new())).unwrap();
        apply_registry(
            &mut reg,
            RegistryOp::Register { name: None, begin: "((".into(), end: "))".into(), escape: None },
        )
        .unwrap();
        assert_eq!(reg.get("((").unwrap().escape, "");
        assert!(apply_registry(&mut reg, RegistryOp::Enable("x".into())).is_err());
    }
}
