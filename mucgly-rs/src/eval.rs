//! Evaluator bridge.
//!
//! The engine never interprets a macro body itself (apart from the `:`
//! directives in [`crate::directive`]).  It hands the body to an
//! [`Evaluator`] and gets back an [`EvalOutcome`]: the text to splice in and
//! an ordered list of [`Mutation`]s the engine applies before splicing.
//!
//! Evaluators never touch the registry or the frame stack directly; they only
//! describe what should change.  This keeps all state owned by
//! [`crate::process::ProcessState`].

use std::path::{Path, PathBuf};

use crate::eater::EaterSide;
use crate::hook::{HookPair, Registry};
use crate::scan::Location;

// ── Mutations ─────────────────────────────────────────────────────────────────

/// Change to the current frame's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    SetDefault { begin: String, end: String, escape: Option<String> },
    SetBegin(String),
    SetEnd(String),
    SetEscape(String),
    Register { name: Option<String>, begin: String, end: String, escape: Option<String> },
    Remove(String),
    Suppress(String),
    Enable(String),
}

/// Change to the frame stack or the current frame's scan state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackOp {
    Block,
    Unblock,
    /// Process a file in a new frame; its output lands at the hook site.
    Include(PathBuf),
    /// Send the current frame's output to a file (`Some`) or back to the
    /// caller (`None`).
    Redirect(Option<PathBuf>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EaterOp {
    Set { ch: char, side: EaterSide },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Registry(RegistryOp),
    Stack(StackOp),
    Eater(EaterOp),
}

impl From<RegistryOp> for Mutation {
    fn from(op: RegistryOp) -> Self {
        Mutation::Registry(op)
    }
}

impl From<StackOp> for Mutation {
    fn from(op: StackOp) -> Self {
        Mutation::Stack(op)
    }
}

impl From<EaterOp> for Mutation {
    fn from(op: EaterOp) -> Self {
        Mutation::Eater(op)
    }
}

/// Build the register mutations for a flat `[begin, end, …]` list.
pub fn multihook_ops<S: AsRef<str>>(seps: &[S]) -> Result<Vec<Mutation>, String> {
    if seps.len() % 2 != 0 {
        return Err(crate::error::ConfigError::OddMultiHook(seps.len()).to_string());
    }
    Ok(seps
        .chunks(2)
        .map(|c| {
            RegistryOp::Register {
                name: None,
                begin: c[0].as_ref().to_owned(),
                end: c[1].as_ref().to_owned(),
                escape: None,
            }
            .into()
        })
        .collect())
}

// ── Outcome / context ─────────────────────────────────────────────────────────

/// One write or mutation, in the order the evaluator issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Write(String),
    Mutate(Mutation),
}

/// Result of evaluating one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalOutcome {
    /// Output fragments; concatenated they form the substitution.
    pub writes: Vec<String>,
    pub mutations: Vec<Mutation>,
    /// Number of writes issued before each mutation.
    issued_after: Vec<usize>,
}

impl EvalOutcome {
    pub fn text(s: impl Into<String>) -> Self {
        let mut out = EvalOutcome::default();
        out.write(s);
        out
    }

    pub fn from_mutations(mutations: impl IntoIterator<Item = Mutation>) -> Self {
        let mut out = EvalOutcome::default();
        out.extend(mutations);
        out
    }

    pub fn write(&mut self, s: impl Into<String>) {
        self.writes.push(s.into());
    }

    pub fn push(&mut self, m: impl Into<Mutation>) {
        self.issued_after.push(self.writes.len());
        self.mutations.push(m.into());
    }

    pub fn extend(&mut self, mutations: impl IntoIterator<Item = Mutation>) {
        for m in mutations {
            self.push(m);
        }
    }

    pub fn substitution(&self) -> String {
        self.writes.concat()
    }

    /// Writes and mutations interleaved as they were issued.
    pub fn into_steps(self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(self.writes.len() + self.mutations.len());
        let mut writes = self.writes.into_iter();
        let mut emitted = 0;
        for (i, m) in self.mutations.into_iter().enumerate() {
            let before = self.issued_after.get(i).copied().unwrap_or(usize::MAX);
            while emitted < before {
                match writes.next() {
                    Some(w) => steps.push(Step::Write(w)),
                    None => break,
                }
                emitted += 1;
            }
            steps.push(Step::Mutate(m));
        }
        steps.extend(writes.map(Step::Write));
        steps
    }
}

/// What the evaluator may see of the engine while evaluating a body.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Where the hook (or script line) starts.
    pub location: &'a Location,
    /// Number of frames on the stack, root included.
    pub depth: usize,
    /// Pair that opened the hook; `None` for configuration scripts.
    pub pair: Option<&'a HookPair>,
    pub registry: &'a Registry,
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// A macro language.
///
/// Errors are plain messages; the engine attaches the location.
pub trait Evaluator {
    /// Evaluate one hook body.
    fn evaluate(&mut self, body: &str, ctx: &HookContext<'_>) -> Result<EvalOutcome, String>;

    /// Run a whole script file (configuration scripts, `:source`).
    fn load_file(&mut self, path: &Path, ctx: &HookContext<'_>) -> Result<EvalOutcome, String>;

    /// Drop all macro state.
    fn reset(&mut self);

    fn name(&self) -> &str;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&mut self, body: &str, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        (**self).evaluate(body, ctx)
    }

    fn load_file(&mut self, path: &Path, ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        (**self).load_file(path, ctx)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multihook_pairs_up() {
        let ops = multihook_ops(&["/*..", "..*/", "_L/*", "_J*/"]).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[1],
            Mutation::Registry(RegistryOp::Register {
                name: None,
                begin: "_L/*".into(),
                end: "_J*/".into(),
                escape: None,
            })
        );
    }

    #[test]
    fn multihook_odd_is_error() {
        let err = multihook_ops(&["rx(", ")", "("]).unwrap_err();
        assert!(err.contains("even number"), "{err}");
    }

    #[test]
    fn steps_keep_issue_order() {
        let mut out = EvalOutcome::default();
        out.write("A");
        out.push(StackOp::Include("inc.txt".into()));
        out.write("B");
        out.push(StackOp::Block);
        assert_eq!(
            out.into_steps(),
            vec![
                Step::Write("A".into()),
                Step::Mutate(Mutation::Stack(StackOp::Include("inc.txt".into()))),
                Step::Write("B".into()),
                Step::Mutate(Mutation::Stack(StackOp::Block)),
            ]
        );
    }

    #[test]
    fn mutations_without_writes_come_first() {
        let out = EvalOutcome::from_mutations(vec![StackOp::Unblock.into()]);
        assert_eq!(out.into_steps(), vec![Step::Mutate(Mutation::Stack(StackOp::Unblock))]);
    }

    #[test]
    fn outcome_concatenates_writes() {
        let mut out = EvalOutcome::text("a");
        out.write("b");
        out.push(StackOp::Block);
        assert_eq!(out.substitution(), "ab");
        assert_eq!(out.mutations, vec![Mutation::Stack(StackOp::Block)]);
    }
}
