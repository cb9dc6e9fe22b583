/// End-to-end expansion tests: text in, text out, through `ProcessState`
/// with either a stub evaluator or the built-in macro language.
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use mucgly::config::{Config, Separators};
use mucgly::eval::{EvalOutcome, Evaluator, HookContext};
use mucgly::process::{self, ProcessState};
use mucgly::script::ScriptEvaluator;
use mucgly::Error;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Writes the trimmed body upper-cased; a body of `!` fails.
struct Upper;

impl Evaluator for Upper {
    fn evaluate(&mut self, body: &str, _ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        match body.trim() {
            "!" => Err("bang".into()),
            b => Ok(EvalOutcome::text(b.to_uppercase())),
        }
    }

    fn load_file(&mut self, _path: &Path, _ctx: &HookContext<'_>) -> Result<EvalOutcome, String> {
        Ok(EvalOutcome::default())
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "upper"
    }
}

/// Process output that the test can inspect afterwards.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn script() -> ProcessState {
    ProcessState::new(Box::new(ScriptEvaluator::new()))
}

fn expand_with(ps: &mut ProcessState, src: &str) -> Result<String, Error> {
    ps.expand("t", src.as_bytes()).map(|b| String::from_utf8(b).unwrap())
}

fn expand(src: &str) -> String {
    expand_with(&mut script(), src).expect("expansion failed")
}

fn upper(src: &str) -> String {
    expand_with(&mut ProcessState::new(Box::new(Upper)), src).expect("expansion failed")
}

// ── Scanning ──────────────────────────────────────────────────────────────────

#[test]
fn text_without_hooks_is_unchanged() {
    let src = "int main() { return a > -1 && b < 2; }\n\ttabs\r\nand é\n";
    assert_eq!(expand(src), src);
    assert_eq!(expand(""), "");
}

#[test]
fn basic_substitution() {
    assert_eq!(expand("a -<1+1>- b"), "a 2 b");
    assert_eq!(expand("-<'x'>--<'y'>-"), "xy");
}

#[test]
fn nested_hook_is_one_body() {
    assert_eq!(upper("a -< x -< y >- z >- b"), "a X -< Y >- Z b");
}

#[test]
fn escapes_inside_and_outside() {
    assert_eq!(expand(r"a \-< b -<'\>-'>-"), "a -< b >-");
    assert_eq!(expand(r"lone \ backslash"), r"lone \ backslash");
}

#[test]
fn substitution_is_not_rescanned() {
    assert_eq!(expand("-<'-<1>-'>-"), "-<1>-");
}

#[test]
fn longest_begin_wins() {
    let mut ps = ProcessState::new(Box::new(Upper));
    ps.registry_mut().register_multi(&["(", ")", "rx(", ")"]).unwrap();
    assert_eq!(expand_with(&mut ps, "a rx(b) (c)").unwrap(), "a B C");
}

#[test]
fn equal_begins_use_first_registered() {
    let mut ps = ProcessState::new(Box::new(Upper));
    ps.registry_mut().register(Some("first"), "<<", ">>", None).unwrap();
    ps.registry_mut().register(Some("second"), "<<", "]]", None).unwrap();
    assert_eq!(expand_with(&mut ps, "<<x>> y]]").unwrap(), "X y]]");
}

#[test]
fn other_pairs_do_not_terminate_a_hook() {
    let mut ps = ProcessState::new(Box::new(Upper));
    ps.registry_mut().register_multi(&["/*..", "..*/", "_L/*", "_J*/"]).unwrap();
    assert_eq!(expand_with(&mut ps, "_L/* a ..*/ b _J*/;").unwrap(), "A ..*/ B;");
}

#[test]
fn block_and_unblock() {
    let src = r"-<:block>- -<1+1>- \-< -<:unblock>- -<1+1>-";
    assert_eq!(expand(src), r" -<1+1>- \-<  2");
}

#[test]
fn unblock_found_after_bare_begin() {
    assert_eq!(expand("-<:block>-a -< b -<:unblock>- c -<1+1>-"), "a -< b  c 2");
}

#[test]
fn unterminated_hook_fails_with_location() {
    let err = expand_with(&mut script(), "ok\n  -< 1 +").unwrap_err();
    match &err {
        Error::UnterminatedHook { location, begin } => {
            assert_eq!((location.line, location.column), (2, 3));
            assert_eq!(begin, "-<");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.to_string().starts_with("t:2:3:"));
}

#[test]
fn unterminated_while_blocked_is_text() {
    assert_eq!(expand("-<:block>-a -< b"), "a -< b");
}

// ── Evaluation ────────────────────────────────────────────────────────────────

#[test]
fn variables_persist_across_hooks_and_inputs() {
    let mut ps = script();
    assert_eq!(expand_with(&mut ps, "-<n = 20>-[-<n += 1>-]").unwrap(), "[]");
    assert_eq!(expand_with(&mut ps, "-<n * 2>-").unwrap(), "42");
}

#[test]
fn eval_error_aborts_input() {
    let mut ps = script();
    let err = expand_with(&mut ps, "a -<nope>- b").unwrap_err();
    assert!(matches!(err, Error::Eval { .. }), "{err:?}");
    assert!(err.to_string().contains("undefined variable nope"));
    assert_eq!(ps.depth(), 1);
}

#[test]
fn hook_changes_apply_to_following_text() {
    assert_eq!(expand("-<hookbeg('{{')>-{{1+2>- -<1>-"), "3 -<1>-");
    assert_eq!(expand("-<:hookall @>-@'at'@ -<1>-"), "at -<1>-");
    assert_eq!(expand(r#"-<hook("c", "/*", "*/")>-/* 6*7 */"#), "42");
}

#[test]
fn suppress_and_enable() {
    let src = r#"-<:hook c /* */>-/*1*/ -<:suppress c>-/*2*/ -<:enable c>-/*3*/"#;
    assert_eq!(expand(src), "1 /*2*/ 3");
}

// ── Eater ─────────────────────────────────────────────────────────────────────

#[test]
fn eater_after() {
    assert_eq!(expand("-<:eater _>-x -<1>-_y -<2>-z"), "x 1y 2z");
}

#[test]
fn eater_before() {
    assert_eq!(expand("-<:eater _ before>-x _-<1>- y"), "x 1 y");
}

#[test]
fn eater_both_sides() {
    assert_eq!(expand("-<eater('_', 'both')>-[_-<1>-_]"), "[1]");
}

#[test]
fn eater_set_by_a_hook_does_not_apply_to_it() {
    assert_eq!(expand("-<:eater _>-_"), "_");
}

#[test]
fn eater_cleared_after_its_own_hook() {
    // The clearing hook opened with the eater in force, so it still eats.
    assert_eq!(expand("-<:eater _>--<:eater>-_-<1>-_"), "1_");
}

// ── Frames ────────────────────────────────────────────────────────────────────

fn quoted(path: &Path) -> String {
    format!("{:?}", path.display().to_string())
}

#[test]
fn include_splices_at_hook_site() {
    let dir = tempfile::tempdir().unwrap();
    let inc = dir.path().join("inc.txt");
    fs::write(&inc, "<-<x * 2>->").unwrap();

    let src = format!("-<x = 5>-[-<:include {}>-]", quoted(&inc));
    assert_eq!(expand(&src), "[<10>]");
}

#[test]
fn include_lands_between_surrounding_writes() {
    let dir = tempfile::tempdir().unwrap();
    let inc = dir.path().join("inc.txt");
    fs::write(&inc, "INC").unwrap();
    let src = format!("[-<write('A'), include({}), write('B')>-]", quoted(&inc));
    assert_eq!(expand(&src), "[AINCB]");
}

#[test]
fn include_frame_changes_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let inc = dir.path().join("inc.txt");
    fs::write(&inc, "-<:eater _>--<:hookbeg {{>-{{1+1>-").unwrap();

    let src = format!("[-<include({})>-] -<3>-_ {{{{4>-", quoted(&inc));
    assert_eq!(expand(&src), "[2] 3_ {{4>-");
}

#[test]
fn recursive_include_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let inc = dir.path().join("self.txt");
    fs::write(&inc, format!("again -<:include {}>-", quoted(&inc))).unwrap();

    let mut ps = script();
    let src = format!("-<:include {}>-", quoted(&inc));
    let err = expand_with(&mut ps, &src).unwrap_err();
    assert!(err.to_string().contains("recursive include"), "{err}");
    assert_eq!(ps.depth(), 1);
}

#[test]
fn missing_include_is_io_error() {
    let err = expand_with(&mut script(), "-<:include /no/such/file>-").unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err:?}");
}

#[test]
fn output_redirect_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let side = dir.path().join("side.txt");

    let src = format!("a -<:output {}>-hidden -<1>--<:close>- b", quoted(&side));
    assert_eq!(expand(&src), "a  b");
    assert_eq!(fs::read_to_string(&side).unwrap(), "hidden 1");
}

#[test]
fn output_redirect_closed_at_end_of_input() {
    let dir = tempfile::tempdir().unwrap();
    let side = dir.path().join("tail.txt");

    let src = format!("head -<output({})>-tail", quoted(&side));
    assert_eq!(expand(&src), "head ");
    assert_eq!(fs::read_to_string(&side).unwrap(), "tail");
}

#[test]
fn source_runs_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib.mcg");
    fs::write(&lib, "# helpers\nwidth = 8\n:eater _\n").unwrap();

    let src = format!("-<:source {}>-[-<pad('ab', width)>-_]", quoted(&lib));
    assert_eq!(expand(&src), "[ab      ]");
}

// ── Interactive ───────────────────────────────────────────────────────────────

#[test]
fn interactive_flushes_after_each_hook() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "a -<1>- b -< ! >- c").unwrap();

    let buf = SharedBuf::default();
    let mut ps = ProcessState::with_output(Box::new(Upper), Box::new(buf.clone()), "buf");
    ps.set_interactive(true);
    assert!(ps.process_file(Some(&input), None).is_err());
    assert_eq!(buf.text(), "a 1");
}

#[test]
fn batch_output_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "a -<1>- b -< ! >- c").unwrap();

    let buf = SharedBuf::default();
    let mut ps = ProcessState::with_output(Box::new(Upper), Box::new(buf.clone()), "buf");
    assert!(ps.process_file(Some(&input), None).is_err());
    assert_eq!(buf.text(), "");

    fs::write(&input, "a -<x>- b").unwrap();
    ps.process_file(Some(&input), None).unwrap();
    assert_eq!(buf.text(), "a X b");
}

// ── Batch runs ────────────────────────────────────────────────────────────────

#[test]
fn run_continues_past_failing_input() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.rx.txt");
    let bad = dir.path().join("bad.rx.txt");
    let other = dir.path().join("other.rx.txt");
    fs::write(&good, "g -<1+1>-").unwrap();
    fs::write(&bad, "b -< 1 +").unwrap();
    fs::write(&other, "o -<'k'>-").unwrap();

    let config = Config {
        files: vec![good, bad, other],
        genout: Some(".rx".into()),
        ..Config::default()
    };
    let report = process::run(&config).unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_success());

    assert_eq!(fs::read_to_string(dir.path().join("good.txt")).unwrap(), "g 2");
    assert_eq!(fs::read_to_string(dir.path().join("other.txt")).unwrap(), "o k");
    assert!(!dir.path().join("bad.txt").exists());
}

#[test]
fn setup_order_init_configs_commands_separators() {
    let dir = tempfile::tempdir().unwrap();
    let init = dir.path().join("init.mcg");
    let cfg = dir.path().join("cfg.mcg");
    let input = dir.path().join("page.rx.txt");
    fs::write(&init, "who = 'init'\n").unwrap();
    fs::write(&cfg, "who = who + '+cfg'\n:hookbeg {{\n").unwrap();
    fs::write(&input, "<<who>- {{who>-").unwrap();

    let config = Config {
        files: vec![input],
        genout: Some(".rx".into()),
        init_script: Some(init),
        configs: vec![cfg],
        cli_cmds: vec!["who += '+cli'".into()],
        separators: Separators { begin: Some("<<".into()), ..Separators::default() },
        ..Config::default()
    };
    assert!(process::run(&config).unwrap().is_success());
    assert_eq!(
        fs::read_to_string(dir.path().join("page.txt")).unwrap(),
        "init+cfg+cli {{who>-"
    );
}

#[test]
fn missing_init_script_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("x.rx");
    fs::write(&input, "-<1>-").unwrap();

    let config = Config {
        files: vec![input],
        genout: Some(".rx".into()),
        init_script: Some(dir.path().join("missing.mcg")),
        ..Config::default()
    };
    assert!(process::run(&config).unwrap().is_success());
    assert_eq!(fs::read_to_string(dir.path().join("x")).unwrap(), "1");
}

#[test]
fn failing_config_script_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("x.rx");
    fs::write(&input, "-<1>-").unwrap();

    let config = Config {
        files: vec![input],
        genout: Some(".rx".into()),
        configs: vec![dir.path().join("missing.mcg")],
        ..Config::default()
    };
    assert!(process::run(&config).is_err());
    assert!(!dir.path().join("x").exists());
}

#[test]
fn empty_input_with_genout_creates_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("e.rx.txt");
    fs::write(&input, "").unwrap();

    let config = Config { files: vec![input], genout: Some(".rx".into()), ..Config::default() };
    assert!(process::run(&config).unwrap().is_success());
    assert_eq!(fs::read_to_string(dir.path().join("e.txt")).unwrap(), "");
}
