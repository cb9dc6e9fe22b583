//! Hook separators and the separator registry.
//!
//! A [`HookPair`] is the `(begin, end, escape)` delimiter triple that marks a
//! macro region in the input.  A [`Registry`] holds the anonymous default pair
//! plus any number of additional pairs that are active at the same time
//! ("multi-hook").
//!
//! ## Begin-sequence resolution
//!
//! The registry compiles every active begin sequence (and every
//! `escape + begin` combination) into one leftmost-longest Aho-Corasick
//! automaton.  At a given input position:
//!
//! 1. the longest begin sequence wins (`rx(` beats `(`);
//! 2. among equally long candidates the pair registered first wins
//!    (the default pair counts as registered first).
//!
//! An `escape + begin` candidate starts one escape-length earlier than the
//! bare begin, so leftmost matching finds the escaped form first.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::error::ConfigError;

/// Default hook begin separator.
pub const DEFAULT_BEGIN: &str = "-<";
/// Default hook end separator.
pub const DEFAULT_END: &str = ">-";
/// Default hook escape.
pub const DEFAULT_ESCAPE: &str = "\\";

// ── HookPair ──────────────────────────────────────────────────────────────────

/// One delimiter triple.  `escape` may be empty (escaping disabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookPair {
    pub begin: String,
    pub end: String,
    pub escape: String,
    /// `None` only for the registry's default pair.
    pub name: Option<String>,
}

impl HookPair {
    /// Build an unnamed pair, rejecting empty begin/end separators.
    pub fn new(
        begin: impl Into<String>,
        end: impl Into<String>,
        escape: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pair = HookPair {
            begin: begin.into(),
            end: end.into(),
            escape: escape.into(),
            name: None,
        };
        pair.validate()?;
        Ok(pair)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registry key: the name, or the begin separator for unnamed pairs.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(self.begin.as_str())
    }

    /// Begin and end are the same string; such a pair never nests.
    pub fn is_symmetric(&self) -> bool {
        self.begin == self.end
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.begin.is_empty() {
            return Err(ConfigError::EmptySeparator("hookbeg"));
        }
        if self.end.is_empty() {
            return Err(ConfigError::EmptySeparator("hookend"));
        }
        Ok(())
    }
}

impl Default for HookPair {
    fn default() -> Self {
        HookPair {
            begin: DEFAULT_BEGIN.to_owned(),
            end: DEFAULT_END.to_owned(),
            escape: DEFAULT_ESCAPE.to_owned(),
            name: None,
        }
    }
}

// ── BeginMatch ────────────────────────────────────────────────────────────────

/// A begin sequence found by [`Registry::find_begin`].
///
/// `start..end` covers the escape too when `escaped` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginMatch<'r> {
    pub start: usize,
    pub end: usize,
    pub pair: &'r HookPair,
    pub escaped: bool,
}

// ── Matcher ───────────────────────────────────────────────────────────────────

/// Where a compiled pattern came from.  `None` is the default pair.
type Slot = Option<usize>;

#[derive(Debug, Clone)]
struct Pattern {
    bytes: Vec<u8>,
    slot: Slot,
    escaped: bool,
}

#[derive(Debug, Clone)]
struct Matcher {
    ac: AhoCorasick,
    patterns: Vec<Pattern>,
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Ordered set of hook pairs with one anonymous default.
///
/// Cloned by value into every frame; never shared.
#[derive(Debug, Clone)]
pub struct Registry {
    default: HookPair,
    pairs: Vec<HookPair>,
    /// Keys of individually disabled pairs.
    suppressed: Vec<String>,
    matcher: Matcher,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_default(HookPair::default())
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: HookPair) -> Self {
        let mut reg = Registry {
            default: HookPair { name: None, ..default },
            pairs: Vec::new(),
            suppressed: Vec::new(),
            matcher: Matcher { ac: AhoCorasick::new(Vec::<&str>::new()), patterns: Vec::new() },
        };
        reg.rebuild();
        reg
    }

    pub fn default_pair(&self) -> &HookPair {
        &self.default
    }

    /// Replace the default pair.  `escape = None` keeps the current escape.
    pub fn set_default(
        &mut self,
        begin: &str,
        end: &str,
        escape: Option<&str>,
    ) -> Result<(), ConfigError> {
        let escape = escape.unwrap_or(self.default.escape.as_str());
        self.default = HookPair::new(begin, end, escape)?;
        self.rebuild();
        Ok(())
    }

    pub fn set_begin(&mut self, begin: &str) -> Result<(), ConfigError> {
        let (end, escape) = (self.default.end.clone(), self.default.escape.clone());
        self.set_default(begin, &end, Some(&escape))
    }

    pub fn set_end(&mut self, end: &str) -> Result<(), ConfigError> {
        let (begin, escape) = (self.default.begin.clone(), self.default.escape.clone());
        self.set_default(&begin, end, Some(&escape))
    }

    /// An empty escape disables escaping for the default pair.
    pub fn set_escape(&mut self, escape: &str) {
        self.default.escape = escape.to_owned();
        self.rebuild();
    }

    /// Add a pair, or overwrite in place the pair with the same key.
    ///
    /// Unnamed pairs are keyed by their begin separator.  `escape = None`
    /// inherits the default pair's escape.
    pub fn register(
        &mut self,
        name: Option<&str>,
        begin: &str,
        end: &str,
        escape: Option<&str>,
    ) -> Result<(), ConfigError> {
        let escape = escape.unwrap_or(self.default.escape.as_str());
        let pair = HookPair::new(begin, end, escape)?;
        let pair = match name {
            Some(n) => pair.named(n),
            None => {
                let key = pair.begin.clone();
                pair.named(key)
            }
        };
        match self.pairs.iter_mut().find(|p| p.key() == pair.key()) {
            Some(slot) => *slot = pair,
            None => self.pairs.push(pair),
        }
        self.rebuild();
        Ok(())
    }

    /// Register a flat `[begin, end, begin, end, …]` list.
    pub fn register_multi<S: AsRef<str>>(&mut self, seps: &[S]) -> Result<(), ConfigError> {
        if seps.len() % 2 != 0 {
            return Err(ConfigError::OddMultiHook(seps.len()));
        }
        for chunk in seps.chunks(2) {
            self.register(None, chunk[0].as_ref(), chunk[1].as_ref(), None)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<HookPair, ConfigError> {
        let idx = self.index_of(name)?;
        self.suppressed.retain(|k| k != name);
        let pair = self.pairs.remove(idx);
        self.rebuild();
        Ok(pair)
    }

    /// Disable a registered pair without forgetting it.
    pub fn suppress(&mut self, name: &str) -> Result<(), ConfigError> {
        self.index_of(name)?;
        if !self.suppressed.iter().any(|k| k == name) {
            self.suppressed.push(name.to_owned());
            self.rebuild();
        }
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<(), ConfigError> {
        self.index_of(name)?;
        self.suppressed.retain(|k| k != name);
        self.rebuild();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HookPair> {
        self.pairs.iter().find(|p| p.key() == name)
    }

    /// Registered pairs other than the default, in registration order.
    pub fn pairs(&self) -> impl Iterator<Item = &HookPair> {
        self.pairs.iter()
    }

    pub fn is_suppressed(&self, name: &str) -> bool {
        self.suppressed.iter().any(|k| k == name)
    }

    /// Enabled pairs in resolution order: the default first, then the
    /// registered pairs in insertion order.
    pub fn active(&self) -> Vec<&HookPair> {
        std::iter::once(&self.default)
            .chain(self.pairs.iter().filter(|p| !self.is_suppressed(p.key())))
            .collect()
    }

    /// Find the leftmost begin sequence in `hay`.
    pub fn find_begin(&self, hay: &[u8]) -> Option<BeginMatch<'_>> {
        let m = self.matcher.ac.find(hay)?;
        let text = &hay[m.start()..m.end()];
        // Equal strings from several pairs: the earliest registered wins.
        let pat = self.matcher.patterns.iter().find(|p| p.bytes == text)?;
        Some(BeginMatch {
            start: m.start(),
            end: m.end(),
            pair: self.slot(pat.slot),
            escaped: pat.escaped,
        })
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn index_of(&self, name: &str) -> Result<usize, ConfigError> {
        self.pairs
            .iter()
            .position(|p| p.key() == name)
            .ok_or_else(|| ConfigError::UnknownPair(name.to_owned()))
    }

    fn slot(&self, slot: Slot) -> &HookPair {
        match slot {
            Some(i) => &self.pairs[i],
            None => &self.default,
        }
    }

    fn rebuild(&mut self) {
        let slots = std::iter::once((None, &self.default)).chain(
            self.pairs
                .iter()
                .enumerate()
                .filter(|(_, p)| !self.is_suppressed(p.key()))
                .map(|(i, p)| (Some(i), p)),
        );

        let mut patterns = Vec::new();
        for (slot, pair) in slots {
            patterns.push(Pattern { bytes: pair.begin.as_bytes().to_vec(), slot, escaped: false });
            if !pair.escape.is_empty() {
                let mut bytes = pair.escape.as_bytes().to_vec();
                bytes.extend_from_slice(pair.begin.as_bytes());
                patterns.push(Pattern { bytes, slot, escaped: true });
            }
        }

        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(patterns.iter().map(|p| &p.bytes));
        self.matcher = Matcher { ac, patterns };
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(reg: &Registry) -> Vec<String> {
        reg.active().iter().map(|p| p.key().to_owned()).collect()
    }

    #[test]
    fn default_separators() {
        let reg = Registry::new();
        let d = reg.default_pair();
        assert_eq!((d.begin.as_str(), d.end.as_str(), d.escape.as_str()), ("-<", ">-", "\\"));
        assert_eq!(reg.active().len(), 1);
    }

    #[test]
    fn empty_separators_rejected() {
        let mut reg = Registry::new();
        assert_eq!(
            reg.register(Some("x"), "", ")", None),
            Err(ConfigError::EmptySeparator("hookbeg"))
        );
        assert_eq!(
            reg.register(Some("x"), "(", "", None),
            Err(ConfigError::EmptySeparator("hookend"))
        );
        assert!(reg.set_begin("").is_err());
        assert_eq!(reg.default_pair().begin, "-<");
    }

    #[test]
    fn register_overwrites_in_place() {
        let mut reg = Registry::new();
        reg.register(Some("a"), "<a", "a>", None).unwrap();
        reg.register(Some("b"), "<b", "b>", None).unwrap();
        reg.register(Some("a"), "[a", "a]", Some("")).unwrap();
        let pairs: Vec<_> = reg.pairs().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].begin, "[a");
        assert_eq!(pairs[0].escape, "");
        assert_eq!(pairs[1].key(), "b");
    }

    #[test]
    fn unnamed_pairs_keyed_by_begin() {
        let mut reg = Registry::new();
        reg.register(None, "/*..", "..*/", None).unwrap();
        reg.register(None, "/*..", "!!*/", None).unwrap();
        assert_eq!(reg.pairs().count(), 1);
        assert_eq!(reg.get("/*..").unwrap().end, "!!*/");
        assert_eq!(reg.get("/*..").unwrap().escape, "\\");
    }

    #[test]
    fn odd_multi_list_rejected() {
        let mut reg = Registry::new();
        assert_eq!(reg.register_multi(&["a", "b", "c"]), Err(ConfigError::OddMultiHook(3)));
        assert_eq!(reg.pairs().count(), 0);
        reg.register_multi(&["/*..", "..*/", "_L/*", "_J*/"]).unwrap();
        assert_eq!(keys(&reg), vec!["-<", "/*..", "_L/*"]);
    }

    #[test]
    fn suppress_and_enable() {
        let mut reg = Registry::new();
        reg.register(Some("p"), "((", "))", None).unwrap();
        reg.suppress("p").unwrap();
        assert_eq!(keys(&reg), vec!["-<"]);
        assert!(reg.find_begin(b"x ((y))").is_none());
        reg.enable("p").unwrap();
        assert_eq!(reg.find_begin(b"x ((y))").unwrap().start, 2);
        assert_eq!(reg.suppress("nope"), Err(ConfigError::UnknownPair("nope".into())));
    }

    #[test]
    fn remove_pair() {
        let mut reg = Registry::new();
        reg.register(Some("p"), "((", "))", None).unwrap();
        assert_eq!(reg.remove("p").unwrap().begin, "((");
        assert!(reg.get("p").is_none());
        assert!(reg.remove("p").is_err());
    }

    #[test]
    fn longest_begin_wins() {
        let mut reg = Registry::new();
        reg.register(Some("paren"), "(", ")", None).unwrap();
        reg.register(Some("rx"), "rx(", ")", None).unwrap();
        let m = reg.find_begin(b"c = rx( body )").unwrap();
        assert_eq!((m.start, m.end), (4, 7));
        assert_eq!(m.pair.key(), "rx");
    }

    #[test]
    fn equal_begins_resolve_by_registration_order() {
        let mut reg = Registry::new();
        reg.register(Some("first"), "<<", ">>", None).unwrap();
        reg.register(Some("second"), "<<", "]]", None).unwrap();
        assert_eq!(reg.find_begin(b"a << b").unwrap().pair.key(), "first");

        // The default pair counts as registered first.
        reg.register(Some("shadow"), "-<", "]]", None).unwrap();
        assert_eq!(reg.find_begin(b"-<").unwrap().pair.name, None);
    }

    #[test]
    fn escaped_begin_is_reported() {
        let reg = Registry::new();
        let m = reg.find_begin(br"a \-< b").unwrap();
        assert!(m.escaped);
        assert_eq!((m.start, m.end), (2, 5));
    }

    #[test]
    fn identical_separators_escape_with_doubling() {
        let mut reg = Registry::new();
        reg.set_default("@", "@", Some("@")).unwrap();
        let m = reg.find_begin(b"x @@ y").unwrap();
        assert!(m.escaped);
        let m = reg.find_begin(b"x @y@").unwrap();
        assert!(!m.escaped);
        assert!(reg.default_pair().is_symmetric());
    }

    #[test]
    fn no_escape_when_disabled() {
        let mut reg = Registry::new();
        reg.set_escape("");
        let m = reg.find_begin(br"\-<").unwrap();
        assert!(!m.escaped);
        assert_eq!(m.start, 1);
    }
}
