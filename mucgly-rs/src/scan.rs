//! Hook scanner.
//!
//! [`Scanner`] walks an input buffer and yields [`Event`]s: runs of literal
//! text (as ranges into the source) and completed hooks.  It knows nothing
//! about evaluation; the caller passes in the registry and scan flag of the
//! current frame on every call, so configuration changes made by one hook
//! take effect for the very next event.
//!
//! ## States
//!
//! | State               | Input                         | Action                          |
//! |---------------------|-------------------------------|---------------------------------|
//! | `COPY`              | `escape begin`                | emit `begin` literally          |
//! | `COPY`              | `begin`                       | enter `IN_HOOK(pair, 1)`        |
//! | `IN_HOOK(p, d)`     | `escape end` / `escape begin` | buffer literal end / begin      |
//! | `IN_HOOK(p, d)`     | `end`                         | `d - 1`; at 0 yield the hook    |
//! | `IN_HOOK(p, d)`     | `begin`                       | `d + 1`, buffer literal begin   |
//! | `IN_HOOK(p, d > 0)` | end of input                  | unterminated hook               |
//!
//! Inside a hook only the open pair's separators are significant, and the end
//! separator is tested before the begin separator.
//!
//! With scanning disabled nothing nests or pairs up: a begin sequence opens a
//! hook only when it starts a complete unblock directive (`-<:unblock>-`),
//! and is otherwise copied as text.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::directive;
use crate::hook::{HookPair, Registry};

// ── Position / Location ───────────────────────────────────────────────────────

/// 1-based line and column (in bytes) within one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

/// A position tagged with the name of its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub source: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(source: &Arc<str>, pos: Position) -> Self {
        Location { source: Arc::clone(source), line: pos.line, column: pos.column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// A complete hook span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    /// Snapshot of the pair that opened the hook.
    pub pair: HookPair,
    /// Body with escapes resolved, separators excluded.
    pub body: Vec<u8>,
    /// Whole span in the source, separators included.
    pub span: Range<usize>,
    /// Position of the first byte of the begin separator.
    pub start: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Copy `src[range]` to the output.
    Text(Range<usize>),
    Hook(Hook),
    Eof,
}

/// End of input inside an open hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unterminated {
    pub start: Position,
    pub begin: String,
}

// ── Scanner ───────────────────────────────────────────────────────────────────

pub struct Scanner<'s> {
    src: &'s [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'s> Scanner<'s> {
    pub fn new(src: &'s [u8]) -> Self {
        Scanner { src, pos: 0, line: 1, line_start: 0 }
    }

    pub fn source(&self) -> &'s [u8] {
        self.src
    }

    /// Byte offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn position(&self) -> Position {
        Position { line: self.line, column: self.pos - self.line_start + 1 }
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Consume `prefix` if the unread input starts with it.
    pub fn skip_prefix(&mut self, prefix: &[u8]) -> bool {
        if !prefix.is_empty() && self.src[self.pos..].starts_with(prefix) {
            self.advance_to(self.pos + prefix.len());
            true
        } else {
            false
        }
    }

    /// Produce the next event.
    pub fn next_event(
        &mut self,
        registry: &Registry,
        scan_enabled: bool,
    ) -> Result<Event, Unterminated> {
        if self.is_done() {
            return Ok(Event::Eof);
        }

        let rest = &self.src[self.pos..];
        let Some(m) = registry.find_begin(rest) else {
            return Ok(self.text_until(self.src.len()));
        };

        if m.start > 0 {
            return Ok(self.text_until(self.pos + m.start));
        }

        if m.escaped {
            if !scan_enabled {
                return Ok(self.text_until(self.pos + m.end));
            }
            // Drop the escape, emit the begin separator as text.
            let begin_at = self.pos + m.end - m.pair.begin.len();
            self.advance_to(begin_at);
            return Ok(self.text_until(self.pos + m.pair.begin.len()));
        }

        if !scan_enabled {
            return Ok(self.blocked_begin(m.pair));
        }
        self.read_hook(m.pair.clone()).map(Event::Hook)
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn text_until(&mut self, end: usize) -> Event {
        let start = self.pos;
        self.advance_to(end);
        Event::Text(start..end)
    }

    /// A begin sequence met while scanning is disabled.  Yields the hook if
    /// it is an unblock directive, else the begin sequence as text.
    fn blocked_begin(&mut self, pair: &HookPair) -> Event {
        let src = self.src;
        let (begin, end) = (pair.begin.as_bytes(), pair.end.as_bytes());
        let body_start = self.pos + begin.len();
        let close = src[body_start..].windows(end.len()).position(|w| w == end);

        if let Some(len) = close {
            let body = &src[body_start..body_start + len];
            if directive::is_unblock(&String::from_utf8_lossy(body)) {
                let start = self.position();
                let span_start = self.pos;
                let span_end = body_start + len + end.len();
                self.advance_to(span_end);
                return Event::Hook(Hook {
                    pair: pair.clone(),
                    body: body.to_vec(),
                    span: span_start..span_end,
                    start,
                });
            }
        }
        self.text_until(body_start)
    }

    /// Read a hook whose begin separator starts at the current offset.
    /// On failure nothing is consumed.
    fn read_hook(&mut self, pair: HookPair) -> Result<Hook, Unterminated> {
        let start = self.position();
        let span_start = self.pos;
        let (begin, end, esc) = (pair.begin.as_bytes(), pair.end.as_bytes(), pair.escape.as_bytes());

        let mut body = Vec::new();
        let mut depth = 1usize;
        let mut i = span_start + begin.len();

        loop {
            let rest = &self.src[i..];
            if rest.is_empty() {
                return Err(Unterminated { start, begin: pair.begin.clone() });
            }

            if !esc.is_empty() && rest.starts_with(esc) {
                let after = &rest[esc.len()..];
                if after.starts_with(end) {
                    body.extend_from_slice(end);
                    i += esc.len() + end.len();
                    continue;
                }
                if after.starts_with(begin) {
                    body.extend_from_slice(begin);
                    i += esc.len() + begin.len();
                    continue;
                }
            }

            if rest.starts_with(end) {
                depth -= 1;
                i += end.len();
                if depth == 0 {
                    break;
                }
                body.extend_from_slice(end);
                continue;
            }

            if !pair.is_symmetric() && rest.starts_with(begin) {
                depth += 1;
                body.extend_from_slice(begin);
                i += begin.len();
                continue;
            }

            body.push(rest[0]);
            i += 1;
        }

        self.advance_to(i);
        Ok(Hook { pair, body, span: span_start..i, start })
    }

    fn advance_to(&mut self, end: usize) {
        let src = self.src;
        for (i, &b) in src[self.pos..end].iter().enumerate() {
            if b == b'\n' {
                self.line += 1;
                self.line_start = self.pos + i + 1;
            }
        }
        self.pos = end;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
