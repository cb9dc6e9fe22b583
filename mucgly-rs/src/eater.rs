//! Eater: a marker character dropped next to a substitution site.
//!
//! A template line such as `int x = -<value>-;` keeps the host syntax valid
//! when written `int x = -<value>-_;` with `_` as the eater: the `_` after the
//! hook disappears from the output.

use std::fmt;
use std::str::FromStr;

/// Which side(s) of a hook the eater looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EaterSide {
    Before,
    #[default]
    After,
    Both,
}

impl EaterSide {
    pub fn eats_before(self) -> bool {
        matches!(self, EaterSide::Before | EaterSide::Both)
    }

    pub fn eats_after(self) -> bool {
        matches!(self, EaterSide::After | EaterSide::Both)
    }
}

impl FromStr for EaterSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "before" => Ok(EaterSide::Before),
            "after" => Ok(EaterSide::After),
            "both" => Ok(EaterSide::Both),
            other => Err(format!("unknown eater side {other:?} (expected before, after or both)")),
        }
    }
}

impl fmt::Display for EaterSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EaterSide::Before => "before",
            EaterSide::After => "after",
            EaterSide::Both => "both",
        })
    }
}

/// The eater configured for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eater {
    pub ch: char,
    pub side: EaterSide,
}

impl Eater {
    pub fn new(ch: char, side: EaterSide) -> Self {
        Eater { ch, side }
    }

    /// Parse the first character of `s` as the eater.  An empty string is
    /// an error; extra characters are rejected too so typos surface.
    pub fn parse(s: &str, side: EaterSide) -> Result<Self, String> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(Eater::new(ch, side)),
            (None, _) => Err("eater must be one character, got an empty string".into()),
            (Some(_), Some(_)) => Err(format!("eater must be one character, got {s:?}")),
        }
    }

    /// UTF-8 encoding of the eater character.
    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = [0u8; 4];
        self.ch.encode_utf8(&mut buf).as_bytes().to_vec()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
