//! The frame stack.
//!
//! Strict LIFO.  The bottom frame is the root: it carries the process-wide
//! registry that configuration scripts and CLI options modify, and it is
//! never popped.

use crate::frame::Frame;

#[derive(Debug)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    pub fn new(root: Frame) -> Self {
        Stack { frames: vec![root] }
    }

    /// Number of frames, root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn root(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn root_mut(&mut self) -> &mut Frame {
        &mut self.frames[0]
    }

    pub fn current(&self) -> &Frame {
        // Never empty: the root cannot be popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    pub fn push(&mut self, frame: Frame) {
        log::debug!("push frame {} (depth {})", frame.label, self.frames.len() + 1);
        self.frames.push(frame);
    }

    /// Remove and return the current frame.  `None` at the root.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return None;
        }
        let frame = self.frames.pop()?;
        log::debug!("pop frame {} (depth {})", frame.label, self.frames.len());
        Some(frame)
    }

    /// Pop frames until `depth` remain, discarding them.  Used after a
    /// failure deep inside nested includes.
    pub fn unwind(&mut self, depth: usize) {
        while self.frames.len() > depth.max(1) {
            let _ = self.pop();
        }
    }

    /// `true` if any frame on the stack is already reading `label`.
    pub fn contains_label(&self, label: &str) -> bool {
        self.frames.iter().any(|f| &*f.label == label)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
