//! Frames: one scanning and output context per input being expanded.
//!
//! A frame owns a snapshot of the hook registry, the scan flag, the eater and
//! a pending output buffer.  Where the buffer ends up is decided by its
//! [`Sink`] when the frame finishes (or on an interactive flush).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::eater::Eater;
use crate::hook::Registry;
use crate::scan::{Location, Position};

// ── FileSink ──────────────────────────────────────────────────────────────────

/// A file that is created on first write.
///
/// An input that fails before producing anything leaves no empty file behind.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into(), file: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file if nothing was written, then flush.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            log::debug!("creating {}", self.path.display());
            self.file = Some(BufWriter::new(File::create(&self.path)?));
        }
        // Populated just above.
        self.file.as_mut().ok_or_else(|| io::Error::other("file sink not open"))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Destination of a frame's output.
#[derive(Debug)]
pub enum Sink {
    /// Spliced into the calling frame (includes).
    Parent,
    /// The process output (stdout or `-o FILE`).
    Process,
    /// A per-input file (`-g TAG`).
    File(FileSink),
    /// Returned to the caller of [`crate::process::ProcessState::expand`].
    Capture,
}

/// Active `:output` redirection: text goes to `sink` instead of the frame's
/// own buffer until `:close` or the end of the frame.
#[derive(Debug)]
pub struct Redirect {
    pub sink: FileSink,
    pending: Vec<u8>,
}

impl Redirect {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Redirect { sink: FileSink::new(path), pending: Vec::new() }
    }

    /// Write out everything buffered so far.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.sink.write_all(&self.pending)?;
            self.pending.clear();
        }
        self.sink.flush()
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Frame {
    pub registry: Registry,
    pub scan_enabled: bool,
    pub eater: Option<Eater>,
    /// Input name used in diagnostics (`<stdin>` for standard input).
    pub label: Arc<str>,
    /// Start of the hook being processed, or 1:1 before the first one.
    pub position: Position,
    pub sink: Sink,
    out: Vec<u8>,
    redirect: Option<Redirect>,
}

impl Frame {
    pub fn new(label: impl Into<Arc<str>>, registry: Registry, sink: Sink) -> Self {
        Frame {
            registry,
            scan_enabled: true,
            eater: None,
            label: label.into(),
            position: Position::default(),
            sink,
            out: Vec::new(),
            redirect: None,
        }
    }

    /// A frame inheriting this frame's registry and eater.
    pub fn child(&self, label: impl Into<Arc<str>>, sink: Sink) -> Self {
        Frame { eater: self.eater, ..Frame::new(label, self.registry.clone(), sink) }
    }

    pub fn location(&self) -> Location {
        Location::new(&self.label, self.position)
    }

    /// Append output, honouring any active redirection.
    pub fn emit(&mut self, bytes: &[u8]) {
        self.buffer_mut().extend_from_slice(bytes);
    }

    /// Drop `tail` from the end of the pending output if it is there.
    pub fn retract(&mut self, tail: &[u8]) -> bool {
        let buf = self.buffer_mut();
        if !tail.is_empty() && buf.ends_with(tail) {
            buf.truncate(buf.len() - tail.len());
            true
        } else {
            false
        }
    }

    /// Take the frame's own buffered output, leaving it empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Start sending output to `path`, closing any previous redirection.
    pub fn redirect_to(&mut self, path: impl Into<PathBuf>) -> Result<(), (PathBuf, io::Error)> {
        self.close_redirect()?;
        self.redirect = Some(Redirect::new(path));
        Ok(())
    }

    /// Flush and drop the active redirection, if any.
    pub fn close_redirect(&mut self) -> Result<(), (PathBuf, io::Error)> {
        match self.redirect.take() {
            Some(mut r) => r.flush().map_err(|e| (r.sink.path().to_path_buf(), e)),
            None => Ok(()),
        }
    }

    /// Write buffered redirected output without closing the redirection.
    pub fn flush_redirect(&mut self) -> Result<(), (PathBuf, io::Error)> {
        match self.redirect.as_mut() {
            Some(r) => r.flush().map_err(|e| (r.sink.path().to_path_buf(), e)),
            None => Ok(()),
        }
    }

    fn buffer_mut(&mut self) -> &mut Vec<u8> {
        match self.redirect.as_mut() {
            Some(r) => &mut r.pending,
            None => &mut self.out,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
