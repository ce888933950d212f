//! Text buffers the engine writes into, and the plumbing that separates the
//! engine's own writes from human edits

use crate::realign::EditRange;
use crate::text::{line_count, split_lines};
use crate::types::Uri;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("No buffer open for {0}")]
    NotOpen(Uri),
    #[error("Buffer {0} is read-only")]
    ReadOnly(Uri),
    #[error("Edit at lines {start}..={end} is outside buffer {uri}")]
    OutOfRange { uri: Uri, start: usize, end: usize },
}

/// Full-text access to live buffers keyed by file identity
pub trait TextBuffers {
    fn text(&self, uri: &Uri) -> Option<String>;
    fn set_text(&mut self, uri: &Uri, text: &str) -> Result<(), BufferError>;
}

/// A buffer edit reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub uri: Uri,
    pub range: EditRange,
    pub text: String,
}

/// Set while the engine writes into a buffer. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct SystemWriteFlag {
    depth: Rc<Cell<usize>>,
}

impl SystemWriteFlag {
    pub fn is_set(&self) -> bool {
        self.depth.get() > 0
    }

    /// Raise the flag until the returned guard is dropped
    pub fn begin(&self) -> SystemWriteGuard {
        self.depth.set(self.depth.get() + 1);
        SystemWriteGuard {
            depth: Rc::clone(&self.depth),
        }
    }
}

#[must_use = "the flag drops as soon as the guard does"]
#[derive(Debug)]
pub struct SystemWriteGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for SystemWriteGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Where hosts report buffer edits.
///
/// Changes that arrive while a system write is in progress are the engine's
/// own and are dropped on the spot; everything else queues up until the
/// engine drains it.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    flag: SystemWriteFlag,
    queue: Rc<RefCell<VecDeque<ContentChange>>>,
}

impl ChangeSink {
    pub(crate) fn new(flag: SystemWriteFlag) -> Self {
        Self {
            flag,
            queue: Rc::default(),
        }
    }

    /// Report a change; returns false when it was recognised as a system write
    pub fn push(&self, change: ContentChange) -> bool {
        if self.flag.is_set() {
            log::trace!("ignoring system write to {}", change.uri);
            return false;
        }
        self.queue.borrow_mut().push_back(change);
        true
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn drain(&self) -> Vec<ContentChange> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

/// In-memory buffers for hosts without an editor of their own
#[derive(Debug, Default)]
pub struct MemoryBuffers {
    texts: HashMap<Uri, String>,
    read_only: HashSet<Uri>,
    sink: Option<ChangeSink>,
}

impl MemoryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every change (engine writes included) to `sink`
    pub fn connect(&mut self, sink: ChangeSink) {
        self.sink = Some(sink);
    }

    pub fn open(&mut self, uri: Uri, text: impl Into<String>) {
        self.texts.insert(uri, text.into());
    }

    pub fn close(&mut self, uri: &Uri) -> Option<String> {
        self.read_only.remove(uri);
        self.texts.remove(uri)
    }

    pub fn set_read_only(&mut self, uri: &Uri, read_only: bool) {
        if read_only {
            self.read_only.insert(uri.clone());
        } else {
            self.read_only.remove(uri);
        }
    }

    /// Replace lines `range` with `text`, the way a person typing would
    pub fn edit(&mut self, uri: &Uri, range: EditRange, text: &str) -> Result<(), BufferError> {
        let current = self
            .texts
            .get(uri)
            .ok_or_else(|| BufferError::NotOpen(uri.clone()))?;
        if self.read_only.contains(uri) {
            return Err(BufferError::ReadOnly(uri.clone()));
        }

        let mut lines = split_lines(current);
        if range.start_line == 0 || range.end_line > lines.len() {
            return Err(BufferError::OutOfRange {
                uri: uri.clone(),
                start: range.start_line,
                end: range.end_line,
            });
        }
        lines.splice(range.start_line - 1..range.end_line, split_lines(text));
        let updated = lines.join("\n");

        self.texts.insert(uri.clone(), updated);
        self.notify(ContentChange {
            uri: uri.clone(),
            range,
            text: text.to_string(),
        });
        Ok(())
    }

    fn notify(&self, change: ContentChange) {
        if let Some(sink) = &self.sink {
            sink.push(change);
        }
    }
}

impl TextBuffers for MemoryBuffers {
    fn text(&self, uri: &Uri) -> Option<String> {
        self.texts.get(uri).cloned()
    }

    fn set_text(&mut self, uri: &Uri, text: &str) -> Result<(), BufferError> {
        let previous = self
            .texts
            .get(uri)
            .ok_or_else(|| BufferError::NotOpen(uri.clone()))?;
        if self.read_only.contains(uri) {
            return Err(BufferError::ReadOnly(uri.clone()));
        }

        let range = EditRange::new(1, line_count(previous));
        self.texts.insert(uri.clone(), text.to_string());
        self.notify(ContentChange {
            uri: uri.clone(),
            range,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = SystemWriteFlag::default();
        {
            let _outer = flag.begin();
            let _inner = flag.begin();
            assert!(flag.is_set());
        }
        assert!(!flag.is_set());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let flag = SystemWriteFlag::default();
        let shared = flag.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = shared.begin();
            panic!("write failed");
        }));
        assert!(result.is_err());
        assert!(!flag.is_set());
    }

    #[test]
    fn test_sink_drops_system_writes() {
        let flag = SystemWriteFlag::default();
        let sink = ChangeSink::new(flag.clone());
        let mut buffers = MemoryBuffers::new();
        let uri = Uri::from("file:///a");
        buffers.open(uri.clone(), "a\nb");
        buffers.connect(sink.clone());

        {
            let _guard = flag.begin();
            buffers.set_text(&uri, "a\nB").unwrap();
        }
        assert_eq!(sink.pending(), 0);

        buffers.edit(&uri, EditRange::line(1), "x\ny").unwrap();
        assert_eq!(sink.pending(), 1);
        assert_eq!(buffers.text(&uri).unwrap(), "x\ny\nB");
    }

    #[test]
    fn test_read_only_buffer_rejects_writes() {
        let mut buffers = MemoryBuffers::new();
        let uri = Uri::from("file:///a");
        buffers.open(uri.clone(), "a");
        buffers.set_read_only(&uri, true);
        assert!(matches!(buffers.set_text(&uri, "b"), Err(BufferError::ReadOnly(_))));
        assert!(matches!(
            buffers.set_text(&Uri::from("file:///missing"), "b"),
            Err(BufferError::NotOpen(_))
        ));
    }
}
