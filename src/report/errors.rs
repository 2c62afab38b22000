//! Chainable error sinks.
//!
//! A bucket handles an error locally and then forwards it to its child,
//! so a "print to stderr, also enqueue" pipeline is a reporter whose child
//! is a queue. Scans receive a sink; nothing error-related is global.

use std::io::{Read, Write};

use crate::error::{Error, ErrorInfo, Result};
use crate::wire::{read, write};

/// A link in an error pipeline.
pub trait ErrorBucket {
    /// Local handling for one error.
    fn handle(&mut self, err: &ErrorInfo);

    fn child(&mut self) -> Option<&mut (dyn ErrorBucket + '_)> {
        None
    }

    /// Handles the error locally, then forwards it down the chain.
    fn add_error(&mut self, err: &ErrorInfo) {
        self.handle(err);
        if let Some(child) = self.child() {
            child.add_error(err);
        }
    }

    /// Convenience wrapper for live [`Error`] values.
    fn add(&mut self, err: &Error) {
        self.add_error(&ErrorInfo::of(err));
    }
}

/// An in-memory queue of errors, the form reports carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorQueue {
    items: Vec<ErrorInfo>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorInfo> {
        self.items.iter()
    }

    pub fn extend_from(&mut self, other: &ErrorQueue) {
        self.items.extend(other.items.iter().cloned());
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::usize_as_u32(dest, self.items.len())?;
        for item in &self.items {
            write::string(dest, &item.id)?;
            write::string(dest, &item.msg)?;
            write::option(dest, item.extra.as_deref(), |s, d| write::string(d, s))?;
            write::bool(dest, item.fatal)?;
            write::bool(dest, item.suppress_extra)?;
        }
        Ok(())
    }

    pub fn read(src: &mut impl Read) -> Result<ErrorQueue> {
        let count = read::u32_as_usize(src)?;
        let mut queue = ErrorQueue::new();
        for _ in 0..count {
            queue.items.push(ErrorInfo {
                id: read::string(src)?,
                msg: read::string(src)?,
                extra: read::option(src, read::string)?,
                fatal: read::bool(src)?,
                suppress_extra: read::bool(src)?,
            });
        }
        Ok(queue)
    }
}

impl ErrorBucket for ErrorQueue {
    fn handle(&mut self, err: &ErrorInfo) {
        self.items.push(err.clone());
    }
}

/// Logs each error, then hands it to an optional child bucket.
#[derive(Default)]
pub struct ErrorReporter {
    child: Option<Box<dyn ErrorBucket>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(child: Box<dyn ErrorBucket>) -> Self {
        Self { child: Some(child) }
    }

    pub fn into_child(self) -> Option<Box<dyn ErrorBucket>> {
        self.child
    }
}

impl ErrorBucket for ErrorReporter {
    fn handle(&mut self, err: &ErrorInfo) {
        if err.fatal {
            tracing::error!(id = %err.id, "{}", err);
        } else {
            tracing::warn!(id = %err.id, "{}", err);
        }
    }

    fn child(&mut self) -> Option<&mut (dyn ErrorBucket + '_)> {
        match &mut self.child {
            Some(b) => Some(b.as_mut()),
            None => None,
        }
    }
}
