//! Deduplicating, size-bounded store of intercepted requests.
//!
//! Append-only within a session. Not thread-safe: the session driver owns
//! the buffer and the interceptor only ever sees it through `&mut`.

use std::collections::HashSet;

use crate::types::CapturedRequest;

/// Why [`CaptureBuffer::admit`] turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Duplicate,
    Full,
}

/// Capture-ordered buffer of unique requests, capped at `target_count`.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    entries: Vec<CapturedRequest>,
    seen: HashSet<String>,
    target_count: usize,
}

impl CaptureBuffer {
    /// Create an empty buffer that accepts at most `target_count` requests.
    pub fn new(target_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
            target_count,
        }
    }

    /// Append `candidate` unless its key is already present or the buffer is full.
    pub fn admit(&mut self, candidate: CapturedRequest) -> bool {
        self.try_admit(candidate).is_ok()
    }

    /// Like [`admit`](Self::admit) but reports why a request was rejected.
    pub fn try_admit(&mut self, candidate: CapturedRequest) -> Result<(), Rejection> {
        let key = candidate.dedup_key();
        if self.seen.contains(&key) {
            return Err(Rejection::Duplicate);
        }
        if self.is_full() {
            return Err(Rejection::Full);
        }
        self.seen.insert(key);
        self.entries.push(candidate);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.target_count
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    /// Requests in capture order.
    pub fn iter(&self) -> std::slice::Iter<'_, CapturedRequest> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[CapturedRequest] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a CaptureBuffer {
    type Item = &'a CapturedRequest;
    type IntoIter = std::slice::Iter<'a, CapturedRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
