use std::collections::VecDeque;
use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::trace;

use crate::path::join_names;

/// One committed path, tagged with the commit that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub sequence: u64,
    pub path: Vec<String>,
}

impl JournalEntry {
    pub fn path_string(&self) -> String {
        join_names(&self.path)
    }
}

/// Receiver of user-level modifications accepted by commits.
///
/// Called with the registry lock held, once per merged path, in commit
/// order. Implementations must not call back into the registry.
#[cfg_attr(test, automock)]
pub trait ModificationSink: Send + Sync + 'static {
    fn append(
        &self,
        entry: JournalEntry,
    );
}

/// In-memory journal, optionally bounded (oldest entries are evicted).
#[derive(Default)]
pub struct ModificationLog {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl Debug for ModificationLog {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ModificationLog")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl ModificationLog {
    /// `capacity == 0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<JournalEntry> {
        self.entries.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ModificationSink for ModificationLog {
    fn append(
        &self,
        entry: JournalEntry,
    ) {
        trace!(sequence = entry.sequence, path = %entry.path_string(), "journal append");
        let mut entries = self.entries.lock();
        if self.capacity > 0 && entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
