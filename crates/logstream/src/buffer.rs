// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lines read from the log file that have not been shipped yet.
//!
//! The detector appends, the dispatcher drains. A drain takes every line held
//! at that moment and leaves the buffer empty, so a line can only ever be
//! handed to one drain.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ordered lines shared between the change detector and the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl PendingBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, line: String) {
        self.lock().push(line);
    }

    /// Appends `lines` in order, under a single lock.
    pub fn extend(&self, lines: impl IntoIterator<Item = String>) {
        self.lock().extend(lines);
    }

    /// Removes and returns every buffered line, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-updated, so the
    // poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
