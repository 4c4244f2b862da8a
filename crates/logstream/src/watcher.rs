// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Filesystem notifications driving the reader.
//!
//! The OS watcher is bound to the log file's parent directory (non-recursive)
//! and its events are filtered down to modifications of the log file itself.
//! Each matching event wakes a blocking worker that owns the [`TailReader`]
//! and appends whatever it reads to the [`PendingBuffer`]. Events that pile up
//! while a read is in progress are coalesced into the next read.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::buffer::PendingBuffer;
use crate::constants::WATCH_EVENT_QUEUE_SIZE;
use crate::reader::TailReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Changed,
    Shutdown,
}

/// A running change detector. Stop it with [`ChangeDetector::stop`].
pub struct ChangeDetector {
    watcher: RecommendedWatcher,
    signals: mpsc::Sender<Signal>,
    worker: JoinHandle<()>,
}

impl ChangeDetector {
    /// Starts watching the reader's file. Must be called from within a tokio runtime.
    pub fn spawn(reader: TailReader, buffer: PendingBuffer) -> Result<Self, notify::Error> {
        let (signals, rx) = mpsc::channel(WATCH_EVENT_QUEUE_SIZE);
        let target = reader.path().to_path_buf();

        let events = signals.clone();
        let filter_target = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_change_of(&event, &filter_target) => {
                    // A full queue already holds a pending wake-up
                    let _ = events.try_send(Signal::Changed);
                }
                Ok(event) => trace!("LOGSTREAM | Ignoring event {:?}", event.kind),
                Err(e) => debug!("LOGSTREAM | File watcher error: {e}"),
            }
        })?;

        let watch_dir = target.parent().unwrap_or(&target);
        watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
        debug!("LOGSTREAM | Watching {}", target.display());

        let worker = tokio::task::spawn_blocking(move || detect_changes(reader, buffer, rx));

        Ok(Self {
            watcher,
            signals,
            worker,
        })
    }

    /// Tears down the OS watcher, lets the worker do a last catch-up read and
    /// waits for it to exit.
    pub async fn stop(self) {
        let Self {
            watcher,
            signals,
            worker,
        } = self;
        drop(watcher);

        // Fails only if the worker is already gone
        let _ = signals.send(Signal::Shutdown).await;
        drop(signals);

        if let Err(e) = worker.await {
            error!("LOGSTREAM | Change detector failed: {e}");
        }
    }
}

fn is_change_of(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|path| path == target)
}

fn detect_changes(mut reader: TailReader, buffer: PendingBuffer, mut rx: mpsc::Receiver<Signal>) {
    let path = reader.path().to_path_buf();

    while let Some(signal) = rx.blocking_recv() {
        let mut shutdown = signal == Signal::Shutdown;
        while let Ok(next) = rx.try_recv() {
            shutdown |= next == Signal::Shutdown;
        }

        match reader.read_new_lines() {
            Ok(lines) if lines.is_empty() => {}
            Ok(lines) => {
                trace!("LOGSTREAM | Read {} new lines", lines.len());
                buffer.extend(lines);
            }
            Err(e) => warn!("LOGSTREAM | Failed to read {}: {e}", path.display()),
        }

        if shutdown {
            break;
        }
    }

    debug!("LOGSTREAM | Stopped watching {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::StartPosition;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn append(path: &Path, contents: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    async fn wait_for_lines(buffer: &PendingBuffer, count: usize) {
        let wait = async {
            while buffer.len() < count {
                sleep(Duration::from_millis(10)).await;
            }
        };
        timeout(Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for the detector");
    }

    #[test]
    fn test_event_filter() {
        let target = Path::new("/var/log/app.log");
        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(target.to_path_buf());
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(target.to_path_buf());
        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(target.to_path_buf());
        let sibling = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/var/log/other.log"));

        assert!(is_change_of(&modify, target));
        assert!(is_change_of(&create, target));
        assert!(!is_change_of(&remove, target));
        assert!(!is_change_of(&sibling, target));
    }

    #[tokio::test]
    async fn test_lines_arrive_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let buffer = PendingBuffer::new();
        let reader = TailReader::open(&path, StartPosition::Beginning).unwrap();
        let detector = ChangeDetector::spawn(reader, buffer.clone()).unwrap();

        append(&path, "a\n");
        wait_for_lines(&buffer, 1).await;
        append(&path, "b\n");
        wait_for_lines(&buffer, 2).await;

        assert_eq!(buffer.drain(), vec!["a", "b"]);
        detector.stop().await;
    }

    #[tokio::test]
    async fn test_sibling_files_are_not_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let sibling = dir.path().join("other.log");
        std::fs::write(&path, "").unwrap();
        std::fs::write(&sibling, "").unwrap();

        let buffer = PendingBuffer::new();
        let reader = TailReader::open(&path, StartPosition::Beginning).unwrap();
        let detector = ChangeDetector::spawn(reader, buffer.clone()).unwrap();

        append(&sibling, "not ours\n");
        append(&path, "ours\n");
        wait_for_lines(&buffer, 1).await;
        detector.stop().await;

        assert_eq!(buffer.drain(), vec!["ours"]);
    }

    #[tokio::test]
    async fn test_stop_reads_pending_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "").unwrap();

        let buffer = PendingBuffer::new();
        let reader = TailReader::open(&path, StartPosition::Beginning).unwrap();
        let detector = ChangeDetector::spawn(reader, buffer.clone()).unwrap();

        append(&path, "written right before stop\n");
        timeout(Duration::from_secs(5), detector.stop())
            .await
            .expect("detector did not stop");

        assert_eq!(buffer.drain(), vec!["written right before stop"]);
    }
}
