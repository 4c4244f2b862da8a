// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Session lifecycle.
//!
//! A [`LogStream`] is either stopped (initial state) or running. Starting it
//! clears the collector backlog, spawns the change detector and the
//! dispatcher; stopping it tears both down and waits for them. [`LogStream::scope`]
//! brackets a unit of work with start and stop so the session can never
//! outlive the work, whatever way the work ends.

use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::PendingBuffer;
use crate::client::CollectorClient;
use crate::config::LogStreamConfig;
use crate::dispatcher::Dispatcher;
use crate::error::LogStreamError;
use crate::reader::TailReader;
use crate::watcher::ChangeDetector;

struct StreamSession {
    detector: ChangeDetector,
    dispatcher: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Streams one log file to the collector for the duration of a session.
pub struct LogStream {
    config: LogStreamConfig,
    client: CollectorClient,
    session: Option<StreamSession>,
}

impl LogStream {
    #[must_use]
    pub fn new(config: LogStreamConfig) -> Self {
        let client = CollectorClient::new(&config);
        Self {
            config,
            client,
            session: None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Starts streaming the configured log file.
    ///
    /// Fails without side effects if the session is already running or the
    /// log file cannot be opened. A failure to clear the collector backlog is
    /// logged and does not prevent the session from starting.
    pub async fn start(&mut self) -> Result<(), LogStreamError> {
        if self.session.is_some() {
            return Err(LogStreamError::AlreadyRunning);
        }

        let log_file = &self.config.log_file;
        let reader = TailReader::open(log_file, self.config.start_position).map_err(|source| {
            LogStreamError::FileAccess {
                path: log_file.clone(),
                source,
            }
        })?;
        let watched = reader.path().to_path_buf();

        if let Err(e) = self.client.clear_buffer().await {
            warn!("LOGSTREAM | Failed to clear collector backlog, streaming anyway: {e}");
        }

        let buffer = PendingBuffer::new();
        let detector = ChangeDetector::spawn(reader, buffer.clone()).map_err(|source| {
            LogStreamError::Watcher {
                path: watched.clone(),
                source,
            }
        })?;

        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(buffer, self.client.clone(), self.config.dispatch)
            .with_shutdown_timeout(self.config.request_timeout);
        let dispatcher = tokio::spawn(dispatcher.run(cancel.clone()));

        self.session = Some(StreamSession {
            detector,
            dispatcher,
            cancel,
        });

        info!(
            "LOGSTREAM | Streaming {} for automation {} ({})",
            watched.display(),
            self.config.identity.automation_name(),
            self.config.identity.automation_id()
        );
        Ok(())
    }

    /// Stops streaming and waits for the background work to finish.
    ///
    /// Lines already written to the file are read and shipped once more
    /// before this returns, within one request timeout. Does nothing if the
    /// session is not running.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("LOGSTREAM | Stop requested but the stream is not running");
            return;
        };

        session.detector.stop().await;
        session.cancel.cancel();
        if let Err(e) = session.dispatcher.await {
            error!("LOGSTREAM | Dispatcher failed: {e}");
        }

        info!("LOGSTREAM | Stopped streaming");
    }

    /// Runs `work` inside a streaming session and returns its output.
    ///
    /// The session is stopped on every exit path. A panic inside `work` is
    /// resumed after the session has stopped.
    pub async fn scope<F>(&mut self, work: F) -> Result<F::Output, LogStreamError>
    where
        F: Future,
    {
        self.start().await?;
        let result = AssertUnwindSafe(work).catch_unwind().await;
        self.stop().await;

        match result {
            Ok(output) => Ok(output),
            Err(panic) => resume_unwind(panic),
        }
    }

    /// Like [`LogStream::scope`] for synchronous work, run on the blocking pool.
    pub async fn scope_blocking<F, T>(&mut self, work: F) -> Result<T, LogStreamError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.start().await?;
        let result = tokio::task::spawn_blocking(work).await;
        self.stop().await;

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.is_panic() => resume_unwind(e.into_panic()),
            // Only a runtime shutting down cancels blocking tasks
            Err(_) => Err(LogStreamError::WorkCancelled),
        }
    }
}

impl Drop for LogStream {
    // Best effort: without an async context the tasks are signalled, not awaited.
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!("LOGSTREAM | Stream dropped while running, stopping without waiting");
            session.cancel.cancel();
        }
    }
}
