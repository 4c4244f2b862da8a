// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic drain-and-send loop.
//!
//! On every tick the dispatcher drains the [`PendingBuffer`] and ships what it
//! got, either as batches or one request per line. Delivery is at-most-once:
//! a failed request is logged and its lines are dropped, never re-buffered.

use std::time::Duration;

use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::buffer::PendingBuffer;
use crate::client::CollectorClient;
use crate::constants::{
    BATCH_FLUSH_INTERVAL, MAX_BATCH_LINES, PER_LINE_FLUSH_INTERVAL, REQUEST_TIMEOUT,
};

/// How drained lines are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One request per batch of at most `max_batch_lines` lines.
    Batched { max_batch_lines: usize },
    /// One request per line.
    PerLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Time between two drains of the buffer.
    pub interval: Duration,
    pub mode: DispatchMode,
}

impl DispatchPolicy {
    /// Low request overhead: a batch every 5 seconds.
    #[must_use]
    pub fn batched() -> Self {
        Self {
            interval: BATCH_FLUSH_INTERVAL,
            mode: DispatchMode::Batched {
                max_batch_lines: MAX_BATCH_LINES,
            },
        }
    }

    /// Low latency: every line on its own, polled every 100ms.
    #[must_use]
    pub fn per_line() -> Self {
        Self {
            interval: PER_LINE_FLUSH_INTERVAL,
            mode: DispatchMode::PerLine,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::batched()
    }
}

/// Moves lines from the [`PendingBuffer`] to the collector on a fixed interval.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    buffer: PendingBuffer,
    client: CollectorClient,
    policy: DispatchPolicy,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(buffer: PendingBuffer, client: CollectorClient, policy: DispatchPolicy) -> Self {
        Self {
            buffer,
            client,
            policy,
            shutdown_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Caps the time spent shipping once cancellation is observed.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Drains the buffer once and ships the result. Returns how many lines
    /// the collector accepted.
    pub async fn tick(&self) -> usize {
        let lines = self.buffer.drain();
        if lines.is_empty() {
            return 0;
        }

        let delivered = match self.policy.mode {
            DispatchMode::Batched { max_batch_lines } => {
                self.send_batches(&lines, max_batch_lines.max(1)).await
            }
            DispatchMode::PerLine => self.send_lines(&lines).await,
        };

        debug!("LOGSTREAM | Delivered {delivered} of {} lines", lines.len());
        delivered
    }

    async fn send_batches(&self, lines: &[String], max_batch_lines: usize) -> usize {
        let mut delivered = 0;
        for batch in lines.chunks(max_batch_lines) {
            match self.client.send_batch(batch).await {
                Ok(()) => delivered += batch.len(),
                Err(e) => {
                    error!(
                        "LOGSTREAM | Failed to send batch of {} lines, dropping it: {e}",
                        batch.len()
                    );
                }
            }
        }
        delivered
    }

    async fn send_lines(&self, lines: &[String]) -> usize {
        let mut delivered = 0;
        for line in lines {
            match self.client.send_log(line).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    error!("LOGSTREAM | Failed to send log line, dropping it: {e}");
                }
            }
        }
        delivered
    }

    /// Ticks on the configured interval until `cancel` fires, then drains one
    /// last time so lines read before shutdown are still shipped.
    ///
    /// Once cancelled, a send in flight and the final drain share a single
    /// `shutdown_timeout` budget. Lines not shipped by then are dropped.
    pub async fn run(self, cancel: CancellationToken) {
        debug!("LOGSTREAM | Dispatcher started");

        let period = self.policy.interval.max(Duration::from_millis(1));
        let mut flush_interval = interval(period);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = flush_interval.tick() => {}
            }

            let tick = self.tick();
            tokio::pin!(tick);
            tokio::select! {
                _ = &mut tick => {}
                () = cancel.cancelled() => {
                    let deadline = Instant::now() + self.shutdown_timeout;
                    if timeout_at(deadline, &mut tick).await.is_ok() {
                        self.final_drain(deadline).await;
                    } else {
                        self.log_abandoned();
                    }
                    debug!("LOGSTREAM | Dispatcher stopped");
                    return;
                }
            }
        }

        self.final_drain(Instant::now() + self.shutdown_timeout).await;
        debug!("LOGSTREAM | Dispatcher stopped");
    }

    async fn final_drain(&self, deadline: Instant) {
        if timeout_at(deadline, self.tick()).await.is_err() {
            self.log_abandoned();
        }
    }

    fn log_abandoned(&self) {
        warn!(
            "LOGSTREAM | Collector did not answer within {:?} of shutdown, dropping unsent lines",
            self.shutdown_timeout
        );
    }
}
