// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults shared by the configuration and the dispatch loop.

use std::time::Duration;

/// Collector used when no API URL override is configured.
pub const DEFAULT_API_URL: &str = "https://dclick-logstream.insidev.com.br";

/// Name of the settings file looked up in the project directory.
pub const SETTINGS_FILE_NAME: &str = ".logstream";

/// Log file name used when the settings file is first materialized.
pub const DEFAULT_LOG_FILE_NAME: &str = ".log";

/// Flush interval for batched delivery.
///
/// Trades latency for fewer requests: a busy automation produces one request
/// per interval instead of one per line.
pub const BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Flush interval for per-line delivery.
pub const PER_LINE_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum number of lines carried by a single batch request.
///
/// Larger drains are split into consecutive batches of at most this size.
pub const MAX_BATCH_LINES: usize = 1_000;

/// Timeout applied to every request sent to the collector.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the channel between the filesystem watcher and the detector task.
///
/// Notifications beyond this are coalesced: one pending read already covers them.
pub(crate) const WATCH_EVENT_QUEUE_SIZE: usize = 64;
