// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # LogStream
//!
//! Streams the lines appended to a local log file to a LogStream collector
//! while a unit of work runs.
//!
//! ## Architecture
//!
//! ```text
//!   file write
//!       │
//!       v
//!   ┌──────────┐     ┌────────────┐     ┌───────────────┐
//!   │ watcher  │ ──> │   reader   │ ──> │    buffer     │
//!   └──────────┘     └────────────┘     └───────┬───────┘
//!                                               │ drain (every tick)
//!                                               v
//!                                       ┌───────────────┐     ┌──────────┐
//!                                       │  dispatcher   │ ──> │  client  │
//!                                       └───────────────┘     └──────────┘
//! ```
//!
//! - [`config`]: automation identity and settings file handling
//! - [`reader`]: offset-tracked incremental reads of the log file
//! - [`watcher`]: filesystem notifications feeding the reader
//! - [`buffer`]: shared queue of lines waiting to be shipped
//! - [`dispatcher`]: periodic drain-and-send loop
//! - [`client`]: HTTP calls against the collector
//! - [`stream`]: start/stop lifecycle and scoped sessions
//!
//! ## Example
//!
//! ```rust,no_run
//! use logstream::config::{self, LogStreamConfig};
//! use logstream::stream::LogStream;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = config::load(std::env::current_dir()?)?;
//! let mut stream = LogStream::new(LogStreamConfig::try_from(settings)?);
//!
//! let answer = stream
//!     .scope(async {
//!         // work that writes to the configured log file
//!         42
//!     })
//!     .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod client;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod reader;
pub mod stream;
pub mod watcher;

pub use config::{AutomationIdentity, LogStreamConfig};
pub use error::{ConfigError, LogStreamError, TransmissionError};
pub use stream::LogStream;
