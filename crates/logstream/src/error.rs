// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors raised while loading or validating the settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set: fill in AUTOMATION_ID and AUTOMATION_NAME in the settings file")]
    MissingIdentity(&'static str),

    #[error("Invalid configuration key: {0}")]
    InvalidKey(String),

    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Errors surfaced synchronously by the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum LogStreamError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Log file {path} is not accessible: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch {path}: {source}")]
    Watcher {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Log stream already running")]
    AlreadyRunning,

    #[error("Streamed work was cancelled before completing")]
    WorkCancelled,
}

/// Failures talking to the collector. Never propagated past the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum TransmissionError {
    #[error("Request to collector failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{status}: collector rejected request: {body}")]
    Status { status: StatusCode, body: String },
}
