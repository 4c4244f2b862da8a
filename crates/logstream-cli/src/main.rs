// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, time::Duration};

use tokio::process::Command;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use logstream::{
    config::{self, LogStreamConfig},
    dispatcher::DispatchPolicy,
    logger::Formatter,
    LogStream,
};

const CONFIG_FAILURE: u8 = 2;
const USAGE: &str = "usage: logstream [--per-line] -- <command> [args...]";

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    per_line: bool,
    program: String,
    args: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Option<Invocation> {
    let mut per_line = false;
    let mut args = args.into_iter();

    loop {
        match args.next()?.as_str() {
            "--per-line" => per_line = true,
            "--" => break,
            _ => return None,
        }
    }

    let program = args.next()?;
    Some(Invocation {
        per_line,
        program,
        args: args.collect(),
    })
}

fn dispatch_policy(per_line: bool) -> DispatchPolicy {
    let policy = if per_line {
        DispatchPolicy::per_line()
    } else {
        DispatchPolicy::batched()
    };

    match env::var("LOGSTREAM_FLUSH_INTERVAL_MS")
        .ok()
        .map(|val| val.parse::<u64>())
    {
        Some(Ok(ms)) if ms > 0 => policy.with_interval(Duration::from_millis(ms)),
        Some(_) => {
            warn!("Ignoring invalid LOGSTREAM_FLUSH_INTERVAL_MS, using the default interval");
            policy
        }
        None => policy,
    }
}

fn init_logging() {
    let log_level = env::var("LOGSTREAM_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    let filter = EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("LOGSTREAM | a global tracing subscriber is already installed");
    }
    debug!("Logging subsystem enabled");
}

async fn run_child(invocation: &Invocation) -> u8 {
    let mut child = match Command::new(&invocation.program)
        .args(&invocation.args)
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to launch {}: {e}", invocation.program);
            return 127;
        }
    };

    let status = tokio::select! {
        status = child.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping {}", invocation.program);
            if let Err(e) = child.kill().await {
                error!("Failed to stop {}: {e}", invocation.program);
            }
            return 130;
        }
    };

    match status {
        Ok(status) => status
            .code()
            .and_then(|code| u8::try_from(code).ok())
            .unwrap_or(1),
        Err(e) => {
            error!("Failed to wait for {}: {e}", invocation.program);
            1
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let Some(invocation) = parse_args(env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(CONFIG_FAILURE);
    };

    let project_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Unable to determine the working directory: {e}");
            return ExitCode::from(CONFIG_FAILURE);
        }
    };

    let config = match config::load(&project_dir).and_then(LogStreamConfig::try_from) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(CONFIG_FAILURE);
        }
    };

    let mut config = config.with_dispatch_policy(dispatch_policy(invocation.per_line));
    if let Ok(api_url) = env::var("LOGSTREAM_API_URL") {
        config = config.with_api_url(api_url);
    }

    let mut stream = LogStream::new(config);
    match stream.scope(run_child(&invocation)).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e}");
            ExitCode::from(CONFIG_FAILURE)
        }
    }
}
