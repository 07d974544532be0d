// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! logging stuffs
use std::env;
use std::io::IsTerminal;
use std::sync::{Arc, Mutex, Once};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

/// The default logs directory.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

const DEFAULT_LOG_TARGETS: &str = "info";

const DEFAULT_MAX_LOG_FILES: usize = 720;

type BoxedLayer = Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync>;

/// The logging options that used to initialize the logger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// The directory to store log files. If empty, logs are only written to stdout.
    pub dir: String,

    /// The log level directives, e.g. "info" or "debug,auto_column=trace". Default is "info".
    pub level: Option<String>,

    /// The log format that can be one of "json" or "text". Default is "text".
    pub log_format: LogFormat,

    /// The maximum number of rotated log files to keep.
    pub max_log_files: usize,

    /// Whether to append logs to stdout. Default is true.
    pub append_stdout: bool,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            dir: String::new(),
            level: None,
            log_format: LogFormat::Text,
            max_log_files: DEFAULT_MAX_LOG_FILES,
            append_stdout: true,
        }
    }
}

/// Init tracing for unittest.
/// Write logs to file `unittest`.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();

        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());

        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stdout: false,
            ..Default::default()
        };
        *g = Some(init_global_logging("unittest", &opts));

        crate::info!("logs dir = {}", dir);
    });
}

static GLOBAL_UT_LOG_GUARD: Lazy<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Installs the global tracing subscriber.
///
/// Returns the guards of the non-blocking writers; logs are flushed when they are dropped.
/// Only the first call in a process installs a subscriber, later calls return no guards.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Vec<WorkerGuard> {
    static START: Once = Once::new();
    let mut guards = vec![];

    START.call_once(|| {
        // resolve log level settings from:
        // - options from command line or config files
        // - environment variable: RUST_LOG
        // - default settings
        let filter = opts
            .level
            .as_deref()
            .or(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
            .unwrap_or(DEFAULT_LOG_TARGETS)
            .parse::<Targets>()
            .unwrap_or_else(|_| Targets::new().with_default(Level::INFO));

        let mut layers: Vec<BoxedLayer> = Vec::new();

        if opts.append_stdout {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            let layer = Layer::new()
                .with_writer(writer)
                .with_ansi(std::io::stdout().is_terminal());
            layers.push(match opts.log_format {
                LogFormat::Json => layer.json().with_filter(filter.clone()).boxed(),
                LogFormat::Text => layer.with_filter(filter.clone()).boxed(),
            });
        }

        // Configure the file logging layer with rolling policy.
        let mut file_error = None;
        if !opts.dir.is_empty() {
            match RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix(app_name)
                .max_log_files(opts.max_log_files)
                .build(&opts.dir)
            {
                Ok(rolling_appender) => {
                    let (writer, guard) = tracing_appender::non_blocking(rolling_appender);
                    guards.push(guard);
                    let layer = Layer::new().with_writer(writer).with_ansi(false);
                    layers.push(match opts.log_format {
                        LogFormat::Json => layer.json().with_filter(filter.clone()).boxed(),
                        LogFormat::Text => layer.with_filter(filter.clone()).boxed(),
                    });
                }
                Err(e) => file_error = Some(e),
            }
        }

        if tracing::subscriber::set_global_default(Registry::default().with(layers)).is_err() {
            // Another subscriber was installed by the embedding process.
            guards.clear();
            return;
        }

        if let Some(e) = file_error {
            crate::warn!("Failed to create log files under {}: {}", opts.dir, e);
        }
    });

    guards
}
