/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use serde::Deserialize;
use tracing::subscriber::set_global_default;
pub use tracing::{debug, error, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Registry};

#[derive(Debug, Deserialize, Clone, Copy)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
    OFF,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::TRACE => LevelFilter::TRACE,
            LogLevel::DEBUG => LevelFilter::DEBUG,
            LogLevel::INFO => LevelFilter::INFO,
            LogLevel::WARN => LevelFilter::WARN,
            LogLevel::ERROR => LevelFilter::ERROR,
            LogLevel::OFF => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub log_to_file: bool,
}

/// Keeps the non-blocking writers alive. Logs buffered in a writer are flushed
/// when its guard is dropped, so hold this until shutdown.
pub struct LoggerGuard {
    _guards: Vec<WorkerGuard>,
}

/// Installs the global bunyan-formatted JSON subscriber.
///
/// Console output is always on. With `log_to_file` the same records also go
/// to a daily rolling file under `./logs`. Both writers are non-blocking, so a
/// slow sink never stalls a request handler or the fan-out path.
///
/// # Panics
///
/// If a global logger or subscriber is already installed.
pub fn setup_tracing(logger_cfg: LoggerConfig) -> LoggerGuard {
    LogTracer::init().expect("Failed to setup logger");

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    let mut guards = vec![console_guard];

    let file_layer = if logger_cfg.log_to_file {
        let (file_writer, file_guard) = tracing_appender::non_blocking(
            tracing_appender::rolling::daily("logs", format!("{app_name}.log")),
        );
        guards.push(file_guard);
        Some(BunyanFormattingLayer::new(app_name.to_owned(), file_writer))
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(LevelFilter::from(logger_cfg.level))
        .with(JsonStorageLayer)
        .with(file_layer)
        .with(BunyanFormattingLayer::new(app_name, console_writer));

    set_global_default(subscriber).expect("Unable to set global tracing subscriber");

    LoggerGuard { _guards: guards }
}
