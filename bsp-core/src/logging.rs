/*
 *   Copyright (c) 2022 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! The runtime's own diagnostics: thread spawn/join, barrier arrival,
//! registry growth, abort propagation. Distinct from [`crate::world::World::log`],
//! which is the BSP model's user-facing, per-superstep, stable-sorted-by-rank
//! log stream (`spec.md` §4.2/§6) and has its own buffering.
//!
//! Grounded in the teacher's `tui::core::log::tracing_config`/`tracing_init`
//! builder-style setup (compact formatter, configurable writer target, a
//! rolling file appender via `tracing-appender`), trimmed to the crates this
//! workspace actually depends on (no `miette`, no `SharedWriter`, no async
//! runtime — this crate has none of those concerns).

use std::path::PathBuf;

use tracing_core::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{BspError, Result};

/// Where the runtime's own `tracing` events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterConfig {
    /// No internal diagnostics at all.
    None,
    Stdout,
    Stderr,
    /// A rolling file at `path_and_prefix` (e.g. `"/tmp/bsp_core"` ->
    /// `/tmp/bsp_core.log`).
    File(String),
    /// Both stdout and the file.
    StdoutAndFile(String),
}

/// How verbose and where to. Construct with [`TracingConfig::new`] and call
/// [`TracingConfig::install_global`] once, before [`crate::environment`]
/// spawns any peers (a global subscriber can't be changed afterwards), or
/// [`TracingConfig::install_thread_local`] per test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub writer_config: WriterConfig,
    pub level_filter: LevelFilter,
}

impl TracingConfig {
    #[must_use]
    pub fn new(writer_config: WriterConfig, level_filter: LevelFilter) -> Self {
        Self {
            writer_config,
            level_filter,
        }
    }

    /// Installs a process-global subscriber. Can only succeed once per
    /// process; a second call returns a [`BspError::Configuration`] rather
    /// than panicking, since the embedding application may legitimately try
    /// this more than once (e.g. across `#[test]`s in one binary).
    ///
    /// # Errors
    ///
    /// Returns an error if the file writer (for [`WriterConfig::File`] /
    /// [`WriterConfig::StdoutAndFile`]) can't be created, or if a global
    /// subscriber has already been installed.
    pub fn install_global(self) -> Result<()> {
        let level_filter = self.level_filter;

        macro_rules! finish_and_init {
            ($writer:expr) => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_max_level(level_filter)
                    .without_time()
                    .with_thread_names(true)
                    .with_target(false)
                    .with_writer($writer)
                    .try_init()
                    .map_err(|err| BspError::Configuration(format!("tracing subscriber already installed: {err}")))
            };
        }

        match self.writer_config {
            WriterConfig::None => Ok(()),
            WriterConfig::Stdout => finish_and_init!(std::io::stdout),
            WriterConfig::Stderr => finish_and_init!(std::io::stderr),
            WriterConfig::File(path) => {
                let appender = try_create_rolling_file_appender(&path)?;
                finish_and_init!(appender)
            }
            WriterConfig::StdoutAndFile(path) => {
                let appender = try_create_rolling_file_appender(&path)?;
                let both = appender.and(std::io::stdout);
                finish_and_init!(both)
            }
        }
    }

    /// Installs a thread-local subscriber, returning a guard that restores
    /// the previous one on drop. Used in tests, where each test wants its
    /// own capture without fighting over the single process-global slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file writer can't be created.
    pub fn install_thread_local(self) -> Result<tracing::dispatcher::DefaultGuard> {
        let level_filter = self.level_filter;

        macro_rules! finish_and_set_default {
            ($writer:expr) => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_max_level(level_filter)
                    .without_time()
                    .with_thread_names(true)
                    .with_target(false)
                    .with_writer($writer)
                    .finish()
                    .set_default()
            };
        }

        Ok(match self.writer_config {
            WriterConfig::None => finish_and_set_default!(std::io::sink),
            WriterConfig::Stdout => finish_and_set_default!(std::io::stdout),
            WriterConfig::Stderr => finish_and_set_default!(std::io::stderr),
            WriterConfig::File(path) => {
                let appender = try_create_rolling_file_appender(&path)?;
                finish_and_set_default!(appender)
            }
            WriterConfig::StdoutAndFile(path) => {
                let appender = try_create_rolling_file_appender(&path)?;
                let both = appender.and(std::io::stdout);
                finish_and_set_default!(both)
            }
        })
    }
}

/// # Errors
///
/// Returns an error if `path_and_prefix` has no file name component.
fn try_create_rolling_file_appender(path_and_prefix: &str) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let path = PathBuf::from(path_and_prefix);
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), PathBuf::from);
    let file_name = path
        .file_name()
        .ok_or_else(|| BspError::Configuration(format!("no file name in log path {path_and_prefix:?}")))?;
    Ok(tracing_appender::rolling::never(parent, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_writer_installs_without_error() {
        let config = TracingConfig::new(WriterConfig::None, LevelFilter::DEBUG);
        let guard = config.install_thread_local();
        assert!(guard.is_ok());
    }

    #[test]
    fn file_writer_with_no_file_name_errors() {
        let config = TracingConfig::new(WriterConfig::File(String::new()), LevelFilter::DEBUG);
        assert!(config.install_thread_local().is_err());
    }
}
