//! Logging shared by the portal binaries.
//!
//! Warnings and errors go to stderr (overridable through `RUST_LOG`) while everything down to
//! trace level goes to a file in the temp directory.
use std::{
    env,
    fs::File,
    iter,
    path::{Path, PathBuf},
};

use log::{info, LevelFilter, Log, Metadata, Record};

/// Stderr, plus the log file when it could be created.
struct Tee {
    stderr: env_logger::Logger,
    file: Option<env_logger::Logger>,
}

impl Tee {
    fn loggers(&self) -> impl Iterator<Item = &env_logger::Logger> {
        iter::once(&self.stderr).chain(&self.file)
    }

    fn max_level(&self) -> LevelFilter {
        self.loggers()
            .map(env_logger::Logger::filter)
            .max()
            .unwrap_or(LevelFilter::Off)
    }
}

impl Log for Tee {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.loggers().any(|logger| logger.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        self.loggers()
            .filter(|logger| logger.enabled(record.metadata()))
            .for_each(|logger| logger.log(record));
    }

    fn flush(&self) {
        self.loggers().for_each(env_logger::Logger::flush);
    }
}

/// Points at the log file if the run ends without [`Guard::disarm`] being called.
pub struct Guard {
    file: Option<PathBuf>,
}

impl Guard {
    pub fn disarm(&mut self) {
        if let Some(file) = self.file.take() {
            info!("Full log stored in {}", file.display());
        }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(file) = self.file.as_ref() {
            eprintln!("Run failed, full log stored in {}", file.display());
        }
    }
}

fn file_path(app: &str) -> PathBuf {
    env::temp_dir().join(app).with_extension("log")
}

fn file_logger(path: &Path) -> Option<env_logger::Logger> {
    let target = env_logger::Target::Pipe(Box::new(File::create(path).ok()?));
    Some(
        env_logger::Builder::new()
            .filter_level(LevelFilter::Trace)
            .filter_module("hyper_util", LevelFilter::Debug)
            .filter_module("rustls", LevelFilter::Info)
            .target(target)
            .build(),
    )
}

/// Terse lines for a person at a terminal; the file keeps timestamps and module paths.
fn stderr_logger() -> env_logger::Logger {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .parse_default_env()
        .build()
}

/// Install the global logger for the binary called `app`.
///
/// Falls back to stderr only if the log file cannot be created. Panics if a logger has already
/// been installed.
pub fn init(app: &str) -> Guard {
    let path = file_path(app);
    let tee = Tee {
        stderr: stderr_logger(),
        file: file_logger(&path),
    };
    let max_level = tee.max_level();
    let file = tee.file.is_some().then_some(path);

    log::set_boxed_logger(Box::new(tee)).expect("Logger is installed only once");
    log::set_max_level(max_level);

    Guard { file }
}
