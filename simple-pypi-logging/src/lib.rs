//! Tracing subscriber setup for the simple PyPI server.
//!
//! Output is driven by environment variables so the same binary can log to a
//! terminal during development and to a rolling file when left running:
//!
//! - `LOG_LEVEL`: filter directive used when `RUST_LOG` is unset (default `info`)
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_OUTPUT`: `console`, `file` or `both`
//! - `LOG_FILE_PATH`: log file location (default `/tmp/simple-pypi.log`)

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

const DEFAULT_LOG_FILE: &str = "/tmp/simple-pypi.log";

// --- Custom "Tee" Writer ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Console,
        }
    }

    fn console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub output: LogOutput,
    pub file_path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            output: LogOutput::Console,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogSettings {
    /// Read settings from the `LOG_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: lookup("LOG_LEVEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.level),
            json: lookup("LOG_FORMAT").is_some_and(|v| v.trim().eq_ignore_ascii_case("json")),
            output: lookup("LOG_OUTPUT")
                .map(|v| LogOutput::parse(&v))
                .unwrap_or(defaults.output),
            file_path: lookup("LOG_FILE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        ["tokio=warn", "hyper=warn", "reqwest=warn"]
            .iter()
            .filter_map(|d| d.parse().ok())
            .fold(filter, |f, directive| f.add_directive(directive))
    }

    fn file_parts(&self) -> (&Path, &Path) {
        let dir = self
            .file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("/tmp"));
        let name = self
            .file_path
            .file_name()
            .map(Path::new)
            .unwrap_or_else(|| Path::new("simple-pypi.log"));
        (dir, name)
    }
}

/// Initializes the global tracing subscriber based on environment variables.
///
/// The returned guard must be held for the life of the process when file
/// output is enabled, otherwise buffered lines are lost on exit.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

/// Initializes the global tracing subscriber from explicit settings.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let subscriber = registry().with(settings.env_filter());
    let (dir, name) = settings.file_parts();

    match (settings.output.console(), settings.output.file()) {
        (true, true) => {
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let writer = MakeTee {
                make_a: io::stderr,
                make_b: non_blocking,
            };
            let layer = tracing_subscriber::fmt::layer().with_writer(writer);
            if settings.json {
                subscriber.with(layer.json()).init();
            } else {
                subscriber.with(layer).init();
            }
            Some(guard)
        }
        (false, true) => {
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking);
            if settings.json {
                subscriber.with(layer.json()).init();
            } else {
                subscriber.with(layer).init();
            }
            Some(guard)
        }
        _ => {
            let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
            if settings.json {
                subscriber.with(layer.json()).init();
            } else {
                subscriber.with(layer).init();
            }
            None
        }
    }
}
