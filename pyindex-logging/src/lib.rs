//! Tracing subscriber setup shared by the pyindex binaries.
//!
//! Configured from the environment:
//!
//! | Variable        | Values                              | Default                |
//! |-----------------|-------------------------------------|------------------------|
//! | `LOG_LEVEL`     | any `EnvFilter` directive           | `info`                 |
//! | `LOG_FORMAT`    | `human`, `json`                     | `human`                |
//! | `LOG_OUTPUT`    | `console`, `file`, `both`, `none`   | `console`              |
//! | `LOG_FILE_PATH` | path of the daily-rolled log file   | `$TMPDIR/pyindex.log`  |
//!
//! `RUST_LOG`, when set, takes precedence over `LOG_LEVEL`.

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

const DEFAULT_LOG_FILE: &str = "pyindex.log";

/// Directives always appended so dependency chatter stays quiet.
const QUIET_DEPENDENCIES: &[&str] = &["tokio=warn", "hyper=warn", "h2=warn"];

// --- Custom "Tee" Writer ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A, B> Write for Tee<A, B>
where
    A: Write,
    B: Write,
{
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

impl<'a, A, B, W1, W2> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a, Writer = W1>,
    B: MakeWriter<'a, Writer = W2>,
    W1: Write + 'a,
    W2: Write + 'a,
{
    type Writer = Tee<W1, W2>;
    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

impl LogOutput {
    fn to_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            output: LogOutput::Console,
            file_path: env::temp_dir().join(DEFAULT_LOG_FILE),
        }
    }
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; unknown values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        let output = match lookup("LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            _ => LogOutput::Console,
        };

        Self {
            level: lookup("LOG_LEVEL")
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            format,
            output,
            file_path: lookup("LOG_FILE_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in QUIET_DEPENDENCIES {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    fn file_location(&self) -> (PathBuf, PathBuf) {
        let dir = self
            .file_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(env::temp_dir);
        let name = self
            .file_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        (dir, name)
    }
}

/// Installs the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Calling this twice is harmless; the second call
/// leaves the first subscriber in place.
pub fn init_subscriber(settings: &LogSettings) -> Option<WorkerGuard> {
    let subscriber = registry().with(settings.env_filter());
    let is_json = settings.format == LogFormat::Json;
    let mut guard: Option<WorkerGuard> = None;

    let result = match (settings.output.to_console(), settings.output.to_file()) {
        (true, true) => {
            let (dir, name) = settings.file_location();
            let file_appender = tracing_appender::rolling::daily(dir, name);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(file_guard);

            let tee_writer = MakeTee {
                make_a: std::io::stdout,
                make_b: non_blocking,
            };

            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(tee_writer);
            if is_json {
                subscriber.with(fmt_layer.json()).try_init()
            } else {
                subscriber.with(fmt_layer.pretty()).try_init()
            }
        }
        (true, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
            if is_json {
                subscriber.with(fmt_layer.json()).try_init()
            } else {
                subscriber.with(fmt_layer.pretty()).try_init()
            }
        }
        (false, true) => {
            let (dir, name) = settings.file_location();
            let file_appender = tracing_appender::rolling::daily(dir, name);
            let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
            guard = Some(file_guard);

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking);
            if is_json {
                subscriber.with(fmt_layer.json()).try_init()
            } else {
                subscriber.with(fmt_layer.pretty()).try_init()
            }
        }
        (false, false) => subscriber.try_init(),
    };

    if result.is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
    guard
}
