use std::fmt::{self as stdfmt, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use rv_config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// ---------------------------------------------------------------------------
// FileFields -- separate span field cache for the file layer
// ---------------------------------------------------------------------------

/// Without a distinct `FormatFields` type both fmt layers would share one
/// `FormattedFields` extension per span, and the file layer would reuse the
/// console's ANSI-coloured field text.
#[derive(Default)]
struct FileFields(DefaultFields);

impl<'writer> FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// DomainFormat -- `[domain]` prefix for plain-text output
// ---------------------------------------------------------------------------

/// Plain-text event formatter that lifts the `domain` field set by the
/// `rv_*!` macros into a `[domain]` prefix:
///
/// ```text
/// 2026-10-19T08:01:02Z  WARN [pipe] rule_execution{rule_uid=cpu-high attempt=2}: rule evaluation failed, retrying rule=1/cpu-high
/// ```
pub(crate) struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    pub(crate) fn new() -> Self {
        Self { timer: SystemTime }
    }
}

fn paint(writer: &mut Writer<'_>, ansi: bool, code: &str, text: &dyn stdfmt::Display) -> stdfmt::Result {
    if ansi {
        write!(writer, "\x1b[{code}m{text}\x1b[0m")
    } else {
        write!(writer, "{text}")
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let ansi = writer.has_ansi_escapes();

        if ansi {
            write!(writer, "\x1b[2m")?;
        }
        if self.timer.format_time(&mut writer).is_err() {
            write!(writer, "<unknown time>")?;
        }
        if ansi {
            write!(writer, "\x1b[0m")?;
        }

        let level = *event.metadata().level();
        write!(writer, " ")?;
        paint(&mut writer, ansi, level_color(level), &format_args!("{level:>5}"))?;
        write!(writer, " ")?;

        let mut fields = FieldSplitter::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint(&mut writer, ansi, "1;36", &format_args!("[{domain}]"))?;
            write!(writer, " ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint(&mut writer, ansi, "1", &span.name())?;
                let ext = span.extensions();
                match ext.get::<FormattedFields<N>>() {
                    Some(f) if !f.is_empty() => write!(writer, "{{{f}}}: ")?,
                    _ => write!(writer, ": ")?,
                }
            }
        }

        write!(writer, "{}", fields.message)?;
        if !fields.rest.is_empty() {
            write!(writer, " ")?;
            paint(&mut writer, ansi, "3", &fields.rest)?;
        }
        writeln!(writer)
    }
}

// ---------------------------------------------------------------------------
// FieldSplitter -- separates domain and message from the other fields
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FieldSplitter {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl FieldSplitter {
    fn push(&mut self, name: &str, value: stdfmt::Arguments<'_>) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        write!(&mut self.rest, "{name}={value}").ok();
    }
}

impl Visit for FieldSplitter {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.push(name, format_args!("{value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => self.domain = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => {
                write!(&mut self.message, "{value:?}").ok();
            }
            name => self.push(name, format_args!("{value:?}")),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field.name(), format_args!("{value}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field.name(), format_args!("{value}"));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field.name(), format_args!("{value}"));
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Install the global `tracing` subscriber described by `config`.
///
/// Logs always go to stderr; `config.file` adds a non-blocking file writer.
/// Relative file paths are resolved against `base_dir`. The returned
/// [`WorkerGuard`] must be held until exit, dropping it flushes the file.
///
/// `RUST_LOG`, when set, replaces the configured level and module overrides.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.format)];
    let mut guard = None;
    if let Some(file) = &config.file {
        let path = if file.is_relative() {
            base_dir.join(file)
        } else {
            file.clone()
        };
        let dir = path
            .parent()
            .context("log file path has no parent directory")?;
        let name = path.file_name().context("log file path has no file name")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;

        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(file_layer(config.format, writer));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("installing tracing subscriber")?;
    rv_debug!(conf,
        filter = %config.directives(),
        format = ?config.format,
        file = ?config.file,
        "tracing initialised"
    );
    Ok(guard)
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    let directives = config.directives();
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
    }
}
