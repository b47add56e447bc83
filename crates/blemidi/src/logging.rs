use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Target of every event the codec emits.
const CODEC_TARGET: &str = "blemidi_codec";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for the tool, `codec_level` for packet diagnostics.
///
/// The reader warns on dropped packets and abandoned SysEx and reports
/// skipped bytes at `debug`; per-event encode/decode lines are `trace`.
fn filter(level: LogLevel, codec_level: LogLevel) -> Targets {
    Targets::new()
        .with_target(CODEC_TARGET, codec_level.as_filter())
        .with_default(level.as_filter())
}

/// Install the stderr subscriber.
pub fn init_logging(format: LogFormat, level: LogLevel, codec_level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let registry = tracing_subscriber::registry().with(filter(level, codec_level));
    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}
