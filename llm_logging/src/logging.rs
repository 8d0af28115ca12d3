use std::{fmt::Write, fs::create_dir_all, path::Path, path::PathBuf};

use anyhow::Context;
use bon::Builder;
use colorful::Colorful;
use indenter::indented;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Rotated log files kept on disk, one per hour.
pub const MAX_LOG_FILES: usize = 6;

/// Where and how verbosely the process logs.
///
/// `RUST_LOG` directives, when set, refine `level`.
#[derive(Builder, Clone, Debug)]
pub struct LoggingConfig {
    #[builder(default = tracing::Level::INFO)]
    pub level: tracing::Level,

    /// `false` turns [`LoggingConfig::install`] into a no-op, for hosts with their own
    /// subscriber.
    #[builder(default = true)]
    pub enabled: bool,

    /// Shown in the banner and used as the log file prefix.
    #[builder(into, default = "llm_vram".to_string())]
    pub name: String,

    /// Pretty, hourly rotated log files are written here. Terminal only when unset.
    #[builder(into)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig::builder().build()
    }
}

impl LoggingConfig {
    /// Installs the subscriber as the process-wide default, so events raised on rayon worker
    /// threads reach it too. Fails if a global subscriber is already set.
    ///
    /// Terminal output goes to stderr; stdout belongs to the caller's report.
    pub fn install(&self) -> crate::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let file_layer = match &self.log_dir {
            Some(dir) => Some(
                fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_writer(rolling_appender(dir, &self.name)?),
            ),
            None => None,
        };
        let filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy();

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            );
        tracing::subscriber::set_global_default(subscriber)
            .context("a global tracing subscriber is already installed")?;

        eprintln!(
            "{}",
            format!("{} logging at {}", self.name, self.level)
                .color(colorful::RGB::new(0, 139, 248))
                .bold()
        );
        Ok(())
    }
}

fn rolling_appender(dir: &Path, prefix: &str) -> crate::Result<RollingFileAppender> {
    create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)?)
}

/// Writes `arg` indented by four spaces, without a trailing newline.
pub fn i_ln(f: &mut std::fmt::Formatter<'_>, arg: std::fmt::Arguments<'_>) -> std::fmt::Result {
    write!(indented(f), "{arg}")
}

pub fn i_nln(f: &mut std::fmt::Formatter<'_>, arg: std::fmt::Arguments<'_>) -> std::fmt::Result {
    writeln!(indented(f), "{arg}")
}

pub fn i_nlns(
    f: &mut std::fmt::Formatter<'_>,
    args: &[std::fmt::Arguments<'_>],
) -> std::fmt::Result {
    args.iter().try_for_each(|arg| i_nln(f, *arg))
}
