use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Controls the log format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise
    /// [`LogFormat::Simplified`].
    #[default]
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for Outpost.
    #[serde(with = "level_serde")]
    pub level: Level,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based
    /// on the TTY.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Auto,
        }
    }
}

impl LogConfig {
    /// Creates a config with the given level name, falling back to `info`
    /// for unknown names.
    pub fn with_level(level: &str) -> Self {
        Self {
            level: Level::from_str(level).unwrap_or(Level::INFO),
            ..Self::default()
        }
    }
}

mod level_serde {
    use std::fmt;

    use serde::de::{Error, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(level)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl Visitor<'_> for V {
            type Value = Level;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a log level")
            }

            fn visit_str<E>(self, value: &str) -> Result<Level, E>
            where
                E: Error,
            {
                value
                    .parse()
                    .map_err(|_| Error::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(V)
    }
}

/// Builds the default filter: the configured level for outpost crates,
/// quieter levels for dependencies that are spammy on INFO.
fn default_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::new(format!(
        "{level},\
         hyper=WARN,\
         sqlx=WARN,\
         tower=WARN,\
         h2=WARN,\
         reqwest=WARN",
    ));

    for name in &[
        "outpost",
        "outpost_agent",
        "outpost_config",
        "outpost_crypto",
        "outpost_server",
        "outpost_storage",
    ] {
        if let Ok(directive) = format!("{name}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    filter
}

/// Initializes the logging system from the given config.
///
/// The `RUST_LOG` environment variable takes precedence over the configured
/// level. Safe to call only once; subsequent calls are ignored.
pub fn init(config: &LogConfig) {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.is_empty() => EnvFilter::new(value),
        _ => default_filter(config.level),
    };

    let format = match config.format {
        LogFormat::Auto if console::is_tty() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        other => other,
    };

    let fmt = tracing_subscriber::fmt::layer();
    let fmt = match format {
        LogFormat::Pretty => fmt.compact().with_ansi(true).boxed(),
        LogFormat::Simplified | LogFormat::Auto => fmt.with_ansi(false).boxed(),
        LogFormat::Json => fmt
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init();
}

mod console {
    use std::io::IsTerminal;

    pub fn is_tty() -> bool {
        std::io::stderr().is_terminal()
    }
}
