use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Shape of the log lines written to stdout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, with file and line.
    Json,
    /// `key=value` pairs.
    LogFmt,
    #[default]
    Terminal,
}

impl LogFormat {
    pub(crate) fn layer(
        self,
        filter: EnvFilter,
        use_color: bool,
    ) -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
        match self {
            Self::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(use_color)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter)
                .boxed(),
            Self::LogFmt => tracing_logfmt::layer().with_filter(filter).boxed(),
            Self::Terminal => tracing_subscriber::fmt::layer()
                .with_ansi(use_color)
                .with_target(true)
                .with_filter(filter)
                .boxed(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::LogFmt => "logfmt",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log format `{0}`, expected one of: json, logfmt, terminal")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Json, Self::LogFmt, Self::Terminal]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLogFormat(s.to_owned()))
    }
}
