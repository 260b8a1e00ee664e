//! Tracing setup shared by the lanemap crates.
//!
//! Launch phases, geometry decisions and buffer traffic are all logged
//! through `tracing`. This crate decides how those events are rendered:
//!
//! - [`TracingProfile`] picks a preset (`local`, `ci`, `launch`)
//! - [`TracingConfig::from_env`] layers `LANEMAP_TRACING_*` overrides on top
//! - [`init_global_tracing`] installs the subscriber and applies the
//!   [`performance`] switches
//!
//! Tests call [`init_test_tracing`] instead so output lands in the test
//! harness capture.

pub mod performance;

#[macro_use]
mod macros;

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}

use performance::PerfSettings;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry};

/// Targets the `launch` profile raises to `debug`.
pub const ENGINE_TARGETS: [&str; 3] = ["lanemap_kernel", "lanemap_backends", "lanemap_tracing"];

#[derive(Debug, Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directives `{directives}`: {source}")]
    InvalidFilter {
        directives: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid value `{value}` for {key}")]
    InvalidSetting { key: &'static str, value: String },

    #[error("failed to install global tracing subscriber: {0}")]
    Install(#[source] TryInitError),
}

/// Named presets for [`TracingConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingProfile {
    /// Pretty, coloured output at `info`.
    #[default]
    Local,
    /// JSON at `info`, performance events off.
    Ci,
    /// JSON with engine crates at `debug` and span close timings.
    Launch,
}

impl FromStr for TracingProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ci" => Ok(Self::Ci),
            "launch" | "performance" => Ok(Self::Launch),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for TracingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Ci => "ci",
            Self::Launch => "launch",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl FromStr for TracingOutput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub profile: TracingProfile,
    /// Filter directives. `None` defers to `RUST_LOG`, then `fallback`.
    pub directives: Option<String>,
    pub fallback: String,
    pub output: TracingOutput,
    pub ansi: bool,
    pub targets: bool,
    pub span_events: FmtSpan,
    pub perf: PerfSettings,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_profile(TracingProfile::Local)
    }
}

impl TracingConfig {
    pub fn for_profile(profile: TracingProfile) -> Self {
        let base = Self {
            profile,
            directives: None,
            fallback: "info".to_string(),
            output: TracingOutput::Json,
            ansi: false,
            targets: true,
            span_events: FmtSpan::NONE,
            perf: PerfSettings::OFF,
        };
        match profile {
            TracingProfile::Local => Self {
                output: TracingOutput::Pretty,
                ansi: true,
                perf: PerfSettings::default(),
                ..base
            },
            TracingProfile::Ci => base,
            TracingProfile::Launch => Self {
                directives: Some(
                    ENGINE_TARGETS
                        .iter()
                        .map(|target| format!("{target}=debug"))
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                span_events: FmtSpan::CLOSE,
                perf: PerfSettings::ALL,
                ..base
            },
        }
    }

    pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        if output == TracingOutput::Json {
            self.ansi = false;
        }
        self
    }

    /// Read the configuration from the process environment.
    ///
    /// | Variable | Effect |
    /// |---|---|
    /// | `LANEMAP_TRACING_PROFILE` | `local` (default), `ci` or `launch` |
    /// | `LANEMAP_TRACING_DIRECTIVES` | filter directives |
    /// | `LANEMAP_TRACING_FORMAT` | `pretty`, `compact` or `json` |
    /// | `LANEMAP_PERF_TRACING` | `1`/`true`/`yes` or `0`/`false`/`no` |
    /// | `LANEMAP_PERF_THRESHOLD_US` | minimum span duration to report |
    pub fn from_env() -> Result<Self, TracingSetupError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TracingConfig::from_env`] with a caller-supplied lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TracingSetupError> {
        let read = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty()).map(|value| (key, value));

        let profile = match read("LANEMAP_TRACING_PROFILE") {
            Some((key, value)) => value
                .parse::<TracingProfile>()
                .map_err(|_| TracingSetupError::InvalidSetting { key, value })?,
            None => TracingProfile::default(),
        };
        let mut config = Self::for_profile(profile);

        if let Some((_, directives)) = read("LANEMAP_TRACING_DIRECTIVES") {
            config.directives = Some(directives);
        }
        if let Some((key, value)) = read("LANEMAP_TRACING_FORMAT") {
            let output = value
                .parse::<TracingOutput>()
                .map_err(|_| TracingSetupError::InvalidSetting { key, value })?;
            config = config.with_output(output);
        }
        if let Some((key, value)) = read("LANEMAP_PERF_TRACING") {
            config.perf.enabled = parse_switch(&value).ok_or(TracingSetupError::InvalidSetting { key, value })?;
        }
        if let Some((key, value)) = read("LANEMAP_PERF_THRESHOLD_US") {
            config.perf.threshold_us = value
                .trim()
                .parse()
                .map_err(|_| TracingSetupError::InvalidSetting { key, value })?;
        }
        Ok(config)
    }

    fn filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => EnvFilter::try_new(directives).map_err(|source| TracingSetupError::InvalidFilter {
                directives: directives.clone(),
                source,
            }),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.fallback))),
        }
    }

    fn format_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(self.targets)
            .with_span_events(self.span_events.clone());
        match self.output {
            TracingOutput::Compact => Box::new(layer.compact().with_ansi(self.ansi)),
            TracingOutput::Pretty => Box::new(layer.pretty().with_ansi(self.ansi)),
            TracingOutput::Json => Box::new(layer.json().with_ansi(false)),
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.filter()?;
    Ok(Registry::default().with(config.format_layer()).with(filter))
}

/// Install the subscriber process-wide and apply `config.perf`.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    let subscriber = build_subscriber(config)?;
    performance::configure(config.perf);
    subscriber.try_init().map_err(TracingSetupError::Install)
}

/// Route engine logs into the test harness capture.
///
/// `LANEMAP_TEST_LOG` sets the filter (default `debug`). Only the first call
/// installs anything.
pub fn init_test_tracing() {
    let filter = env::var("LANEMAP_TEST_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}
