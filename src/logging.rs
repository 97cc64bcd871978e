//! Logging setup for service-container
//!
//! Container events are emitted with `tracing` under the `service_container`
//! target: registrations and constructions at DEBUG, cache hits and generic
//! fallbacks at TRACE. This module installs a `tracing-subscriber` for them.
//!
//! # Features
//!
//! - `logging` - Emit container events (default)
//! - `logging-json` - JSON subscriber output (production)
//! - `logging-pretty` - Human-readable subscriber output (development)
//!
//! # Example
//!
//! ```rust,ignore
//! use service_container::logging;
//!
//! // JSON if logging-json is enabled, pretty otherwise
//! logging::init();
//!
//! // Or configure explicitly
//! logging::builder()
//!     .trace()
//!     .container_only()
//!     .from_env()
//!     .compact()
//!     .init();
//! ```

use tracing::Level;

/// Target used by every container event.
pub const TARGET: &str = "service_container";

/// Subscriber output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON objects, one per line
    #[default]
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single line per event
    Compact,
}

/// Builder for the global subscriber
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    from_env: bool,
    source_location: bool,
    thread_info: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            from_env: false,
            source_location: false,
            thread_info: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show container events
    pub fn container_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Let `RUST_LOG` override the configured filter when it is set
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Include file and line of each event
    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    /// Include thread ids and names
    pub fn with_thread_info(mut self) -> Self {
        self.thread_info = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Filter directive derived from the level and target settings
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string().to_lowercase(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Panics if a global subscriber is already set, like
    /// `tracing_subscriber::util::SubscriberInitExt::init`.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

        let filter = if self.from_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
        } else {
            EnvFilter::new(self.directive())
        };

        let base = fmt::layer()
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_thread_ids(self.thread_info)
            .with_thread_names(self.thread_info)
            .with_target(true);

        let layer = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => base.json().boxed(),
            // Without logging-json the JSON request degrades to the default text format
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        };

        tracing_subscriber::registry().with(filter).with(layer).init();
    }

    /// No-op without a subscriber feature
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// JSON with `logging-json`, pretty otherwise.
pub fn init() {
    if cfg!(feature = "logging-json") {
        init_json();
    } else {
        init_pretty();
    }
}

/// JSON output at DEBUG.
pub fn init_json() {
    builder().json().debug().init();
}

/// Pretty output at DEBUG.
pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Container events only, honouring `RUST_LOG`.
pub fn init_container_only() {
    builder().container_only().from_env().debug().init();
}
