//! Launch and transfer instrumentation.
//!
//! Whether these events are emitted, and how long a [`PerformanceSpan`] must
//! run before it reports, is process-wide state set through [`configure`]
//! (normally by [`crate::init_global_tracing`]).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));
static THRESHOLD_US: AtomicU64 = AtomicU64::new(0);

/// Process-wide switches for performance events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSettings {
    pub enabled: bool,
    /// Spans shorter than this stay silent.
    pub threshold_us: u64,
}

impl PerfSettings {
    pub const OFF: Self = Self {
        enabled: false,
        threshold_us: 0,
    };

    pub const ALL: Self = Self {
        enabled: true,
        threshold_us: 0,
    };
}

impl Default for PerfSettings {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            threshold_us: 0,
        }
    }
}

pub fn configure(settings: PerfSettings) {
    ENABLED.store(settings.enabled, Ordering::Relaxed);
    THRESHOLD_US.store(settings.threshold_us, Ordering::Relaxed);
}

pub fn settings() -> PerfSettings {
    PerfSettings {
        enabled: enabled(),
        threshold_us: THRESHOLD_US.load(Ordering::Relaxed),
    }
}

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Whole microseconds elapsed since `start`, saturating.
pub fn micros_since(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Entered span guard that reports its duration when dropped.
///
/// Not `Send`: keep it on the thread that created it.
///
/// ```rust
/// use lanemap_tracing::performance::PerformanceSpan;
///
/// let span = PerformanceSpan::start("fit_geometry");
/// assert_eq!(span.name(), "fit_geometry");
/// ```
pub struct PerformanceSpan {
    name: &'static str,
    started: Instant,
    _entered: tracing::span::EnteredSpan,
}

impl PerformanceSpan {
    pub fn start(name: &'static str) -> Self {
        Self::within(name, tracing::debug_span!("perf", name))
    }

    /// Enter `span` and time `name` until the guard drops.
    pub fn within(name: &'static str, span: tracing::Span) -> Self {
        Self {
            name,
            started: Instant::now(),
            _entered: span.entered(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn elapsed_us(&self) -> u64 {
        micros_since(self.started)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let current = settings();
        let elapsed_us = self.elapsed_us();
        if current.enabled && elapsed_us >= current.threshold_us {
            tracing::debug!(elapsed_us, "span closed");
        }
    }
}

/// One finished kernel launch as seen by the resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchSample<'a> {
    pub resource: &'a str,
    pub groups: u64,
    pub lanes_per_group: u64,
    pub asynchronous: bool,
    /// Time spent in submit, plus the wait for synchronous launches.
    pub elapsed_us: u64,
}

impl LaunchSample<'_> {
    pub fn lanes(&self) -> u64 {
        self.groups.saturating_mul(self.lanes_per_group)
    }

    pub fn lanes_per_sec(&self) -> f64 {
        if self.elapsed_us == 0 {
            return 0.0;
        }
        self.lanes() as f64 * 1_000_000.0 / self.elapsed_us as f64
    }

    pub fn record(&self) {
        if !enabled() {
            return;
        }
        tracing::debug!(
            event = "launch",
            resource = self.resource,
            groups = self.groups,
            lanes_per_group = self.lanes_per_group,
            lanes = self.lanes(),
            asynchronous = self.asynchronous,
            elapsed_us = self.elapsed_us,
            lanes_per_sec = self.lanes_per_sec(),
            "kernel launched"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    ToBuffer,
    FromBuffer,
}

impl Transfer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToBuffer => "to_buffer",
            Self::FromBuffer => "from_buffer",
        }
    }
}

/// Report a copy between host memory and a resource buffer.
pub fn record_transfer(direction: Transfer, bytes: usize, elapsed_us: u64) {
    if !enabled() {
        return;
    }
    let mib_per_sec = if elapsed_us == 0 {
        0.0
    } else {
        bytes as f64 / elapsed_us as f64 * 1_000_000.0 / (1024.0 * 1024.0)
    };
    tracing::debug!(
        event = "transfer",
        direction = direction.as_str(),
        bytes,
        elapsed_us,
        mib_per_sec,
        "buffer copied"
    );
}
