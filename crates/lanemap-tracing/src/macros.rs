/// Time the enclosing scope inside a `perf` span carrying the given fields.
///
/// ```rust
/// use lanemap_tracing::perf_span;
///
/// let _span = perf_span!("run_range", groups = 4, lanes = 256);
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr $(, $field:ident = $value:expr)* $(,)?) => {
        $crate::performance::PerformanceSpan::within(
            $name,
            $crate::__private::tracing::debug_span!("perf", name = $name $(, $field = $value)*),
        )
    };
}

/// Debug event tagged `event = <name>`, skipped while performance events are off.
///
/// ```rust
/// use lanemap_tracing::perf_event;
///
/// perf_event!("buffer_acquired", handle = 3, bytes = 128);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr $(, $field:ident = $value:expr)* $(,)?) => {
        if $crate::performance::enabled() {
            $crate::__private::tracing::debug!(event = $name $(, $field = $value)*);
        }
    };
}

/// Evaluate a block, yielding `(value, elapsed_us)`.
///
/// ```rust
/// use lanemap_tracing::timed_block;
///
/// let (sum, _elapsed_us) = timed_block!("sum", { (1..=10).sum::<u32>() });
/// assert_eq!(sum, 55);
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $body:block) => {{
        let started = ::std::time::Instant::now();
        let value = $body;
        let elapsed_us = $crate::performance::micros_since(started);
        $crate::__private::tracing::trace!(operation = $name, elapsed_us, "timed");
        (value, elapsed_us)
    }};
}
