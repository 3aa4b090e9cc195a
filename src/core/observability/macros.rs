/// Creates a root span based on the configured sampling rate.
///
/// Span sampling is a pre-filter here: an unsampled request gets
/// `Span::none()` and every child span macro below short-circuits,
/// so the span machinery costs nothing on the hot path.
///
/// # Behavior
/// - If a parent span exists (is active): always creates a child span
/// - If no parent exists: makes the sampling decision at the given rate
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name)
        } else {
            tracing::Span::none()
        }
    }};
    ($sample_percent:expr, $span_name:literal, $($fields:tt)*) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name, $($fields)*)
        } else {
            tracing::Span::none()
        }
    }};
}

/// Creates an INFO-level child span only if the parent span is active
/// (sampled). Returns an un-entered `Span` - call `.entered()` or use
/// `.instrument()`.
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// DEBUG-level variant of ['child_span_info!']
#[macro_export]
macro_rules! child_span_debug {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
