//! Structured logging helpers.
//!
//! Every event emitted through these macros carries a `component` field so
//! logs from the bus, the host and individual handlers can be filtered on
//! one key, in both pretty and JSON output.

/// Emit an event tagged with a component name.
///
/// ```rust,ignore
/// log_event!(info, "courier-host", "Heartbeat sent", sequence = 4);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}
