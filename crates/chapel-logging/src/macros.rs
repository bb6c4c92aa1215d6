//! ---
//! chapel_section: "03-persistence-logging"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Structured logging adapters and sinks."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
#[doc(hidden)]
#[macro_export]
macro_rules! __chapel_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            identity = ctx.identity.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            key = ctx.key.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with access context.
#[macro_export]
macro_rules! chapel_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with access context.
#[macro_export]
macro_rules! chapel_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with access context.
#[macro_export]
macro_rules! chapel_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__chapel_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}
