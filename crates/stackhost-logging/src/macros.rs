//! ---
//! sh_section: "03-logging"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Structured lifecycle events and logging macros."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
/// Emit an informational log carrying the lifecycle context.
#[macro_export]
macro_rules! sh_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            command = ctx.command.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::INFO, message = %format_args!($($arg)+));
    }};
}

/// Emit a warning carrying the lifecycle context.
#[macro_export]
macro_rules! sh_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            command = ctx.command.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::WARN, message = %format_args!($($arg)+));
    }};
}

/// Emit an error carrying the lifecycle context.
#[macro_export]
macro_rules! sh_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            command = ctx.command.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::ERROR, message = %format_args!($($arg)+));
    }};
}
