/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so callers never spell the string
/// literal themselves. Domains used by the runtime:
///
/// | domain  | covers                                                  |
/// |---------|---------------------------------------------------------|
/// | `sys`   | supervisor / registry lifecycle (start, stop, cleanup)  |
/// | `pipe`  | the evaluation pipeline (attempts, resets, sends)       |
/// | `conf`  | configuration and tracing setup                         |
///
/// ```ignore
/// rv_info!(sys, rule = %key, "rule supervisor started");
/// rv_warn!(pipe, error = %e, attempt, "evaluation failed");
/// ```
///
/// The domain is a bare identifier, converted to a `&str` by the macro.

#[doc(hidden)]
macro_rules! rv_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

/// Log at ERROR level with an automatic `domain` field.
macro_rules! rv_error {
    ($domain:ident, $($rest:tt)*) => {
        rv_log!(error, $domain, $($rest)*)
    };
}

/// Log at WARN level with an automatic `domain` field.
macro_rules! rv_warn {
    ($domain:ident, $($rest:tt)*) => {
        rv_log!(warn, $domain, $($rest)*)
    };
}

/// Log at INFO level with an automatic `domain` field.
macro_rules! rv_info {
    ($domain:ident, $($rest:tt)*) => {
        rv_log!(info, $domain, $($rest)*)
    };
}

/// Log at DEBUG level with an automatic `domain` field.
macro_rules! rv_debug {
    ($domain:ident, $($rest:tt)*) => {
        rv_log!(debug, $domain, $($rest)*)
    };
}

/// Log at TRACE level with an automatic `domain` field.
#[allow(unused_macros)]
macro_rules! rv_trace {
    ($domain:ident, $($rest:tt)*) => {
        rv_log!(trace, $domain, $($rest)*)
    };
}
