//! Unified error handling for the route registry
//!
//! Every error raised by registration, compilation or a request pipeline is a
//! [`RouterError`]. Messages carry a namespaced code (`[$router:badrt] ...`)
//! rendered by [`format_message`], so that logs and error handlers can tell the
//! failure class apart without matching on prose.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const ROUTER_NAMESPACE: &str = "$router";
pub const INJECTOR_NAMESPACE: &str = "$injector";

static TEMPLATE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\d+)\}").unwrap());

/// Namespaced error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed route or configuration (registration time)
    BadRoute,
    /// Controller missing (request time)
    NoController,
    /// Action exists but is not callable (request time)
    NoAction,
    /// Filter did not yield a callable filter (request time)
    BadFilter,
    /// The injector has no provider for a dependency (request time)
    UnknownProvider,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRoute => "badrt",
            ErrorCode::NoController => "noctrl",
            ErrorCode::NoAction => "noact",
            ErrorCode::BadFilter => "badflt",
            ErrorCode::UnknownProvider => "unpr",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            ErrorCode::UnknownProvider => INJECTOR_NAMESPACE,
            _ => ROUTER_NAMESPACE,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace(), self.as_str())
    }
}

/// Unified error types for the router
#[derive(Debug, Clone)]
pub enum RouterError {
    /// Structural route errors, raised while registering (`badrt`)
    Configuration(String),

    /// Controller or action lookup failures (`noctrl`, `noact`)
    Lookup(ErrorCode, String),

    /// Filter resolution failures (`badflt`)
    Filter(String),

    /// Dependency injection failures (`unpr`)
    Injector(String),

    /// Errors raised by application handlers, the `next(err)` payload
    Handler(String),

    /// Config file parsing and validation errors
    Validation(String),

    /// Internal system errors
    Internal(String),
}

impl RouterError {
    /// Build a coded error, rendering `template` with positional arguments.
    pub fn new(code: ErrorCode, template: &str, args: &[String]) -> Self {
        let message = format_message(code.namespace(), code.as_str(), template, args);
        match code {
            ErrorCode::BadRoute => RouterError::Configuration(message),
            ErrorCode::NoController | ErrorCode::NoAction => RouterError::Lookup(code, message),
            ErrorCode::BadFilter => RouterError::Filter(message),
            ErrorCode::UnknownProvider => RouterError::Injector(message),
        }
    }

    /// Error raised by an application handler.
    pub fn handler(msg: impl Into<String>) -> Self {
        RouterError::Handler(msg.into())
    }

    /// The namespaced code carried by this error, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            RouterError::Configuration(_) => Some(ErrorCode::BadRoute),
            RouterError::Lookup(code, _) => Some(*code),
            RouterError::Filter(_) => Some(ErrorCode::BadFilter),
            RouterError::Injector(_) => Some(ErrorCode::UnknownProvider),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RouterError::Configuration(msg)
            | RouterError::Lookup(_, msg)
            | RouterError::Filter(msg)
            | RouterError::Injector(msg)
            | RouterError::Handler(msg)
            | RouterError::Validation(msg)
            | RouterError::Internal(msg) => msg,
        }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            RouterError::Lookup(_, msg) => write!(f, "Lookup error: {msg}"),
            RouterError::Filter(msg) => write!(f, "Filter error: {msg}"),
            RouterError::Injector(msg) => write!(f, "Injector error: {msg}"),
            RouterError::Handler(msg) => write!(f, "Handler error: {msg}"),
            RouterError::Validation(msg) => write!(f, "Validation error: {msg}"),
            RouterError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for RouterError {}

/// Result type alias for router operations
pub type RouterResult<T> = std::result::Result<T, RouterError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> RouterResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> RouterResult<T> {
        self.map_err(|e| RouterError::Internal(format!("{context}: {e}")))
    }
}

/// Render `[namespace:code] template`, replacing `{n}` with the n-th argument.
///
/// Markers without a matching argument are kept as-is.
pub fn format_message(namespace: &str, code: &str, template: &str, args: &[String]) -> String {
    let body = TEMPLATE_MARKER.replace_all(template, |caps: &Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| args.get(index))
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    });

    if namespace.is_empty() {
        format!("[{code}] {body}")
    } else {
        format!("[{namespace}:{code}] {body}")
    }
}

/// Convenience macro for coded error creation
#[macro_export]
macro_rules! router_error {
    ($code:expr, $template:expr) => {
        $crate::core::error::RouterError::new($code, $template, &[])
    };
    ($code:expr, $template:expr, $($arg:expr),+ $(,)?) => {
        $crate::core::error::RouterError::new($code, $template, &[$($arg.to_string()),+])
    };
}
