//! Error types for routing and dispatch.

use thiserror::Error;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No route matched the path, or a controller has no member for it.
    #[error("no route found for path: {path}{}", .reason.as_ref().map(|r| format!(" ({r})")).unwrap_or_default())]
    NotFound {
        path: String,
        reason: Option<String>,
    },

    /// A route matched, but none of its handlers accepts the method.
    #[error("method {method} not allowed for path: {path} (allowed: {})", .allowed.join(", "))]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    /// The router or one of its handlers is misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// A path segment could not be turned into a handler argument.
    #[error(transparent)]
    ArgumentBinding(#[from] BindingError),

    /// Middleware rejected the request.
    #[error("middleware rejected request: {0}")]
    Rejected(String),
}

impl RouterError {
    pub(crate) fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            reason: None,
        }
    }

    /// Returns `true` for errors caused by registration or wiring mistakes.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Programming errors: detected at registration or on first dispatch.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The normalized pattern is already registered.
    #[error("route with pattern '{pattern}' is already registered")]
    DuplicatePattern { pattern: String },

    /// A declared route has fewer wildcards than required path parameters.
    #[error(
        "route '{pattern}' has {wildcards} wildcard(s) but handler '{handler}' expects {expected} route parameter(s)"
    )]
    WildcardMismatch {
        pattern: String,
        wildcards: usize,
        handler: String,
        expected: usize,
    },

    /// A variadic parameter is followed by further parameters.
    #[error("variadic parameter '{param}' must be the last parameter of '{handler}'")]
    VariadicNotLast { handler: String, param: String },

    /// The controller base path does not prefix the registered pattern.
    #[error("route mismatch: base path '{base}' of {controller} does not match registered pattern '/{pattern}'")]
    BasePathMismatch {
        controller: &'static str,
        base: String,
        pattern: String,
    },

    /// A dependency was requested but no container is installed.
    #[error("cannot resolve {type_name}: no container configured")]
    MissingContainer { type_name: &'static str },

    /// The container has no entry for a requested type.
    #[error("container could not resolve {type_name}")]
    UnresolvedDependency { type_name: &'static str },

    /// The container returned an object of another type.
    #[error("container returned a value that is not a {type_name}")]
    WrongDependencyType { type_name: &'static str },

    /// A middleware reference resolved to something that cannot handle requests.
    #[error("required middleware method handle() is missing on {type_name}")]
    NotMiddleware { type_name: &'static str },

    /// `member` was called on a closure route.
    #[error("defining a controller member on a closure route is not supported ('{pattern}')")]
    MemberOnClosure { pattern: String },

    /// `disable_reflection` was called on a controller route.
    #[error("disabling reflection is only supported for closures ('{pattern}')")]
    ReflectionOnController { pattern: String },

    /// Middleware was attached to a route with reflection disabled.
    #[error("route '{pattern}' has reflection disabled and cannot run middleware")]
    MiddlewareOnRawRoute { pattern: String },

    /// The pinned member does not exist.
    #[error("{controller} has no member named '{member}'")]
    UnknownMember {
        controller: &'static str,
        member: String,
    },

    /// The pinned member is not public.
    #[error("route method '{member}' of {controller} is not a public method")]
    MemberNotPublic {
        controller: &'static str,
        member: String,
    },

    /// An HTTP method name could not be parsed.
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),
}

/// Data-dependent failures while turning segments into arguments.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A segment failed scalar conversion.
    #[error("invalid value '{value}' for parameter '{param}' in {handler}: expected {expected}")]
    InvalidValue {
        handler: String,
        param: String,
        value: String,
        expected: &'static str,
    },

    /// A segment matched no enum case.
    #[error("invalid enum value '{value}' for parameter '{param}' ({enum_name}) in {handler}")]
    InvalidEnum {
        handler: String,
        param: String,
        value: String,
        enum_name: &'static str,
    },

    /// A segment matched none of the accepted date formats.
    #[error("invalid date/time '{value}' for parameter '{param}' in {handler}")]
    InvalidDateTime {
        handler: String,
        param: String,
        value: String,
    },

    /// A required parameter had no segment left.
    #[error("missing required parameter '{param}' ({type_name}) in {handler}")]
    MissingArgument {
        handler: String,
        param: String,
        type_name: &'static str,
    },

    /// Segments were left over after every parameter was bound.
    #[error("too many arguments passed to {handler}: {extra:?}")]
    TooManyArguments { handler: String, extra: Vec<String> },
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
