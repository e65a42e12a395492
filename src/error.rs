//! Error types shared by the property cache and the dispatch engine.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the crate can surface.
///
/// All errors are raised synchronously at the call site. There is no
/// partial result or degraded mode.
#[derive(Debug, Error)]
pub enum Error {
    /// No overload in a dispatch tree matched the argument types.
    ///
    /// Internal to dispatch: callers catch it and fall back to the default.
    #[error("no overload matches the given argument types")]
    NoMatch,

    /// A class definition was rejected while it was being built.
    #[error("illegal construction: {0}")]
    IllegalConstruction(String),

    /// A parameter without a default is missing from the option store.
    #[error("parameter \"{0}\" used but is not specified in options")]
    MissingOption(String),

    /// A property id is not part of the owning class's property table.
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// Member lookup on a class failed.
    #[error("{class} has no member named \"{name}\"")]
    NoSuchMember { class: String, name: String },

    /// A property was requested while it was already being computed.
    #[error("cyclic property dependency: {0}")]
    CyclicDependency(String),

    /// Caller supplied the wrong number of positional arguments.
    #[error("{name} expects {expected} caller arguments, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// An argument failed a declared-type assertion.
    #[error("{name}: argument {index} is {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        index: usize,
        expected: String,
        actual: String,
    },

    /// An instance-bound method was invoked without an instance.
    #[error("method \"{0}\" must be called on an instance")]
    UnboundMethod(String),

    /// Malformed configuration input.
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_option_message() {
        let err = Error::MissingOption("hej".to_string());
        assert_eq!(
            err.to_string(),
            "parameter \"hej\" used but is not specified in options"
        );
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
