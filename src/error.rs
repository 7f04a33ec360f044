//! Error types for URI parsing, configuration, and the URI managers.
//!
//! Request-level problems never show up here: a malformed inbound URI is
//! reported as [`UriStatus::BadUri`](crate::UriStatus::BadUri). These types
//! cover structural parse failures and operator misconfiguration.

use thiserror::Error;

/// Errors that can occur when parsing a URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse URI '{input}': {kind}")]
pub struct ParseError {
    /// The input that failed to parse
    pub input: String,
    /// The specific error that occurred
    pub kind: ParseErrorKind,
}

/// Specific parsing error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Scheme does not start with a letter or contains invalid characters
    #[error("invalid scheme '{scheme}'; must start with a letter followed by letters, digits, '+', '-' or '.'")]
    InvalidScheme {
        /// The offending scheme
        scheme: String,
    },
    /// Character not permitted anywhere in a URI
    #[error("illegal character {char:?} at position {position}")]
    IllegalChar {
        /// The illegal character
        char: char,
        /// Byte position in the input
        position: usize,
    },
    /// A '%' not followed by two hex digits
    #[error("malformed percent escape at position {position}")]
    InvalidPercentEncoding {
        /// Byte position of the '%'
        position: usize,
    },
    /// Port is present but not numeric
    #[error("invalid port '{port}'")]
    InvalidPort {
        /// The offending port text
        port: String,
    },
}

/// Required container configuration is absent.
///
/// This is an operator error, never a request-level status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required key has no value for the container or its default
    #[error("missing required config '{key}' for container '{container}'")]
    MissingKey {
        /// Container that was looked up
        container: String,
        /// Key that was required
        key: String,
    },
    /// A key has a value that cannot be used
    #[error("invalid value '{value}' for config '{key}' in container '{container}'")]
    InvalidValue {
        /// Container that was looked up
        container: String,
        /// Key holding the value
        key: String,
        /// The offending value
        value: String,
    },
}

impl ConfigError {
    /// Creates a `MissingKey` error.
    #[must_use]
    pub fn missing(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            container: container.into(),
            key: key.into(),
        }
    }
}

/// Errors raised by [`ProxyUriManager`](crate::ProxyUriManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyUriError {
    /// Proxy host or path is not configured
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The inbound URI was not addressed to this container's proxy host
    #[error("proxy host mismatch: expected '{expected}', found '{found}'")]
    HostMismatch {
        /// Configured proxy host
        expected: String,
        /// Authority of the inbound URI
        found: String,
    },
}

/// Errors raised by [`ConcatUriManager`](crate::ConcatUriManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcatUriError {
    /// Concat host or path is not configured
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The requested combination cannot be produced
    #[error("unsupported concat operation: {reason}")]
    UnsupportedOperation {
        /// What was requested
        reason: &'static str,
    },
}

/// Errors raised by a [`TokenCodec`](crate::TokenCodec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token fields could not be encoded
    #[error("failed to encode security token: {0}")]
    Encode(String),
    /// Token string could not be decoded or verified
    #[error("failed to decode security token: {0}")]
    Decode(String),
}

/// Errors raised by [`IframeUriManager`](crate::IframeUriManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IframeUriError {
    /// Base path or domain is not configured
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The container requires a locked domain and none is available
    #[error("gadget '{gadget}' requires a locked domain in container '{container}'")]
    LockedDomainRequired {
        /// Gadget spec URL
        gadget: String,
        /// Container being rendered
        container: String,
    },
    /// Configured domain does not form a valid authority
    #[error("invalid rendering domain '{domain}': {source}")]
    InvalidDomain {
        /// The configured or generated domain
        domain: String,
        /// Why it failed to parse
        source: ParseError,
    },
    /// Security token could not be produced
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Errors raised by [`JsUriManager`](crate::JsUriManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsUriError {
    /// JS host or path is not configured
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Configured JS host does not parse
    #[error("invalid JS host '{host}': {source}")]
    InvalidHost {
        /// The configured host
        host: String,
        /// Why it failed to parse
        source: ParseError,
    },
}
