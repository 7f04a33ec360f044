//! Convenient re-exports for glob imports.
//!
//! ```rust
//! use gadget_uri::prelude::*;
//!
//! let uri = Uri::parse("//proxy.example.com/gadgets/proxy?url=http%3A%2F%2Fa.com%2Fx.png").unwrap();
//! assert_eq!(uri.query_parameter("url"), Some("http://a.com/x.png"));
//! ```
//!
//! Option structs and the concrete collaborator implementations are left
//! out; import them by name.

pub use crate::{
    // Core types
    Gadget, GadgetContext, QueryParams, Uri, UriBuilder, UriStatus, View,
    // Managers
    ConcatData, ConcatType, ConcatUri, ConcatUriManager, IframeUriManager, JsUri, JsUriManager,
    ProxyParams, ProxyUri, ProxyUriManager, RenderingContext,
    // Collaborators
    ConfigLookup, LockedDomainService, TemplatingSignal, TokenCodec, Versioner,
    // Errors
    ConcatUriError, ConfigError, IframeUriError, JsUriError, ParseError, ParseErrorKind,
    ProxyUriError, TokenError,
};
