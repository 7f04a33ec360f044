//! Generation, parsing and validation of gadget container URIs.
//!
//! A gadget container serves gadgets and their resources through four
//! families of URIs, each handled by a manager that can both build URIs
//! (`make`) and classify inbound ones (`process`):
//!
//! | Manager | Purpose |
//! |---------|---------|
//! | [`ProxyUriManager`] | fetch one external resource through the container |
//! | [`ConcatUriManager`] | fetch a batch of JS or CSS resources in one request |
//! | [`IframeUriManager`] | render a gadget in an iframe on its locked domain |
//! | [`JsUriManager`] | serve a versioned bundle of JavaScript features |
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use gadget_uri::{ConfigSnapshot, ContainerConfig, ProxyParams, ProxyUri, ProxyUriManager, Uri, UriStatus};
//!
//! let config = Arc::new(ContainerConfig::new(
//!     ConfigSnapshot::builder()
//!         .set("default", "gadgets.uri.proxy.host", "proxy.example.com")
//!         .set("default", "gadgets.uri.proxy.path", "/gadgets/proxy")
//!         .build(),
//! ));
//! let manager = ProxyUriManager::new(config);
//!
//! let resource = Uri::parse("http://images.example.com/logo.png").unwrap();
//! let uris = manager
//!     .make(&[ProxyUri::new(resource.clone(), ProxyParams::new("default"))], None)
//!     .unwrap();
//!
//! let inbound = manager.process(&uris[0]).unwrap();
//! assert_eq!(inbound.status(), UriStatus::ValidUnversioned);
//! assert_eq!(inbound.resource(), Some(&resource));
//! ```
//!
//! # Status
//!
//! Every `process` operation classifies its input as a [`UriStatus`].
//! Malformed input is [`UriStatus::BadUri`], never an error. Errors are
//! reserved for operator problems: missing container configuration, or a
//! URI that was never addressed to this container.
//!
//! # Versioning
//!
//! Generated URIs carry a cache-busting fingerprint (`v`) when the manager
//! has a [`Versioner`]. On the way back in the fingerprint is checked
//! against current content, yielding [`UriStatus::ValidVersioned`] or
//! [`UriStatus::InvalidVersion`].
//!
//! # Configuration
//!
//! Per-container settings are read through [`ConfigLookup`] on every call.
//! [`ContainerConfig`] swaps whole snapshots on reload, so managers are
//! shared freely across threads without locking.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod builder;
mod concat;
mod config;
mod constants;
mod error;
mod gadget;
mod iframe;
mod js;
mod locked_domain;
pub mod prelude;
mod proxy;
mod proxy_base;
mod query;
mod status;
mod token;
mod uri;
mod versioner;

pub use builder::UriBuilder;
pub use concat::{ConcatData, ConcatType, ConcatUri, ConcatUriManager};
pub use config::{
    ConcatOptions, ConfigLookup, ConfigSnapshot, ConfigSnapshotBuilder, ContainerConfig,
    IframeOptions, JsOptions,
};
pub use constants::{
    CHAINED_PARAMS_END_BEACON, CHAINED_PARAMS_START_BEACON, CHAINED_PARAMS_TOKEN,
    DEFAULT_CONTAINER, DEFAULT_URL_MAX_LENGTH, URL_LENGTH_BUDGET_PERCENT, config_key, param,
};
pub use error::{
    ConcatUriError, ConfigError, IframeUriError, JsUriError, ParseError, ParseErrorKind,
    ProxyUriError, TokenError,
};
pub use gadget::{ContentType, Gadget, GadgetContext, Locale, UserPref, View};
pub use iframe::{DefaultTemplatingSignal, FixedTemplatingSignal, IframeUriManager, TemplatingSignal};
pub use js::{FeatureVersionSource, FeatureVersioner, JsUri, JsUriManager, RenderingContext};
pub use locked_domain::{
    HashLockedDomainService, LOCKED_DOMAIN_PREFIX_LEN, LockedDomainService, NoLockedDomainService,
};
pub use proxy::{ProxyUri, ProxyUriManager};
pub use proxy_base::{ProxyParams, ResizeParams};
pub use query::{QueryParams, encode_component};
pub use status::UriStatus;
pub use token::{TokenCodec, field as token_field};
pub use uri::Uri;
pub use versioner::{CachingVersioner, ContentSource, HashingVersioner, Versioner, fingerprint};
