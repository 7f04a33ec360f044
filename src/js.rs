//! Feature bundle URIs.
//!
//! The requested features travel in the path, colon-delimited, followed by
//! the features the page has already loaded:
//!
//! ```text
//! //{host}{jsPath}/{lib1}:{lib2}!{loaded1}:{loaded2}.js?container=&nocache=&debug=&container_mode=&url=&onload=&jsload=1&v=
//! ```

use std::fmt;
use std::sync::Arc;

use crate::builder::UriBuilder;
use crate::config::{ConfigLookup, JsOptions};
use crate::constants::{
    DEFAULT_CONTAINER, JS_DELIMITER, JS_LOADED_DELIMITER, JS_SUFFIX, config_key, param,
};
use crate::error::JsUriError;
use crate::proxy_base::{flag, is_set};
use crate::query::QueryParams;
use crate::status::UriStatus;
use crate::uri::Uri;
use crate::versioner::{Versioner, fingerprint, version_at};

/// Parameters owned by the JS URI format; anything else is an extension.
const KNOWN_PARAMS: [&str; 9] = [
    param::CONTAINER,
    param::NO_CACHE,
    param::DEBUG,
    param::CONTAINER_MODE,
    param::URL,
    param::ONLOAD,
    param::JSLOAD,
    param::NO_HINT,
    param::VERSION,
];

/// Who the feature bundle is loaded for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RenderingContext {
    /// A gadget iframe.
    #[default]
    Gadget,
    /// The container page.
    Container,
    /// A gadget whose configuration is inlined by the container.
    ConfiguredGadget,
}

impl RenderingContext {
    /// Returns the `container_mode` wire value.
    #[must_use]
    pub const fn param_value(self) -> &'static str {
        match self {
            Self::Gadget => "0",
            Self::Container => "1",
            Self::ConfiguredGadget => "2",
        }
    }

    /// Parses a `container_mode` wire value.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Self::Gadget),
            "1" => Some(Self::Container),
            "2" => Some(Self::ConfiguredGadget),
            _ => None,
        }
    }
}

impl fmt::Display for RenderingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param_value())
    }
}

/// A request for a bundle of JavaScript features.
///
/// # Examples
///
/// ```
/// use gadget_uri::{JsUri, RenderingContext};
///
/// let js = JsUri::new("default", ["core", "rpc"])
///     .with_context(RenderingContext::Container)
///     .with_onload("init");
/// assert_eq!(js.libs(), ["core", "rpc"]);
/// assert_eq!(js.onload(), Some("init"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsUri {
    status: UriStatus,
    libs: Vec<String>,
    loaded_libs: Vec<String>,
    container: String,
    context: RenderingContext,
    debug: bool,
    no_cache: bool,
    jsload: bool,
    nohint: bool,
    onload: Option<String>,
    gadget: Option<String>,
    extension_params: Vec<(String, String)>,
}

impl JsUri {
    /// Creates a request for `libs` in `container`.
    #[must_use]
    pub fn new<I, S>(container: impl Into<String>, libs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: UriStatus::ValidUnversioned,
            libs: libs.into_iter().map(Into::into).collect(),
            loaded_libs: Vec::new(),
            container: container.into(),
            context: RenderingContext::Gadget,
            debug: false,
            no_cache: false,
            jsload: false,
            nohint: false,
            onload: None,
            gadget: None,
            extension_params: Vec::new(),
        }
    }

    /// The sentinel returned for malformed inbound URIs.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            status: UriStatus::BadUri,
            ..Self::new(DEFAULT_CONTAINER, Vec::<String>::new())
        }
    }

    /// Declares features the page has already loaded.
    #[must_use]
    pub fn with_loaded_libs<I, S>(mut self, libs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loaded_libs = libs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the rendering context.
    #[must_use]
    pub const fn with_context(mut self, context: RenderingContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the debug flag.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the cache-bypass flag.
    #[must_use]
    pub const fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Requests a JS loader wrapper around the bundle.
    #[must_use]
    pub const fn with_jsload(mut self, jsload: bool) -> Self {
        self.jsload = jsload;
        self
    }

    /// Suppresses feature hints in the response.
    #[must_use]
    pub const fn with_nohint(mut self, nohint: bool) -> Self {
        self.nohint = nohint;
        self
    }

    /// Sets the callback invoked once the bundle has loaded.
    #[must_use]
    pub fn with_onload(mut self, onload: impl Into<String>) -> Self {
        self.onload = Some(onload.into());
        self
    }

    /// Sets the originating gadget URL.
    #[must_use]
    pub fn with_gadget(mut self, gadget: impl Into<String>) -> Self {
        self.gadget = Some(gadget.into());
        self
    }

    /// Adds a parameter passed through to the feature server.
    #[must_use]
    pub fn with_extension_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extension_params.push((name.into(), value.into()));
        self
    }

    /// Returns the classification of a processed URI.
    #[must_use]
    pub const fn status(&self) -> UriStatus {
        self.status
    }

    /// Returns the requested features, in request order.
    #[must_use]
    pub fn libs(&self) -> &[String] {
        &self.libs
    }

    /// Returns the features the page has already loaded.
    #[must_use]
    pub fn loaded_libs(&self) -> &[String] {
        &self.loaded_libs
    }

    /// Returns the container.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the rendering context.
    #[must_use]
    pub const fn context(&self) -> RenderingContext {
        self.context
    }

    /// Returns the debug flag.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the cache-bypass flag.
    #[must_use]
    pub const fn no_cache(&self) -> bool {
        self.no_cache
    }

    /// Returns the loader flag.
    #[must_use]
    pub const fn jsload(&self) -> bool {
        self.jsload
    }

    /// Returns the no-hint flag.
    #[must_use]
    pub const fn nohint(&self) -> bool {
        self.nohint
    }

    /// Returns the onload callback name.
    #[must_use]
    pub fn onload(&self) -> Option<&str> {
        self.onload.as_deref()
    }

    /// Returns the originating gadget URL.
    #[must_use]
    pub fn gadget(&self) -> Option<&str> {
        self.gadget.as_deref()
    }

    /// Returns the pass-through parameters.
    #[must_use]
    pub fn extension_params(&self) -> &[(String, String)] {
        &self.extension_params
    }
}

/// Supplies the source of individual features for versioning.
pub trait FeatureVersionSource: Send + Sync {
    /// Returns the served content of `feature`, or `None` if unknown.
    fn feature_content(&self, feature: &str, container: &str, debug: bool) -> Option<Vec<u8>>;
}

/// Versions feature bundles by hashing the content of every requested lib.
///
/// A bundle naming an unknown feature is left unversioned.
pub struct FeatureVersioner<S> {
    source: S,
}

impl<S> FeatureVersioner<S> {
    /// Creates a versioner over `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: FeatureVersionSource> FeatureVersioner<S> {
    fn bundle_version(&self, js: &JsUri, container: &str) -> Option<String> {
        let mut content = Vec::new();
        for lib in js.libs() {
            let body = self.source.feature_content(lib, container, js.debug())?;
            content.extend_from_slice(lib.as_bytes());
            content.push(0);
            content.extend_from_slice(&body);
        }
        Some(fingerprint(&content))
    }
}

impl<S: FeatureVersionSource> Versioner<JsUri> for FeatureVersioner<S> {
    fn version(&self, resources: &[JsUri], container: &str) -> Vec<Option<String>> {
        resources
            .iter()
            .map(|js| self.bundle_version(js, container))
            .collect()
    }

    fn validate(&self, resource: &JsUri, container: &str, version: &str) -> UriStatus {
        match self.bundle_version(resource, container) {
            Some(current) if current == version => UriStatus::ValidVersioned,
            _ => UriStatus::InvalidVersion,
        }
    }
}

/// Generates and parses feature bundle URIs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gadget_uri::{ConfigSnapshot, JsOptions, JsUri, JsUriManager};
///
/// let config = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.js.host", "js.example.com")
///     .set("default", "gadgets.uri.js.path", "/gadgets/js")
///     .build();
/// let manager = JsUriManager::new(Arc::new(config), JsOptions::default());
///
/// let uri = manager.make_extern_js_uri(&JsUri::new("default", ["core", "rpc"])).unwrap();
/// assert_eq!(
///     uri.to_string(),
///     "//js.example.com/gadgets/js/core:rpc.js?container=default&nocache=0&debug=0&container_mode=0"
/// );
/// ```
pub struct JsUriManager {
    config: Arc<dyn ConfigLookup>,
    options: JsOptions,
    versioner: Option<Arc<dyn Versioner<JsUri>>>,
}

impl JsUriManager {
    /// Creates an unversioned manager.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigLookup>, options: JsOptions) -> Self {
        Self {
            config,
            options,
            versioner: None,
        }
    }

    /// Versions bundle URIs and validates inbound versions.
    #[must_use]
    pub fn with_versioner(mut self, versioner: Arc<dyn Versioner<JsUri>>) -> Self {
        self.versioner = Some(versioner);
        self
    }

    /// Builds the URI serving `js`.
    ///
    /// # Errors
    ///
    /// Returns `JsUriError::Config` if the JS host or path is not configured
    /// for the container, and `JsUriError::InvalidHost` if the host does not
    /// parse.
    pub fn make_extern_js_uri(&self, js: &JsUri) -> Result<Uri, JsUriError> {
        let container = js.container();
        let host = self.config.require(container, config_key::JS_HOST)?;
        let prefix = self.config.require(container, config_key::JS_PATH)?;

        let mut builder = UriBuilder::new();
        builder
            .set_configured_host(&host)
            .map_err(|source| JsUriError::InvalidHost {
                host: host.clone(),
                source,
            })?;

        let delimiter = JS_DELIMITER.to_string();
        let mut path = prefix;
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(&js.libs.join(&delimiter));
        if !js.loaded_libs.is_empty() {
            path.push(JS_LOADED_DELIMITER);
            path.push_str(&js.loaded_libs.join(&delimiter));
        }
        path.push_str(JS_SUFFIX);
        builder.set_path(&path);

        builder
            .add_query_parameter(param::CONTAINER, container)
            .add_query_parameter(param::NO_CACHE, flag(js.no_cache))
            .add_query_parameter(param::DEBUG, flag(js.debug))
            .add_query_parameter(param::CONTAINER_MODE, js.context.param_value());
        if let Some(gadget) = js.gadget.as_ref().filter(|_| self.options.add_gadget_uri) {
            builder.add_query_parameter(param::URL, gadget);
        }
        if let Some(onload) = &js.onload {
            builder.add_query_parameter(param::ONLOAD, onload);
        }
        if js.jsload {
            builder.add_query_parameter(param::JSLOAD, "1");
        }
        if js.nohint {
            builder.add_query_parameter(param::NO_HINT, "1");
        }

        if let Some(versioner) = self.versioner.as_ref().filter(|_| !js.no_cache) {
            let versions = versioner.version(std::slice::from_ref(js), container);
            if let Some(version) = version_at(&versions, 0) {
                builder.add_query_parameter(param::VERSION, version);
            }
        }

        for (name, value) in &js.extension_params {
            builder.add_query_parameter(name, value);
        }

        let uri = builder.build();
        tracing::debug!(container, uri = %uri, "generated feature bundle URI");
        Ok(uri)
    }

    /// Parses an inbound feature bundle URI.
    ///
    /// Malformed URIs yield [`JsUri::invalid`].
    ///
    /// # Errors
    ///
    /// Returns `JsUriError::Config` if the JS path is not configured for the
    /// named container.
    pub fn process_extern_js_uri(&self, uri: &Uri) -> Result<JsUri, JsUriError> {
        let query = uri.query_params();
        let container = query.get(param::CONTAINER).unwrap_or(DEFAULT_CONTAINER);
        let prefix = self.config.require(container, config_key::JS_PATH)?;

        if uri.authority().is_none() || uri.path().is_empty() {
            tracing::warn!(container, uri = %uri, "malformed feature bundle URI");
            return Ok(JsUri::invalid());
        }
        let Some(context) = query
            .get(param::CONTAINER_MODE)
            .map_or(Some(RenderingContext::Gadget), RenderingContext::from_param)
        else {
            tracing::warn!(container, "unknown container_mode");
            return Ok(JsUri::invalid());
        };

        let path = uri.path();
        let path = path.strip_prefix(prefix.as_str()).unwrap_or(path);
        let path = path.strip_suffix(JS_SUFFIX).unwrap_or(path);
        let path = path.trim_start_matches('/');
        let (requested, loaded) = path
            .split_once(JS_LOADED_DELIMITER)
            .unwrap_or((path, ""));

        let mut js = JsUri::new(container, split_libs(requested))
            .with_loaded_libs(split_libs(loaded))
            .with_context(context)
            .with_debug(is_set(query, param::DEBUG))
            .with_no_cache(is_set(query, param::NO_CACHE))
            .with_jsload(is_set(query, param::JSLOAD))
            .with_nohint(is_set(query, param::NO_HINT));
        js.onload = query.get(param::ONLOAD).map(str::to_string);
        js.gadget = query.get(param::URL).map(str::to_string);
        js.extension_params = extension_params(query);

        if let (Some(versioner), Some(version)) = (&self.versioner, query.get(param::VERSION)) {
            js.status = versioner.validate(&js, container, version);
        }
        tracing::debug!(container, libs = js.libs.len(), status = %js.status, "processed feature bundle URI");
        Ok(js)
    }
}

fn split_libs(part: &str) -> Vec<String> {
    part.split(JS_DELIMITER)
        .filter(|lib| !lib.is_empty())
        .map(str::to_string)
        .collect()
}

fn extension_params(query: &QueryParams) -> Vec<(String, String)> {
    query
        .iter()
        .filter(|(name, _)| !KNOWN_PARAMS.contains(name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
