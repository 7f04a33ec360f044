//! Parameters shared by proxy and concat URIs.

use crate::constants::{DEFAULT_CONTAINER, param};
use crate::gadget::GadgetContext;
use crate::query::QueryParams;

/// Image resize hints carried on a proxy URI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResizeParams {
    /// Target height in pixels
    pub height: Option<u32>,
    /// Target width in pixels
    pub width: Option<u32>,
    /// Output quality (0-100)
    pub quality: Option<u32>,
    /// Never upscale past the original size
    pub no_expand: bool,
}

impl ResizeParams {
    fn is_empty(&self) -> bool {
        self.height.is_none() && self.width.is_none() && self.quality.is_none() && !self.no_expand
    }
}

/// Request context embedded in every proxied or concatenated fetch.
///
/// # Examples
///
/// ```
/// use gadget_uri::ProxyParams;
///
/// let params = ProxyParams::new("default")
///     .with_gadget("http://example.com/gadget.xml")
///     .with_refresh(3600);
/// let query = params.to_query_params(None, Some("abc"));
/// assert_eq!(
///     query.to_string(),
///     "container=default&gadget=http%3A%2F%2Fexample.com%2Fgadget.xml&debug=0&nocache=0&refresh=3600&v=abc"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyParams {
    container: String,
    gadget: Option<String>,
    debug: bool,
    no_cache: bool,
    refresh: Option<u32>,
    rewrite_mime: Option<String>,
    sanitize: bool,
    cajole: bool,
    fallback_url: Option<String>,
    resize: ResizeParams,
}

impl ProxyParams {
    /// Creates parameters for `container` with every flag off.
    #[must_use]
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            gadget: None,
            debug: false,
            no_cache: false,
            refresh: None,
            rewrite_mime: None,
            sanitize: false,
            cajole: false,
            fallback_url: None,
            resize: ResizeParams::default(),
        }
    }

    /// Creates parameters from a rendering context.
    #[must_use]
    pub fn from_context(context: &GadgetContext) -> Self {
        Self::new(context.container())
            .with_gadget(context.url().as_str())
            .with_debug(context.debug())
            .with_no_cache(context.ignore_cache())
    }

    /// Sets the originating gadget URL.
    #[must_use]
    pub fn with_gadget(mut self, gadget: impl Into<String>) -> Self {
        self.gadget = Some(gadget.into());
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

    /// Sets the refresh override in seconds.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: u32) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Sets the MIME type the content is rewritten as.
    #[must_use]
    pub fn with_rewrite_mime(mut self, mime: impl Into<String>) -> Self {
        self.rewrite_mime = Some(mime.into());
        self
    }

    /// Sets the sanitize flag.
    #[must_use]
    pub const fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Sets the cajole flag.
    #[must_use]
    pub const fn with_cajole(mut self, cajole: bool) -> Self {
        self.cajole = cajole;
        self
    }

    /// Sets the URL fetched when the primary fetch fails.
    #[must_use]
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    /// Sets image resize hints.
    #[must_use]
    pub const fn with_resize(mut self, resize: ResizeParams) -> Self {
        self.resize = resize;
        self
    }

    /// Returns the container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the originating gadget URL.
    #[must_use]
    pub fn gadget(&self) -> Option<&str> {
        self.gadget.as_deref()
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

    /// Returns the refresh override in seconds.
    #[must_use]
    pub const fn refresh(&self) -> Option<u32> {
        self.refresh
    }

    /// Returns the rewritten MIME type.
    #[must_use]
    pub fn rewrite_mime(&self) -> Option<&str> {
        self.rewrite_mime.as_deref()
    }

    /// Returns the sanitize flag.
    #[must_use]
    pub const fn sanitize(&self) -> bool {
        self.sanitize
    }

    /// Returns the cajole flag.
    #[must_use]
    pub const fn cajole(&self) -> bool {
        self.cajole
    }

    /// Returns the fallback URL.
    #[must_use]
    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback_url.as_deref()
    }

    /// Returns the resize hints.
    #[must_use]
    pub const fn resize(&self) -> &ResizeParams {
        &self.resize
    }

    /// Serializes the parameters in wire order.
    ///
    /// A non-negative `forced_refresh` takes precedence over the stored
    /// refresh value.
    #[must_use]
    pub fn to_query_params(&self, forced_refresh: Option<i32>, version: Option<&str>) -> QueryParams {
        let mut query = QueryParams::new();
        query.push(param::CONTAINER, self.container.as_str());
        if let Some(gadget) = &self.gadget {
            query.push(param::GADGET, gadget.as_str());
        }
        query.push(param::DEBUG, flag(self.debug));
        query.push(param::NO_CACHE, flag(self.no_cache));

        match (forced_refresh, self.refresh) {
            (Some(forced), _) if forced >= 0 => query.push(param::REFRESH, forced.to_string()),
            (_, Some(refresh)) => query.push(param::REFRESH, refresh.to_string()),
            _ => {}
        }
        if let Some(version) = version {
            query.push(param::VERSION, version);
        }
        if let Some(mime) = &self.rewrite_mime {
            query.push(param::REWRITE_MIME, mime.as_str());
        }
        if self.sanitize {
            query.push(param::SANITIZE, "1");
        }
        if self.cajole {
            query.push(param::CAJOLE, "1");
        }
        if let Some(fallback) = &self.fallback_url {
            query.push(param::FALLBACK_URL, fallback.as_str());
        }
        if !self.resize.is_empty() {
            let optional = [
                (param::RESIZE_HEIGHT, self.resize.height),
                (param::RESIZE_WIDTH, self.resize.width),
                (param::RESIZE_QUALITY, self.resize.quality),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    query.push(key, value.to_string());
                }
            }
            if self.resize.no_expand {
                query.push(param::NO_EXPAND, "1");
            }
        }
        query
    }

    /// Reads parameters from an inbound query.
    ///
    /// Returns `None` when a numeric parameter does not parse, which callers
    /// report as [`UriStatus::BadUri`](crate::UriStatus::BadUri).
    #[must_use]
    pub fn from_query_params(query: &QueryParams) -> Option<Self> {
        let container = query
            .get(param::CONTAINER)
            .or_else(|| query.get(param::SYNDICATOR))
            .unwrap_or(DEFAULT_CONTAINER);

        Some(Self {
            container: container.to_string(),
            gadget: query.get(param::GADGET).map(str::to_string),
            debug: is_set(query, param::DEBUG),
            no_cache: is_set(query, param::NO_CACHE),
            refresh: parse_number(query, param::REFRESH)?,
            rewrite_mime: query.get(param::REWRITE_MIME).map(str::to_string),
            sanitize: is_set(query, param::SANITIZE),
            cajole: is_set(query, param::CAJOLE),
            fallback_url: query.get(param::FALLBACK_URL).map(str::to_string),
            resize: ResizeParams {
                height: parse_number(query, param::RESIZE_HEIGHT)?,
                width: parse_number(query, param::RESIZE_WIDTH)?,
                quality: parse_number(query, param::RESIZE_QUALITY)?,
                no_expand: is_set(query, param::NO_EXPAND),
            },
        })
    }
}

/// Wire form of a boolean flag.
pub(crate) const fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Returns true if the parameter is present and set to "1".
pub(crate) fn is_set(query: &QueryParams, name: &str) -> bool {
    query.get(name) == Some("1")
}

/// `Some(None)` if absent, `Some(Some(n))` if numeric, `None` if malformed.
fn parse_number(query: &QueryParams, name: &str) -> Option<Option<u32>> {
    match query.get(name) {
        None => Some(None),
        Some(value) => value.parse().ok().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_params() {
        let query = ProxyParams::new("c").to_query_params(None, None);
        assert_eq!(query.to_string(), "container=c&debug=0&nocache=0");
    }

    #[test]
    fn forced_refresh_overrides_stored_refresh() {
        let params = ProxyParams::new("c").with_refresh(100);
        let query = params.to_query_params(Some(5), None);
        assert_eq!(query.get(param::REFRESH), Some("5"));
        let query = params.to_query_params(Some(-1), None);
        assert_eq!(query.get(param::REFRESH), Some("100"));
    }

    #[test]
    fn optional_params_roundtrip() {
        let params = ProxyParams::new("c")
            .with_gadget("http://g.com/g.xml")
            .with_debug(true)
            .with_no_cache(true)
            .with_refresh(60)
            .with_rewrite_mime("image/*")
            .with_sanitize(true)
            .with_cajole(true)
            .with_fallback_url("http://a.com/f.gif")
            .with_resize(ResizeParams {
                height: Some(10),
                width: Some(20),
                quality: None,
                no_expand: true,
            });
        let query = params.to_query_params(None, Some("v1"));
        assert_eq!(query.get(param::VERSION), Some("v1"));
        assert_eq!(ProxyParams::from_query_params(&query), Some(params));
    }

    #[test]
    fn missing_container_defaults() {
        let parsed = ProxyParams::from_query_params(&QueryParams::parse("debug=1")).unwrap();
        assert_eq!(parsed.container(), DEFAULT_CONTAINER);
        assert!(parsed.debug());
    }

    #[test]
    fn legacy_syndicator_alias() {
        let parsed = ProxyParams::from_query_params(&QueryParams::parse("synd=legacy")).unwrap();
        assert_eq!(parsed.container(), "legacy");
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert!(ProxyParams::from_query_params(&QueryParams::parse("refresh=soon")).is_none());
        assert!(ProxyParams::from_query_params(&QueryParams::parse("resize_w=-3")).is_none());
    }
}
