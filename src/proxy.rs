//! Proxy URIs: fetching a single external resource through the container.
//!
//! Two wire syntaxes are supported, selected per container by the
//! configured proxy path:
//!
//! ```text
//! query:   //{host}{path}?container=C&gadget=G&debug=0&nocache=0&refresh=N&v=V&url=RESOURCE
//! chained: //{host}{path before token}&s&container=C&...&e/{resource verbatim}
//! ```
//!
//! Chained syntax keeps the resource URL in the path so that relative URLs
//! inside proxied content resolve against the proxy as well.

use std::sync::Arc;

use crate::builder::UriBuilder;
use crate::config::ConfigLookup;
use crate::constants::{
    CHAINED_PARAMS_END_BEACON, CHAINED_PARAMS_START_BEACON, CHAINED_PARAMS_TOKEN,
    DEFAULT_CONTAINER, config_key, param,
};
use crate::error::ProxyUriError;
use crate::gadget::GadgetContext;
use crate::proxy_base::ProxyParams;
use crate::query::QueryParams;
use crate::status::UriStatus;
use crate::uri::Uri;
use crate::versioner::{Versioner, version_at};

/// A resource to proxy, together with its request context.
///
/// Built from a rendering context on the way out, or recovered from an
/// inbound URI by [`ProxyUriManager::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyUri {
    status: UriStatus,
    resource: Option<Uri>,
    params: ProxyParams,
}

impl ProxyUri {
    /// Creates a proxy request for `resource`.
    #[must_use]
    pub const fn new(resource: Uri, params: ProxyParams) -> Self {
        Self {
            status: UriStatus::ValidUnversioned,
            resource: Some(resource),
            params,
        }
    }

    /// Creates a proxy request for `resource` on behalf of a rendered gadget.
    #[must_use]
    pub fn from_context(resource: Uri, context: &GadgetContext) -> Self {
        Self::new(resource, ProxyParams::from_context(context))
    }

    fn bad(container: &str) -> Self {
        Self {
            status: UriStatus::BadUri,
            resource: None,
            params: ProxyParams::new(container),
        }
    }

    /// Returns the classification of a processed URI.
    #[must_use]
    pub const fn status(&self) -> UriStatus {
        self.status
    }

    /// Returns the resource to fetch; absent only for [`UriStatus::BadUri`].
    #[must_use]
    pub const fn resource(&self) -> Option<&Uri> {
        self.resource.as_ref()
    }

    /// Returns the request context.
    #[must_use]
    pub const fn params(&self) -> &ProxyParams {
        &self.params
    }

    /// Returns the container.
    #[must_use]
    pub fn container(&self) -> &str {
        self.params.container()
    }
}

/// Generates and parses proxy URIs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gadget_uri::{ConfigSnapshot, ProxyParams, ProxyUri, ProxyUriManager, Uri, UriStatus};
///
/// let config = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.proxy.host", "proxy.com")
///     .set("default", "gadgets.uri.proxy.path", "/gadgets/proxy")
///     .build();
/// let manager = ProxyUriManager::new(Arc::new(config));
///
/// let resource = Uri::parse("http://a.com/img.gif").unwrap();
/// let uris = manager
///     .make(&[ProxyUri::new(resource.clone(), ProxyParams::new("default"))], None)
///     .unwrap();
/// assert_eq!(
///     uris[0].to_string(),
///     "//proxy.com/gadgets/proxy?container=default&debug=0&nocache=0&url=http%3A%2F%2Fa.com%2Fimg.gif"
/// );
///
/// let parsed = manager.process(&uris[0]).unwrap();
/// assert_eq!(parsed.status(), UriStatus::ValidUnversioned);
/// assert_eq!(parsed.resource(), Some(&resource));
/// ```
pub struct ProxyUriManager {
    config: Arc<dyn ConfigLookup>,
    versioner: Option<Arc<dyn Versioner<Uri>>>,
}

impl ProxyUriManager {
    /// Creates an unversioned manager.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigLookup>) -> Self {
        Self {
            config,
            versioner: None,
        }
    }

    /// Versions generated URIs and validates inbound versions.
    #[must_use]
    pub fn with_versioner(mut self, versioner: Arc<dyn Versioner<Uri>>) -> Self {
        self.versioner = Some(versioner);
        self
    }

    /// Generates one proxy URI per input, index-correlated.
    ///
    /// A non-negative `forced_refresh` overrides every input's refresh value.
    ///
    /// # Errors
    ///
    /// Returns `ProxyUriError::Config` if the proxy host or path is not
    /// configured for an input's container.
    pub fn make(
        &self,
        resources: &[ProxyUri],
        forced_refresh: Option<i32>,
    ) -> Result<Vec<Uri>, ProxyUriError> {
        let Some(first) = resources.first() else {
            return Ok(Vec::new());
        };

        let versions = match &self.versioner {
            Some(versioner) => {
                let uris: Vec<Uri> = resources
                    .iter()
                    .filter_map(|r| r.resource.clone())
                    .collect();
                if uris.len() == resources.len() {
                    versioner.version(&uris, first.container())
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        let mut result = Vec::with_capacity(resources.len());
        for (i, proxy_uri) in resources.iter().enumerate() {
            let container = proxy_uri.container();
            let host = self.config.require(container, config_key::PROXY_HOST)?;
            let path = self.config.require(container, config_key::PROXY_PATH)?;
            let Some(resource) = &proxy_uri.resource else {
                tracing::warn!(container, "skipping proxy URI without a resource");
                continue;
            };

            let query = proxy_uri
                .params
                .to_query_params(forced_refresh, version_at(&versions, i));
            let uri = if path.contains(CHAINED_PARAMS_TOKEN) {
                Self::make_chained(&host, &path, &query, resource)
            } else {
                Self::make_query(&host, &path, query, resource)
            };
            tracing::debug!(container, uri = %uri, "generated proxy URI");
            result.push(uri);
        }
        Ok(result)
    }

    fn make_query(host: &str, path: &str, mut query: QueryParams, resource: &Uri) -> Uri {
        query.push(param::URL, resource.as_str());
        let mut builder = UriBuilder::new();
        builder.set_authority(host).set_path(path);
        builder.add_query_parameters(query.iter());
        builder.build()
    }

    fn make_chained(host: &str, path: &str, query: &QueryParams, resource: &Uri) -> Uri {
        let embedded = format!("{CHAINED_PARAMS_START_BEACON}{query}{CHAINED_PARAMS_END_BEACON}");
        let mut full_path = path.replace(CHAINED_PARAMS_TOKEN, &embedded);
        if !full_path.ends_with('/') {
            full_path.push('/');
        }

        // The resource is appended verbatim; its own query and fragment
        // become those of the proxy URI.
        let (rest, fragment) = match resource.as_str().split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (resource.as_str(), None),
        };
        let (resource_path, resource_query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };
        full_path.push_str(resource_path);

        Uri::from_raw_parts(
            None,
            Some(host.to_string()),
            full_path,
            resource_query,
            fragment,
        )
    }

    /// Parses an inbound proxy URI.
    ///
    /// # Errors
    ///
    /// Returns `ProxyUriError::HostMismatch` if the URI is not addressed to
    /// the container's proxy host, and `ProxyUriError::Config` if that host
    /// is not configured. Every other problem is reported as
    /// [`UriStatus::BadUri`].
    pub fn process(&self, uri: &Uri) -> Result<ProxyUri, ProxyUriError> {
        let chained = split_chained(uri.path());
        let query = match &chained {
            Some((embedded, _)) => embedded,
            None => uri.query_params(),
        };

        let container = query
            .get(param::CONTAINER)
            .or_else(|| query.get(param::SYNDICATOR))
            .unwrap_or(DEFAULT_CONTAINER);

        let expected = self.config.require(container, config_key::PROXY_HOST)?;
        let found = uri.authority().unwrap_or_default();
        if !found.eq_ignore_ascii_case(&expected) {
            tracing::warn!(container, expected = %expected, found, "proxy host mismatch");
            return Err(ProxyUriError::HostMismatch {
                expected,
                found: found.to_string(),
            });
        }

        let resource_str = match &chained {
            Some((_, tail)) => {
                let mut resource = repair_collapsed_scheme(tail);
                if let Some(raw_query) = uri.query() {
                    resource.push('?');
                    resource.push_str(raw_query);
                }
                if let Some(fragment) = uri.fragment() {
                    resource.push('#');
                    resource.push_str(fragment);
                }
                resource
            }
            None => {
                let path = self.config.require(container, config_key::PROXY_PATH)?;
                if uri.path() != path {
                    tracing::warn!(container, path = uri.path(), "not a proxy path");
                    return Ok(ProxyUri::bad(container));
                }
                match query.get(param::URL) {
                    Some(url) => url.to_string(),
                    None => {
                        tracing::warn!(container, "proxy URI without url parameter");
                        return Ok(ProxyUri::bad(container));
                    }
                }
            }
        };

        let Some(params) = ProxyParams::from_query_params(query) else {
            tracing::warn!(container, "malformed proxy parameters");
            return Ok(ProxyUri::bad(container));
        };
        let resource = match Uri::parse(&resource_str) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!(container, error = %e, "unparseable proxied resource");
                return Ok(ProxyUri::bad(container));
            }
        };

        let status = match (&self.versioner, query.get(param::VERSION)) {
            (Some(versioner), Some(version)) => versioner.validate(&resource, container, version),
            _ => UriStatus::ValidUnversioned,
        };
        tracing::debug!(container, status = %status, "processed proxy URI");

        Ok(ProxyUri {
            status,
            resource: Some(resource),
            params,
        })
    }
}

/// Splits a chained proxy path into its embedded parameters and the
/// verbatim resource that follows them.
fn split_chained(path: &str) -> Option<(QueryParams, &str)> {
    let start = path.find(CHAINED_PARAMS_START_BEACON)?;
    let params_start = start + CHAINED_PARAMS_START_BEACON.len();
    let end_marker = format!("{CHAINED_PARAMS_END_BEACON}/");
    let end = params_start + path[params_start..].find(&end_marker)?;
    let embedded = QueryParams::parse(&path[params_start..end]);
    Some((embedded, &path[end + end_marker.len()..]))
}

/// Restores `scheme://` when an intermediary collapsed it to `scheme:/`.
fn repair_collapsed_scheme(resource: &str) -> String {
    if let Some((scheme, rest)) = resource.split_once(":/") {
        let is_scheme = !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic());
        if is_scheme && !rest.starts_with('/') {
            return format!("{scheme}://{rest}");
        }
    }
    resource.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSnapshot;

    struct PathVersioner;

    impl Versioner<Uri> for PathVersioner {
        fn version(&self, resources: &[Uri], _: &str) -> Vec<Option<String>> {
            resources
                .iter()
                .map(|r| (!r.path().contains("nover")).then(|| format!("v{}", r.path().len())))
                .collect()
        }

        fn validate(&self, resource: &Uri, _: &str, version: &str) -> UriStatus {
            if version == format!("v{}", resource.path().len()) {
                UriStatus::ValidVersioned
            } else {
                UriStatus::InvalidVersion
            }
        }
    }

    fn manager(path: &str) -> ProxyUriManager {
        let config = ConfigSnapshot::builder()
            .set("default", config_key::PROXY_HOST, "proxy.com")
            .set("default", config_key::PROXY_PATH, path)
            .set("other", config_key::PROXY_HOST, "other-proxy.com")
            .build();
        ProxyUriManager::new(Arc::new(config))
    }

    fn proxy_uri(resource: &str, container: &str) -> ProxyUri {
        ProxyUri::new(
            Uri::parse(resource).unwrap(),
            ProxyParams::new(container).with_gadget("http://g.com/g.xml"),
        )
    }

    #[test]
    fn make_query_syntax() {
        let uris = manager("/proxy")
            .make(&[proxy_uri("http://x/img.gif", "default")], None)
            .unwrap();
        let uri = &uris[0];
        assert_eq!(uri.authority(), Some("proxy.com"));
        assert_eq!(uri.path(), "/proxy");
        assert_eq!(uri.query_parameter(param::CONTAINER), Some("default"));
        assert_eq!(uri.query_parameter(param::GADGET), Some("http://g.com/g.xml"));
        assert_eq!(uri.query_parameter(param::URL), Some("http://x/img.gif"));
        assert_eq!(uri.query_parameter(param::VERSION), None);
    }

    #[test]
    fn make_chained_syntax() {
        let uris = manager("/proxy/%chained_params%")
            .make(&[proxy_uri("http://x/img.gif", "default")], Some(30))
            .unwrap();
        let serialized = uris[0].to_string();
        assert!(serialized.starts_with("//proxy.com/proxy/&s&container=default&"));
        assert!(serialized.contains("&refresh=30&e/http://x/img.gif"));
        assert_eq!(uris[0].query(), None);
    }

    #[test]
    fn make_chained_keeps_resource_query() {
        let uris = manager("/proxy/%chained_params%/")
            .make(&[proxy_uri("http://x/img.php?id=3", "default")], None)
            .unwrap();
        assert!(uris[0].path().ends_with("&e/http://x/img.php"));
        assert_eq!(uris[0].query(), Some("id=3"));
    }

    #[test]
    fn make_requires_config() {
        let manager = ProxyUriManager::new(Arc::new(ConfigSnapshot::new()));
        let result = manager.make(&[proxy_uri("http://x/a.gif", "default")], None);
        assert!(matches!(result, Err(ProxyUriError::Config(_))));
    }

    #[test]
    fn make_empty_input() {
        let manager = ProxyUriManager::new(Arc::new(ConfigSnapshot::new()));
        assert!(manager.make(&[], None).unwrap().is_empty());
    }

    #[test]
    fn make_skips_null_versions() {
        let manager = manager("/proxy").with_versioner(Arc::new(PathVersioner));
        let uris = manager
            .make(
                &[
                    proxy_uri("http://x/a.gif", "default"),
                    proxy_uri("http://x/nover.gif", "default"),
                ],
                None,
            )
            .unwrap();
        assert_eq!(uris[0].query_parameter(param::VERSION), Some("v6"));
        assert_eq!(uris[1].query_parameter(param::VERSION), None);
    }

    #[test]
    fn process_query_syntax_roundtrip() {
        let manager = manager("/proxy").with_versioner(Arc::new(PathVersioner));
        let input = proxy_uri("http://x/a.gif", "default");
        let uris = manager.make(std::slice::from_ref(&input), None).unwrap();
        let parsed = manager.process(&uris[0]).unwrap();
        assert_eq!(parsed.status(), UriStatus::ValidVersioned);
        assert_eq!(parsed.resource(), input.resource());
        assert_eq!(parsed.params().gadget(), Some("http://g.com/g.xml"));
    }

    #[test]
    fn process_chained_syntax_roundtrip() {
        let manager = manager("/proxy/%chained_params%").with_versioner(Arc::new(PathVersioner));
        let input = proxy_uri("http://x/dir/img.php?id=3", "default");
        let uris = manager.make(std::slice::from_ref(&input), None).unwrap();
        let inbound = Uri::parse(&format!("http:{}", uris[0])).unwrap();
        let parsed = manager.process(&inbound).unwrap();
        assert_eq!(parsed.status(), UriStatus::ValidVersioned);
        assert_eq!(parsed.resource(), input.resource());
    }

    #[test]
    fn chained_roundtrip_keeps_leading_slashes() {
        let manager = manager("/proxy/%chained_params%");
        for resource in ["//cdn.x.com/a.gif", "/abs/a.gif", "rel/a.gif"] {
            let input = proxy_uri(resource, "default");
            let uris = manager.make(std::slice::from_ref(&input), None).unwrap();
            let parsed = manager.process(&uris[0]).unwrap();
            assert_eq!(parsed.status(), UriStatus::ValidUnversioned);
            assert_eq!(parsed.resource().map(Uri::as_str), Some(resource));
        }
    }

    #[test]
    fn chained_roundtrip_keeps_fragment() {
        let manager = manager("/proxy/%chained_params%");
        let input = proxy_uri("http://x/page.html?a=1#top", "default");
        let uris = manager.make(std::slice::from_ref(&input), None).unwrap();
        assert_eq!(uris[0].fragment(), Some("top"));
        let parsed = manager.process(&uris[0]).unwrap();
        assert_eq!(parsed.resource(), input.resource());
    }

    #[test]
    fn process_repairs_collapsed_scheme() {
        let inbound = Uri::parse("//proxy.com/proxy/&s&container=default&e/http:/x/a.gif").unwrap();
        let parsed = manager("/proxy/%chained_params%").process(&inbound).unwrap();
        assert_eq!(parsed.resource().map(Uri::as_str), Some("http://x/a.gif"));
    }

    #[test]
    fn process_stale_version() {
        let manager = manager("/proxy").with_versioner(Arc::new(PathVersioner));
        let inbound = Uri::parse("//proxy.com/proxy?url=http%3A%2F%2Fx%2Fa.gif&v=old").unwrap();
        assert_eq!(manager.process(&inbound).unwrap().status(), UriStatus::InvalidVersion);
    }

    #[test]
    fn process_host_is_case_insensitive() {
        let inbound = Uri::parse("//PROXY.com/proxy?url=http%3A%2F%2Fx%2Fa.gif").unwrap();
        let parsed = manager("/proxy").process(&inbound).unwrap();
        assert_eq!(parsed.status(), UriStatus::ValidUnversioned);
    }

    #[test]
    fn process_host_mismatch_is_an_error() {
        let inbound = Uri::parse("//evil.com/proxy?url=http%3A%2F%2Fx%2Fa.gif").unwrap();
        let result = manager("/proxy").process(&inbound);
        assert!(matches!(result, Err(ProxyUriError::HostMismatch { .. })));

        // The host is per container.
        let inbound = Uri::parse("//proxy.com/proxy?container=other&url=http%3A%2F%2Fx%2Fa.gif")
            .unwrap();
        assert!(manager("/proxy").process(&inbound).is_err());
    }

    #[tracing_test::traced_test]
    #[test]
    fn host_mismatch_is_logged() {
        let inbound = Uri::parse("//evil.com/proxy?url=http%3A%2F%2Fx%2Fa.gif").unwrap();
        assert!(manager("/proxy").process(&inbound).is_err());
        assert!(logs_contain("proxy host mismatch"));
    }

    #[test]
    fn process_missing_url_is_bad() {
        let inbound = Uri::parse("//proxy.com/proxy?container=default").unwrap();
        assert_eq!(
            manager("/proxy").process(&inbound).unwrap().status(),
            UriStatus::BadUri
        );
    }

    #[test]
    fn process_wrong_path_is_bad() {
        let inbound = Uri::parse("//proxy.com/elsewhere?url=http%3A%2F%2Fx%2Fa.gif").unwrap();
        assert_eq!(
            manager("/proxy").process(&inbound).unwrap().status(),
            UriStatus::BadUri
        );
    }

    #[test]
    fn process_unparseable_resource_is_bad() {
        let inbound = Uri::parse("//proxy.com/proxy?url=http%3A%2F%2Fx%2Fa+b.gif").unwrap();
        let parsed = manager("/proxy").process(&inbound).unwrap();
        assert_eq!(parsed.status(), UriStatus::BadUri);
        assert!(parsed.resource().is_none());
    }

    #[test]
    fn process_malformed_refresh_is_bad() {
        let inbound = Uri::parse("//proxy.com/proxy?url=http%3A%2F%2Fx%2Fa.gif&refresh=x").unwrap();
        assert_eq!(
            manager("/proxy").process(&inbound).unwrap().status(),
            UriStatus::BadUri
        );
    }

    #[test]
    fn repair_collapsed_scheme_leaves_valid_urls() {
        assert_eq!(repair_collapsed_scheme("http://x/a"), "http://x/a");
        assert_eq!(repair_collapsed_scheme("https:/x/a"), "https://x/a");
        assert_eq!(repair_collapsed_scheme("/relative/a"), "/relative/a");
    }
}
