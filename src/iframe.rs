//! Iframe rendering URIs.
//!
//! A rendering URI points the gadget iframe at the server that renders the
//! gadget, on the gadget's locked domain when one is available:
//!
//! ```text
//! //{host}{basePath}?url=&container=&view=&lang=&country=&debug=&nocache=&sanitize=&v=#up_name=&st=
//! ```
//!
//! When the [`TemplatingSignal`] is on, request-dependent values are
//! replaced by `%name%` placeholders the client fills in, so one rendered
//! shell can be cached across views, locales and preferences.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::UriBuilder;
use crate::config::{ConfigLookup, IframeOptions};
use crate::constants::{
    DEFAULT_CONTAINER, JS_DELIMITER, SECURITY_TOKEN_FEATURE, TOKEN_RENDERING_FEATURES,
    USER_PREF_PREFIX, config_key, param,
};
use crate::error::{IframeUriError, TokenError};
use crate::gadget::{ContentType, Gadget};
use crate::locked_domain::{LockedDomainService, NoLockedDomainService};
use crate::proxy_base::flag;
use crate::status::UriStatus;
use crate::token::{TokenCodec, field};
use crate::uri::Uri;
use crate::versioner::{Versioner, version_at};

/// Tells the iframe manager whether the client substitutes parameter values.
pub trait TemplatingSignal: Send + Sync {
    /// Returns true to emit `%name%` placeholders instead of values.
    fn use_templates(&self) -> bool;
}

/// Never templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplatingSignal;

impl TemplatingSignal for DefaultTemplatingSignal {
    fn use_templates(&self) -> bool {
        false
    }
}

/// Always answers with a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTemplatingSignal(pub bool);

impl TemplatingSignal for FixedTemplatingSignal {
    fn use_templates(&self) -> bool {
        self.0
    }
}

/// Where a parameter lands on the rendering URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Query,
    Fragment,
}

/// Generates and validates gadget rendering URIs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gadget_uri::{ConfigSnapshot, Gadget, GadgetContext, IframeOptions, IframeUriManager, Uri, View};
///
/// let config = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.iframe.basePath", "/gadgets/ifr")
///     .set("default", "gadgets.uri.iframe.unlockedDomain", "render.example.com")
///     .build();
/// let manager = IframeUriManager::new(Arc::new(config), IframeOptions::default());
///
/// let context = GadgetContext::new(Uri::parse("http://example.com/g.xml").unwrap());
/// let uri = manager.make_rendering_uri(&Gadget::new(context, View::html("home"))).unwrap();
/// assert_eq!(uri.authority(), Some("render.example.com"));
/// assert_eq!(uri.path(), "/gadgets/ifr");
/// assert_eq!(uri.query_parameter("view"), Some("home"));
/// ```
pub struct IframeUriManager {
    config: Arc<dyn ConfigLookup>,
    options: IframeOptions,
    locked_domains: Arc<dyn LockedDomainService>,
    templating: Arc<dyn TemplatingSignal>,
    versioner: Option<Arc<dyn Versioner<Uri>>>,
    token_codec: Option<Arc<dyn TokenCodec>>,
}

impl IframeUriManager {
    /// Creates a manager rendering on unlocked domains, never templating,
    /// unversioned and without a token codec.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigLookup>, options: IframeOptions) -> Self {
        Self {
            config,
            options,
            locked_domains: Arc::new(NoLockedDomainService),
            templating: Arc::new(DefaultTemplatingSignal),
            versioner: None,
            token_codec: None,
        }
    }

    /// Sets the locked domain service.
    #[must_use]
    pub fn with_locked_domain_service(mut self, service: Arc<dyn LockedDomainService>) -> Self {
        self.locked_domains = service;
        self
    }

    /// Sets the templating signal.
    #[must_use]
    pub fn with_templating_signal(mut self, signal: Arc<dyn TemplatingSignal>) -> Self {
        self.templating = signal;
        self
    }

    /// Versions rendering URIs by gadget spec and validates inbound versions.
    #[must_use]
    pub fn with_versioner(mut self, versioner: Arc<dyn Versioner<Uri>>) -> Self {
        self.versioner = Some(versioner);
        self
    }

    /// Sets the codec producing security tokens.
    #[must_use]
    pub fn with_token_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.token_codec = Some(codec);
        self
    }

    /// Builds the URI the gadget's iframe loads.
    ///
    /// # Errors
    ///
    /// - `IframeUriError::Config` if the base path or a domain is not
    ///   configured for the gadget's container
    /// - `IframeUriError::LockedDomainRequired` if the container mandates a
    ///   locked domain and none is available
    /// - `IframeUriError::InvalidDomain` if the configured domain does not parse
    /// - `IframeUriError::Token` if a security token is needed and cannot be
    ///   encoded
    pub fn make_rendering_uri(&self, gadget: &Gadget) -> Result<Uri, IframeUriError> {
        let context = gadget.context();
        let container = context.container();
        let view = gadget.view();
        let use_templates = self.templating.use_templates();

        let (mut builder, is_url_view) = match (view.content_type(), view.href()) {
            (ContentType::Url, Some(href)) => (href.to_builder(), true),
            _ => (self.html_base(gadget, container)?, false),
        };

        let add = |builder: &mut UriBuilder, key: &str, value: &str, placement: Placement| {
            let templated;
            let value = if use_templates {
                templated = format!("%{key}%");
                templated.as_str()
            } else {
                value
            };
            match placement {
                Placement::Query => builder.add_query_parameter(key, value),
                Placement::Fragment => builder.add_fragment_parameter(key, value),
            };
        };

        add(&mut builder, param::CONTAINER, container, Placement::Query);
        add(&mut builder, param::VIEW, view.name(), Placement::Query);
        add(&mut builder, param::LANG, context.locale().language(), Placement::Query);
        add(&mut builder, param::COUNTRY, context.locale().country(), Placement::Query);
        add(&mut builder, param::DEBUG, flag(context.debug()), Placement::Query);
        add(&mut builder, param::NO_CACHE, flag(context.ignore_cache()), Placement::Query);
        add(&mut builder, param::SANITIZE, flag(context.sanitize()), Placement::Query);
        if context.cajoled() {
            add(&mut builder, param::CAJOLE, "1", Placement::Query);
        }

        let pref_placement = if view.needs_user_pref_substitution() {
            Placement::Query
        } else {
            Placement::Fragment
        };
        for pref in gadget.user_prefs() {
            let value = context
                .user_pref(pref.name())
                .unwrap_or_else(|| pref.default_value());
            let key = format!("{USER_PREF_PREFIX}{}", pref.name());
            add(&mut builder, &key, value, pref_placement);
        }

        if let Some(versioner) = &self.versioner {
            let versions = versioner.version(std::slice::from_ref(gadget.spec_url()), container);
            if let Some(version) = version_at(&versions, 0) {
                builder.add_query_parameter(param::VERSION, version);
            }
        }

        if self.wants_security_token(gadget, container) {
            let placement = if !is_url_view && is_token_needed_for_rendering(gadget) {
                Placement::Query
            } else {
                Placement::Fragment
            };
            let token = if use_templates {
                String::new()
            } else {
                self.security_token(gadget)?
            };
            add(&mut builder, param::SECURITY_TOKEN, &token, placement);
        }

        if is_url_view {
            let libs: Vec<&str> = gadget.features().collect();
            if !libs.is_empty() {
                builder.add_query_parameter(param::LIBS, &libs.join(&JS_DELIMITER.to_string()));
            }
        }
        for (name, value) in context.extra_params() {
            builder.add_query_parameter(name, value);
        }

        let uri = builder.build();
        tracing::debug!(container, gadget = %gadget.spec_url(), uri = %uri, "generated rendering URI");
        Ok(uri)
    }

    /// Base path, host, scheme and `url` of a container-rendered view.
    fn html_base(&self, gadget: &Gadget, container: &str) -> Result<UriBuilder, IframeUriError> {
        let mut builder = UriBuilder::new();
        builder.set_path(&self.config.require(container, config_key::IFRAME_BASE_PATH)?);

        let locked_prefix = if self.options.locked_domain_enabled {
            self.locked_domains.locked_domain_prefix(gadget, container)
        } else {
            None
        };
        let host = match locked_prefix {
            Some(prefix) => {
                let suffix = self.config.require(container, config_key::LOCKED_DOMAIN_SUFFIX)?;
                format!("{prefix}{suffix}")
            }
            None if self.config.get_bool(container, config_key::LOCKED_DOMAIN_REQUIRED) => {
                tracing::warn!(container, gadget = %gadget.spec_url(), "locked domain required but unavailable");
                return Err(IframeUriError::LockedDomainRequired {
                    gadget: gadget.spec_url().to_string(),
                    container: container.to_string(),
                });
            }
            None => self.config.require(container, config_key::UNLOCKED_DOMAIN)?,
        };

        builder
            .set_configured_host(&host)
            .map_err(|source| IframeUriError::InvalidDomain {
                domain: host.clone(),
                source,
            })?;
        if let Some(scheme) = &self.options.scheme {
            builder.set_scheme(Some(scheme.as_str()));
        }

        builder.add_query_parameter(param::URL, gadget.spec_url().as_str());
        Ok(builder)
    }

    fn wants_security_token(&self, gadget: &Gadget, container: &str) -> bool {
        gadget.has_feature(SECURITY_TOKEN_FEATURE)
            || self.config.get_bool(container, config_key::SECURITY_TOKEN_ALWAYS)
    }

    fn security_token(&self, gadget: &Gadget) -> Result<String, TokenError> {
        let Some(codec) = &self.token_codec else {
            return Err(TokenError::Encode("no token codec configured".to_string()));
        };
        let context = gadget.context();
        let mut fields = BTreeMap::new();
        if let Some(owner) = context.owner() {
            fields.insert(field::OWNER.to_string(), owner.to_string());
        }
        if let Some(viewer) = context.viewer() {
            fields.insert(field::VIEWER.to_string(), viewer.to_string());
        }
        fields.insert(field::APP_URL.to_string(), gadget.spec_url().to_string());
        fields.insert(field::MODULE_ID.to_string(), context.module_id().to_string());
        fields.insert(field::CONTAINER.to_string(), context.container().to_string());
        codec.encode(&fields)
    }

    /// Classifies an inbound rendering URI.
    ///
    /// With locked domains enabled, a host other than the gadget's locked
    /// host yields [`UriStatus::InvalidDomain`] before any version check.
    #[must_use]
    pub fn validate_rendering_uri(&self, uri: &Uri) -> UriStatus {
        let Some(gadget_url) = uri.query_parameter(param::URL).and_then(|u| Uri::parse(u).ok())
        else {
            tracing::warn!(uri = %uri, "rendering URI without a valid gadget url");
            return UriStatus::BadUri;
        };
        let container = uri
            .query_parameter(param::CONTAINER)
            .unwrap_or(DEFAULT_CONTAINER);

        if self.options.locked_domain_enabled {
            let host = uri.host().unwrap_or_default();
            if !self.locked_domains.is_host_valid(host, &gadget_url, container) {
                tracing::warn!(container, host, gadget = %gadget_url, "rendering on the wrong domain");
                return UriStatus::InvalidDomain;
            }
        }

        let status = match (&self.versioner, uri.query_parameter(param::VERSION)) {
            (Some(versioner), Some(version)) => versioner.validate(&gadget_url, container, version),
            _ => UriStatus::ValidUnversioned,
        };
        tracing::debug!(container, status = %status, "validated rendering URI");
        status
    }
}

/// True when the rendering server itself needs the security token.
fn is_token_needed_for_rendering(gadget: &Gadget) -> bool {
    TOKEN_RENDERING_FEATURES
        .iter()
        .any(|feature| gadget.has_feature(feature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSnapshot;
    use crate::gadget::{GadgetContext, Locale, UserPref, View};
    use crate::locked_domain::HashLockedDomainService;
    use crate::token::tests::PlainCodec;

    const SPEC: &str = "http://example.com/gadget.xml";

    struct SpecVersioner;

    impl Versioner<Uri> for SpecVersioner {
        fn version(&self, resources: &[Uri], _: &str) -> Vec<Option<String>> {
            resources.iter().map(|_| Some("spec-v1".to_string())).collect()
        }

        fn validate(&self, _: &Uri, _: &str, version: &str) -> UriStatus {
            if version == "spec-v1" {
                UriStatus::ValidVersioned
            } else {
                UriStatus::InvalidVersion
            }
        }
    }

    fn config() -> Arc<ConfigSnapshot> {
        Arc::new(
            ConfigSnapshot::builder()
                .set("default", config_key::IFRAME_BASE_PATH, "/gadgets/ifr")
                .set("default", config_key::UNLOCKED_DOMAIN, "unlocked.com")
                .set("default", config_key::LOCKED_DOMAIN_SUFFIX, "-a.locked.com")
                .set("secure", config_key::LOCKED_DOMAIN_REQUIRED, "true")
                .set("always", config_key::SECURITY_TOKEN_ALWAYS, "true")
                .set("qualified", config_key::UNLOCKED_DOMAIN, "https://render.com:8443")
                .set("ip", config_key::UNLOCKED_DOMAIN, "127.0.0.1:8080")
                .set("named", config_key::UNLOCKED_DOMAIN, "localhost:8080")
                .build(),
        )
    }

    fn manager() -> IframeUriManager {
        IframeUriManager::new(config(), IframeOptions::default()).with_token_codec(Arc::new(PlainCodec))
    }

    fn locked_manager() -> IframeUriManager {
        let config = config();
        IframeUriManager::new(config.clone(), IframeOptions::default().with_locked_domain_enabled(true))
            .with_locked_domain_service(Arc::new(HashLockedDomainService::new(config)))
    }

    fn context() -> GadgetContext {
        GadgetContext::new(Uri::parse(SPEC).unwrap())
            .with_locale(Locale::new("en", "US"))
            .with_user_pref("color", "red")
            .with_principals("alice", "bob")
    }

    fn gadget(context: GadgetContext, view: View) -> Gadget {
        Gadget::new(context, view)
            .with_user_pref(UserPref::new("color", "blue"))
            .with_user_pref(UserPref::new("size", "10"))
    }

    #[test]
    fn html_view_on_unlocked_domain() {
        let uri = manager()
            .make_rendering_uri(&gadget(context(), View::html("home")))
            .unwrap();
        assert_eq!(uri.scheme(), None);
        assert_eq!(uri.authority(), Some("unlocked.com"));
        assert_eq!(uri.path(), "/gadgets/ifr");
        let keys: Vec<&str> = uri.query_params().iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["url", "container", "view", "lang", "country", "debug", "nocache", "sanitize"]
        );
        assert_eq!(uri.query_parameter(param::URL), Some(SPEC));
        assert_eq!(uri.query_parameter(param::LANG), Some("en"));
        assert_eq!(uri.fragment_parameter("up_color"), Some("red"));
        assert_eq!(uri.fragment_parameter("up_size"), Some("10"));
    }

    #[test]
    fn user_prefs_in_query_when_substituted() {
        let view = View::html("home").with_user_pref_substitution(true);
        let uri = manager().make_rendering_uri(&gadget(context(), view)).unwrap();
        assert_eq!(uri.query_parameter("up_color"), Some("red"));
        assert_eq!(uri.fragment(), None);
    }

    #[test]
    fn cajole_only_when_set() {
        let uri = manager()
            .make_rendering_uri(&gadget(context().with_cajoled(true), View::html("home")))
            .unwrap();
        assert_eq!(uri.query_parameter(param::CAJOLE), Some("1"));
        let uri = manager()
            .make_rendering_uri(&gadget(context(), View::html("home")))
            .unwrap();
        assert_eq!(uri.query_parameter(param::CAJOLE), None);
    }

    #[test]
    fn templated_values() {
        let manager = manager()
            .with_templating_signal(Arc::new(FixedTemplatingSignal(true)))
            .with_versioner(Arc::new(SpecVersioner));
        let gadget = gadget(context(), View::html("home")).with_feature(SECURITY_TOKEN_FEATURE);
        let uri = manager.make_rendering_uri(&gadget).unwrap();
        for (key, value) in uri.query_params().iter().chain(uri.fragment_params().iter()) {
            match key {
                "url" => assert_eq!(value, SPEC),
                "v" => assert_eq!(value, "spec-v1"),
                _ => assert_eq!(value, format!("%{key}%")),
            }
        }
        assert!(uri.as_str().contains("view=%25view%25"));
        assert_eq!(uri.fragment_parameter(param::SECURITY_TOKEN), Some("%st%"));
    }

    #[test]
    fn security_token_placement() {
        let plain = gadget(context(), View::html("home")).with_feature(SECURITY_TOKEN_FEATURE);
        let uri = manager().make_rendering_uri(&plain).unwrap();
        let token = uri.fragment_parameter(param::SECURITY_TOKEN).unwrap();
        let fields = PlainCodec.decode(token).unwrap();
        assert_eq!(fields.get(field::OWNER).map(String::as_str), Some("alice"));
        assert_eq!(fields.get(field::APP_URL).map(String::as_str), Some(SPEC));
        assert_eq!(uri.query_parameter(param::SECURITY_TOKEN), None);

        let rendering = plain.with_feature("opensocial-data");
        let uri = manager().make_rendering_uri(&rendering).unwrap();
        assert!(uri.query_parameter(param::SECURITY_TOKEN).is_some());
        assert_eq!(uri.fragment_parameter(param::SECURITY_TOKEN), None);
    }

    #[test]
    fn security_token_forced_by_container() {
        let uri = manager()
            .make_rendering_uri(&gadget(context().with_container("always"), View::html("home")))
            .unwrap();
        assert!(uri.fragment_parameter(param::SECURITY_TOKEN).is_some());
    }

    #[test]
    fn security_token_without_codec_is_an_error() {
        let manager = IframeUriManager::new(config(), IframeOptions::default());
        let gadget = gadget(context(), View::html("home")).with_feature(SECURITY_TOKEN_FEATURE);
        assert!(matches!(
            manager.make_rendering_uri(&gadget),
            Err(IframeUriError::Token(_))
        ));
    }

    #[test]
    fn url_view_uses_href() {
        let href = Uri::parse("http://remote.com/app?x=1").unwrap();
        let gadget = gadget(context(), View::url("canvas", href))
            .with_feature("rpc")
            .with_feature("dynamic-height")
            .with_feature(SECURITY_TOKEN_FEATURE)
            .with_feature("opensocial-data");
        let uri = manager().make_rendering_uri(&gadget).unwrap();
        assert_eq!(uri.authority(), Some("remote.com"));
        assert_eq!(uri.path(), "/app");
        assert_eq!(uri.query_parameter("x"), Some("1"));
        assert_eq!(uri.query_parameter(param::URL), None);
        assert_eq!(
            uri.query_parameter(param::LIBS),
            Some("dynamic-height:opensocial-data:rpc:security-token")
        );
        assert!(uri.fragment_parameter(param::SECURITY_TOKEN).is_some());
    }

    #[test]
    fn extra_params_are_appended() {
        let uri = manager()
            .make_rendering_uri(&gadget(context().with_extra_param("mid", "7"), View::html("home")))
            .unwrap();
        let (last_key, last_value) = uri.query_params().iter().last().unwrap();
        assert_eq!((last_key, last_value), ("mid", "7"));
    }

    #[test]
    fn unlocked_domain_with_port() {
        for (container, host) in [("ip", "127.0.0.1:8080"), ("named", "localhost:8080")] {
            let context = context().with_container(container);
            let uri = manager()
                .make_rendering_uri(&gadget(context, View::html("home")))
                .unwrap();
            assert_eq!(uri.scheme(), None);
            assert_eq!(uri.authority(), Some(host));
            assert_eq!(uri.path(), "/gadgets/ifr");
        }
    }

    #[test]
    fn qualified_unlocked_domain_and_scheme_override() {
        let context = context().with_container("qualified");
        let uri = manager()
            .make_rendering_uri(&gadget(context.clone(), View::html("home")))
            .unwrap();
        assert_eq!(uri.scheme(), Some("https"));
        assert_eq!(uri.authority(), Some("render.com:8443"));

        let manager = IframeUriManager::new(config(), IframeOptions::default().with_scheme("http"));
        let uri = manager
            .make_rendering_uri(&gadget(context, View::html("home")))
            .unwrap();
        assert_eq!(uri.scheme(), Some("http"));
    }

    #[test]
    fn locked_domain_rendering_and_validation() {
        let manager = locked_manager();
        let uri = manager
            .make_rendering_uri(&gadget(context(), View::html("home")))
            .unwrap();
        let expected = HashLockedDomainService::locked_host(&Uri::parse(SPEC).unwrap(), "-a.locked.com");
        assert_eq!(uri.authority(), Some(expected.as_str()));
        assert_eq!(manager.validate_rendering_uri(&uri), UriStatus::ValidUnversioned);

        let moved = Uri::parse(&format!("//unlocked.com/gadgets/ifr?{}", uri.query().unwrap())).unwrap();
        assert_eq!(manager.validate_rendering_uri(&moved), UriStatus::InvalidDomain);
    }

    #[test]
    fn locked_domain_required() {
        let manager = IframeUriManager::new(config(), IframeOptions::default());
        let result = manager.make_rendering_uri(&gadget(context().with_container("secure"), View::html("home")));
        assert!(matches!(
            result,
            Err(IframeUriError::LockedDomainRequired { .. })
        ));
    }

    #[test]
    fn missing_base_path_is_a_config_error() {
        let manager = IframeUriManager::new(Arc::new(ConfigSnapshot::new()), IframeOptions::default());
        assert!(matches!(
            manager.make_rendering_uri(&gadget(context(), View::html("home"))),
            Err(IframeUriError::Config(_))
        ));
    }

    #[test]
    fn versioned_roundtrip() {
        let manager = manager().with_versioner(Arc::new(SpecVersioner));
        let uri = manager
            .make_rendering_uri(&gadget(context(), View::html("home")))
            .unwrap();
        assert_eq!(uri.query_parameter(param::VERSION), Some("spec-v1"));
        assert_eq!(manager.validate_rendering_uri(&uri), UriStatus::ValidVersioned);

        let stale = Uri::parse("//unlocked.com/gadgets/ifr?url=http%3A%2F%2Fexample.com%2Fgadget.xml&v=old")
            .unwrap();
        assert_eq!(manager.validate_rendering_uri(&stale), UriStatus::InvalidVersion);
    }

    #[test]
    fn validate_without_url_is_bad() {
        let uri = Uri::parse("//unlocked.com/gadgets/ifr?container=default").unwrap();
        assert_eq!(manager().validate_rendering_uri(&uri), UriStatus::BadUri);
        let uri = Uri::parse("//unlocked.com/gadgets/ifr?url=a+b").unwrap();
        assert_eq!(manager().validate_rendering_uri(&uri), UriStatus::BadUri);
    }
}
