//! Gadget rendering model consumed by the URI managers.
//!
//! These types describe what the managers need to know about a gadget being
//! rendered: its spec URL, selected view, declared user preferences and
//! features, and the request context. They are built per render call.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::DEFAULT_CONTAINER;
use crate::uri::Uri;

/// How a view's content is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ContentType {
    /// Inline HTML rendered by the container.
    Html,
    /// Inline HTML rendered after sanitization.
    HtmlSanitized,
    /// Content served directly from the view's href.
    Url,
}

impl ContentType {
    /// Parses the `type` attribute of a view.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "html" => Some(Self::Html),
            "html-sanitized" | "html_sanitized" => Some(Self::HtmlSanitized),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

/// A gadget view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    name: String,
    content_type: ContentType,
    href: Option<Uri>,
    needs_user_pref_substitution: bool,
}

impl View {
    /// Creates an inline HTML view.
    #[must_use]
    pub fn html(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: ContentType::Html,
            href: None,
            needs_user_pref_substitution: false,
        }
    }

    /// Creates a type=url view pointing at `href`.
    #[must_use]
    pub fn url(name: impl Into<String>, href: Uri) -> Self {
        Self {
            name: name.into(),
            content_type: ContentType::Url,
            href: Some(href),
            needs_user_pref_substitution: false,
        }
    }

    /// Sets the content type.
    #[must_use]
    pub const fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Declares that the server substitutes user prefs into the content.
    #[must_use]
    pub const fn with_user_pref_substitution(mut self, needed: bool) -> Self {
        self.needs_user_pref_substitution = needed;
        self
    }

    /// Returns the view name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the content type.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the href of a type=url view.
    #[must_use]
    pub const fn href(&self) -> Option<&Uri> {
        self.href.as_ref()
    }

    /// Returns true if user prefs must reach the server.
    #[must_use]
    pub const fn needs_user_pref_substitution(&self) -> bool {
        self.needs_user_pref_substitution
    }
}

/// A user preference declared by a gadget spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPref {
    name: String,
    default_value: String,
}

impl UserPref {
    /// Declares a preference with its default value.
    #[must_use]
    pub fn new(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
        }
    }

    /// Returns the preference name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared default.
    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default_value
    }
}

/// Locale of a rendering request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    country: String,
}

impl Locale {
    /// Creates a locale.
    #[must_use]
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            country: country.into(),
        }
    }

    /// Returns the language code.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Returns the country code.
    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }
}

impl Default for Locale {
    /// The wildcard locale, `all_ALL`.
    fn default() -> Self {
        Self::new("all", "ALL")
    }
}

/// Request context of a gadget render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GadgetContext {
    container: String,
    url: Uri,
    locale: Locale,
    user_prefs: BTreeMap<String, String>,
    debug: bool,
    ignore_cache: bool,
    sanitize: bool,
    cajoled: bool,
    owner: Option<String>,
    viewer: Option<String>,
    module_id: u64,
    extra_params: Vec<(String, String)>,
}

impl GadgetContext {
    /// Creates a context rendering the spec at `url` in the default container.
    #[must_use]
    pub fn new(url: Uri) -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            url,
            locale: Locale::default(),
            user_prefs: BTreeMap::new(),
            debug: false,
            ignore_cache: false,
            sanitize: false,
            cajoled: false,
            owner: None,
            viewer: None,
            module_id: 0,
            extra_params: Vec::new(),
        }
    }

    /// Sets the container.
    #[must_use]
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Sets the locale.
    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Sets a user preference value.
    #[must_use]
    pub fn with_user_pref(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_prefs.insert(name.into(), value.into());
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
    pub const fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
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
    pub const fn with_cajoled(mut self, cajoled: bool) -> Self {
        self.cajoled = cajoled;
        self
    }

    /// Sets the owner and viewer carried in the security token.
    #[must_use]
    pub fn with_principals(mut self, owner: impl Into<String>, viewer: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.viewer = Some(viewer.into());
        self
    }

    /// Sets the module id carried in the security token.
    #[must_use]
    pub const fn with_module_id(mut self, module_id: u64) -> Self {
        self.module_id = module_id;
        self
    }

    /// Adds a parameter passed through to the rendering URI.
    #[must_use]
    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((name.into(), value.into()));
        self
    }

    /// Returns the container.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the gadget spec URL.
    #[must_use]
    pub const fn url(&self) -> &Uri {
        &self.url
    }

    /// Returns the locale.
    #[must_use]
    pub const fn locale(&self) -> &Locale {
        &self.locale
    }

    /// Returns the value set for a user preference.
    #[must_use]
    pub fn user_pref(&self, name: &str) -> Option<&str> {
        self.user_prefs.get(name).map(String::as_str)
    }

    /// Returns the debug flag.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the cache-bypass flag.
    #[must_use]
    pub const fn ignore_cache(&self) -> bool {
        self.ignore_cache
    }

    /// Returns the sanitize flag.
    #[must_use]
    pub const fn sanitize(&self) -> bool {
        self.sanitize
    }

    /// Returns the cajole flag.
    #[must_use]
    pub const fn cajoled(&self) -> bool {
        self.cajoled
    }

    /// Returns the owner id.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Returns the viewer id.
    #[must_use]
    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    /// Returns the module id.
    #[must_use]
    pub const fn module_id(&self) -> u64 {
        self.module_id
    }

    /// Returns the pass-through parameters.
    #[must_use]
    pub fn extra_params(&self) -> &[(String, String)] {
        &self.extra_params
    }
}

/// A gadget selected for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gadget {
    context: GadgetContext,
    view: View,
    user_prefs: Vec<UserPref>,
    features: BTreeSet<String>,
}

impl Gadget {
    /// Creates a gadget rendering `view` in `context`.
    #[must_use]
    pub fn new(context: GadgetContext, view: View) -> Self {
        Self {
            context,
            view,
            user_prefs: Vec::new(),
            features: BTreeSet::new(),
        }
    }

    /// Declares a user preference.
    #[must_use]
    pub fn with_user_pref(mut self, pref: UserPref) -> Self {
        self.user_prefs.push(pref);
        self
    }

    /// Declares a required feature.
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    /// Returns the request context.
    #[must_use]
    pub const fn context(&self) -> &GadgetContext {
        &self.context
    }

    /// Returns the gadget spec URL.
    #[must_use]
    pub const fn spec_url(&self) -> &Uri {
        self.context.url()
    }

    /// Returns the selected view.
    #[must_use]
    pub const fn view(&self) -> &View {
        &self.view
    }

    /// Returns the declared user preferences, in declaration order.
    #[must_use]
    pub fn user_prefs(&self) -> &[UserPref] {
        &self.user_prefs
    }

    /// Returns the declared features, sorted.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }

    /// Returns true if the gadget requires `feature`.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parse() {
        assert_eq!(ContentType::parse("HTML"), Some(ContentType::Html));
        assert_eq!(ContentType::parse("html-sanitized"), Some(ContentType::HtmlSanitized));
        assert_eq!(ContentType::parse("url"), Some(ContentType::Url));
        assert_eq!(ContentType::parse("flash"), None);
    }

    #[test]
    fn default_context() {
        let context = GadgetContext::new(Uri::parse("http://g.com/g.xml").unwrap());
        assert_eq!(context.container(), DEFAULT_CONTAINER);
        assert_eq!(context.locale(), &Locale::new("all", "ALL"));
        assert!(!context.debug());
        assert_eq!(context.user_pref("x"), None);
    }

    #[test]
    fn gadget_features_are_sorted() {
        let gadget = Gadget::new(
            GadgetContext::new(Uri::parse("http://g.com/g.xml").unwrap()),
            View::html("home"),
        )
        .with_feature("rpc")
        .with_feature("core");
        assert_eq!(gadget.features().collect::<Vec<_>>(), vec!["core", "rpc"]);
        assert!(gadget.has_feature("rpc"));
        assert!(!gadget.has_feature("views"));
    }
}
