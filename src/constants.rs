//! Wire parameter names, container configuration keys, and defaults.

/// Container used when an inbound URI names none.
pub const DEFAULT_CONTAINER: &str = "default";

/// Default maximum length of a generated URL.
pub const DEFAULT_URL_MAX_LENGTH: usize = 2048;

/// Percentage of `url_max_length` a concat batch may fill before it is split.
///
/// The remainder is left for the version parameter added after batching.
pub const URL_LENGTH_BUDGET_PERCENT: usize = 80;

/// Placeholder in a configured proxy path that selects chained syntax.
pub const CHAINED_PARAMS_TOKEN: &str = "%chained_params%";

/// Marks the start of the parameters embedded in a chained proxy path.
pub const CHAINED_PARAMS_START_BEACON: &str = "&s&";

/// Marks the end of the parameters embedded in a chained proxy path.
pub const CHAINED_PARAMS_END_BEACON: &str = "&e";

/// Gadget feature that requests a security token.
pub const SECURITY_TOKEN_FEATURE: &str = "security-token";

/// Features whose server-side processing needs the security token.
pub const TOKEN_RENDERING_FEATURES: [&str; 2] = ["opensocial-data", "opensocial-templates"];

/// Prefix of user preference parameters on a rendering URI.
pub const USER_PREF_PREFIX: &str = "up_";

/// Suffix of a feature bundle path.
pub const JS_SUFFIX: &str = ".js";

/// Separator between feature names in a feature bundle path.
pub const JS_DELIMITER: char = ':';

/// Separator between requested and already-loaded features.
pub const JS_LOADED_DELIMITER: char = '!';

/// Query and fragment parameter names.
pub mod param {
    /// Container name.
    pub const CONTAINER: &str = "container";
    /// Legacy alias of [`CONTAINER`].
    pub const SYNDICATOR: &str = "synd";
    /// Gadget spec URL that originated the request.
    pub const GADGET: &str = "gadget";
    /// Debug flag.
    pub const DEBUG: &str = "debug";
    /// Cache bypass flag.
    pub const NO_CACHE: &str = "nocache";
    /// Refresh (TTL) override in seconds.
    pub const REFRESH: &str = "refresh";
    /// Resource fingerprint.
    pub const VERSION: &str = "v";
    /// Target URL.
    pub const URL: &str = "url";
    /// Rewritten MIME type, also the legacy concat type parameter.
    pub const REWRITE_MIME: &str = "rewriteMime";
    /// Content sanitization flag.
    pub const SANITIZE: &str = "sanitize";
    /// Cajoling flag.
    pub const CAJOLE: &str = "cajole";
    /// Fallback URL used when the proxied fetch fails.
    pub const FALLBACK_URL: &str = "fallback_url";
    /// Image resize height.
    pub const RESIZE_HEIGHT: &str = "resize_h";
    /// Image resize width.
    pub const RESIZE_WIDTH: &str = "resize_w";
    /// Image resize quality.
    pub const RESIZE_QUALITY: &str = "resize_q";
    /// Disables upscaling when resizing.
    pub const NO_EXPAND: &str = "no_expand";
    /// Concat resource type.
    pub const TYPE: &str = "type";
    /// Concat split-loading variable.
    pub const JSON: &str = "json";
    /// Gadget view name.
    pub const VIEW: &str = "view";
    /// Locale language.
    pub const LANG: &str = "lang";
    /// Locale country.
    pub const COUNTRY: &str = "country";
    /// Security token.
    pub const SECURITY_TOKEN: &str = "st";
    /// Feature list for client-side loading.
    pub const LIBS: &str = "libs";
    /// Rendering context of a feature bundle.
    pub const CONTAINER_MODE: &str = "container_mode";
    /// Callback invoked once a feature bundle loads.
    pub const ONLOAD: &str = "onload";
    /// Incremental-load flag.
    pub const JSLOAD: &str = "jsload";
    /// Disables loading hints in a feature bundle.
    pub const NO_HINT: &str = "nohint";
}

/// Per-container configuration keys.
pub mod config_key {
    /// Authority serving proxied content.
    pub const PROXY_HOST: &str = "gadgets.uri.proxy.host";
    /// Path of the proxy endpoint; may contain the chained params token.
    pub const PROXY_PATH: &str = "gadgets.uri.proxy.path";
    /// Authority serving concatenated content.
    pub const CONCAT_HOST: &str = "gadgets.uri.concat.host";
    /// Path of the concat endpoint.
    pub const CONCAT_PATH: &str = "gadgets.uri.concat.path";
    /// Variable name prefix used for split-loaded JS.
    pub const CONCAT_JS_SPLIT_TOKEN: &str = "gadgets.uri.concat.js.splitToken";
    /// Path of the rendering endpoint.
    pub const IFRAME_BASE_PATH: &str = "gadgets.uri.iframe.basePath";
    /// Suffix appended to a locked domain prefix.
    pub const LOCKED_DOMAIN_SUFFIX: &str = "gadgets.uri.iframe.lockedDomainSuffix";
    /// Domain used when a gadget is not locked.
    pub const UNLOCKED_DOMAIN: &str = "gadgets.uri.iframe.unlockedDomain";
    /// Appends a security token to every rendering URI.
    pub const SECURITY_TOKEN_ALWAYS: &str = "gadgets.uri.iframe.alwaysAppendSecurityToken";
    /// Refuses to render a gadget outside its locked domain.
    pub const LOCKED_DOMAIN_REQUIRED: &str = "gadgets.uri.iframe.lockedDomainRequired";
    /// Authority (optionally with scheme) serving feature bundles.
    pub const JS_HOST: &str = "gadgets.uri.js.host";
    /// Path prefix of feature bundles.
    pub const JS_PATH: &str = "gadgets.uri.js.path";
}
