//! Container configuration and manager options.
//!
//! Per-container values (hosts, paths, split tokens) are read through the
//! [`ConfigLookup`] trait. [`ContainerConfig`] is the provided
//! implementation: an immutable [`ConfigSnapshot`] behind an atomic pointer,
//! replaced wholesale on [`reload`](ContainerConfig::reload) so that a lookup
//! never observes a half-applied update.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::constants::{DEFAULT_CONTAINER, DEFAULT_URL_MAX_LENGTH};
use crate::error::ConfigError;

/// Read-only access to per-container configuration.
pub trait ConfigLookup: Send + Sync {
    /// Returns the value of `key` for `container`, if any.
    fn get(&self, container: &str, key: &str) -> Option<String>;

    /// Returns true if `key` is set to `"true"` (case-insensitive).
    fn get_bool(&self, container: &str, key: &str) -> bool {
        self.get(container, key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Returns the non-empty value of `key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` if the key is unset or empty.
    fn require(&self, container: &str, key: &str) -> Result<String, ConfigError> {
        match self.get(container, key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => {
                tracing::warn!(container, key, "missing required container config");
                Err(ConfigError::missing(container, key))
            }
        }
    }
}

impl<C: ConfigLookup + ?Sized> ConfigLookup for Arc<C> {
    fn get(&self, container: &str, key: &str) -> Option<String> {
        (**self).get(container, key)
    }
}

/// Immutable `container -> key -> value` configuration.
///
/// Keys missing from a named container are looked up in the
/// [`DEFAULT_CONTAINER`].
///
/// # Examples
///
/// ```
/// use gadget_uri::{ConfigLookup, ConfigSnapshot};
///
/// let snapshot = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.proxy.host", "proxy.example.com")
///     .set("accel", "gadgets.uri.proxy.path", "/accel/proxy")
///     .build();
///
/// assert_eq!(snapshot.get("accel", "gadgets.uri.proxy.host").as_deref(), Some("proxy.example.com"));
/// assert_eq!(snapshot.get("accel", "gadgets.uri.proxy.path").as_deref(), Some("/accel/proxy"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ConfigSnapshot {
    containers: HashMap<String, HashMap<String, String>>,
}

impl ConfigSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building a snapshot.
    #[must_use]
    pub fn builder() -> ConfigSnapshotBuilder {
        ConfigSnapshotBuilder::default()
    }

    /// Returns the names of all configured containers.
    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    fn lookup(&self, container: &str, key: &str) -> Option<&str> {
        self.containers
            .get(container)
            .and_then(|values| values.get(key))
            .or_else(|| {
                self.containers
                    .get(DEFAULT_CONTAINER)
                    .and_then(|values| values.get(key))
            })
            .map(String::as_str)
    }
}

impl ConfigLookup for ConfigSnapshot {
    fn get(&self, container: &str, key: &str) -> Option<String> {
        self.lookup(container, key).map(str::to_string)
    }
}

/// Builder for [`ConfigSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshotBuilder {
    containers: HashMap<String, HashMap<String, String>>,
}

impl ConfigSnapshotBuilder {
    /// Sets `key` to `value` for `container`.
    #[must_use]
    pub fn set(
        mut self,
        container: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.containers
            .entry(container.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Finishes the snapshot.
    #[must_use]
    pub fn build(self) -> ConfigSnapshot {
        ConfigSnapshot {
            containers: self.containers,
        }
    }
}

/// Reloadable container configuration.
///
/// Readers load the current snapshot without locking; [`reload`](Self::reload)
/// publishes a complete replacement atomically.
///
/// # Examples
///
/// ```
/// use gadget_uri::{ConfigLookup, ConfigSnapshot, ContainerConfig};
///
/// let config = ContainerConfig::new(
///     ConfigSnapshot::builder().set("default", "gadgets.uri.js.host", "old.com").build(),
/// );
/// config.reload(
///     ConfigSnapshot::builder().set("default", "gadgets.uri.js.host", "new.com").build(),
/// );
/// assert_eq!(config.get("default", "gadgets.uri.js.host").as_deref(), Some("new.com"));
/// ```
#[derive(Debug)]
pub struct ContainerConfig {
    current: ArcSwap<ConfigSnapshot>,
}

impl ContainerConfig {
    /// Creates a configuration holding `snapshot`.
    #[must_use]
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Returns the snapshot currently in effect.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Atomically replaces the configuration.
    pub fn reload(&self, snapshot: ConfigSnapshot) {
        let containers = snapshot.containers.len();
        self.current.store(Arc::new(snapshot));
        tracing::debug!(containers, "container config reloaded");
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::new(ConfigSnapshot::default())
    }
}

impl ConfigLookup for ContainerConfig {
    fn get(&self, container: &str, key: &str) -> Option<String> {
        self.current
            .load()
            .lookup(container, key)
            .map(str::to_string)
    }
}

/// Options for [`ConcatUriManager`](crate::ConcatUriManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatOptions {
    /// Require a container parameter and the configured host/path on inbound URIs.
    ///
    /// Default: false
    pub strict_parsing: bool,

    /// Maximum length of a generated concat URL.
    ///
    /// Default: 2048
    pub url_max_length: usize,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            strict_parsing: false,
            url_max_length: DEFAULT_URL_MAX_LENGTH,
        }
    }
}

impl ConcatOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables strict parsing.
    #[must_use]
    pub const fn with_strict_parsing(mut self, strict: bool) -> Self {
        self.strict_parsing = strict;
        self
    }

    /// Sets the maximum URL length.
    #[must_use]
    pub const fn with_url_max_length(mut self, max: usize) -> Self {
        self.url_max_length = max;
        self
    }
}

/// Options for [`IframeUriManager`](crate::IframeUriManager).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IframeOptions {
    /// Scheme forced onto rendering URIs.
    ///
    /// `None` inherits the scheme of the configured domain, and falls back
    /// to a scheme-relative URI. Default: None
    pub scheme: Option<String>,

    /// Render gadgets on their locked domain when one is available.
    ///
    /// Default: false
    pub locked_domain_enabled: bool,
}

impl IframeOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces a scheme onto rendering URIs.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Enables or disables locked domains.
    #[must_use]
    pub const fn with_locked_domain_enabled(mut self, enabled: bool) -> Self {
        self.locked_domain_enabled = enabled;
        self
    }
}

/// Options for [`JsUriManager`](crate::JsUriManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsOptions {
    /// Pass the originating gadget URL through on feature bundle URIs.
    ///
    /// Default: true
    pub add_gadget_uri: bool,
}

impl Default for JsOptions {
    fn default() -> Self {
        Self {
            add_gadget_uri: true,
        }
    }
}

impl JsOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the gadget URL parameter.
    #[must_use]
    pub const fn with_add_gadget_uri(mut self, add: bool) -> Self {
        self.add_gadget_uri = add;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn snapshot(host: &str) -> ConfigSnapshot {
        ConfigSnapshot::builder()
            .set("default", "host", host)
            .set("default", "path", format!("/{host}"))
            .set("default", "flag", "TRUE")
            .set("other", "host", "other.com")
            .build()
    }

    #[test]
    fn named_container_falls_back_to_default() {
        let config = snapshot("a.com");
        assert_eq!(config.get("other", "host").as_deref(), Some("other.com"));
        assert_eq!(config.get("other", "path").as_deref(), Some("/a.com"));
        assert_eq!(config.get("unknown", "host").as_deref(), Some("a.com"));
        assert_eq!(config.get("other", "absent"), None);
    }

    #[test]
    fn get_bool_is_case_insensitive() {
        let config = snapshot("a.com");
        assert!(config.get_bool("default", "flag"));
        assert!(!config.get_bool("default", "host"));
        assert!(!config.get_bool("default", "absent"));
    }

    #[test]
    fn require_reports_container_and_key() {
        let config = ConfigSnapshot::builder().set("default", "empty", "").build();
        assert_eq!(
            config.require("c", "absent"),
            Err(ConfigError::missing("c", "absent"))
        );
        assert_eq!(
            config.require("c", "empty"),
            Err(ConfigError::missing("c", "empty"))
        );
    }

    #[test]
    fn reload_swaps_whole_snapshot() {
        let config = ContainerConfig::new(snapshot("a.com"));
        let before = config.snapshot();
        config.reload(snapshot("b.com"));

        assert_eq!(config.get("default", "host").as_deref(), Some("b.com"));
        assert_eq!(config.get("default", "path").as_deref(), Some("/b.com"));
        // A snapshot taken earlier is unaffected.
        assert_eq!(before.get("default", "host").as_deref(), Some("a.com"));
    }

    #[test]
    fn readers_never_see_mixed_snapshots() {
        let config = Arc::new(ContainerConfig::new(snapshot("a.com")));
        let reader = {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let snap = config.snapshot();
                    let host = snap.get("default", "host").unwrap_or_default();
                    let path = snap.get("default", "path").unwrap_or_default();
                    assert_eq!(path, format!("/{host}"));
                }
            })
        };
        for i in 0..100 {
            config.reload(snapshot(&format!("h{i}.com")));
        }
        reader.join().unwrap();
    }

    #[test]
    fn options_builders() {
        let concat = ConcatOptions::new()
            .with_strict_parsing(true)
            .with_url_max_length(100);
        assert!(concat.strict_parsing);
        assert_eq!(concat.url_max_length, 100);
        assert_eq!(ConcatOptions::default().url_max_length, 2048);

        let iframe = IframeOptions::new()
            .with_scheme("https")
            .with_locked_domain_enabled(true);
        assert_eq!(iframe.scheme.as_deref(), Some("https"));
        assert!(iframe.locked_domain_enabled);

        assert!(JsOptions::default().add_gadget_uri);
        assert!(!JsOptions::new().with_add_gadget_uri(false).add_gadget_uri);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_deserializes_from_json() {
        let snapshot: ConfigSnapshot = serde_json::from_str(
            r#"{"default": {"gadgets.uri.proxy.host": "p.com"}, "c": {"gadgets.uri.proxy.path": "/p"}}"#,
        )
        .unwrap();
        assert_eq!(
            snapshot.get("c", "gadgets.uri.proxy.host").as_deref(),
            Some("p.com")
        );
        assert_eq!(snapshot.get("c", "gadgets.uri.proxy.path").as_deref(), Some("/p"));
    }
}
