//! Locked domains: per-gadget hosts isolating gadgets from each other.
//!
//! A locked host is `{prefix}{suffix}`, where the prefix is derived from the
//! gadget spec URL and the suffix comes from container configuration
//! (`gadgets.uri.iframe.lockedDomainSuffix`).

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::ConfigLookup;
use crate::constants::config_key;
use crate::gadget::Gadget;
use crate::uri::Uri;

/// Length of a hashed locked-domain prefix, in hex characters.
pub const LOCKED_DOMAIN_PREFIX_LEN: usize = 32;

/// Decides which host a gadget renders on and whether a host may serve it.
pub trait LockedDomainService: Send + Sync {
    /// Returns the locked host prefix for `gadget`, or `None` if the gadget
    /// renders on the unlocked domain in `container`.
    fn locked_domain_prefix(&self, gadget: &Gadget, container: &str) -> Option<String>;

    /// Returns true if `host` may serve the gadget at `gadget_url`.
    fn is_host_valid(&self, host: &str, gadget_url: &Uri, container: &str) -> bool;
}

impl<S: LockedDomainService + ?Sized> LockedDomainService for Arc<S> {
    fn locked_domain_prefix(&self, gadget: &Gadget, container: &str) -> Option<String> {
        (**self).locked_domain_prefix(gadget, container)
    }

    fn is_host_valid(&self, host: &str, gadget_url: &Uri, container: &str) -> bool {
        (**self).is_host_valid(host, gadget_url, container)
    }
}

/// Renders every gadget on the unlocked domain and accepts any host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLockedDomainService;

impl LockedDomainService for NoLockedDomainService {
    fn locked_domain_prefix(&self, _: &Gadget, _: &str) -> Option<String> {
        None
    }

    fn is_host_valid(&self, _: &str, _: &Uri, _: &str) -> bool {
        true
    }
}

/// Derives locked hosts from a hash of the gadget spec URL.
///
/// Containers without a configured suffix render unlocked.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gadget_uri::{ConfigSnapshot, HashLockedDomainService, LockedDomainService, Uri};
///
/// let config = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.iframe.lockedDomainSuffix", "-a.gadgets.com")
///     .build();
/// let service = HashLockedDomainService::new(Arc::new(config));
///
/// let spec = Uri::parse("http://example.com/gadget.xml").unwrap();
/// let host = HashLockedDomainService::locked_host(&spec, "-a.gadgets.com");
/// assert!(service.is_host_valid(&host, &spec, "default"));
/// assert!(!service.is_host_valid("evil-a.gadgets.com", &spec, "default"));
/// ```
pub struct HashLockedDomainService {
    config: Arc<dyn ConfigLookup>,
}

impl HashLockedDomainService {
    /// Creates a service reading suffixes from `config`.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigLookup>) -> Self {
        Self { config }
    }

    /// Hex prefix for the gadget at `gadget_url`.
    #[must_use]
    pub fn prefix_for(gadget_url: &Uri) -> String {
        let digest = Sha256::digest(gadget_url.as_str().as_bytes());
        let mut prefix = hex::encode(digest);
        prefix.truncate(LOCKED_DOMAIN_PREFIX_LEN);
        prefix
    }

    /// Full locked host for the gadget at `gadget_url`.
    #[must_use]
    pub fn locked_host(gadget_url: &Uri, suffix: &str) -> String {
        format!("{}{suffix}", Self::prefix_for(gadget_url))
    }

    fn suffix(&self, container: &str) -> Option<String> {
        self.config
            .get(container, config_key::LOCKED_DOMAIN_SUFFIX)
            .filter(|s| !s.is_empty())
    }
}

impl LockedDomainService for HashLockedDomainService {
    fn locked_domain_prefix(&self, gadget: &Gadget, container: &str) -> Option<String> {
        self.suffix(container)?;
        Some(Self::prefix_for(gadget.spec_url()))
    }

    fn is_host_valid(&self, host: &str, gadget_url: &Uri, container: &str) -> bool {
        let Some(suffix) = self.suffix(container) else {
            return true;
        };
        let expected = Self::locked_host(gadget_url, &suffix);
        let valid = host.eq_ignore_ascii_case(&expected);
        if !valid {
            tracing::debug!(container, host, expected = %expected, "host is not the gadget's locked domain");
        }
        valid
    }
}
