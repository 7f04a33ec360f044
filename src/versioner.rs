//! Cache-busting fingerprints for managed resources.
//!
//! Every URI manager versions its output through the same [`Versioner`]
//! capability, parameterized by what it versions:
//!
//! | Manager | Resource type |
//! |---------|---------------|
//! | proxy   | [`Uri`](crate::Uri) of the proxied resource |
//! | concat  | `Vec<Uri>`, one physical batch |
//! | iframe  | [`Uri`](crate::Uri) of the gadget spec |
//! | js      | [`JsUri`](crate::JsUri) |

use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

use crate::status::UriStatus;

/// Produces and checks fingerprints for resources of type `T`.
///
/// Implementations must be deterministic for unchanged content; callers may
/// memoize [`version`](Self::version) results keyed by the exact input
/// (see [`CachingVersioner`]).
pub trait Versioner<T>: Send + Sync {
    /// Returns one fingerprint per resource, index-correlated with
    /// `resources`. `None` means the resource cannot be versioned and the
    /// URI is emitted without a version parameter.
    fn version(&self, resources: &[T], container: &str) -> Vec<Option<String>>;

    /// Checks a fingerprint against current content.
    ///
    /// Returns [`UriStatus::ValidVersioned`] on a match and
    /// [`UriStatus::InvalidVersion`] otherwise.
    fn validate(&self, resource: &T, container: &str, version: &str) -> UriStatus;
}

impl<T, V: Versioner<T> + ?Sized> Versioner<T> for Arc<V> {
    fn version(&self, resources: &[T], container: &str) -> Vec<Option<String>> {
        (**self).version(resources, container)
    }

    fn validate(&self, resource: &T, container: &str, version: &str) -> UriStatus {
        (**self).validate(resource, container, version)
    }
}

impl<T, V: Versioner<T> + ?Sized> Versioner<T> for Box<V> {
    fn version(&self, resources: &[T], container: &str) -> Vec<Option<String>> {
        (**self).version(resources, container)
    }

    fn validate(&self, resource: &T, container: &str, version: &str) -> UriStatus {
        (**self).validate(resource, container, version)
    }
}

/// Returns the fingerprint at `index`, tolerating short result lists.
pub(crate) fn version_at(versions: &[Option<String>], index: usize) -> Option<&str> {
    versions
        .get(index)
        .and_then(Option::as_deref)
        .filter(|v| !v.is_empty())
}

/// Hex fingerprint of `content`: the first 128 bits of its SHA-256.
#[must_use]
pub fn fingerprint(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..16])
}

/// Supplies the bytes a [`HashingVersioner`] fingerprints.
pub trait ContentSource<T>: Send + Sync {
    /// Returns the current content of `resource`, or `None` if unknown.
    fn content(&self, resource: &T, container: &str) -> Option<Vec<u8>>;
}

/// Versions resources by hashing the content a [`ContentSource`] returns.
///
/// # Examples
///
/// ```
/// use gadget_uri::{ContentSource, HashingVersioner, Uri, UriStatus, Versioner};
///
/// struct Fixed;
///
/// impl ContentSource<Uri> for Fixed {
///     fn content(&self, _: &Uri, _: &str) -> Option<Vec<u8>> {
///         Some(b"body".to_vec())
///     }
/// }
///
/// let versioner = HashingVersioner::new(Fixed);
/// let uri = Uri::parse("http://a.com/x.js").unwrap();
/// let versions = versioner.version(&[uri.clone()], "default");
/// let v = versions[0].as_deref().unwrap();
/// assert_eq!(versioner.validate(&uri, "default", v), UriStatus::ValidVersioned);
/// assert_eq!(versioner.validate(&uri, "default", "stale"), UriStatus::InvalidVersion);
/// ```
#[derive(Debug, Clone)]
pub struct HashingVersioner<S> {
    source: S,
}

impl<S> HashingVersioner<S> {
    /// Creates a versioner over `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Returns the content source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<T, S: ContentSource<T>> Versioner<T> for HashingVersioner<S> {
    fn version(&self, resources: &[T], container: &str) -> Vec<Option<String>> {
        resources
            .iter()
            .map(|r| self.source.content(r, container).map(|c| fingerprint(&c)))
            .collect()
    }

    fn validate(&self, resource: &T, container: &str, version: &str) -> UriStatus {
        match self.source.content(resource, container) {
            Some(content) if fingerprint(&content) == version => UriStatus::ValidVersioned,
            _ => UriStatus::InvalidVersion,
        }
    }
}

/// Memoizes [`Versioner::version`] results of an inner versioner.
///
/// Entries are keyed by container and resource and held in a bounded
/// [`moka`] cache, which evicts the least valuable entries once
/// `max_entries` is reached. Validation is always delegated.
pub struct CachingVersioner<T, V> {
    inner: V,
    cache: Cache<(String, T), Option<String>>,
}

impl<T, V> CachingVersioner<T, V>
where
    T: Eq + Hash + Send + Sync + 'static,
{
    /// Default number of cached fingerprints.
    pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

    /// Wraps `inner` with the default capacity.
    #[must_use]
    pub fn new(inner: V) -> Self {
        Self::with_max_entries(inner, Self::DEFAULT_MAX_ENTRIES)
    }

    /// Wraps `inner`, holding at most `max_entries` fingerprints.
    #[must_use]
    pub fn with_max_entries(inner: V, max_entries: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    /// Drops every cached fingerprint.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached fingerprints.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, V> Versioner<T> for CachingVersioner<T, V>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
    V: Versioner<T>,
{
    fn version(&self, resources: &[T], container: &str) -> Vec<Option<String>> {
        let mut results: Vec<Option<Option<String>>> = resources
            .iter()
            .map(|r| self.cache.get(&(container.to_string(), r.clone())))
            .collect();

        let missing: Vec<usize> = (0..resources.len())
            .filter(|&i| results[i].is_none())
            .collect();
        if !missing.is_empty() {
            let misses: Vec<T> = missing.iter().map(|&i| resources[i].clone()).collect();
            let computed = self.inner.version(&misses, container);
            tracing::debug!(container, misses = misses.len(), "computed uncached versions");

            for (pos, &i) in missing.iter().enumerate() {
                let value = computed.get(pos).cloned().flatten();
                self.cache
                    .insert((container.to_string(), resources[i].clone()), value.clone());
                results[i] = Some(value);
            }
        }

        results.into_iter().map(Option::flatten).collect()
    }

    fn validate(&self, resource: &T, container: &str, version: &str) -> UriStatus {
        self.inner.validate(resource, container, version)
    }
}
