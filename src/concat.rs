//! Concat URIs: fetching a batch of JS or CSS resources in one request.
//!
//! Resources travel as positionally numbered query parameters:
//!
//! ```text
//! //{host}{path}?container=C&gadget=G&debug=0&nocache=0&type=js&v=V&json=T&1=url1&2=url2
//! ```
//!
//! A batch that would push the URL past its length budget is split across
//! several URIs. When split-loading is active each resource is additionally
//! given an `eval` snippet that pulls it out of the per-batch JSON variable
//! named by `json`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::builder::UriBuilder;
use crate::config::{ConcatOptions, ConfigLookup};
use crate::constants::{DEFAULT_CONTAINER, URL_LENGTH_BUDGET_PERCENT, config_key, param};
use crate::error::ConcatUriError;
use crate::proxy_base::ProxyParams;
use crate::query::{QueryParams, encoded_pair_len};
use crate::status::UriStatus;
use crate::uri::Uri;
use crate::versioner::{Versioner, version_at};

/// Digits reserved for the numeric part of a split token.
const SPLIT_TOKEN_DIGITS: usize = 10;

/// Kind of resource a concat batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConcatType {
    /// Stylesheets; always served as one adjacent payload.
    Css,
    /// Scripts; may be split-loaded.
    Js,
}

impl ConcatType {
    /// Parses the `type` parameter (`css` or `js`).
    #[must_use]
    pub fn from_type(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("css") {
            Some(Self::Css)
        } else if value.eq_ignore_ascii_case("js") {
            Some(Self::Js)
        } else {
            None
        }
    }

    /// Parses a MIME type, as carried by the legacy `rewriteMime` parameter.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "text/css" => Some(Self::Css),
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                Some(Self::Js)
            }
            _ => None,
        }
    }

    /// Returns the wire form of the `type` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
        }
    }

    /// Returns the MIME type of concatenated output.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Css => "text/css",
            Self::Js => "text/javascript",
        }
    }
}

impl fmt::Display for ConcatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical batch of resources to concatenate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatUri {
    status: UriStatus,
    batch: Vec<Uri>,
    split_token: Option<String>,
    concat_type: Option<ConcatType>,
    params: ProxyParams,
    origin: Option<Uri>,
}

impl ConcatUri {
    /// Creates a batch to pass to [`ConcatUriManager::make`].
    #[must_use]
    pub const fn new(concat_type: ConcatType, batch: Vec<Uri>, params: ProxyParams) -> Self {
        Self {
            status: UriStatus::ValidUnversioned,
            batch,
            split_token: None,
            concat_type: Some(concat_type),
            params,
            origin: None,
        }
    }

    fn bad(container: &str, origin: &Uri) -> Self {
        Self {
            status: UriStatus::BadUri,
            batch: Vec::new(),
            split_token: None,
            concat_type: None,
            params: ProxyParams::new(container),
            origin: Some(origin.clone()),
        }
    }

    /// Returns the classification of a processed URI.
    #[must_use]
    pub const fn status(&self) -> UriStatus {
        self.status
    }

    /// Returns the resources, in order.
    #[must_use]
    pub fn batch(&self) -> &[Uri] {
        &self.batch
    }

    /// Returns the split-load variable name carried by an inbound URI.
    #[must_use]
    pub fn split_token(&self) -> Option<&str> {
        self.split_token.as_deref()
    }

    /// Returns the resource type; absent only for [`UriStatus::BadUri`].
    #[must_use]
    pub const fn concat_type(&self) -> Option<ConcatType> {
        self.concat_type
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

    /// Returns the inbound URI this batch was parsed from.
    #[must_use]
    pub const fn origin(&self) -> Option<&Uri> {
        self.origin.as_ref()
    }
}

/// One physical concat URI produced by [`ConcatUriManager::make`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatData {
    uri: Uri,
    snippets: HashMap<Uri, String>,
    source_index: usize,
}

impl ConcatData {
    /// Returns the URI to fetch.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the split-load snippet of every resource in this URI.
    ///
    /// Empty unless split-loading is active.
    #[must_use]
    pub const fn snippets(&self) -> &HashMap<Uri, String> {
        &self.snippets
    }

    /// Returns the split-load snippet of `resource`.
    #[must_use]
    pub fn snippet(&self, resource: &Uri) -> Option<&str> {
        self.snippets.get(resource).map(String::as_str)
    }

    /// Returns the index of the input [`ConcatUri`] this URI serves.
    #[must_use]
    pub const fn source_index(&self) -> usize {
        self.source_index
    }
}

/// A physical batch before versioning.
struct PendingBatch {
    source_index: usize,
    base: QueryParams,
    resources: Vec<Uri>,
    split_param: Option<String>,
}

/// Generates and parses concat URIs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gadget_uri::{ConcatOptions, ConcatType, ConcatUri, ConcatUriManager, ConfigSnapshot, ProxyParams, Uri};
///
/// let config = ConfigSnapshot::builder()
///     .set("default", "gadgets.uri.concat.host", "h")
///     .set("default", "gadgets.uri.concat.path", "/c")
///     .build();
/// let manager = ConcatUriManager::new(Arc::new(config), ConcatOptions::default());
///
/// let batch = vec![Uri::parse("a.css").unwrap(), Uri::parse("b.css").unwrap()];
/// let out = manager
///     .make(&[ConcatUri::new(ConcatType::Css, batch, ProxyParams::new("default"))], true)
///     .unwrap();
/// assert_eq!(
///     out[0].uri().to_string(),
///     "//h/c?container=default&debug=0&nocache=0&type=css&1=a.css&2=b.css"
/// );
/// ```
pub struct ConcatUriManager {
    config: Arc<dyn ConfigLookup>,
    options: ConcatOptions,
    versioner: Option<Arc<dyn Versioner<Vec<Uri>>>>,
}

impl ConcatUriManager {
    /// Creates an unversioned manager.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigLookup>, options: ConcatOptions) -> Self {
        Self {
            config,
            options,
            versioner: None,
        }
    }

    /// Versions each physical batch and validates inbound versions.
    #[must_use]
    pub fn with_versioner(mut self, versioner: Arc<dyn Versioner<Vec<Uri>>>) -> Self {
        self.versioner = Some(versioner);
        self
    }

    /// Returns the options this manager was built with.
    #[must_use]
    pub const fn options(&self) -> &ConcatOptions {
        &self.options
    }

    /// Maximum length of a batch URL before the version is appended.
    fn length_budget(&self) -> usize {
        self.options.url_max_length.saturating_mul(URL_LENGTH_BUDGET_PERCENT) / 100
    }

    /// Generates concat URIs for `batches`.
    ///
    /// Every input shares the container of the first. An input whose
    /// resources do not fit the length budget yields several URIs, each
    /// tagged with the input's index. With `is_adjacent == false`, JS
    /// batches are split-loaded when the container configures a split token.
    ///
    /// # Errors
    ///
    /// Returns `ConcatUriError::UnsupportedOperation` if a CSS batch is
    /// requested non-adjacent, and `ConcatUriError::Config` if the concat
    /// host or path is not configured.
    pub fn make(
        &self,
        batches: &[ConcatUri],
        is_adjacent: bool,
    ) -> Result<Vec<ConcatData>, ConcatUriError> {
        let Some(first) = batches.first() else {
            return Ok(Vec::new());
        };
        if !is_adjacent
            && batches
                .iter()
                .any(|b| b.concat_type == Some(ConcatType::Css))
        {
            return Err(ConcatUriError::UnsupportedOperation {
                reason: "css batches cannot be split-loaded",
            });
        }

        let container = first.container();
        let host = self.config.require(container, config_key::CONCAT_HOST)?;
        let path = self.config.require(container, config_key::CONCAT_PATH)?;
        let split_param = self
            .config
            .get(container, config_key::CONCAT_JS_SPLIT_TOKEN)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("false"));

        let mut pending = Vec::new();
        for (source_index, concat_uri) in batches.iter().enumerate() {
            let concat_type = concat_uri.concat_type.unwrap_or(ConcatType::Js);
            let split = split_param
                .clone()
                .filter(|_| !is_adjacent && concat_type == ConcatType::Js);
            let mut base = concat_uri.params.to_query_params(None, None);
            base.push(param::TYPE, concat_type.as_str());
            self.partition(&host, &path, source_index, base, split, &concat_uri.batch, &mut pending);
        }

        let versions = match &self.versioner {
            Some(versioner) => {
                let resources: Vec<Vec<Uri>> =
                    pending.iter().map(|b| b.resources.clone()).collect();
                versioner.version(&resources, container)
            }
            None => Vec::new(),
        };

        let result: Vec<ConcatData> = pending
            .into_iter()
            .enumerate()
            .map(|(i, batch)| Self::finish(&host, &path, batch, version_at(&versions, i)))
            .collect();
        tracing::debug!(
            container,
            inputs = batches.len(),
            uris = result.len(),
            "generated concat URIs"
        );
        Ok(result)
    }

    /// Splits one logical batch into physical batches within the length budget.
    #[allow(clippy::too_many_arguments)]
    fn partition(
        &self,
        host: &str,
        path: &str,
        source_index: usize,
        base: QueryParams,
        split_param: Option<String>,
        resources: &[Uri],
        pending: &mut Vec<PendingBatch>,
    ) {
        let budget = self.length_budget();
        let mut prefix = UriBuilder::new();
        prefix.set_authority(host).set_path(path);
        prefix.add_query_parameters(base.iter());
        let mut base_len = prefix.encoded_len();
        if let Some(split) = &split_param {
            base_len += 1 + encoded_pair_len(param::JSON, split) + SPLIT_TOKEN_DIGITS;
        }

        let mut current: Vec<Uri> = Vec::new();
        let mut current_len = base_len;
        for resource in resources {
            let mut added = 1 + encoded_pair_len(&(current.len() + 1).to_string(), resource.as_str());
            if !current.is_empty() && current_len + added > budget {
                tracing::debug!(
                    resources = current.len(),
                    length = current_len,
                    budget,
                    "concat batch split"
                );
                pending.push(PendingBatch {
                    source_index,
                    base: base.clone(),
                    resources: std::mem::take(&mut current),
                    split_param: split_param.clone(),
                });
                current_len = base_len;
                added = 1 + encoded_pair_len("1", resource.as_str());
            }
            if current.is_empty() && current_len + added > budget {
                tracing::warn!(
                    resource = %resource,
                    budget,
                    "resource alone exceeds concat URL budget"
                );
            }
            current.push(resource.clone());
            current_len += added;
        }

        if !current.is_empty() {
            pending.push(PendingBatch {
                source_index,
                base,
                resources: current,
                split_param,
            });
        }
    }

    fn finish(host: &str, path: &str, batch: PendingBatch, version: Option<&str>) -> ConcatData {
        let mut query = batch.base;
        if let Some(version) = version {
            query.push(param::VERSION, version);
        }

        let mut snippets = HashMap::new();
        if let Some(split_param) = &batch.split_param {
            let token = split_token(split_param, &query, &batch.resources);
            for resource in &batch.resources {
                snippets.insert(resource.clone(), eval_snippet(&token, resource));
            }
            query.push(param::JSON, token);
        }
        for (i, resource) in batch.resources.iter().enumerate() {
            query.push((i + 1).to_string(), resource.as_str());
        }

        let mut builder = UriBuilder::new();
        builder.set_authority(host).set_path(path);
        builder.add_query_parameters(query.iter());
        ConcatData {
            uri: builder.build(),
            snippets,
            source_index: batch.source_index,
        }
    }

    /// Parses an inbound concat URI.
    ///
    /// Every malformed input, including a single unparseable resource, is
    /// reported as [`UriStatus::BadUri`] for the whole batch.
    ///
    /// # Errors
    ///
    /// With strict parsing enabled, returns `ConcatUriError::Config` if the
    /// concat host or path is not configured for the named container.
    pub fn process(&self, uri: &Uri) -> Result<ConcatUri, ConcatUriError> {
        let query = uri.query_params();
        let named = query.get(param::CONTAINER);
        let container = named.unwrap_or(DEFAULT_CONTAINER);

        if self.options.strict_parsing {
            let Some(container) = named else {
                tracing::warn!(uri = %uri, "concat URI without container");
                return Ok(ConcatUri::bad(DEFAULT_CONTAINER, uri));
            };
            let host = self.config.require(container, config_key::CONCAT_HOST)?;
            let path = self.config.require(container, config_key::CONCAT_PATH)?;
            let host_matches = uri
                .authority()
                .is_some_and(|a| a.eq_ignore_ascii_case(&host));
            if !host_matches || uri.path() != path {
                tracing::warn!(container, uri = %uri, "concat URI not addressed to this container");
                return Ok(ConcatUri::bad(container, uri));
            }
        }

        let concat_type = query
            .get(param::TYPE)
            .and_then(ConcatType::from_type)
            .or_else(|| query.get(param::REWRITE_MIME).and_then(ConcatType::from_mime));
        let Some(concat_type) = concat_type else {
            tracing::warn!(container, "concat URI without a recognized type");
            return Ok(ConcatUri::bad(container, uri));
        };
        let Some(params) = ProxyParams::from_query_params(query) else {
            tracing::warn!(container, "malformed concat parameters");
            return Ok(ConcatUri::bad(container, uri));
        };

        let mut batch = Vec::new();
        for position in 1.. {
            let Some(value) = query.get(&position.to_string()) else {
                break;
            };
            let resource = match Uri::parse(value) {
                Ok(resource) => resource,
                Err(e) => {
                    tracing::warn!(container, position, error = %e, "unparseable concat resource");
                    return Ok(ConcatUri::bad(container, uri));
                }
            };
            // Network-path references take the scheme of the request.
            let resource = if resource.scheme().is_none() && resource.authority().is_some() {
                resource.with_scheme(uri.scheme())
            } else {
                resource
            };
            batch.push(resource);
        }

        let status = match (&self.versioner, query.get(param::VERSION)) {
            (Some(versioner), Some(version)) => versioner.validate(&batch, container, version),
            _ => UriStatus::ValidUnversioned,
        };
        tracing::debug!(container, resources = batch.len(), status = %status, "processed concat URI");

        Ok(ConcatUri {
            status,
            batch,
            split_token: query.get(param::JSON).map(str::to_string),
            concat_type: Some(concat_type),
            params,
            origin: Some(uri.clone()),
        })
    }
}

/// Names the JSON variable a split-loaded batch is delivered in.
///
/// Derived from the batch contents so distinct batches on one page get
/// distinct variables and regenerating a batch yields the same name.
fn split_token(split_param: &str, query: &QueryParams, resources: &[Uri]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.to_string().as_bytes());
    for resource in resources {
        hasher.update(b"\n");
        hasher.update(resource.as_str().as_bytes());
    }
    let digest = hasher.finalize();
    let id = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{split_param}{id}")
}

/// `eval(<token>['<resource>']);`, with the resource made safe for a
/// single-quoted JS string.
fn eval_snippet(token: &str, resource: &Uri) -> String {
    let mut escaped = String::with_capacity(resource.as_str().len());
    for c in resource.as_str().chars() {
        match c {
            '\'' => escaped.push_str("%27"),
            '\\' => escaped.push_str("%5C"),
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("%{byte:02X}"));
                }
            }
            c => escaped.push(c),
        }
    }
    format!("eval({token}['{escaped}']);")
}
