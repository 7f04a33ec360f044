//! Mutable builder for [`Uri`] instances.

use crate::error::ParseError;
use crate::query::QueryParams;
use crate::uri::Uri;

/// Accumulates URI components and emits immutable [`Uri`] values.
///
/// The managers grow a builder incrementally (for instance one resource
/// parameter at a time while watching the serialized length), so setters
/// take `&mut self` and return `&mut Self` for chaining.
///
/// # Examples
///
/// ```
/// use gadget_uri::UriBuilder;
///
/// let uri = UriBuilder::new()
///     .set_authority("www.example.com")
///     .set_path("/gadgets/ifr")
///     .add_query_parameter("container", "default")
///     .add_fragment_parameter("st", "token")
///     .build();
///
/// assert_eq!(uri.to_string(), "//www.example.com/gadgets/ifr?container=default#st=token");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UriBuilder {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: QueryParams,
    fragment: QueryParams,
    /// Fragment that is not made of parameters
    fragment_text: Option<String>,
}

impl UriBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding every component of `uri`.
    #[must_use]
    pub fn from_uri(uri: &Uri) -> Self {
        let (fragment, fragment_text) = match uri.fragment() {
            Some(raw) if raw.contains('=') => (uri.fragment_params().clone(), None),
            Some(raw) => (QueryParams::new(), Some(raw.to_string())),
            None => (QueryParams::new(), None),
        };
        Self {
            scheme: uri.scheme().map(str::to_string),
            authority: uri.authority().map(str::to_string),
            path: uri.path().to_string(),
            query: uri.query_params().clone(),
            fragment,
            fragment_text,
        }
    }

    /// Sets or clears the scheme.
    pub fn set_scheme(&mut self, scheme: Option<&str>) -> &mut Self {
        self.scheme = scheme.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// Sets the authority.
    pub fn set_authority(&mut self, authority: &str) -> &mut Self {
        self.authority = Some(authority.to_string()).filter(|a| !a.is_empty());
        self
    }

    /// Sets or clears the authority.
    pub fn set_authority_opt(&mut self, authority: Option<&str>) -> &mut Self {
        self.authority = authority.filter(|a| !a.is_empty()).map(str::to_string);
        self
    }

    /// Sets scheme and authority from a configured host.
    ///
    /// A value starting with `//` or containing `://` is parsed as a URI
    /// and supplies its scheme (if any) and authority. Anything else, such
    /// as `render.example.com` or `127.0.0.1:8080`, is taken verbatim as
    /// the authority.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if a qualified host does not parse.
    pub fn set_configured_host(&mut self, host: &str) -> Result<&mut Self, ParseError> {
        if host.starts_with("//") || host.contains("://") {
            let parsed = Uri::parse(host)?;
            self.set_scheme(parsed.scheme())
                .set_authority_opt(parsed.authority());
        } else {
            self.set_authority(host);
        }
        Ok(self)
    }

    /// Sets the path, which must already be encoded.
    pub fn set_path(&mut self, path: &str) -> &mut Self {
        self.path = path.to_string();
        self
    }

    /// Appends a query parameter.
    pub fn add_query_parameter(&mut self, name: &str, value: &str) -> &mut Self {
        self.query.push(name, value);
        self
    }

    /// Appends every parameter in `params`.
    pub fn add_query_parameters<'a>(
        &mut self,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> &mut Self {
        for (k, v) in params {
            self.query.push(k, v);
        }
        self
    }

    /// Replaces every value of a query parameter.
    pub fn set_query_parameter(&mut self, name: &str, value: &str) -> &mut Self {
        self.query.set(name, value);
        self
    }

    /// Removes a query parameter.
    pub fn remove_query_parameter(&mut self, name: &str) -> &mut Self {
        self.query.remove(name);
        self
    }

    /// Appends a fragment parameter.
    pub fn add_fragment_parameter(&mut self, name: &str, value: &str) -> &mut Self {
        if let Some(text) = self.fragment_text.take() {
            self.fragment = QueryParams::parse(&text);
        }
        self.fragment.push(name, value);
        self
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    /// Returns the first value of a fragment parameter.
    #[must_use]
    pub fn fragment_parameter(&self, name: &str) -> Option<&str> {
        self.fragment.get(name)
    }

    /// Returns the query parameters accumulated so far.
    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Returns the configured scheme.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the configured authority.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Returns the configured path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Length of the URI [`build`](Self::build) would currently produce.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = self.path.len();
        if let Some(scheme) = &self.scheme {
            len += scheme.len() + 1;
        }
        if let Some(authority) = &self.authority {
            len += authority.len() + 2;
        }
        if !self.query.is_empty() {
            len += 1 + self.query.encoded_len();
        }
        if !self.fragment.is_empty() {
            len += 1 + self.fragment.encoded_len();
        } else if let Some(text) = &self.fragment_text {
            len += 1 + text.len();
        }
        len
    }

    /// Emits a [`Uri`] from the current state.
    #[must_use]
    pub fn build(&self) -> Uri {
        let query = (!self.query.is_empty()).then(|| self.query.to_string());
        let fragment = if self.fragment.is_empty() {
            self.fragment_text.clone()
        } else {
            Some(self.fragment.to_string())
        };
        Uri::from_raw_parts(
            self.scheme.clone(),
            self.authority.clone(),
            self.path.clone(),
            query,
            fragment,
        )
    }
}

impl From<&Uri> for UriBuilder {
    fn from(uri: &Uri) -> Self {
        Self::from_uri(uri)
    }
}
