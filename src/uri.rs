//! Immutable URI value type.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::builder::UriBuilder;
use crate::error::{ParseError, ParseErrorKind};
use crate::query::QueryParams;

/// A parsed URI.
///
/// Every component except the path is optional. The query and fragment are
/// kept in their raw (encoded) form for faithful re-serialization and are
/// also exposed as decoded parameters.
///
/// # Structure
///
/// ```text
/// [scheme:][//authority]path[?query][#fragment]
/// ```
///
/// # Examples
///
/// ```
/// use gadget_uri::Uri;
///
/// let uri = Uri::parse("http://www.example.com/gadgets/proxy?container=default&url=http%3A%2F%2Fa.com%2Fb.gif").unwrap();
/// assert_eq!(uri.scheme(), Some("http"));
/// assert_eq!(uri.authority(), Some("www.example.com"));
/// assert_eq!(uri.path(), "/gadgets/proxy");
/// assert_eq!(uri.query_parameter("url"), Some("http://a.com/b.gif"));
///
/// // Scheme-relative URIs keep an authority without a scheme
/// let relative = Uri::parse("//cdn.example.com/x.css").unwrap();
/// assert_eq!(relative.scheme(), None);
/// assert_eq!(relative.to_string(), "//cdn.example.com/x.css");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    query_params: QueryParams,
    fragment: Option<String>,
    fragment_params: QueryParams,
    /// Serialized form
    serialized: String,
}

impl Uri {
    /// Parses a URI reference, absolute or relative.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The input contains whitespace, control, or otherwise illegal characters
    /// - A '%' is not followed by two hex digits
    /// - The scheme is syntactically invalid
    /// - The authority carries a non-numeric port
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Self::parse_inner(input).map_err(|kind| ParseError {
            input: input.to_string(),
            kind,
        })
    }

    /// Assembles a URI from already-encoded components.
    pub(crate) fn from_raw_parts(
        scheme: Option<String>,
        authority: Option<String>,
        path: String,
        query: Option<String>,
        fragment: Option<String>,
    ) -> Self {
        let query = query.filter(|q| !q.is_empty());
        let fragment = fragment.filter(|f| !f.is_empty());
        let query_params = query.as_deref().map(QueryParams::parse).unwrap_or_default();
        let fragment_params = fragment
            .as_deref()
            .map(QueryParams::parse)
            .unwrap_or_default();
        let serialized = Self::serialize(
            scheme.as_deref(),
            authority.as_deref(),
            &path,
            query.as_deref(),
            fragment.as_deref(),
        );

        Self {
            scheme,
            authority,
            path,
            query,
            query_params,
            fragment,
            fragment_params,
            serialized,
        }
    }

    /// Returns the scheme, if present.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the authority (`[userinfo@]host[:port]`), if present.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Returns the host portion of the authority, without userinfo or port.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        let authority = self.authority.as_deref()?;
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        Some(split_port(host_port).0)
    }

    /// Returns the path, still percent-encoded.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string, if present.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the decoded query parameters.
    #[must_use]
    pub const fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_params.get(name)
    }

    /// Returns every value of a repeated query parameter, in order.
    pub fn query_parameters<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query_params.get_all(name)
    }

    /// Returns the raw fragment, if present.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns the fragment decoded as parameters.
    #[must_use]
    pub const fn fragment_params(&self) -> &QueryParams {
        &self.fragment_params
    }

    /// Returns the first value of a fragment parameter.
    #[must_use]
    pub fn fragment_parameter(&self, name: &str) -> Option<&str> {
        self.fragment_params.get(name)
    }

    /// Returns the serialized URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Returns a copy of this URI with the given scheme.
    #[must_use]
    pub fn with_scheme(&self, scheme: Option<&str>) -> Self {
        Self::from_raw_parts(
            scheme.map(str::to_string),
            self.authority.clone(),
            self.path.clone(),
            self.query.clone(),
            self.fragment.clone(),
        )
    }

    /// Returns a builder initialized from this URI.
    #[must_use]
    pub fn to_builder(&self) -> UriBuilder {
        UriBuilder::from_uri(self)
    }

    fn parse_inner(input: &str) -> Result<Self, ParseErrorKind> {
        Self::validate_chars(input)?;

        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => {
                if let Some(idx) = fragment.find('#') {
                    return Err(ParseErrorKind::IllegalChar {
                        char: '#',
                        position: rest.len() + 1 + idx,
                    });
                }
                (rest, Some(fragment.to_string()))
            }
            None => (input, None),
        };

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };

        let (scheme, rest) = Self::split_scheme(rest)?;

        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                let authority = &after[..end];
                Self::validate_authority(authority)?;
                (Some(authority.to_string()), &after[end..])
            }
            None => (None, rest),
        };

        Ok(Self::from_raw_parts(
            scheme,
            authority,
            path.to_string(),
            query,
            fragment,
        ))
    }

    fn validate_chars(input: &str) -> Result<(), ParseErrorKind> {
        let bytes = input.as_bytes();
        for (position, c) in input.char_indices() {
            if c.is_whitespace() || c.is_control() || "\"<>\\^`{|}".contains(c) {
                return Err(ParseErrorKind::IllegalChar { char: c, position });
            }
            if c == '%' {
                let valid = bytes
                    .get(position + 1..position + 3)
                    .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
                if !valid {
                    return Err(ParseErrorKind::InvalidPercentEncoding { position });
                }
            }
        }
        Ok(())
    }

    fn split_scheme(input: &str) -> Result<(Option<String>, &str), ParseErrorKind> {
        let Some(colon) = input.find(':') else {
            return Ok((None, input));
        };
        // A ':' after the first '/' belongs to the path.
        if input.find('/').is_some_and(|slash| slash < colon) {
            return Ok((None, input));
        }

        let scheme = &input[..colon];
        let mut chars = scheme.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid {
            return Err(ParseErrorKind::InvalidScheme {
                scheme: scheme.to_string(),
            });
        }
        Ok((Some(scheme.to_string()), &input[colon + 1..]))
    }

    fn validate_authority(authority: &str) -> Result<(), ParseErrorKind> {
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        if let (_, Some(port)) = split_port(host_port) {
            if !port.chars().all(|c| c.is_ascii_digit()) {
                return Err(ParseErrorKind::InvalidPort {
                    port: port.to_string(),
                });
            }
        }
        Ok(())
    }

    fn serialize(
        scheme: Option<&str>,
        authority: Option<&str>,
        path: &str,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> String {
        let mut result = String::new();
        if let Some(scheme) = scheme {
            result.push_str(scheme);
            result.push(':');
        }
        if let Some(authority) = authority {
            result.push_str("//");
            result.push_str(authority);
        }
        result.push_str(path);
        if let Some(query) = query {
            result.push('?');
            result.push_str(query);
        }
        if let Some(fragment) = fragment {
            result.push('#');
            result.push_str(fragment);
        }
        result
    }
}

/// Splits `host[:port]`, leaving IPv6 literals intact.
fn split_port(host_port: &str) -> (&str, Option<&str>) {
    let search_from = host_port.rfind(']').unwrap_or(0);
    match host_port[search_from..].rfind(':') {
        Some(idx) => {
            let idx = search_from + idx;
            (&host_port[..idx], Some(&host_port[idx + 1..]))
        }
        None => (host_port, None),
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

impl FromStr for Uri {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.serialized
    }
}

impl TryFrom<&str> for Uri {
    type Error = ParseError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl PartialOrd for Uri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serialized.cmp(&other.serialized)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Uri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.serialized)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Uri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
