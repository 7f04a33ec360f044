//! Ordered query and fragment parameters.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

/// Parameters from a query string or a parameterized fragment.
///
/// Keys may repeat and insertion order is preserved, so a serialized URI
/// reads back exactly as it was built. Lookups by key return the first
/// occurrence. Values are stored decoded and form-urlencoded on output.
///
/// # Examples
///
/// ```
/// use gadget_uri::QueryParams;
///
/// let params = QueryParams::parse("container=default&url=http%3A%2F%2Fa.com%2Fx.js");
/// assert_eq!(params.get("url"), Some("http://a.com/x.js"));
/// assert_eq!(params.to_string(), "container=default&url=http%3A%2F%2Fa.com%2Fx.js");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a form-urlencoded string (without leading '?' or '#').
    ///
    /// Parsing is lenient: empty pairs are skipped, a pair without '=' has
    /// an empty value, and a stray '%' is kept literally.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let params = form_urlencoded::parse(input.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { params }
    }

    /// Appends a parameter, keeping any existing values for the key.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single value at the position
    /// of the first occurrence, or appends it if absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter().position(|(k, _)| k == name) {
            Some(idx) => {
                self.params[idx].1 = value;
                let mut seen = false;
                self.params.retain(|(k, _)| {
                    if k != name {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.params.push((name.to_string(), value)),
        }
    }

    /// Removes every value of `name`, returning whether any was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.params.len();
        self.params.retain(|(k, _)| k != name);
        before != self.params.len()
    }

    /// Returns the first value for a parameter, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for a parameter, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the parameter is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of parameters, counting repeated keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns an iterator over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Length of the serialized form, without building the string.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let separators = self.params.len().saturating_sub(1);
        self.params
            .iter()
            .map(|(k, v)| encoded_pair_len(k, v))
            .sum::<usize>()
            + separators
    }
}

/// Form-urlencodes a single component.
#[must_use]
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Length of `name=value` once both sides are form-urlencoded.
#[must_use]
pub fn encoded_pair_len(name: &str, value: &str) -> usize {
    let len = |s: &str| {
        form_urlencoded::byte_serialize(s.as_bytes())
            .map(str::len)
            .sum::<usize>()
    };
    len(name) + 1 + len(value)
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.params {
            serializer.append_pair(k, v);
        }
        f.write_str(&serializer.finish())
    }
}

impl FromStr for QueryParams {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
