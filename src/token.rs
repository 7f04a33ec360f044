//! Security token codec interface.
//!
//! The cryptography behind security tokens lives outside this crate. The
//! iframe manager only needs to turn a set of named fields into an opaque
//! string and back.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::TokenError;

/// Well-known token field names.
pub mod field {
    /// Owner id
    pub const OWNER: &str = "o";
    /// Viewer id
    pub const VIEWER: &str = "v";
    /// Gadget spec URL
    pub const APP_URL: &str = "u";
    /// Module id
    pub const MODULE_ID: &str = "m";
    /// Container
    pub const CONTAINER: &str = "c";
}

/// Opaque encoding of security token fields.
///
/// Implementations are expected to sign or encrypt; [`decode`](Self::decode)
/// must reject anything [`encode`](Self::encode) did not produce.
pub trait TokenCodec: Send + Sync {
    /// Encodes `fields` into a token string.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if the fields cannot be encoded.
    fn encode(&self, fields: &BTreeMap<String, String>) -> Result<String, TokenError>;

    /// Decodes a token string back into its fields.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Decode` if the token is malformed or fails
    /// verification.
    fn decode(&self, token: &str) -> Result<BTreeMap<String, String>, TokenError>;
}

impl<C: TokenCodec + ?Sized> TokenCodec for Arc<C> {
    fn encode(&self, fields: &BTreeMap<String, String>) -> Result<String, TokenError> {
        (**self).encode(fields)
    }

    fn decode(&self, token: &str) -> Result<BTreeMap<String, String>, TokenError> {
        (**self).decode(token)
    }
}
